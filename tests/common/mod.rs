#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

pub struct CmdResult {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub log_path: PathBuf,
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis())
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

pub fn resolve_bin_path() -> PathBuf {
    if let Some(path) = option_env!("CARGO_BIN_EXE_ssd-linux-runtime") {
        return PathBuf::from(path);
    }

    let fallback = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(PathBuf::from))
        .and_then(|deps| deps.parent().map(PathBuf::from))
        .map(|debug_dir| debug_dir.join("ssd-linux-runtime"));

    match fallback {
        Some(path) if path.exists() => path,
        _ => panic!("unable to resolve ssd-linux-runtime binary path for integration test"),
    }
}

/// Command with a hermetic environment: no host config file, no syslog,
/// and a health check that always passes unless overridden.
pub fn base_command(args: &[&str], env: &[(&str, &str)]) -> Command {
    let mut cmd = Command::new(resolve_bin_path());
    cmd.args(args)
        .env("SSDRT_CONFIG", "/nonexistent/ssdrt-test/config.toml")
        .env("SSDRT_LOG_SYSLOG", "false")
        .env("SSDRT_READ_DIRECT", "false")
        .env("SSDRT_HEALTH_COMMAND", "true")
        .env("RUST_BACKTRACE", "1");
    for (k, v) in env {
        cmd.env(k, v);
    }
    cmd
}

fn write_case_log(case_name: &str, args: &[&str], status: ExitStatus, stdout: &str, stderr: &str) -> PathBuf {
    let root = std::env::temp_dir().join("ssdrt-test-logs");
    fs::create_dir_all(&root).expect("create temp test log dir");
    let log_path = root.join(format!("{}-{}.log", sanitize(case_name), now_millis()));

    let mut log_content = String::new();
    log_content.push_str(&format!("case={case_name}\n"));
    log_content.push_str(&format!("args={args:?}\n"));
    log_content.push_str(&format!("status={status}\n"));
    log_content.push_str("----- stdout -----\n");
    log_content.push_str(stdout);
    log_content.push('\n');
    log_content.push_str("----- stderr -----\n");
    log_content.push_str(stderr);
    log_content.push('\n');
    fs::write(&log_path, log_content).expect("write test log");
    log_path
}

pub fn run_cli_case(case_name: &str, args: &[&str], env: &[(&str, &str)]) -> CmdResult {
    let output = base_command(args, env)
        .output()
        .expect("execute ssd-linux-runtime command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let log_path = write_case_log(case_name, args, output.status, &stdout, &stderr);

    CmdResult {
        status: output.status,
        stdout,
        stderr,
        log_path,
    }
}

/// Start the binary with stdout/stderr captured, for signal tests.
pub fn spawn_cli(args: &[&str], env: &[(&str, &str)]) -> Child {
    base_command(args, env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn ssd-linux-runtime")
}

/// Poll until the child exits or `timeout` passes.
pub fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Option<ExitStatus> {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if let Some(status) = child.try_wait().expect("try_wait") {
            return Some(status);
        }
        std::thread::sleep(Duration::from_millis(25));
    }
    None
}

/// Collect a finished child's output and write the case log.
pub fn finish(case_name: &str, args: &[&str], child: Child) -> CmdResult {
    let output = child.wait_with_output().expect("collect child output");
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let log_path = write_case_log(case_name, args, output.status, &stdout, &stderr);
    CmdResult {
        status: output.status,
        stdout,
        stderr,
        log_path,
    }
}

/// A file standing in for a block device.
pub fn scratch_device(len: usize) -> tempfile::NamedTempFile {
    let file = tempfile::NamedTempFile::new().expect("create scratch device");
    fs::write(file.path(), vec![0xA5u8; len]).expect("fill scratch device");
    file
}
