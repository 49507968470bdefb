//! Top-level CLI definition and dispatch.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use serde_json::{Value, json};
use thiserror::Error;

use ssd_linux_runtime::core::config::Config;
use ssd_linux_runtime::daemon::lifecycle::open_logger;
use ssd_linux_runtime::daemon::loop_main::{
    CycleReport, CycleResult, DaemonArgs, MaintenanceLoop, SkipReason, StepOutcome, run_daemon,
};
use ssd_linux_runtime::daemon::signals::SignalHandler;

/// ssd-linux-runtime: periodic direct read, discard, and SMART health check.
#[derive(Debug, Parser)]
#[command(
    name = "ssd-linux-runtime",
    author,
    version,
    about = "SSD maintenance daemon: direct reads, TRIM, and SMART health checks",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Run the maintenance daemon.
    Run(RunArgs),
    /// Run a single maintenance cycle in the foreground and report it.
    Cycle(CycleArgs),
    /// View the effective configuration.
    Config(ConfigArgs),
}

#[derive(Debug, Clone, Args, Default)]
struct RunArgs {
    /// Stay attached to the terminal and log to stderr.
    #[arg(long)]
    foreground: bool,
    /// Target device (overrides config).
    #[arg(long, value_name = "PATH")]
    device: Option<PathBuf>,
    /// Stop after this many cycles.
    #[arg(long, value_name = "N")]
    max_cycles: Option<u64>,
}

#[derive(Debug, Clone, Args, Default)]
struct CycleArgs {
    /// Target device (overrides config).
    #[arg(long, value_name = "PATH")]
    device: Option<PathBuf>,
}

#[derive(Debug, Clone, Args, Default)]
struct ConfigArgs {
    #[command(subcommand)]
    command: Option<ConfigCommand>,
}

#[derive(Debug, Clone, Subcommand)]
enum ConfigCommand {
    /// Print the config file path in use.
    Path,
    /// Print the effective configuration.
    Show,
    /// Load and validate the configuration, then exit.
    Validate,
}

/// Errors surfaced by the CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input at runtime.
    #[error("{0}")]
    User(String),
    /// Environment/runtime failure.
    #[error("{0}")]
    Runtime(String),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

/// Dispatch a parsed command line.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    match &cli.command {
        Command::Run(args) => run_run(cli, args),
        Command::Cycle(args) => run_cycle(cli, args),
        Command::Config(args) => run_config(cli, args),
    }
}

fn load_config(cli: &Cli, device: Option<&PathBuf>) -> Result<Config, CliError> {
    let mut config =
        Config::load(cli.config.as_deref()).map_err(|e| CliError::User(e.to_string()))?;
    if let Some(device) = device {
        config.device.path.clone_from(device);
        config
            .validate()
            .map_err(|e| CliError::User(e.to_string()))?;
    }
    Ok(config)
}

fn run_run(cli: &Cli, args: &RunArgs) -> Result<(), CliError> {
    let config = load_config(cli, args.device.as_ref())?;
    let daemon_args = DaemonArgs {
        foreground: args.foreground,
        max_cycles: args.max_cycles,
    };
    let summary =
        run_daemon(&config, &daemon_args).map_err(|e| CliError::Runtime(e.to_string()))?;

    if args.foreground && cli.json {
        write_json_line(&json!({
            "command": "run",
            "cycles": summary.cycles,
            "failed_cycles": summary.failed_cycles,
            "reloads": summary.reloads,
        }))?;
    }
    Ok(())
}

fn run_cycle(cli: &Cli, args: &CycleArgs) -> Result<(), CliError> {
    let config = load_config(cli, args.device.as_ref())?;
    let logger = Arc::new(open_logger(&config, !cli.json));
    let mut maintenance = MaintenanceLoop::new(&config, Arc::clone(&logger), SignalHandler::detached())
        .map_err(|e| CliError::Runtime(e.to_string()))?;

    let report = maintenance.run_cycle();
    logger.close();

    if cli.json {
        write_json_line(&report_json(&config, &report))?;
    } else {
        print_report(&config, &report)?;
    }
    Ok(())
}

fn step_json(step: &StepOutcome) -> Value {
    match step {
        StepOutcome::Ok => json!({ "status": "ok" }),
        StepOutcome::Skipped(reason) => json!({
            "status": "skipped",
            "reason": skip_label(*reason),
        }),
        StepOutcome::Failed(e) => json!({
            "status": "failed",
            "code": e.code(),
            "error": e.to_string(),
        }),
    }
}

const fn skip_label(reason: SkipReason) -> &'static str {
    match reason {
        SkipReason::Disabled => "disabled",
        SkipReason::ShutdownRequested => "shutdown_requested",
    }
}

const fn result_label(result: &CycleResult) -> &'static str {
    match result {
        CycleResult::Ok => "ok",
        CycleResult::ReadFailed(_) => "read_failed",
        CycleResult::DiscardFailed(_) => "discard_failed",
        CycleResult::HealthCheckFailed(_) => "health_check_failed",
    }
}

fn report_json(config: &Config, report: &CycleReport) -> Value {
    json!({
        "command": "cycle",
        "device": config.device.path.to_string_lossy(),
        "result": result_label(&report.result()),
        "duration_ms": u64::try_from(report.duration.as_millis()).unwrap_or(u64::MAX),
        "steps": {
            "read": step_json(&report.read),
            "discard": step_json(&report.discard),
            "health": step_json(&report.health),
        },
    })
}

fn print_report(config: &Config, report: &CycleReport) -> Result<(), CliError> {
    let mut out = io::stdout().lock();
    writeln!(out, "device:  {}", config.device.path.display())?;
    for (name, step) in [
        ("read", &report.read),
        ("discard", &report.discard),
        ("health", &report.health),
    ] {
        let line = match step {
            StepOutcome::Ok => "ok".to_string(),
            StepOutcome::Skipped(reason) => format!("skipped ({})", skip_label(*reason)),
            StepOutcome::Failed(e) => format!("FAILED {e}"),
        };
        writeln!(out, "{name:<8} {line}")?;
    }
    writeln!(out, "result:  {}", result_label(&report.result()))?;
    Ok(())
}

fn run_config(cli: &Cli, args: &ConfigArgs) -> Result<(), CliError> {
    match &args.command {
        None | Some(ConfigCommand::Path) => {
            let path = cli.config.clone().unwrap_or_else(Config::default_path);
            let exists = path.exists();
            if cli.json {
                write_json_line(&json!({
                    "command": "config path",
                    "path": path.to_string_lossy(),
                    "exists": exists,
                }))?;
            } else {
                println!("{}", path.display());
                if !exists {
                    println!("  (file does not exist; defaults will be used)");
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Show) => {
            let config = load_config(cli, None)?;
            if cli.json {
                write_json_line(&json!({
                    "command": "config show",
                    "config": serde_json::to_value(&config)?,
                }))?;
            } else {
                let rendered = config
                    .to_toml()
                    .map_err(|e| CliError::Runtime(e.to_string()))?;
                println!("{rendered}");
            }
            Ok(())
        }
        Some(ConfigCommand::Validate) => {
            let config = load_config(cli, None)?;
            let hash = config
                .stable_hash()
                .map_err(|e| CliError::Runtime(e.to_string()))?;
            if cli.json {
                write_json_line(&json!({
                    "command": "config validate",
                    "valid": true,
                    "hash": hash,
                }))?;
            } else {
                println!("configuration valid (hash {hash})");
            }
            Ok(())
        }
    }
}

fn write_json_line(value: &Value) -> Result<(), CliError> {
    let mut out = io::stdout().lock();
    serde_json::to_writer(&mut out, value)?;
    writeln!(out)?;
    Ok(())
}
