//! External health check: runs a SMART tool against the device and reports
//! pass/fail from its exit status alone.
//!
//! The device path is passed as one argument-vector element. Nothing goes
//! through a shell, so a hostile path cannot inject commands.

#![allow(missing_docs)]

use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::core::config::HealthConfig;
use crate::core::errors::{Result, RtError};

/// How often a running probe is polled for exit.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Successful probe outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthOk {
    pub elapsed_ms: u64,
}

/// Result of a probe run that may be abandoned early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeRun {
    Healthy(HealthOk),
    /// The caller asked to stop; the child was killed.
    Cancelled,
}

/// Subprocess-backed health probe.
#[derive(Debug, Clone)]
pub struct HealthProbe {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl HealthProbe {
    /// `program args... <device>` with the given timeout.
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    /// `smartctl -H <device>`, 60 s timeout.
    #[must_use]
    pub fn smartctl() -> Self {
        Self::from_config(&HealthConfig::default())
    }

    #[must_use]
    pub fn from_config(cfg: &HealthConfig) -> Self {
        Self::new(
            cfg.command.clone(),
            cfg.args.clone(),
            Duration::from_secs(cfg.timeout_secs),
        )
    }

    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Human-readable command line, for logs only.
    #[must_use]
    pub fn describe(&self, device: &Path) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 2);
        parts.push(self.program.clone());
        parts.extend(self.args.iter().cloned());
        parts.push(device.display().to_string());
        parts.join(" ")
    }

    fn command(&self, device: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg(device)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        cmd
    }

    /// Run the probe once.
    ///
    /// Exit status 0 is `HealthOk`. A non-zero status, death by signal, spawn
    /// failure, or timeout is an error. A timed-out child is killed and reaped.
    pub fn check(&self, device: &Path) -> Result<HealthOk> {
        match self.check_until(device, || false)? {
            ProbeRun::Healthy(ok) => Ok(ok),
            ProbeRun::Cancelled => Err(self.failure(device, "cancelled".to_string())),
        }
    }

    /// Like [`check`](Self::check), but `cancelled` is polled while the child
    /// runs. Once it returns true the child is killed and reaped and the run
    /// reports [`ProbeRun::Cancelled`].
    pub fn check_until(&self, device: &Path, cancelled: impl Fn() -> bool) -> Result<ProbeRun> {
        let started = Instant::now();
        let child = self
            .command(device)
            .spawn()
            .map_err(|e| self.failure(device, format!("failed to launch: {e}")))?;

        let Some(status) = self.wait_bounded(child, device, &cancelled)? else {
            return Ok(ProbeRun::Cancelled);
        };
        if status.success() {
            let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
            return Ok(ProbeRun::Healthy(HealthOk { elapsed_ms }));
        }

        let details = status.code().map_or_else(
            || format!("terminated by signal ({status})"),
            |code| format!("exit status {code}"),
        );
        Err(self.failure(device, details))
    }

    fn failure(&self, device: &Path, details: String) -> RtError {
        RtError::HealthCheckFailed {
            command: self.program.clone(),
            path: device.to_path_buf(),
            details,
        }
    }

    /// `None` when the wait was cancelled.
    fn wait_bounded(
        &self,
        mut child: Child,
        device: &Path,
        cancelled: &dyn Fn() -> bool,
    ) -> Result<Option<ExitStatus>> {
        let deadline = Instant::now() + self.timeout;
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Ok(Some(status)),
                Ok(None) => {}
                Err(e) => {
                    reap(&mut child);
                    return Err(self.failure(device, format!("wait failed: {e}")));
                }
            }

            if cancelled() {
                reap(&mut child);
                return Ok(None);
            }

            let now = Instant::now();
            if now >= deadline {
                reap(&mut child);
                return Err(RtError::HealthCheckTimeout {
                    command: self.program.clone(),
                    path: device.to_path_buf(),
                    timeout_secs: self.timeout.as_secs(),
                });
            }
            thread::sleep(POLL_INTERVAL.min(deadline - now));
        }
    }
}

fn reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

impl Default for HealthProbe {
    fn default() -> Self {
        Self::smartctl()
    }
}
