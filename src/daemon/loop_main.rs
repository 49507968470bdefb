//! Main maintenance loop: direct read → discard → health check, then a
//! cancellable wait, repeated until shutdown.
//!
//! Single-threaded and strictly sequential. Every step failure is logged and
//! swallowed; the next step and the next cycle always run. Shutdown requests
//! are honored between steps and during the wait, never mid-syscall.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::core::config::Config;
use crate::core::errors::{Result, RtError};
use crate::daemon::lifecycle::Lifecycle;
use crate::daemon::signals::{DaemonState, SignalHandler, Wake};
use crate::device::aligned::AlignedBuffer;
use crate::device::discard::{DiscardIssuer, DiscardMethod, DiscardRange};
use crate::device::reader::DirectReader;
use crate::logger::Logger;
use crate::monitor::health_probe::{HealthProbe, ProbeRun};

/// Notice logged when a termination signal ends the loop.
pub const TERMINATE_NOTICE: &str = "Termination signal caught, shutting down...";
/// Notice logged when a reload signal arrives. Reload changes nothing.
pub const RELOAD_NOTICE: &str = "Hangup signal caught, reloading configuration...";
/// Notice logged after a successful startup.
pub const STARTED_NOTICE: &str = "SSD-Linux-Runtime daemon started successfully";

// ──────────────────── cycle outcome types ────────────────────

/// Why a step did not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Disabled,
    ShutdownRequested,
}

/// Outcome of one step of a cycle.
#[derive(Debug)]
pub enum StepOutcome {
    Ok,
    Skipped(SkipReason),
    Failed(RtError),
}

impl StepOutcome {
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }

    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    pub const fn error(&self) -> Option<&RtError> {
        match self {
            Self::Failed(e) => Some(e),
            _ => None,
        }
    }

    fn from_result<T>(result: Result<T>) -> Self {
        match result {
            Ok(_) => Self::Ok,
            Err(e) => Self::Failed(e),
        }
    }
}

/// Per-cycle summary: the first failing step, if any. Informational only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleResult {
    Ok,
    ReadFailed(String),
    DiscardFailed(String),
    HealthCheckFailed(String),
}

/// Everything one cycle did.
#[derive(Debug)]
pub struct CycleReport {
    /// 1-based cycle number.
    pub cycle: u64,
    pub read: StepOutcome,
    pub discard: StepOutcome,
    pub health: StepOutcome,
    pub duration: Duration,
}

impl CycleReport {
    pub fn result(&self) -> CycleResult {
        if let Some(e) = self.read.error() {
            return CycleResult::ReadFailed(e.to_string());
        }
        if let Some(e) = self.discard.error() {
            return CycleResult::DiscardFailed(e.to_string());
        }
        if let Some(e) = self.health.error() {
            return CycleResult::HealthCheckFailed(e.to_string());
        }
        CycleResult::Ok
    }

    /// True when no step failed.
    pub fn is_clean(&self) -> bool {
        !(self.read.is_failed() || self.discard.is_failed() || self.health.is_failed())
    }
}

/// Why [`MaintenanceLoop::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Signal,
    CycleLimit,
}

/// Totals for one [`MaintenanceLoop::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles: u64,
    pub failed_cycles: u64,
    pub reloads: u64,
    pub stop: StopReason,
}

// ──────────────────── maintenance loop ────────────────────

/// The maintenance loop. Owns the aligned buffer for its whole life.
pub struct MaintenanceLoop {
    device: PathBuf,
    read_offset: u64,
    reader: DirectReader,
    buffer: AlignedBuffer,
    discard: Option<(DiscardIssuer, DiscardRange)>,
    probe: Option<HealthProbe>,
    interval: Duration,
    logger: Arc<Logger>,
    signals: SignalHandler,
    cycles: u64,
}

impl MaintenanceLoop {
    /// Build from configuration. Allocates the aligned buffer; an
    /// unsatisfiable geometry fails here with an allocation error.
    pub fn new(config: &Config, logger: Arc<Logger>, signals: SignalHandler) -> Result<Self> {
        let buffer = AlignedBuffer::new(config.read.buffer_size, config.read.alignment)?;
        let discard = if config.discard.enabled {
            Some((
                DiscardIssuer::new(),
                DiscardRange::new(config.discard.offset, config.discard.length)?,
            ))
        } else {
            None
        };
        let probe = config
            .health
            .enabled
            .then(|| HealthProbe::from_config(&config.health));

        Ok(Self {
            device: config.device.path.clone(),
            read_offset: config.read.offset,
            reader: DirectReader::with_direct(config.read.direct),
            buffer,
            discard,
            probe,
            interval: Duration::from_secs(config.schedule.interval_secs),
            logger,
            signals,
            cycles: 0,
        })
    }

    /// Replace the inter-cycle interval (tests and one-shot tools).
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn device(&self) -> &Path {
        &self.device
    }

    pub fn buffer(&self) -> &AlignedBuffer {
        &self.buffer
    }

    pub fn discard_range(&self) -> Option<DiscardRange> {
        self.discard.map(|(_, range)| range)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Run one cycle: read, discard, health check, in that order.
    ///
    /// Never fails. A shutdown request observed between steps skips the rest.
    pub fn run_cycle(&mut self) -> CycleReport {
        let started = Instant::now();
        self.cycles += 1;

        let read = self.step_read();
        let discard = if self.signals.should_shutdown() {
            StepOutcome::Skipped(SkipReason::ShutdownRequested)
        } else {
            self.step_discard()
        };
        let health = if self.signals.should_shutdown() {
            StepOutcome::Skipped(SkipReason::ShutdownRequested)
        } else {
            self.step_health()
        };

        CycleReport {
            cycle: self.cycles,
            read,
            discard,
            health,
            duration: started.elapsed(),
        }
    }

    fn step_read(&mut self) -> StepOutcome {
        let result = self
            .reader
            .read(&self.device, &mut self.buffer, self.read_offset);
        match &result {
            Ok(n) => self.logger.info(&format!(
                "direct read completed: {n} bytes at offset {} from {}",
                self.read_offset,
                self.device.display()
            )),
            Err(e) => self.logger.error(&format!("direct read failed: {e}")),
        }
        StepOutcome::from_result(result)
    }

    fn step_discard(&self) -> StepOutcome {
        let Some((issuer, range)) = &self.discard else {
            return StepOutcome::Skipped(SkipReason::Disabled);
        };
        let result = issuer.issue(&self.device, *range);
        match &result {
            Ok(method) => {
                let via = match method {
                    DiscardMethod::BlockDevice => "BLKDISCARD",
                    DiscardMethod::PunchHole => "hole punch",
                };
                self.logger.info(&format!(
                    "discard issued via {via}: {} bytes at offset {} on {}",
                    range.length,
                    range.offset,
                    self.device.display()
                ));
            }
            Err(e) => self.logger.error(&format!("discard failed: {e}")),
        }
        StepOutcome::from_result(result)
    }

    fn step_health(&self) -> StepOutcome {
        let Some(probe) = &self.probe else {
            return StepOutcome::Skipped(SkipReason::Disabled);
        };
        match probe.check_until(&self.device, || self.signals.should_shutdown()) {
            Ok(ProbeRun::Healthy(_)) => {
                self.logger.info(&format!(
                    "health check completed successfully: {}",
                    probe.describe(&self.device)
                ));
                StepOutcome::Ok
            }
            Ok(ProbeRun::Cancelled) => {
                self.logger
                    .notice("health check abandoned: shutdown requested");
                StepOutcome::Skipped(SkipReason::ShutdownRequested)
            }
            Err(e) => {
                self.logger.error(&format!("health check failed: {e}"));
                StepOutcome::Failed(e)
            }
        }
    }

    /// Cancellable inter-cycle wait. Reload requests are logged and the wait
    /// resumes toward the same deadline. Returns false on shutdown.
    fn wait_interval(&self, reloads: &mut u64) -> bool {
        let deadline = Instant::now() + self.interval;
        loop {
            match self.signals.wait_until(deadline) {
                Wake::Deadline => return true,
                Wake::Shutdown => return false,
                Wake::Reload => {
                    *reloads += 1;
                    self.logger.notice(RELOAD_NOTICE);
                }
            }
        }
    }

    /// Cycle until shutdown is requested or `max_cycles` cycles have run.
    pub fn run(&mut self, max_cycles: Option<u64>) -> RunSummary {
        self.signals.set_state(DaemonState::Running);
        let mut cycles = 0_u64;
        let mut failed_cycles = 0_u64;
        let mut reloads = 0_u64;

        let stop = loop {
            if self.signals.should_shutdown() {
                break StopReason::Signal;
            }
            if self.signals.should_reload() {
                reloads += 1;
                self.logger.notice(RELOAD_NOTICE);
            }

            let report = self.run_cycle();
            cycles += 1;
            if !report.is_clean() {
                failed_cycles += 1;
            }

            if max_cycles.is_some_and(|max| cycles >= max) {
                break StopReason::CycleLimit;
            }
            if !self.wait_interval(&mut reloads) {
                break StopReason::Signal;
            }
        };

        self.signals.set_state(DaemonState::ShuttingDown);
        RunSummary {
            cycles,
            failed_cycles,
            reloads,
            stop,
        }
    }
}

// ──────────────────── daemon entry point ────────────────────

/// Arguments for the `run` subcommand.
#[derive(Debug, Clone, Default)]
pub struct DaemonArgs {
    /// Stay attached to the terminal and log to stderr.
    pub foreground: bool,
    /// Stop after this many cycles (unbounded when `None`).
    pub max_cycles: Option<u64>,
}

/// Start the daemon and run until terminated.
///
/// Startup failures (detach, buffer allocation) are logged and returned; the
/// caller exits with status 1. A signal-driven or bounded stop returns `Ok`.
pub fn run_daemon(config: &Config, args: &DaemonArgs) -> Result<RunSummary> {
    let lifecycle = Lifecycle::start(config, args.foreground)?;
    run_with_lifecycle(config, lifecycle, args.max_cycles)
}

/// Everything after detach: allocate, announce, loop, shut down.
pub fn run_with_lifecycle(
    config: &Config,
    lifecycle: Lifecycle,
    max_cycles: Option<u64>,
) -> Result<RunSummary> {
    let logger = Arc::clone(lifecycle.logger());

    let mut maintenance =
        match MaintenanceLoop::new(config, Arc::clone(&logger), lifecycle.signals().clone()) {
            Ok(m) => m,
            Err(e) => {
                logger.error(&format!("Failed to allocate aligned memory: {e}"));
                lifecycle.shutdown("startup aborted");
                return Err(e);
            }
        };

    logger.notice(STARTED_NOTICE);
    logger.info(&format!(
        "device={} interval={}s config_hash={}",
        maintenance.device().display(),
        maintenance.interval().as_secs(),
        config.stable_hash().unwrap_or_default()
    ));

    let summary = maintenance.run(max_cycles);
    drop(maintenance);

    let notice = match summary.stop {
        StopReason::Signal => TERMINATE_NOTICE,
        StopReason::CycleLimit => "cycle limit reached, shutting down...",
    };
    lifecycle.shutdown(notice);
    Ok(summary)
}
