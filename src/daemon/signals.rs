//! Signal handling: SIGTERM/SIGINT graceful shutdown, SIGHUP reload notice,
//! and the process-wide daemon state cell.
//!
//! Uses the `signal-hook` crate for safe signal registration. Handlers only
//! set atomic flags; the maintenance loop polls them between steps and during
//! its inter-cycle wait, so no work ever runs in signal context.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use signal_hook::consts::{SIGHUP, SIGINT, SIGTERM};

use crate::logger::Logger;

/// Longest the loop can go without noticing a shutdown request while waiting.
pub const POLL_TICK: Duration = Duration::from_millis(100);

// ──────────────────── daemon state ────────────────────

/// Process-wide lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DaemonState {
    Starting = 0,
    Running = 1,
    ShuttingDown = 2,
    Terminated = 3,
}

impl DaemonState {
    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Starting,
            1 => Self::Running,
            2 => Self::ShuttingDown,
            _ => Self::Terminated,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Running => "running",
            Self::ShuttingDown => "shutting_down",
            Self::Terminated => "terminated",
        }
    }
}

// ──────────────────── signal handler ────────────────────

/// Why [`SignalHandler::wait_until`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    Deadline,
    Shutdown,
    Reload,
}

/// Thread-safe signal state shared between the signal handler and the main loop.
///
/// All flags use `Ordering::Relaxed` because the main loop polls them every tick
/// and exact ordering with other atomics is not required.
#[derive(Clone)]
pub struct SignalHandler {
    shutdown_flag: Arc<AtomicBool>,
    reload_flag: Arc<AtomicBool>,
    state: Arc<AtomicU8>,
}

impl SignalHandler {
    /// Create a handler and register OS signal hooks.
    ///
    /// SIGTERM/SIGINT -> shutdown, SIGHUP -> reload. Registration is
    /// best-effort; failures are logged at error level but not fatal.
    pub fn install(logger: &Logger) -> Self {
        let handler = Self::detached();
        handler.register_signals(logger);
        handler
    }

    /// A handler with no OS signals wired in. Requests come only from
    /// [`request_shutdown`](Self::request_shutdown) and
    /// [`request_reload`](Self::request_reload).
    pub fn detached() -> Self {
        Self {
            shutdown_flag: Arc::new(AtomicBool::new(false)),
            reload_flag: Arc::new(AtomicBool::new(false)),
            state: Arc::new(AtomicU8::new(DaemonState::Starting as u8)),
        }
    }

    /// Check whether a shutdown has been requested.
    pub fn should_shutdown(&self) -> bool {
        self.shutdown_flag.load(Ordering::Relaxed)
    }

    /// Check (and clear) whether a reload has been requested.
    pub fn should_reload(&self) -> bool {
        self.reload_flag.swap(false, Ordering::Relaxed)
    }

    /// Programmatically request shutdown.
    pub fn request_shutdown(&self) {
        self.shutdown_flag.store(true, Ordering::Relaxed);
    }

    /// Programmatically request a reload.
    pub fn request_reload(&self) {
        self.reload_flag.store(true, Ordering::Relaxed);
    }

    pub fn state(&self) -> DaemonState {
        DaemonState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Written only by the lifecycle and the main loop.
    pub fn set_state(&self, state: DaemonState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Cancellable wait: sleep in [`POLL_TICK`] slices until `deadline`,
    /// returning early on a shutdown or reload request.
    ///
    /// Shutdown wins over reload when both are pending.
    pub fn wait_until(&self, deadline: Instant) -> Wake {
        loop {
            if self.should_shutdown() {
                return Wake::Shutdown;
            }
            if self.should_reload() {
                return Wake::Reload;
            }
            let now = Instant::now();
            if now >= deadline {
                return Wake::Deadline;
            }
            thread::sleep(POLL_TICK.min(deadline - now));
        }
    }

    fn register_signals(&self, logger: &Logger) {
        for (sig, name, flag) in [
            (SIGTERM, "SIGTERM", &self.shutdown_flag),
            (SIGINT, "SIGINT", &self.shutdown_flag),
            (SIGHUP, "SIGHUP", &self.reload_flag),
        ] {
            if let Err(e) = signal_hook::flag::register(sig, Arc::clone(flag)) {
                logger.error(&format!("failed to register {name} handler: {e}"));
            }
        }
    }
}

impl Default for SignalHandler {
    fn default() -> Self {
        Self::detached()
    }
}

// ──────────────────── tests ────────────────────
