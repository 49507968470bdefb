//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use ssd_linux_runtime::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{Result, RtError};

// Device I/O
pub use crate::device::aligned::AlignedBuffer;
pub use crate::device::discard::{DiscardIssuer, DiscardMethod, DiscardRange};
pub use crate::device::reader::DirectReader;

// Health
pub use crate::monitor::health_probe::{HealthOk, HealthProbe, ProbeRun};

// Logging
pub use crate::logger::{LogSink, Logger, MemorySink, Severity};

// Daemon
#[cfg(feature = "daemon")]
pub use crate::daemon::loop_main::{
    CycleReport, CycleResult, DaemonArgs, MaintenanceLoop, RunSummary, StepOutcome, StopReason,
};
#[cfg(feature = "daemon")]
pub use crate::daemon::signals::{DaemonState, SignalHandler};
