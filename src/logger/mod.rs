//! Process-wide logging channel: a fan-out over syslog, stderr, and JSONL sinks.
//!
//! The channel is opened once at daemon start and closed once at shutdown.
//! Sinks never fail the caller; a daemon must not crash because logging broke.

pub mod jsonl;
#[cfg(target_os = "linux")]
pub mod syslog;

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Name the daemon identifies itself with in every sink.
pub const SERVICE_NAME: &str = "ssd-linux-runtime";

/// Message severity, a subset of the syslog levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Notice,
    Error,
}

impl Severity {
    /// Short uppercase tag used in stderr output.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Notice => "NOTICE",
            Self::Error => "ERROR",
        }
    }
}

/// Destination for log lines.
pub trait LogSink: Send + Sync {
    /// Record one message. Must not panic or block indefinitely.
    fn write(&self, severity: Severity, message: &str);

    /// Release the sink. Called at most once by [`Logger::close`].
    fn close(&self) {}
}

/// Fan-out logging handle shared by every component.
pub struct Logger {
    sinks: Vec<Box<dyn LogSink>>,
    closed: AtomicBool,
}

impl Logger {
    /// A logger with no sinks; messages are dropped.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sinks: Vec::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Builder-style sink registration.
    #[must_use]
    pub fn with_sink(mut self, sink: impl LogSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    /// Register another sink.
    pub fn add_sink(&mut self, sink: Box<dyn LogSink>) {
        self.sinks.push(sink);
    }

    /// Number of attached sinks.
    #[must_use]
    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Write to every sink. Dropped once the channel is closed.
    pub fn log(&self, severity: Severity, message: &str) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        for sink in &self.sinks {
            sink.write(severity, message);
        }
    }

    pub fn info(&self, message: &str) {
        self.log(Severity::Info, message);
    }

    pub fn notice(&self, message: &str) {
        self.log(Severity::Notice, message);
    }

    pub fn error(&self, message: &str) {
        self.log(Severity::Error, message);
    }

    /// Close every sink. Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        for sink in &self.sinks {
            sink.close();
        }
    }

    /// Whether [`close`](Self::close) has run.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        self.close();
    }
}

/// Foreground sink: `[SSD-INFO] message` on stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrSink;

impl LogSink for StderrSink {
    fn write(&self, severity: Severity, message: &str) {
        let _ = writeln!(std::io::stderr(), "[SSD-{}] {message}", severity.tag());
    }
}

/// One captured log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub severity: Severity,
    pub message: String,
}

/// In-memory sink; clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<LogRecord>>>,
    closed: Arc<AtomicBool>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything written so far.
    #[must_use]
    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().clone()
    }

    /// Messages only, in write order.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.records
            .lock()
            .iter()
            .map(|r| r.message.clone())
            .collect()
    }

    /// Whether the owning logger closed this sink.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl LogSink for MemorySink {
    fn write(&self, severity: Severity, message: &str) {
        self.records.lock().push(LogRecord {
            severity,
            message: message.to_string(),
        });
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}
