//! Daemon lifecycle: detach from the terminal, open the logging channel,
//! install signal hooks, and tear everything down once at shutdown.

#![allow(missing_docs)]

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use daemonize::Daemonize;

use crate::core::config::Config;
use crate::core::errors::{Result, RtError};
use crate::daemon::signals::{DaemonState, SignalHandler};
use crate::logger::jsonl::JsonlSink;
use crate::logger::{Logger, StderrSink};

/// Detach into the background.
///
/// Forks (the parent exits 0), clears the file-mode creation mask, starts a
/// new session, changes to `/`, and points stdin/stdout/stderr at `/dev/null`.
/// Any failure is fatal to startup.
pub fn detach(pidfile: Option<&Path>) -> Result<()> {
    let mut daemon = Daemonize::new().umask(0u32).working_directory("/");
    if let Some(path) = pidfile {
        daemon = daemon.pid_file(path).chown_pid_file(false);
    }
    daemon.start().map_err(|e| RtError::Detach {
        details: e.to_string(),
    })
}

/// Build the process-wide logging channel from config.
///
/// Foreground runs add a stderr sink; stderr is `/dev/null` once detached.
pub fn open_logger(config: &Config, foreground: bool) -> Logger {
    let mut logger = Logger::new();

    if foreground {
        logger.add_sink(Box::new(StderrSink));
    }

    #[cfg(target_os = "linux")]
    if config.logging.syslog {
        match crate::logger::syslog::SyslogSink::open() {
            Ok(sink) => logger.add_sink(Box::new(sink)),
            Err(e) => logger.error(&format!("syslog unavailable: {e}")),
        }
    }

    if let Some(path) = &config.logging.jsonl_path {
        logger.add_sink(Box::new(JsonlSink::open(path)));
    }

    logger
}

/// Owns the logging channel and signal state for the life of the process.
pub struct Lifecycle {
    logger: Arc<Logger>,
    signals: SignalHandler,
    started: Instant,
}

impl Lifecycle {
    /// Full startup sequence. In background mode the process detaches first;
    /// a detach failure is logged and returned.
    pub fn start(config: &Config, foreground: bool) -> Result<Self> {
        if !foreground
            && let Err(e) = detach(config.daemon.pidfile.as_deref())
        {
            let logger = open_logger(config, true);
            logger.error(&e.to_string());
            logger.close();
            return Err(e);
        }

        let logger = Arc::new(open_logger(config, foreground));
        let signals = SignalHandler::install(&logger);
        Ok(Self::from_parts(logger, signals))
    }

    /// Assemble from an existing logger and signal handler (embedding, tests).
    pub fn from_parts(logger: Arc<Logger>, signals: SignalHandler) -> Self {
        signals.set_state(DaemonState::Starting);
        Self {
            logger,
            signals,
            started: Instant::now(),
        }
    }

    pub fn logger(&self) -> &Arc<Logger> {
        &self.logger
    }

    pub fn signals(&self) -> &SignalHandler {
        &self.signals
    }

    /// Log the shutdown notice, close the logging channel, mark terminated.
    pub fn shutdown(self, notice: &str) {
        self.signals.set_state(DaemonState::ShuttingDown);
        self.logger.notice(notice);
        self.logger.notice(&format!(
            "shutdown complete (uptime={}s)",
            self.started.elapsed().as_secs()
        ));
        self.logger.close();
        self.signals.set_state(DaemonState::Terminated);
    }
}
