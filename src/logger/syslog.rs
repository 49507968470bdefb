//! System log sink (`LOG_DAEMON` facility, ident `ssd-linux-runtime`).

use std::ffi::CStr;

use nix::syslog::{self, Facility, LogFlags};

use crate::core::errors::{Result, RtError};
use crate::logger::{LogSink, Severity};

/// `openlog` keeps the ident pointer, so it must live for the whole process.
const IDENT: &CStr = c"ssd-linux-runtime";

/// Handle to the process-wide syslog connection.
#[derive(Debug)]
pub struct SyslogSink {
    _private: (),
}

impl SyslogSink {
    /// Open the connection (`openlog(ident, LOG_PID | LOG_CONS, LOG_DAEMON)`).
    pub fn open() -> Result<Self> {
        syslog::openlog(
            Some(IDENT),
            LogFlags::LOG_PID | LogFlags::LOG_CONS,
            Facility::LOG_DAEMON,
        )
        .map_err(|errno| RtError::io("/dev/log", errno.into()))?;
        Ok(Self { _private: () })
    }
}

const fn level(severity: Severity) -> syslog::Severity {
    match severity {
        Severity::Info => syslog::Severity::LOG_INFO,
        Severity::Notice => syslog::Severity::LOG_NOTICE,
        Severity::Error => syslog::Severity::LOG_ERR,
    }
}

impl LogSink for SyslogSink {
    fn write(&self, severity: Severity, message: &str) {
        let _ = syslog::syslog(level(severity), message);
    }

    fn close(&self) {
        syslog::closelog();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ident_matches_service_name() {
        assert_eq!(IDENT.to_str().unwrap(), crate::logger::SERVICE_NAME);
    }

    #[test]
    fn severities_map_to_syslog_levels() {
        assert!(matches!(level(Severity::Info), syslog::Severity::LOG_INFO));
        assert!(matches!(level(Severity::Notice), syslog::Severity::LOG_NOTICE));
        assert!(matches!(level(Severity::Error), syslog::Severity::LOG_ERR));
    }
}
