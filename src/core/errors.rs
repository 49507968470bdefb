//! SSD-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, RtError>;

/// Top-level error type for the SSD maintenance runtime.
#[derive(Debug, Error)]
pub enum RtError {
    #[error("[SSD-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[SSD-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[SSD-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[SSD-1101] unsupported platform: {details}")]
    UnsupportedPlatform { details: String },

    #[error("[SSD-2001] aligned allocation failed (size={size}, alignment={alignment}): {details}")]
    Allocation {
        size: usize,
        alignment: usize,
        details: String,
    },

    #[error("[SSD-2101] failed to open {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[SSD-2102] direct read failed at {path} offset {offset}: {source}")]
    ReadFailed {
        path: PathBuf,
        offset: u64,
        #[source]
        source: std::io::Error,
    },

    #[error("[SSD-2103] short read at {path} offset {offset}: got {got} of {expected} bytes")]
    ShortRead {
        path: PathBuf,
        offset: u64,
        expected: usize,
        got: usize,
    },

    #[error("[SSD-2201] discard of {length} bytes at offset {offset} failed on {path}: {source}")]
    DiscardFailed {
        path: PathBuf,
        offset: u64,
        length: u64,
        #[source]
        source: std::io::Error,
    },

    #[error("[SSD-2301] health check `{command}` failed for {path}: {details}")]
    HealthCheckFailed {
        command: String,
        path: PathBuf,
        details: String,
    },

    #[error("[SSD-2302] health check `{command}` timed out after {timeout_secs}s for {path}")]
    HealthCheckTimeout {
        command: String,
        path: PathBuf,
        timeout_secs: u64,
    },

    #[error("[SSD-3001] failed to detach daemon: {details}")]
    Detach { details: String },

    #[error("[SSD-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[SSD-3101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },
}

impl RtError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "SSD-1001",
            Self::MissingConfig { .. } => "SSD-1002",
            Self::ConfigParse { .. } => "SSD-1003",
            Self::UnsupportedPlatform { .. } => "SSD-1101",
            Self::Allocation { .. } => "SSD-2001",
            Self::OpenFailed { .. } => "SSD-2101",
            Self::ReadFailed { .. } => "SSD-2102",
            Self::ShortRead { .. } => "SSD-2103",
            Self::DiscardFailed { .. } => "SSD-2201",
            Self::HealthCheckFailed { .. } => "SSD-2301",
            Self::HealthCheckTimeout { .. } => "SSD-2302",
            Self::Detach { .. } => "SSD-3001",
            Self::Io { .. } => "SSD-3002",
            Self::Serialization { .. } => "SSD-3101",
        }
    }

    /// Whether the next maintenance cycle might succeed where this one failed.
    ///
    /// Cycle-level device and health-check failures are retried naturally by
    /// the loop; startup failures are not.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::OpenFailed { .. }
                | Self::ReadFailed { .. }
                | Self::ShortRead { .. }
                | Self::DiscardFailed { .. }
                | Self::HealthCheckFailed { .. }
                | Self::HealthCheckTimeout { .. }
                | Self::Io { .. }
        )
    }

    /// Underlying OS error number, when the failure came from a syscall.
    #[must_use]
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::OpenFailed { source, .. }
            | Self::ReadFailed { source, .. }
            | Self::DiscardFailed { source, .. }
            | Self::Io { source, .. } => source.raw_os_error(),
            _ => None,
        }
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Convenience constructor for open failures.
    #[must_use]
    pub fn open(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::OpenFailed {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl From<serde_json::Error> for RtError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for RtError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}

impl From<toml::ser::Error> for RtError {
    fn from(value: toml::ser::Error) -> Self {
        Self::Serialization {
            context: "toml",
            details: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_errors() -> Vec<RtError> {
        let io = || std::io::Error::other("test");
        vec![
            RtError::InvalidConfig {
                details: String::new(),
            },
            RtError::MissingConfig {
                path: PathBuf::new(),
            },
            RtError::ConfigParse {
                context: "",
                details: String::new(),
            },
            RtError::UnsupportedPlatform {
                details: String::new(),
            },
            RtError::Allocation {
                size: 0,
                alignment: 0,
                details: String::new(),
            },
            RtError::open("", io()),
            RtError::ReadFailed {
                path: PathBuf::new(),
                offset: 0,
                source: io(),
            },
            RtError::ShortRead {
                path: PathBuf::new(),
                offset: 0,
                expected: 0,
                got: 0,
            },
            RtError::DiscardFailed {
                path: PathBuf::new(),
                offset: 0,
                length: 0,
                source: io(),
            },
            RtError::HealthCheckFailed {
                command: String::new(),
                path: PathBuf::new(),
                details: String::new(),
            },
            RtError::HealthCheckTimeout {
                command: String::new(),
                path: PathBuf::new(),
                timeout_secs: 0,
            },
            RtError::Detach {
                details: String::new(),
            },
            RtError::io("", io()),
            RtError::Serialization {
                context: "",
                details: String::new(),
            },
        ]
    }

    #[test]
    fn error_codes_are_unique() {
        let errors = sample_errors();
        let codes: Vec<&str> = errors.iter().map(RtError::code).collect();
        let unique: std::collections::HashSet<&&str> = codes.iter().collect();
        assert_eq!(
            codes.len(),
            unique.len(),
            "error codes must be unique: {codes:?}"
        );
    }

    #[test]
    fn display_includes_code() {
        for err in sample_errors() {
            let msg = err.to_string();
            assert!(
                msg.contains(err.code()),
                "display should contain error code {}: {msg}",
                err.code()
            );
        }
    }

    #[test]
    fn cycle_errors_are_retryable_startup_errors_are_not() {
        assert!(RtError::open("/dev/nope", std::io::Error::other("x")).is_retryable());
        assert!(
            RtError::HealthCheckTimeout {
                command: "smartctl".to_string(),
                path: PathBuf::from("/dev/sda"),
                timeout_secs: 1,
            }
            .is_retryable()
        );

        assert!(
            !RtError::Allocation {
                size: 4096,
                alignment: 3,
                details: String::new(),
            }
            .is_retryable()
        );
        assert!(
            !RtError::Detach {
                details: String::new()
            }
            .is_retryable()
        );
        assert!(
            !RtError::InvalidConfig {
                details: String::new()
            }
            .is_retryable()
        );
    }

    #[test]
    fn raw_os_error_is_surfaced() {
        let err = RtError::open(
            "/dev/missing",
            std::io::Error::from_raw_os_error(2), // ENOENT
        );
        assert_eq!(err.raw_os_error(), Some(2));
        assert!(err.to_string().contains("/dev/missing"));

        let err = RtError::ShortRead {
            path: PathBuf::from("/dev/sda"),
            offset: 0,
            expected: 4096,
            got: 12,
        };
        assert_eq!(err.raw_os_error(), None);
    }

    #[test]
    fn from_toml_error() {
        let toml_err = toml::from_str::<toml::Value>("= invalid").unwrap_err();
        let err: RtError = toml_err.into();
        assert_eq!(err.code(), "SSD-1003");
    }

    #[test]
    fn from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: RtError = json_err.into();
        assert_eq!(err.code(), "SSD-3101");
    }
}
