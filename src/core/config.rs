//! Configuration system: TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, RtError};

/// Default on-disk configuration location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/ssd-linux-runtime/config.toml";

/// Full runtime configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Config {
    pub device: DeviceConfig,
    pub read: ReadConfig,
    pub discard: DiscardConfig,
    pub health: HealthConfig,
    pub schedule: ScheduleConfig,
    pub logging: LoggingConfig,
    pub daemon: DaemonConfig,
    /// Where this config was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

/// Target device shared by every step of a cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DeviceConfig {
    pub path: PathBuf,
}

/// Direct-read geometry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReadConfig {
    /// Transfer size in bytes; one device block.
    pub buffer_size: usize,
    /// Minimum I/O alignment of the device.
    pub alignment: usize,
    /// Byte offset of the positioned read.
    pub offset: u64,
    /// Open with `O_DIRECT`. Disable for file-backed targets on tmpfs.
    pub direct: bool,
}

/// Discard range and switch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DiscardConfig {
    pub enabled: bool,
    pub offset: u64,
    pub length: u64,
}

/// External health-check invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HealthConfig {
    pub enabled: bool,
    /// Program to run. Looked up on `PATH`; never passed through a shell.
    pub command: String,
    /// Arguments placed before the device path.
    pub args: Vec<String>,
    pub timeout_secs: u64,
}

/// Cycle cadence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScheduleConfig {
    pub interval_secs: u64,
}

/// Log sinks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Write to the system log under the service name.
    pub syslog: bool,
    /// Optional JSONL mirror of every log line.
    pub jsonl_path: Option<PathBuf>,
}

/// Background-mode settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct DaemonConfig {
    pub pidfile: Option<PathBuf>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/dev/sda"),
        }
    }
}

impl Default for ReadConfig {
    fn default() -> Self {
        Self {
            buffer_size: 4096,
            alignment: 512,
            offset: 0,
            direct: true,
        }
    }
}

impl Default for DiscardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            offset: 0,
            length: 4096,
        }
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: "smartctl".to_string(),
            args: vec!["-H".to_string()],
            timeout_secs: 60,
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self { interval_secs: 10 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            syslog: true,
            jsonl_path: None,
        }
    }
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        env_var("SSDRT_CONFIG").map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from)
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| RtError::Io {
                path: path_buf.clone(),
                source,
            })?;
            let mut parsed: Self = toml::from_str(&raw)?;
            parsed.source_path = Some(path_buf);
            parsed
        } else if is_explicit_path {
            return Err(RtError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.apply_env_overrides_from(env_var)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Deterministic hash of the effective config for startup logging.
    ///
    /// FNV-1a over the canonical JSON form, stable across processes.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("SSDRT_DEVICE_PATH") {
            self.device.path = PathBuf::from(raw);
        }

        if let Some(raw) = lookup("SSDRT_READ_OFFSET") {
            self.read.offset = parse_env_u64("SSDRT_READ_OFFSET", &raw)?;
        }
        if let Some(raw) = lookup("SSDRT_READ_DIRECT") {
            self.read.direct = parse_env_bool("SSDRT_READ_DIRECT", &raw)?;
        }

        if let Some(raw) = lookup("SSDRT_DISCARD_ENABLED") {
            self.discard.enabled = parse_env_bool("SSDRT_DISCARD_ENABLED", &raw)?;
        }
        if let Some(raw) = lookup("SSDRT_DISCARD_OFFSET") {
            self.discard.offset = parse_env_u64("SSDRT_DISCARD_OFFSET", &raw)?;
        }
        if let Some(raw) = lookup("SSDRT_DISCARD_LENGTH") {
            self.discard.length = parse_env_u64("SSDRT_DISCARD_LENGTH", &raw)?;
        }

        if let Some(raw) = lookup("SSDRT_HEALTH_ENABLED") {
            self.health.enabled = parse_env_bool("SSDRT_HEALTH_ENABLED", &raw)?;
        }
        if let Some(raw) = lookup("SSDRT_HEALTH_COMMAND") {
            self.health.command = raw;
        }
        if let Some(raw) = lookup("SSDRT_HEALTH_TIMEOUT_SECS") {
            self.health.timeout_secs = parse_env_u64("SSDRT_HEALTH_TIMEOUT_SECS", &raw)?;
        }

        if let Some(raw) = lookup("SSDRT_INTERVAL_SECS") {
            self.schedule.interval_secs = parse_env_u64("SSDRT_INTERVAL_SECS", &raw)?;
        }

        if let Some(raw) = lookup("SSDRT_LOG_SYSLOG") {
            self.logging.syslog = parse_env_bool("SSDRT_LOG_SYSLOG", &raw)?;
        }
        if let Some(raw) = lookup("SSDRT_LOG_JSONL") {
            self.logging.jsonl_path = Some(PathBuf::from(raw));
        }

        Ok(())
    }

    /// Check cross-field constraints.
    ///
    /// Buffer geometry is checked by `AlignedBuffer::new`; an
    /// unsatisfiable size/alignment is an allocation failure at startup.
    pub fn validate(&self) -> Result<()> {
        if self.device.path.as_os_str().is_empty() {
            return Err(RtError::InvalidConfig {
                details: "device.path must not be empty".to_string(),
            });
        }

        if self.discard.length == 0 {
            return Err(RtError::InvalidConfig {
                details: "discard.length must be > 0".to_string(),
            });
        }

        // pread/fallocate take signed offsets.
        for (name, val) in [
            ("read.offset", self.read.offset),
            ("discard.offset", self.discard.offset),
            ("discard.length", self.discard.length),
        ] {
            if i64::try_from(val).is_err() {
                return Err(RtError::InvalidConfig {
                    details: format!("{name} ({val}) exceeds i64::MAX"),
                });
            }
        }
        if self.discard.offset.checked_add(self.discard.length).is_none() {
            return Err(RtError::InvalidConfig {
                details: "discard.offset + discard.length overflows".to_string(),
            });
        }

        if self.health.enabled && self.health.command.trim().is_empty() {
            return Err(RtError::InvalidConfig {
                details: "health.command must not be empty when health.enabled=true".to_string(),
            });
        }
        if self.health.timeout_secs == 0 {
            return Err(RtError::InvalidConfig {
                details: "health.timeout_secs must be >= 1".to_string(),
            });
        }

        if self.schedule.interval_secs == 0 {
            return Err(RtError::InvalidConfig {
                details: "schedule.interval_secs must be >= 1".to_string(),
            });
        }

        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn parse_env_u64(name: &str, raw: &str) -> Result<u64> {
    raw.trim().parse::<u64>().map_err(|error| RtError::ConfigParse {
        context: "env",
        details: format!("{name}={raw:?}: {error}"),
    })
}

fn parse_env_bool(name: &str, raw: &str) -> Result<bool> {
    raw.trim().parse::<bool>().map_err(|error| RtError::ConfigParse {
        context: "env",
        details: format!("{name}={raw:?}: {error}"),
    })
}

#[cfg(test)]
mod tests {
    use super::{Config, RtError};
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(name, value)| ((*name).to_string(), (*value).to_string()))
            .collect()
    }

    #[test]
    fn default_config_is_valid() {
        let cfg = Config::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.device.path, PathBuf::from("/dev/sda"));
        assert_eq!(cfg.read.buffer_size, 4096);
        assert_eq!(cfg.read.alignment, 512);
        assert_eq!(cfg.discard.offset, 0);
        assert_eq!(cfg.discard.length, 4096);
        assert_eq!(cfg.schedule.interval_secs, 10);
        assert_eq!(cfg.health.command, "smartctl");
    }

    #[test]
    fn zero_discard_length_rejected() {
        let mut cfg = Config::default();
        cfg.discard.length = 0;
        let err = cfg.validate().expect_err("expected discard validation error");
        match err {
            RtError::InvalidConfig { details } => assert!(details.contains("discard.length")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn oversized_offsets_rejected() {
        let mut cfg = Config::default();
        cfg.read.offset = u64::MAX;
        let err = cfg.validate().expect_err("expected offset error");
        assert!(err.to_string().contains("read.offset"));
    }

    #[test]
    fn zero_interval_rejected() {
        let mut cfg = Config::default();
        cfg.schedule.interval_secs = 0;
        let err = cfg.validate().expect_err("expected interval error");
        assert!(err.to_string().contains("interval_secs"));
    }

    #[test]
    fn empty_health_command_rejected_only_when_enabled() {
        let mut cfg = Config::default();
        cfg.health.command = "  ".to_string();
        assert!(cfg.validate().is_err());

        cfg.health.enabled = false;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn env_overrides_apply() {
        let mut cfg = Config::default();
        let overrides = vars(&[
            ("SSDRT_DEVICE_PATH", "/dev/nvme0n1"),
            ("SSDRT_DISCARD_LENGTH", "8192"),
            ("SSDRT_INTERVAL_SECS", "30"),
            ("SSDRT_HEALTH_ENABLED", "false"),
            ("SSDRT_LOG_JSONL", "/tmp/ssd.jsonl"),
        ]);

        cfg.apply_env_overrides_from(|name| overrides.get(name).cloned())
            .expect("env overrides should parse");

        assert_eq!(cfg.device.path, PathBuf::from("/dev/nvme0n1"));
        assert_eq!(cfg.discard.length, 8192);
        assert_eq!(cfg.schedule.interval_secs, 30);
        assert!(!cfg.health.enabled);
        assert_eq!(cfg.logging.jsonl_path, Some(PathBuf::from("/tmp/ssd.jsonl")));
    }

    #[test]
    fn env_invalid_number_rejected() {
        let mut cfg = Config::default();
        let overrides = vars(&[("SSDRT_INTERVAL_SECS", "ten")]);

        let err = cfg
            .apply_env_overrides_from(|name| overrides.get(name).cloned())
            .expect_err("invalid number should fail");
        match err {
            RtError::ConfigParse { context, details } => {
                assert_eq!(context, "env");
                assert!(details.contains("SSDRT_INTERVAL_SECS"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn load_returns_error_for_explicit_missing_path() {
        let result = Config::load(Some(Path::new("/nonexistent/ssdrt/config.toml")));
        assert!(matches!(result, Err(RtError::MissingConfig { .. })));
    }

    #[test]
    fn load_parses_partial_file_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[device]\npath = \"/dev/sdb\"\n\n[discard]\nlength = 1048576\n",
        )
        .unwrap();

        let cfg = Config::load(Some(&path)).expect("config should load");
        assert_eq!(cfg.device.path, PathBuf::from("/dev/sdb"));
        assert_eq!(cfg.discard.length, 1_048_576);
        assert_eq!(cfg.discard.offset, 0);
        assert_eq!(cfg.read.buffer_size, 4096);
        assert_eq!(cfg.source_path.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn load_rejects_malformed_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[device\npath = 3").unwrap();

        let err = Config::load(Some(&path)).expect_err("malformed toml should fail");
        assert_eq!(err.code(), "SSD-1003");
    }

    #[test]
    fn toml_rendering_parses_back() {
        let cfg = Config::default();
        let rendered = cfg.to_toml().expect("render");
        let parsed: Config = toml::from_str(&rendered).expect("parse");
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn stable_hash_changes_when_config_changes() {
        let cfg = Config::default();
        let h1 = cfg.stable_hash().expect("hash");
        let h2 = cfg.stable_hash().expect("hash");
        assert_eq!(h1, h2);

        let mut modified = Config::default();
        modified.discard.offset += 4096;
        assert_ne!(h1, modified.stable_hash().expect("hash"));
    }
}
