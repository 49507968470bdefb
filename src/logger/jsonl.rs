//! JSONL mirror of the logging channel: one self-contained JSON object per line.
//!
//! Lines are assembled in memory and written with a single `write_all` so a
//! tailing reader never sees a partial line. Degradation chain:
//! 1. Configured file (rotated to `<path>.1` past the size cap)
//! 2. stderr with `[SSD-JSONL]` prefix
//! 3. Silent discard

#![allow(missing_docs)]

use std::fs::{self, File, OpenOptions, rename};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, RtError};
use crate::logger::{LogSink, SERVICE_NAME, Severity};

/// Default size cap before the file is rotated: 16 MiB.
pub const DEFAULT_MAX_SIZE_BYTES: u64 = 16 * 1024 * 1024;

/// A single JSONL log line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogLine {
    /// RFC 3339 UTC timestamp with millisecond precision.
    pub ts: String,
    pub service: String,
    pub pid: u32,
    pub severity: Severity,
    pub message: String,
}

impl LogLine {
    pub fn new(severity: Severity, message: &str) -> Self {
        Self {
            ts: format_utc_now(),
            service: SERVICE_NAME.to_string(),
            pid: std::process::id(),
            severity,
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    Normal,
    Stderr,
    Discard,
}

struct Inner {
    file: Option<File>,
    state: WriterState,
    bytes_written: u64,
}

/// Append-only JSONL sink.
pub struct JsonlSink {
    path: PathBuf,
    max_size_bytes: u64,
    inner: Mutex<Inner>,
}

impl JsonlSink {
    /// Open (or create) the file. Never fails; falls back to stderr.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::with_max_size(path, DEFAULT_MAX_SIZE_BYTES)
    }

    pub fn with_max_size(path: impl Into<PathBuf>, max_size_bytes: u64) -> Self {
        let path = path.into();
        let inner = match open_append(&path) {
            Ok((file, size)) => Inner {
                file: Some(file),
                state: WriterState::Normal,
                bytes_written: size,
            },
            Err(e) => {
                let _ = writeln!(io::stderr(), "[SSD-JSONL] {e}; using stderr");
                Inner {
                    file: None,
                    state: WriterState::Stderr,
                    bytes_written: 0,
                }
            }
        };
        Self {
            path,
            max_size_bytes,
            inner: Mutex::new(inner),
        }
    }

    /// Current degradation state.
    pub fn state(&self) -> &'static str {
        match self.inner.lock().state {
            WriterState::Normal => "normal",
            WriterState::Stderr => "stderr",
            WriterState::Discard => "discard",
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_line(&self, line: &str) {
        let mut inner = self.inner.lock();

        if inner.state == WriterState::Normal
            && inner.bytes_written + line.len() as u64 > self.max_size_bytes
        {
            self.rotate(&mut inner);
        }

        match inner.state {
            WriterState::Normal => {
                let ok = inner
                    .file
                    .as_mut()
                    .is_some_and(|f| f.write_all(line.as_bytes()).is_ok());
                if ok {
                    inner.bytes_written += line.len() as u64;
                } else {
                    inner.file = None;
                    inner.state = WriterState::Stderr;
                    let _ = writeln!(io::stderr(), "[SSD-JSONL] write failed, using stderr");
                    let _ = write!(io::stderr(), "[SSD-JSONL] {line}");
                }
            }
            WriterState::Stderr => {
                if write!(io::stderr(), "[SSD-JSONL] {line}").is_err() {
                    inner.state = WriterState::Discard;
                }
            }
            WriterState::Discard => {}
        }
    }

    fn rotate(&self, inner: &mut Inner) {
        inner.file = None;
        let _ = rename(&self.path, rotated_name(&self.path));
        match open_append(&self.path) {
            Ok((file, _)) => {
                inner.file = Some(file);
                inner.bytes_written = 0;
            }
            Err(_) => {
                inner.state = WriterState::Stderr;
            }
        }
    }
}

impl LogSink for JsonlSink {
    fn write(&self, severity: Severity, message: &str) {
        let line = match serde_json::to_string(&LogLine::new(severity, message)) {
            Ok(json) => format!("{json}\n"),
            Err(e) => {
                let _ = writeln!(io::stderr(), "[SSD-JSONL] serialize error: {e}");
                return;
            }
        };
        self.write_line(&line);
    }

    fn close(&self) {
        let mut inner = self.inner.lock();
        if let Some(f) = inner.file.take() {
            let _ = f.sync_data();
        }
        inner.state = WriterState::Discard;
    }
}

/// Open or create a file for appending. Returns `(File, current_size)`.
fn open_append(path: &Path) -> Result<(File, u64)> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|source| RtError::io(parent, source))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| RtError::io(path, source))?;
    let size = file.metadata().map(|m| m.len()).unwrap_or(0);
    Ok((file, size))
}

/// `foo.jsonl` → `foo.jsonl.1`.
fn rotated_name(base: &Path) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(".1");
    PathBuf::from(name)
}

fn format_utc_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
