//! Discard (TRIM) requests over a byte range.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, RtError};

/// Byte range handed to the storage layer as unused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscardRange {
    pub offset: u64,
    pub length: u64,
}

impl DiscardRange {
    /// Rejects empty ranges and ranges whose end overflows.
    pub fn new(offset: u64, length: u64) -> Result<Self> {
        if length == 0 {
            return Err(RtError::InvalidConfig {
                details: "discard length must be > 0".to_string(),
            });
        }
        if offset.checked_add(length).is_none() {
            return Err(RtError::InvalidConfig {
                details: format!("discard range {offset}+{length} overflows"),
            });
        }
        Ok(Self { offset, length })
    }

    /// First block of a device: `{0, block_size}`.
    pub fn first_block(block_size: u64) -> Result<Self> {
        Self::new(0, block_size)
    }

    #[must_use]
    pub const fn end(&self) -> u64 {
        self.offset + self.length
    }
}

/// How the discard was carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscardMethod {
    /// `BLKDISCARD` on a block device.
    BlockDevice,
    /// Hole punch on a regular file.
    PunchHole,
}

/// Opens a device, issues one discard, closes it.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardIssuer;

impl DiscardIssuer {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Issue a single discard for `range`. No retry; the next cycle retries.
    #[cfg(target_os = "linux")]
    pub fn issue(&self, path: &Path, range: DiscardRange) -> Result<DiscardMethod> {
        use std::fs::OpenOptions;
        use std::os::unix::fs::FileTypeExt;

        use crate::device::sys;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|source| RtError::open(path, source))?;

        let fail = |source| RtError::DiscardFailed {
            path: path.to_path_buf(),
            offset: range.offset,
            length: range.length,
            source,
        };

        let is_block = file
            .metadata()
            .map_err(fail)?
            .file_type()
            .is_block_device();

        if is_block {
            sys::blk_discard(&file, range.offset, range.length).map_err(fail)?;
            Ok(DiscardMethod::BlockDevice)
        } else {
            sys::punch_hole(&file, range.offset, range.length).map_err(fail)?;
            Ok(DiscardMethod::PunchHole)
        }
    }

    #[cfg(not(target_os = "linux"))]
    pub fn issue(&self, _path: &Path, _range: DiscardRange) -> Result<DiscardMethod> {
        Err(RtError::UnsupportedPlatform {
            details: "discard requires BLKDISCARD or hole punching (Linux)".to_string(),
        })
    }
}
