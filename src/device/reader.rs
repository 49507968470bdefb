//! Direct, synchronous positioned reads that bypass the page cache.

use std::fs::{File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::path::Path;

use crate::core::errors::{Result, RtError};
use crate::device::aligned::AlignedBuffer;

/// Performs one `pread` of a whole [`AlignedBuffer`] per call.
#[derive(Debug, Clone, Copy)]
pub struct DirectReader {
    direct: bool,
}

impl DirectReader {
    /// Reader using `O_DIRECT | O_SYNC`.
    #[must_use]
    pub const fn new() -> Self {
        Self { direct: true }
    }

    /// Reader that keeps `O_SYNC` but goes through the page cache.
    ///
    /// For file-backed targets on filesystems that reject `O_DIRECT` (tmpfs).
    #[must_use]
    pub const fn buffered() -> Self {
        Self { direct: false }
    }

    #[must_use]
    pub const fn with_direct(direct: bool) -> Self {
        Self { direct }
    }

    #[must_use]
    pub const fn is_direct(&self) -> bool {
        self.direct
    }

    /// Read `buf.len()` bytes at `offset` from `path`.
    ///
    /// The device is opened read-write, used once, and closed before return
    /// on every path. Returns the number of bytes read (always `buf.len()`).
    pub fn read(&self, path: &Path, buf: &mut AlignedBuffer, offset: u64) -> Result<usize> {
        let file = self.open(path)?;
        let expected = buf.len();

        let got = file
            .read_at(buf.as_mut_slice(), offset)
            .map_err(|source| RtError::ReadFailed {
                path: path.to_path_buf(),
                offset,
                source,
            })?;

        if got != expected {
            return Err(RtError::ShortRead {
                path: path.to_path_buf(),
                offset,
                expected,
                got,
            });
        }
        Ok(got)
    }

    #[cfg(target_os = "linux")]
    fn open(&self, path: &Path) -> Result<File> {
        use std::os::unix::fs::OpenOptionsExt;

        let mut flags = libc::O_SYNC;
        if self.direct {
            flags |= libc::O_DIRECT;
        }
        OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(flags)
            .open(path)
            .map_err(|source| RtError::open(path, source))
    }

    /// `O_DIRECT` is Linux-only; elsewhere the reader refuses rather than
    /// silently going through the page cache.
    #[cfg(not(target_os = "linux"))]
    fn open(&self, _path: &Path) -> Result<File> {
        Err(RtError::UnsupportedPlatform {
            details: "direct reads require O_DIRECT (Linux)".to_string(),
        })
    }
}

impl Default for DirectReader {
    fn default() -> Self {
        Self::new()
    }
}
