//! Device-control calls for the discard step. `BLKDISCARD` has no safe
//! binding, so its ioctl wrapper is the crate's only `unsafe`.

#![allow(unsafe_code)]

use std::fs::File;
use std::io;
use std::os::fd::AsRawFd;

use nix::fcntl::{FallocateFlags, fallocate};

mod ioctls {
    // BLKDISCARD = _IO(0x12, 119); the argument is a pointer to `[start, len]`.
    nix::ioctl_write_ptr_bad!(
        blk_discard,
        nix::request_code_none!(0x12, 119),
        [u64; 2]
    );
}

/// Issue `BLKDISCARD` for `[offset, offset + length)` on a block device.
pub fn blk_discard(file: &File, offset: u64, length: u64) -> io::Result<()> {
    let range: [u64; 2] = [offset, length];
    // SAFETY: the fd is open for the lifetime of `file`, and `range` outlives
    // the call; the kernel only reads 16 bytes from the pointer.
    unsafe { ioctls::blk_discard(file.as_raw_fd(), &raw const range) }
        .map(drop)
        .map_err(io::Error::from)
}

/// Deallocate `[offset, offset + length)` of a regular file without changing
/// its size (`FALLOC_FL_PUNCH_HOLE | FALLOC_FL_KEEP_SIZE`).
pub fn punch_hole(file: &File, offset: u64, length: u64) -> io::Result<()> {
    let offset = libc::off_t::try_from(offset)
        .map_err(|_| io::Error::from_raw_os_error(libc::EINVAL))?;
    let length = libc::off_t::try_from(length)
        .map_err(|_| io::Error::from_raw_os_error(libc::EINVAL))?;
    fallocate(
        file,
        FallocateFlags::FALLOC_FL_PUNCH_HOLE | FallocateFlags::FALLOC_FL_KEEP_SIZE,
        offset,
        length,
    )
    .map_err(io::Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn punch_hole_on_character_device_is_enodev() {
        let null = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open("/dev/null")
            .unwrap();
        let err = punch_hole(&null, 0, 4096).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::ENODEV));
    }

    #[test]
    fn blk_discard_on_regular_file_is_rejected() {
        let file = tempfile::tempfile().unwrap();
        assert!(blk_discard(&file, 0, 4096).is_err());
    }

    #[test]
    fn oversized_range_is_einval() {
        let file = tempfile::tempfile().unwrap();
        let err = punch_hole(&file, u64::MAX, 1).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EINVAL));
    }
}
