//! Aligned buffer for direct I/O.
//!
//! `O_DIRECT` requires the user buffer address, the transfer length, and the
//! file offset to be multiples of the device's logical block size. The buffer
//! over-allocates by one alignment unit and exposes the aligned window inside
//! it, so no unsafe allocation code is needed.

use crate::core::errors::{Result, RtError};

/// Transfer size used by the daemon: one 4 KiB device block.
pub const DEFAULT_BLOCK_SIZE: usize = 4096;

/// Minimum I/O alignment of common block devices.
pub const DEFAULT_ALIGNMENT: usize = 512;

/// Fixed-size, aligned, zero-initialized byte buffer.
///
/// Allocated once, reused every cycle, released on drop.
#[derive(Debug)]
pub struct AlignedBuffer {
    storage: Vec<u8>,
    start: usize,
    len: usize,
    alignment: usize,
}

impl AlignedBuffer {
    /// Allocate `size` bytes aligned to `alignment`.
    ///
    /// Fails when the alignment is not a non-zero power of two, when the size
    /// is zero or not a multiple of the alignment, or when memory cannot be
    /// reserved.
    pub fn new(size: usize, alignment: usize) -> Result<Self> {
        let fail = |details: String| RtError::Allocation {
            size,
            alignment,
            details,
        };

        if alignment == 0 || !alignment.is_power_of_two() {
            return Err(fail("alignment must be a non-zero power of two".to_string()));
        }
        if size == 0 {
            return Err(fail("size must be > 0".to_string()));
        }
        if size % alignment != 0 {
            return Err(fail("size must be a multiple of the alignment".to_string()));
        }
        let total = size
            .checked_add(alignment)
            .ok_or_else(|| fail("size + alignment overflows".to_string()))?;

        let mut storage = Vec::new();
        storage
            .try_reserve_exact(total)
            .map_err(|e| fail(e.to_string()))?;
        storage.resize(total, 0);

        let start = storage.as_ptr().align_offset(alignment);
        if start > alignment {
            return Err(fail("allocator returned an unalignable address".to_string()));
        }

        Ok(Self {
            storage,
            start,
            len: size,
            alignment,
        })
    }

    /// One default device block at the default alignment.
    pub fn block() -> Result<Self> {
        Self::new(DEFAULT_BLOCK_SIZE, DEFAULT_ALIGNMENT)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.storage[self.start..self.start + self.len]
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.storage[self.start..self.start + self.len]
    }

    /// Usable size in bytes (the requested `size`).
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always false; zero-sized buffers are rejected at construction.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn alignment(&self) -> usize {
        self.alignment
    }

    /// Zero the usable window.
    pub fn clear(&mut self) {
        self.as_mut_slice().fill(0);
    }
}

impl AsRef<[u8]> for AlignedBuffer {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl AsMut<[u8]> for AlignedBuffer {
    fn as_mut(&mut self) -> &mut [u8] {
        self.as_mut_slice()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn default_block_is_aligned() {
        let buf = AlignedBuffer::block().unwrap();
        assert_eq!(buf.len(), 4096);
        assert_eq!(buf.alignment(), 512);
        assert_eq!(buf.as_slice().as_ptr() as usize % 512, 0);
        assert!(buf.as_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn page_alignment_is_honored() {
        let buf = AlignedBuffer::new(8192, 4096).unwrap();
        assert_eq!(buf.as_slice().as_ptr() as usize % 4096, 0);
        assert_eq!(buf.as_slice().len(), 8192);
    }

    #[test]
    fn non_power_of_two_alignment_rejected() {
        let err = AlignedBuffer::new(4096, 768).unwrap_err();
        assert_eq!(err.code(), "SSD-2001");
        assert!(err.to_string().contains("power of two"));
    }

    #[test]
    fn zero_alignment_and_size_rejected() {
        assert!(AlignedBuffer::new(4096, 0).is_err());
        assert!(AlignedBuffer::new(0, 512).is_err());
    }

    #[test]
    fn unaligned_size_rejected() {
        let err = AlignedBuffer::new(1000, 512).unwrap_err();
        assert!(err.to_string().contains("multiple"));
    }

    #[test]
    fn huge_request_fails_without_panicking() {
        let err = AlignedBuffer::new(usize::MAX - 511, 512).unwrap_err();
        assert_eq!(err.code(), "SSD-2001");
    }

    #[test]
    fn mutation_stays_inside_window() {
        let mut buf = AlignedBuffer::new(1024, 512).unwrap();
        buf.as_mut_slice().fill(0xAB);
        assert!(buf.as_slice().iter().all(|&b| b == 0xAB));
        buf.clear();
        assert!(buf.as_slice().iter().all(|&b| b == 0));
    }

    proptest! {
        #[test]
        fn aligned_for_any_valid_geometry(shift in 0u32..13, blocks in 1usize..16) {
            let alignment = 1usize << shift;
            let size = alignment * blocks;
            let buf = AlignedBuffer::new(size, alignment).unwrap();
            prop_assert_eq!(buf.as_slice().as_ptr() as usize % alignment, 0);
            prop_assert_eq!(buf.len(), size);
        }
    }
}
