//! Memory Mapping - Anonymous Reservation via memmap2
//!
//! The old generation reserves its whole maximum size up front as a single
//! anonymous read/write mapping. The mapping is never moved or resized;
//! commit and decommit are bookkeeping on top of it, with decommitted pages
//! handed back to the OS through `madvise`.
//!
//! Platform Support:
//! - Linux: mmap/munmap/madvise (plus transparent huge page hint)
//! - macOS: mmap/munmap/madvise
//! - Windows: VirtualAlloc/VirtualFree (no decommit advice)

use crate::error::{OldGenError, Result};
use memmap2::{MmapMut, MmapOptions};

/// ReservedMapping - exclusive owner of an anonymous reservation
///
/// Addresses handed out from the mapping are raw; the mapping only has to
/// outlive every user, which the owning virtual space guarantees.
pub struct ReservedMapping {
    mmap: MmapMut,
    base: usize,
    size: usize,
}

impl ReservedMapping {
    /// Reserve an anonymous mapping of at least `size` bytes
    ///
    /// Memory is zero-initialized and faulted in lazily by the OS.
    pub fn anonymous(size: usize) -> Result<Self> {
        if size == 0 {
            return Err(OldGenError::InvalidArgument(
                "cannot reserve an empty mapping".to_string(),
            ));
        }

        let aligned_size = crate::heap::page::align_to_page(size);

        let mmap = MmapOptions::new()
            .len(aligned_size)
            .map_anon()
            .map_err(|e| {
                OldGenError::VirtualMemoryError(format!(
                    "Failed to reserve {} bytes: {}",
                    aligned_size, e
                ))
            })?;

        let base = mmap.as_ptr() as usize;

        Ok(Self {
            mmap,
            base,
            size: aligned_size,
        })
    }

    /// Get base address of mapping
    pub fn base(&self) -> usize {
        self.base
    }

    /// Get size of mapping in bytes
    pub fn size(&self) -> usize {
        self.size
    }

    /// Check if address lies within the mapping
    pub fn contains(&self, addr: usize) -> bool {
        addr >= self.base && addr < self.base + self.size
    }

    /// Check if `[addr, addr + len)` lies within the mapping
    pub fn contains_range(&self, addr: usize, len: usize) -> bool {
        match addr.checked_add(len) {
            Some(end) => addr >= self.base && end <= self.base + self.size,
            None => false,
        }
    }

    /// Raw pointer to the start of the mapping
    pub fn as_ptr(&self) -> *const u8 {
        self.mmap.as_ptr()
    }

    /// Tell the OS the pages in `[addr, addr + len)` are no longer needed
    ///
    /// The range stays mapped; the next access faults in zero pages.
    pub fn advise_dont_need(&self, addr: usize, len: usize) -> Result<()> {
        if len == 0 {
            return Ok(());
        }
        if !self.contains_range(addr, len) {
            return Err(OldGenError::InvalidArgument(format!(
                "range {:#x}+{} outside mapping",
                addr, len
            )));
        }

        #[cfg(unix)]
        {
            // SAFETY: the range lies inside a mapping we own.
            let rc = unsafe { libc::madvise(addr as *mut libc::c_void, len, libc::MADV_DONTNEED) };
            if rc != 0 {
                return Err(OldGenError::VirtualMemoryError(format!(
                    "madvise(MADV_DONTNEED) failed: {}",
                    std::io::Error::last_os_error()
                )));
            }
        }

        Ok(())
    }

    /// Ask for transparent huge pages over the whole mapping
    ///
    /// Best effort; returns `false` where unsupported.
    pub fn advise_huge_pages(&self) -> bool {
        #[cfg(target_os = "linux")]
        {
            // SAFETY: advising a mapping we own.
            let rc = unsafe {
                libc::madvise(
                    self.base as *mut libc::c_void,
                    self.size,
                    libc::MADV_HUGEPAGE,
                )
            };
            rc == 0
        }

        #[cfg(not(target_os = "linux"))]
        {
            false
        }
    }
}

impl std::fmt::Debug for ReservedMapping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReservedMapping")
            .field("base", &format_args!("{:#x}", self.base))
            .field("size", &self.size)
            .finish()
    }
}
