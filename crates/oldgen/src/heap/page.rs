//! Page Management - System Page Geometry
//!
//! Page size: 4KB (standard page) or 2MB (large page)
//!
//! Pages are the unit the OS faults in; pretouching walks memory one page
//! at a time and forces each page resident.

use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};

/// Large page size (2MB)
pub const LARGE_PAGE_SIZE: usize = 2 * 1024 * 1024;

/// System page size (cached)
static SYSTEM_PAGE_SIZE: AtomicUsize = AtomicUsize::new(0);

/// Get system page size dynamically
///
/// Returns actual system page size from OS.
/// Caches result for performance.
pub fn get_page_size() -> usize {
    let cached = SYSTEM_PAGE_SIZE.load(Ordering::Relaxed);
    if cached != 0 {
        return cached;
    }

    let size = page_size::get();
    SYSTEM_PAGE_SIZE.store(size, Ordering::Relaxed);
    size
}

/// Align size to page boundary (round up)
pub fn align_to_page(size: usize) -> usize {
    let ps = get_page_size();
    (size + ps - 1) & !(ps - 1)
}

/// Align address to page boundary (round down)
pub fn align_down_to_page(addr: usize) -> usize {
    addr & !(get_page_size() - 1)
}

/// Convert bytes to pages (round up)
pub fn bytes_to_pages(bytes: usize) -> usize {
    bytes.div_ceil(get_page_size())
}

/// Check if address is page-aligned
pub fn is_page_aligned(addr: usize) -> bool {
    addr.is_multiple_of(get_page_size())
}

/// Fault in a single page without changing its contents
///
/// Safe against concurrent writers: the add of zero is atomic, so a
/// thread that already owns an object on this page never loses a store.
///
/// # Safety
/// `addr` must be 4-byte aligned and lie in committed, writable memory.
#[inline]
pub unsafe fn touch(addr: usize) {
    let word = &*(addr as *const AtomicI32);
    word.fetch_add(0, Ordering::Relaxed);
}

/// Fault in every page of `[start, end)` with the given stride
///
/// # Safety
/// The whole range must be committed and writable.
pub unsafe fn pretouch_range(start: usize, end: usize, page_size: usize) {
    let mut addr = start & !(page_size - 1);
    if addr < start {
        addr += page_size;
    }
    while addr < end {
        touch(addr);
        addr += page_size;
    }
}
