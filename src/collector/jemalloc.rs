//! jemalloc control and statistics through `mallctl`.
//!
//! Figures only describe memory managed by jemalloc, so hosts are expected
//! to install `tikv_jemallocator::Jemalloc` (optionally wrapped in
//! `CountingAllocator`) as their global allocator.

use std::ffi::CStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::collector::source::{CollectError, HeapInfo};

/// `EFAULT` as returned by `thread.tcache.flush` when the calling thread
/// has no cache.
const EFAULT: i32 = 14;

/// Purge events caused by `purge_arenas` rather than by jemalloc's decay.
static FORCED_PURGES: AtomicU64 = AtomicU64::new(0);

/// Serializes `purge_arenas` so each call measures only its own events.
static PURGE_LOCK: Mutex<()> = Mutex::new(());

fn mallctl_error(name: &CStr, code: i32) -> CollectError {
    CollectError::Unavailable(format!(
        "jemalloc {} (error {})",
        name.to_string_lossy(),
        code
    ))
}

/// Advances the statistics epoch so subsequent `stats.*` reads are fresh.
pub fn refresh_stats() -> Result<(), CollectError> {
    let mut epoch: u64 = 1;
    let mut len = std::mem::size_of::<u64>();
    let epoch_ptr: *mut u64 = &mut epoch;
    // SAFETY: "epoch" reads and writes a u64; both pointers reference a live
    // u64 and `len` matches its size.
    let rc = unsafe {
        tikv_jemalloc_sys::mallctl(
            c"epoch".as_ptr().cast(),
            epoch_ptr.cast(),
            &mut len,
            epoch_ptr.cast(),
            len,
        )
    };
    if rc != 0 {
        return Err(mallctl_error(c"epoch", rc));
    }
    Ok(())
}

/// Reads a `size_t` statistic such as `stats.allocated`.
fn read_size(name: &CStr) -> Result<usize, CollectError> {
    let mut value: usize = 0;
    let mut len = std::mem::size_of::<usize>();
    let value_ptr: *mut usize = &mut value;
    // SAFETY: `name` is NUL-terminated, the output pointer references a live
    // usize and `len` matches its size. No new value is written.
    let rc = unsafe {
        tikv_jemalloc_sys::mallctl(
            name.as_ptr().cast(),
            value_ptr.cast(),
            &mut len,
            std::ptr::null_mut(),
            0,
        )
    };
    if rc != 0 {
        return Err(mallctl_error(name, rc));
    }
    Ok(value)
}

/// Reads a `uint64_t` statistic such as `stats.arenas.4096.dirty_npurge`.
fn read_u64(name: &CStr) -> Result<u64, CollectError> {
    let mut value: u64 = 0;
    let mut len = std::mem::size_of::<u64>();
    let value_ptr: *mut u64 = &mut value;
    // SAFETY: `name` is NUL-terminated, the output pointer references a live
    // u64 and `len` matches its size. No new value is written.
    let rc = unsafe {
        tikv_jemalloc_sys::mallctl(
            name.as_ptr().cast(),
            value_ptr.cast(),
            &mut len,
            std::ptr::null_mut(),
            0,
        )
    };
    if rc != 0 {
        return Err(mallctl_error(name, rc));
    }
    Ok(value)
}

/// Dirty and muzzy purge events of all arenas since process start.
pub fn purge_events() -> Result<u64, CollectError> {
    refresh_stats()?;
    let dirty = read_u64(c"stats.arenas.4096.dirty_npurge")?;
    let muzzy = read_u64(c"stats.arenas.4096.muzzy_npurge")?;
    Ok(dirty.saturating_add(muzzy))
}

/// Purge events jemalloc ran on its own, excluding those of `purge_arenas`.
pub fn background_purge_events() -> Result<u64, CollectError> {
    Ok(purge_events()?.saturating_sub(FORCED_PURGES.load(Ordering::Relaxed)))
}

/// Returns jemalloc heap figures in kB.
///
/// `size` is the memory in active pages, `allocated` the bytes handed out to
/// the application, `free` the difference.
pub fn heap_stats() -> Result<HeapInfo, CollectError> {
    refresh_stats()?;
    let active = read_size(c"stats.active")?;
    let allocated = read_size(c"stats.allocated")?;
    Ok(HeapInfo {
        size: (active / 1024) as i64,
        allocated: (allocated / 1024) as i64,
        free: (active.saturating_sub(allocated) / 1024) as i64,
    })
}

/// Returns unused dirty pages of all arenas to the operating system.
///
/// The purge events this causes are excluded from
/// `background_purge_events`.
pub fn purge_arenas() -> Result<(), CollectError> {
    let _guard = PURGE_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
    let before = purge_events()?;
    // SAFETY: "arena.<i>.purge" takes no input or output.
    // MALLCTL_ARENAS_ALL = 4096 selects every arena.
    let rc = unsafe {
        tikv_jemalloc_sys::mallctl(
            c"arena.4096.purge".as_ptr().cast(),
            std::ptr::null_mut(),
            std::ptr::null_mut(),
            std::ptr::null_mut(),
            0,
        )
    };
    if rc != 0 {
        return Err(mallctl_error(c"arena.4096.purge", rc));
    }
    let after = purge_events()?;
    FORCED_PURGES.fetch_add(after.saturating_sub(before), Ordering::Relaxed);
    Ok(())
}

/// Flushes the calling thread's cache so cached frees reach their arenas.
pub fn flush_thread_cache() -> Result<(), CollectError> {
    // SAFETY: "thread.tcache.flush" takes no input or output.
    let rc = unsafe {
        tikv_jemalloc_sys::mallctl(
            c"thread.tcache.flush".as_ptr().cast(),
            std::ptr::null_mut(),
            std::ptr::null_mut(),
            std::ptr::null_mut(),
            0,
        )
    };
    match rc {
        0 | EFAULT => Ok(()),
        code => Err(mallctl_error(c"thread.tcache.flush", code)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heap_stats_are_consistent() {
        let info = heap_stats().unwrap();
        assert!(info.size >= 0);
        assert!(info.allocated >= 0);
        assert!(info.free >= 0);
    }

    #[test]
    fn test_forced_purges_are_not_background_events() {
        // Nothing in the test binary allocates through jemalloc, so every
        // purge event here is a forced one.
        let before = background_purge_events().unwrap();
        purge_arenas().unwrap();
        purge_arenas().unwrap();
        assert_eq!(background_purge_events().unwrap(), before);
        assert!(purge_events().unwrap() >= before);
    }

    #[test]
    fn test_flush_thread_cache() {
        flush_thread_cache().unwrap();
    }

    #[test]
    fn test_unknown_stat_is_unavailable() {
        let err = read_size(c"stats.no_such_stat").unwrap_err();
        assert!(matches!(err, CollectError::Unavailable(_)));
    }
}
