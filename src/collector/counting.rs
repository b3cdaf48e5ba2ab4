//! Allocation-counting global allocator wrapper.
//!
//! ```ignore
//! use memtrace::collector::CountingAllocator;
//! use tikv_jemallocator::Jemalloc;
//!
//! #[global_allocator]
//! static GLOBAL: CountingAllocator<Jemalloc> = CountingAllocator::new(Jemalloc);
//! ```
//!
//! The static is then handed to `ProcfsSource::with_counter(&GLOBAL)`.

use std::alloc::{GlobalAlloc, Layout};
use std::sync::atomic::{AtomicU64, Ordering};

/// Allocation totals since the last reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocTotals {
    pub alloc_count: u64,
    pub alloc_size: u64,
    pub freed_count: u64,
    pub freed_size: u64,
}

/// Source of resettable allocation counters.
pub trait AllocationCounter: Send + Sync {
    fn totals(&self) -> AllocTotals;

    fn reset(&self);
}

/// Wraps an allocator and counts every allocation and free going through it.
///
/// A `realloc` counts as one free of the old block plus one allocation of
/// the new one.
pub struct CountingAllocator<A> {
    inner: A,
    alloc_count: AtomicU64,
    alloc_size: AtomicU64,
    freed_count: AtomicU64,
    freed_size: AtomicU64,
}

impl<A> CountingAllocator<A> {
    pub const fn new(inner: A) -> Self {
        Self {
            inner,
            alloc_count: AtomicU64::new(0),
            alloc_size: AtomicU64::new(0),
            freed_count: AtomicU64::new(0),
            freed_size: AtomicU64::new(0),
        }
    }

    fn record_alloc(&self, size: usize) {
        self.alloc_count.fetch_add(1, Ordering::Relaxed);
        self.alloc_size.fetch_add(size as u64, Ordering::Relaxed);
    }

    fn record_free(&self, size: usize) {
        self.freed_count.fetch_add(1, Ordering::Relaxed);
        self.freed_size.fetch_add(size as u64, Ordering::Relaxed);
    }
}

// SAFETY: every call is forwarded unchanged to `inner`; counting has no
// effect on the returned memory.
unsafe impl<A: GlobalAlloc> GlobalAlloc for CountingAllocator<A> {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { self.inner.alloc(layout) };
        if !ptr.is_null() {
            self.record_alloc(layout.size());
        }
        ptr
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { self.inner.alloc_zeroed(layout) };
        if !ptr.is_null() {
            self.record_alloc(layout.size());
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        self.record_free(layout.size());
        unsafe { self.inner.dealloc(ptr, layout) }
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = unsafe { self.inner.realloc(ptr, layout, new_size) };
        if !new_ptr.is_null() {
            self.record_free(layout.size());
            self.record_alloc(new_size);
        }
        new_ptr
    }
}

impl<A: Send + Sync> AllocationCounter for CountingAllocator<A> {
    fn totals(&self) -> AllocTotals {
        AllocTotals {
            alloc_count: self.alloc_count.load(Ordering::Relaxed),
            alloc_size: self.alloc_size.load(Ordering::Relaxed),
            freed_count: self.freed_count.load(Ordering::Relaxed),
            freed_size: self.freed_size.load(Ordering::Relaxed),
        }
    }

    fn reset(&self) {
        self.alloc_count.store(0, Ordering::Relaxed);
        self.alloc_size.store(0, Ordering::Relaxed);
        self.freed_count.store(0, Ordering::Relaxed);
        self.freed_size.store(0, Ordering::Relaxed);
    }
}
