//! `MetricsSource` backed by `/proc/self` and jemalloc.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::collector::counting::AllocationCounter;
use crate::collector::jemalloc;
use crate::collector::procfs::parser::{
    Smaps, SmapsTotals, parse_proc_io, parse_proc_stat, parse_smaps, parse_uptime_millis,
};
use crate::collector::source::{
    AllocCounts, CollectError, HeapInfo, IpcCounts, MemoryInfo, MetricsSource, RegionMemory,
};
use crate::collector::traits::FileSystem;

/// Clock ticks per second (USER_HZ). Standard value for Linux.
const CLK_TCK: u64 = 100;

/// Reads the current process's counters.
///
/// Region mapping:
/// - native: the `[heap]` mapping (brk heap used by libc malloc)
/// - managed: anonymous mappings, where jemalloc places its arenas
/// - other: file-backed mappings, stacks and the rest
///
/// The managed heap figures come from jemalloc statistics. Allocation
/// counts need an `AllocationCounter` (see `with_counter`); without one
/// `alloc_counts` and `reset_alloc_counts` fail. The GC count is the number
/// of jemalloc decay purges since the last reset; purges issued by
/// `force_gc` are not included.
pub struct ProcfsSource<F: FileSystem> {
    fs: F,
    proc_path: String,
    counter: Option<&'static dyn AllocationCounter>,
    purge_baseline: AtomicU64,
}

impl<F: FileSystem> ProcfsSource<F> {
    /// Creates a new source.
    ///
    /// # Arguments
    /// * `fs` - Filesystem implementation (real or mock)
    /// * `proc_path` - Base path to proc filesystem (usually "/proc")
    pub fn new(fs: F, proc_path: impl Into<String>) -> Self {
        Self {
            fs,
            proc_path: proc_path.into(),
            counter: None,
            purge_baseline: AtomicU64::new(0),
        }
    }

    /// Attaches the allocation counter installed as global allocator.
    pub fn with_counter(mut self, counter: &'static dyn AllocationCounter) -> Self {
        self.counter = Some(counter);
        self
    }

    /// Returns whether the per-process files this source reads exist.
    pub fn is_supported(&self) -> bool {
        ["stat", "io", "smaps"]
            .iter()
            .all(|file| self.fs.exists(Path::new(&self.self_path(file))))
    }

    fn self_path(&self, file: &str) -> String {
        format!("{}/self/{}", self.proc_path, file)
    }

    fn read(&self, path: &str) -> Result<String, CollectError> {
        Ok(self.fs.read_to_string(Path::new(path))?)
    }

    fn smaps(&self) -> Result<Smaps, CollectError> {
        let content = self.read(&self.self_path("smaps"))?;
        parse_smaps(&content).map_err(|e| CollectError::Parse(e.message))
    }

    fn counter(&self) -> Result<&'static dyn AllocationCounter, CollectError> {
        self.counter
            .ok_or_else(|| CollectError::Unavailable("allocation counter".to_string()))
    }
}

fn region(totals: &SmapsTotals) -> RegionMemory {
    RegionMemory {
        pss: totals.pss as i64,
        private_dirty: totals.private_dirty as i64,
        shared_dirty: totals.shared_dirty as i64,
    }
}

impl<F: FileSystem> MetricsSource for ProcfsSource<F> {
    fn elapsed_cpu_time(&self) -> Result<i64, CollectError> {
        let content = self.read(&self.self_path("stat"))?;
        let stat = parse_proc_stat(&content).map_err(|e| CollectError::Parse(e.message))?;
        Ok(((stat.utime + stat.stime) * 1000 / CLK_TCK) as i64)
    }

    fn uptime(&self) -> Result<i64, CollectError> {
        let content = self.read(&format!("{}/uptime", self.proc_path))?;
        let millis = parse_uptime_millis(&content).map_err(|e| CollectError::Parse(e.message))?;
        Ok(millis as i64)
    }

    fn native_heap(&self) -> Result<HeapInfo, CollectError> {
        let heap = self.smaps()?.heap;
        Ok(HeapInfo {
            size: heap.size as i64,
            allocated: heap.rss as i64,
            free: heap.size.saturating_sub(heap.rss) as i64,
        })
    }

    fn managed_heap(&self) -> Result<HeapInfo, CollectError> {
        jemalloc::heap_stats()
    }

    fn memory_info(&self) -> Result<MemoryInfo, CollectError> {
        let smaps = self.smaps()?;
        Ok(MemoryInfo {
            native: region(&smaps.heap),
            managed: region(&smaps.anonymous),
            other: region(&smaps.other),
        })
    }

    fn ipc_counts(&self) -> Result<IpcCounts, CollectError> {
        let content = self.read(&self.self_path("io"))?;
        let io = parse_proc_io(&content).map_err(|e| CollectError::Parse(e.message))?;
        Ok(IpcCounts {
            sent: io.syscw as i64,
            received: io.syscr as i64,
        })
    }

    fn alloc_counts(&self) -> Result<AllocCounts, CollectError> {
        let totals = self.counter()?.totals();
        Ok(AllocCounts {
            alloc_count: totals.alloc_count as i64,
            alloc_size: totals.alloc_size as i64,
            freed_count: totals.freed_count as i64,
            freed_size: totals.freed_size as i64,
            gc_invocation_count: jemalloc::background_purge_events()?
                .saturating_sub(self.purge_baseline.load(Ordering::Relaxed))
                as i64,
        })
    }

    fn force_gc(&self) -> Result<(), CollectError> {
        jemalloc::purge_arenas()
    }

    fn run_finalization(&self) -> Result<(), CollectError> {
        jemalloc::flush_thread_cache()
    }

    fn reset_alloc_counts(&self) -> Result<(), CollectError> {
        let counter = self.counter()?;
        self.purge_baseline
            .store(jemalloc::background_purge_events()?, Ordering::Relaxed);
        counter.reset();
        Ok(())
    }
}
