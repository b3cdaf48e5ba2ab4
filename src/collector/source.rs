//! The metrics source contract.
//!
//! A `MetricsSource` gives the tracer read access to the host's counters and
//! the few control operations it needs around them (forced collection,
//! finalization, counter reset). Implementations hold no trace state.

/// Error type for collection failures.
#[derive(Debug)]
pub enum CollectError {
    /// I/O error reading a counter file.
    Io(std::io::Error),
    /// Parse error in a counter file.
    Parse(String),
    /// The counter is not available on this host.
    Unavailable(String),
}

impl std::fmt::Display for CollectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectError::Io(e) => write!(f, "I/O error: {}", e),
            CollectError::Parse(msg) => write!(f, "parse error: {}", msg),
            CollectError::Unavailable(what) => write!(f, "{} unavailable", what),
        }
    }
}

impl std::error::Error for CollectError {}

impl From<std::io::Error> for CollectError {
    fn from(e: std::io::Error) -> Self {
        CollectError::Io(e)
    }
}

/// Heap size figures, in kilobytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapInfo {
    pub size: i64,
    pub allocated: i64,
    pub free: i64,
}

/// Memory figures of one region, in kilobytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegionMemory {
    /// Proportional set size.
    pub pss: i64,
    pub private_dirty: i64,
    pub shared_dirty: i64,
}

/// Detailed memory breakdown per region.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryInfo {
    pub native: RegionMemory,
    pub managed: RegionMemory,
    pub other: RegionMemory,
}

/// Inter-process transaction counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IpcCounts {
    pub sent: i64,
    pub received: i64,
}

/// Allocation counters since the last reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocCounts {
    pub alloc_count: i64,
    pub alloc_size: i64,
    pub freed_count: i64,
    pub freed_size: i64,
    pub gc_invocation_count: i64,
}

/// Read-only access to host counters.
///
/// Query methods have no side effects. The three control methods
/// (`force_gc`, `run_finalization`, `reset_alloc_counts`) are what the
/// tracer's quiescence cycle is made of.
pub trait MetricsSource: Send + Sync {
    /// CPU time consumed by the process so far, in milliseconds.
    fn elapsed_cpu_time(&self) -> Result<i64, CollectError>;

    /// Monotonic wall-clock reading, in milliseconds.
    fn uptime(&self) -> Result<i64, CollectError>;

    fn native_heap(&self) -> Result<HeapInfo, CollectError>;

    fn managed_heap(&self) -> Result<HeapInfo, CollectError>;

    fn memory_info(&self) -> Result<MemoryInfo, CollectError>;

    fn ipc_counts(&self) -> Result<IpcCounts, CollectError>;

    fn alloc_counts(&self) -> Result<AllocCounts, CollectError>;

    /// Forces a collection of unreachable memory.
    fn force_gc(&self) -> Result<(), CollectError>;

    /// Runs pending finalization / deferred frees.
    fn run_finalization(&self) -> Result<(), CollectError>;

    /// Zeroes the allocation counters reported by `alloc_counts`.
    fn reset_alloc_counts(&self) -> Result<(), CollectError>;
}
