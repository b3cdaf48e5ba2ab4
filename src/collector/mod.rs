//! Metrics sources for the tracer.
//!
//! The tracer only sees the `MetricsSource` trait. The production
//! implementation reads `/proc/self` through the `FileSystem` seam and asks
//! jemalloc and the counting allocator for heap figures.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       MetricsSource (trait)                 │
//! └──────────────┬───────────────────────────────┬──────────────┘
//!                │                               │
//!       ┌────────▼─────────┐            ┌────────▼─────────┐
//!       │   ProcfsSource   │            │    StubSource    │
//!       │ - /proc/uptime   │            │   (Testing)      │
//!       │ - /proc/self/*   │            └──────────────────┘
//!       │ - jemalloc stats │
//!       │ - CountingAlloc  │
//!       └────────┬─────────┘
//!                │
//!         ┌──────▼──────┐
//!         │  FileSystem │ (trait)
//!         └──────┬──────┘
//!        ┌───────┴───────┐
//!  ┌─────▼─────┐   ┌─────▼─────┐
//!  │  RealFs   │   │  MockFs   │
//!  └───────────┘   └───────────┘
//! ```
//!
//! # Usage
//!
//! ```
//! use memtrace::collector::{MetricsSource, MockFs, ProcfsSource};
//!
//! let source = ProcfsSource::new(MockFs::typical_process(), "/proc");
//! assert_eq!(source.elapsed_cpu_time().unwrap(), 3000);
//! ```

pub mod counting;
pub mod jemalloc;
pub mod mock;
pub mod procfs;
pub mod source;
pub mod traits;

pub use counting::{AllocTotals, AllocationCounter, CountingAllocator};
pub use mock::MockFs;
pub use procfs::ProcfsSource;
pub use source::{
    AllocCounts, CollectError, HeapInfo, IpcCounts, MemoryInfo, MetricsSource, RegionMemory,
};
pub use traits::{FileSystem, RealFs};
