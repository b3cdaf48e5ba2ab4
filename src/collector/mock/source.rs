//! Deterministic `MetricsSource` for tests.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::collector::source::{
    AllocCounts, CollectError, HeapInfo, IpcCounts, MemoryInfo, MetricsSource, RegionMemory,
};

/// One call made on a `StubSource`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceCall {
    CpuTime,
    Uptime,
    NativeHeap,
    ManagedHeap,
    MemoryInfo,
    IpcCounts,
    AllocCounts,
    ForceGc,
    RunFinalization,
    ResetAllocCounts,
}

impl SourceCall {
    /// Returns true for read-only queries, false for control operations.
    pub fn is_query(self) -> bool {
        !matches!(
            self,
            SourceCall::ForceGc | SourceCall::RunFinalization | SourceCall::ResetAllocCounts
        )
    }
}

#[derive(Debug, Default)]
struct StubState {
    uptime: i64,
    cpu_time: i64,
    uptime_step: i64,
    cpu_step: i64,
    ipc: IpcCounts,
    alloc: AllocCounts,
    calls: Vec<SourceCall>,
    queries_until_failure: Option<usize>,
}

/// In-memory metrics source with scripted counters.
///
/// - every `uptime` read advances the clock by `uptime_step` ms, every
///   `elapsed_cpu_time` read advances CPU time by `cpu_step` ms
/// - `record_activity` adds allocations that the next read reports
/// - `record_gc` adds host collections; `force_gc` is logged but never
///   counted
/// - `reset_alloc_counts` zeroes the allocation and GC counters
/// - `fail_on_query(n)` makes the n-th query from now fail
pub struct StubSource {
    state: Mutex<StubState>,
}

impl Default for StubSource {
    fn default() -> Self {
        Self::new()
    }
}

impl StubSource {
    /// Clock starts at 1000 ms and advances 10 ms per read; CPU time starts
    /// at 500 ms and advances 4 ms per read.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(StubState {
                uptime: 1000,
                cpu_time: 500,
                uptime_step: 10,
                cpu_step: 4,
                ..StubState::default()
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, StubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sets how far each clock read advances.
    pub fn set_steps(&self, uptime_step: i64, cpu_step: i64) {
        let mut state = self.state();
        state.uptime_step = uptime_step;
        state.cpu_step = cpu_step;
    }

    /// Simulates host activity: `count` allocations of `bytes` in total,
    /// half of which get freed.
    pub fn record_activity(&self, count: i64, bytes: i64) {
        let mut state = self.state();
        state.alloc.alloc_count += count;
        state.alloc.alloc_size += bytes;
        state.alloc.freed_count += count / 2;
        state.alloc.freed_size += bytes / 2;
    }

    /// Simulates collections run by the host itself.
    pub fn record_gc(&self, count: i64) {
        self.state().alloc.gc_invocation_count += count;
    }

    /// Simulates IPC traffic.
    pub fn record_transactions(&self, sent: i64, received: i64) {
        let mut state = self.state();
        state.ipc.sent += sent;
        state.ipc.received += received;
    }

    /// Makes the `n`-th query (1-based, counted from now) fail.
    pub fn fail_on_query(&self, n: usize) {
        self.state().queries_until_failure = Some(n);
    }

    /// Calls made so far, in order.
    pub fn calls(&self) -> Vec<SourceCall> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Logs the call and applies failure injection.
    fn enter(&self, call: SourceCall) -> Result<MutexGuard<'_, StubState>, CollectError> {
        let mut state = self.state();
        state.calls.push(call);
        if call.is_query()
            && let Some(remaining) = state.queries_until_failure.as_mut()
        {
            *remaining = remaining.saturating_sub(1);
            if *remaining == 0 {
                state.queries_until_failure = None;
                return Err(CollectError::Unavailable(format!("{:?}", call)));
            }
        }
        Ok(state)
    }
}

impl MetricsSource for StubSource {
    fn elapsed_cpu_time(&self) -> Result<i64, CollectError> {
        let mut state = self.enter(SourceCall::CpuTime)?;
        let value = state.cpu_time;
        let step = state.cpu_step;
        state.cpu_time += step;
        Ok(value)
    }

    fn uptime(&self) -> Result<i64, CollectError> {
        let mut state = self.enter(SourceCall::Uptime)?;
        let value = state.uptime;
        let step = state.uptime_step;
        state.uptime += step;
        Ok(value)
    }

    fn native_heap(&self) -> Result<HeapInfo, CollectError> {
        self.enter(SourceCall::NativeHeap)?;
        Ok(HeapInfo {
            size: 4096,
            allocated: 3072,
            free: 1024,
        })
    }

    fn managed_heap(&self) -> Result<HeapInfo, CollectError> {
        let state = self.enter(SourceCall::ManagedHeap)?;
        let allocated = 2048 + state.alloc.alloc_size / 1024;
        Ok(HeapInfo {
            size: 8192,
            allocated,
            free: 8192 - allocated,
        })
    }

    fn memory_info(&self) -> Result<MemoryInfo, CollectError> {
        self.enter(SourceCall::MemoryInfo)?;
        Ok(MemoryInfo {
            native: RegionMemory {
                pss: 300,
                private_dirty: 200,
                shared_dirty: 10,
            },
            managed: RegionMemory {
                pss: 900,
                private_dirty: 800,
                shared_dirty: 20,
            },
            other: RegionMemory {
                pss: 1500,
                private_dirty: 100,
                shared_dirty: 30,
            },
        })
    }

    fn ipc_counts(&self) -> Result<IpcCounts, CollectError> {
        let state = self.enter(SourceCall::IpcCounts)?;
        Ok(state.ipc)
    }

    fn alloc_counts(&self) -> Result<AllocCounts, CollectError> {
        let state = self.enter(SourceCall::AllocCounts)?;
        Ok(state.alloc)
    }

    fn force_gc(&self) -> Result<(), CollectError> {
        self.enter(SourceCall::ForceGc)?;
        Ok(())
    }

    fn run_finalization(&self) -> Result<(), CollectError> {
        self.enter(SourceCall::RunFinalization)?;
        Ok(())
    }

    fn reset_alloc_counts(&self) -> Result<(), CollectError> {
        let mut state = self.enter(SourceCall::ResetAllocCounts)?;
        state.alloc = AllocCounts::default();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_advances_per_read() {
        let source = StubSource::new();
        assert_eq!(source.uptime().unwrap(), 1000);
        assert_eq!(source.uptime().unwrap(), 1010);
        assert_eq!(source.elapsed_cpu_time().unwrap(), 500);
        assert_eq!(source.elapsed_cpu_time().unwrap(), 504);
    }

    #[test]
    fn test_reset_clears_activity() {
        let source = StubSource::new();
        source.record_activity(10, 1000);
        source.record_gc(3);
        source.force_gc().unwrap();
        let counts = source.alloc_counts().unwrap();
        assert_eq!(counts.alloc_count, 10);
        assert_eq!(counts.freed_size, 500);
        assert_eq!(counts.gc_invocation_count, 3);

        source.reset_alloc_counts().unwrap();
        assert_eq!(source.alloc_counts().unwrap(), AllocCounts::default());
    }

    #[test]
    fn test_fail_on_query_counts_queries_only() {
        let source = StubSource::new();
        source.fail_on_query(2);
        assert!(source.uptime().is_ok());
        assert!(source.force_gc().is_ok());
        assert!(source.native_heap().is_err());
        assert!(source.native_heap().is_ok());
        assert_eq!(
            source.calls(),
            vec![
                SourceCall::Uptime,
                SourceCall::ForceGc,
                SourceCall::NativeHeap,
                SourceCall::NativeHeap,
            ]
        );
    }
}
