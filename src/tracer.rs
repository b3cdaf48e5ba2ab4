//! Snapshot-collection engine.
//!
//! `Tracer` owns the session lifecycle (`Idle -> Running -> Idle`), runs
//! the metric reads in a fixed order and hands finished snapshots to an
//! optional `ResultsWriter`.
//!
//! Ordering rules every public call follows:
//! - elapsed CPU and wall-clock time are frozen before anything else runs,
//!   so the cost of measuring is never attributed to the measured interval
//! - allocation counters are only reset after a quiescence cycle
//!   (collect, finalize, collect), so garbage that was already dead is not
//!   charged to the next interval
//!
//! One mutex guards the state machine, the timing baseline and the writer,
//! and is held for the whole of each call. Tracer state is committed only
//! after every read succeeded; a failed call leaves it untouched.
//!
//! Writer failures never fail a call. They are queued and can be drained
//! with `Tracer::take_sink_errors`.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::collector::source::{CollectError, MetricsSource};
use crate::storage::model::{MetricKey, SessionResult, Snapshot};
use crate::storage::writer::{ResultsWriter, WriteError};

/// Queued writer errors kept until drained; later ones are dropped.
const MAX_SINK_ERRORS: usize = 16;

/// Error type for tracer operations.
#[derive(Debug)]
pub enum TraceError {
    /// A metric read or control operation failed. Nothing was recorded.
    Collect(CollectError),
}

impl std::fmt::Display for TraceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TraceError::Collect(e) => write!(f, "metrics collection failed: {}", e),
        }
    }
}

impl std::error::Error for TraceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TraceError::Collect(e) => Some(e),
        }
    }
}

impl From<CollectError> for TraceError {
    fn from(e: CollectError) -> Self {
        TraceError::Collect(e)
    }
}

/// Clock readings the next interval is measured against.
#[derive(Debug, Clone, Copy)]
struct Baseline {
    uptime: i64,
    cpu_time: i64,
}

/// Timing of one interval, frozen at its end.
#[derive(Debug, Clone, Copy)]
struct Interval {
    execution_time: i64,
    cpu_time: i64,
    end: Baseline,
}

struct TracerState {
    /// `Some` while Running.
    session: Option<SessionResult>,
    baseline: Option<Baseline>,
    writer: Option<Box<dyn ResultsWriter>>,
    sink_errors: Vec<WriteError>,
}

impl TracerState {
    /// Delivers one event to the writer, queueing its error.
    fn notify(&mut self, event: impl FnOnce(&mut dyn ResultsWriter) -> Result<(), WriteError>) {
        let Some(writer) = self.writer.as_mut() else {
            return;
        };
        if let Err(e) = event(writer.as_mut())
            && self.sink_errors.len() < MAX_SINK_ERRORS
        {
            self.sink_errors.push(e);
        }
    }
}

/// Collects memory snapshots at caller-chosen checkpoints.
///
/// All methods take `&self`; share the tracer between threads with `Arc`.
pub struct Tracer<S: MetricsSource> {
    source: S,
    retain_snapshots: bool,
    state: Mutex<TracerState>,
}

impl<S: MetricsSource> Tracer<S> {
    /// Creates an idle tracer with no writer attached.
    pub fn new(source: S) -> Self {
        Self {
            source,
            retain_snapshots: true,
            state: Mutex::new(TracerState {
                session: None,
                baseline: None,
                writer: None,
                sink_errors: Vec::new(),
            }),
        }
    }

    /// Attaches a results writer.
    pub fn with_writer(self, writer: impl ResultsWriter + 'static) -> Self {
        self.lock().writer = Some(Box::new(writer));
        self
    }

    /// Controls whether session snapshots are kept in the `SessionResult`.
    /// Defaults to `true`.
    pub fn retain_snapshots(mut self, retain: bool) -> Self {
        self.retain_snapshots = retain;
        self
    }

    /// Replaces the writer, returning the previous one.
    pub fn set_writer(
        &self,
        writer: Option<Box<dyn ResultsWriter>>,
    ) -> Option<Box<dyn ResultsWriter>> {
        std::mem::replace(&mut self.lock().writer, writer)
    }

    /// Detaches the writer. Snapshots are still taken and returned.
    pub fn clear_writer(&self) -> Option<Box<dyn ResultsWriter>> {
        self.set_writer(None)
    }

    /// Returns the metrics source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Returns whether a session is running.
    pub fn is_running(&self) -> bool {
        self.lock().session.is_some()
    }

    /// Label of the running session.
    pub fn session_label(&self) -> Option<String> {
        self.lock()
            .session
            .as_ref()
            .map(|session| session.label.clone())
    }

    /// Drains writer errors queued since the last call, oldest first.
    pub fn take_sink_errors(&self) -> Vec<WriteError> {
        std::mem::take(&mut self.lock().sink_errors)
    }

    fn lock(&self) -> MutexGuard<'_, TracerState> {
        // State is only committed at the end of each call, so a panic
        // mid-call cannot leave it torn.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts a session. Does nothing if one is already running.
    ///
    /// Order: capture pre-session IPC counts, notify the writer, run the
    /// quiescence cycle, reset allocation counters, and record the timing
    /// baseline last so setup cost is excluded.
    ///
    /// If a metric read fails the tracer stays idle. When the writer was
    /// already notified it also receives a stop for the empty session, so
    /// every start it sees is paired.
    pub fn start_tracing(&self, label: &str) -> Result<(), TraceError> {
        let mut state = self.lock();
        if state.session.is_some() {
            return Ok(());
        }

        let pre = self.source.ipc_counts()?;
        state.notify(|writer| writer.write_trace_start(label));

        let session = SessionResult::new(label, pre.sent, pre.received);
        match self.open_interval() {
            Ok(baseline) => {
                state.baseline = Some(baseline);
                state.session = Some(session);
                Ok(())
            }
            Err(e) => {
                state.notify(|writer| writer.write_trace_stop(&session));
                Err(e.into())
            }
        }
    }

    /// Takes a snapshot. Works with or without a running session.
    ///
    /// Within a session the snapshot is appended to the session history
    /// (when retention is enabled). It is always passed to the writer and
    /// returned, whatever the writer reports. On a metric read failure
    /// nothing is recorded and the writer is not called.
    pub fn add_snapshot(&self, label: &str) -> Result<Snapshot, TraceError> {
        let mut state = self.lock();

        let interval = self.freeze_timing(state.baseline)?;

        // Allocation totals are frozen between the quiescence cycle and the
        // reset, so they cover exactly the interval since the last reset.
        self.quiesce()?;
        let alloc = self.source.alloc_counts()?;
        self.source.reset_alloc_counts()?;

        let native = self.source.native_heap()?;
        let managed = self.source.managed_heap()?;
        let memory = self.source.memory_info()?;
        let ipc = self.source.ipc_counts()?;

        let snapshot = Snapshot::new(
            label,
            [
                (MetricKey::ExecutionTime, interval.execution_time),
                (MetricKey::CpuTime, interval.cpu_time),
                (MetricKey::NativeSize, native.size),
                (MetricKey::NativeAllocated, native.allocated),
                (MetricKey::NativeFree, native.free),
                (MetricKey::NativePss, memory.native.pss),
                (MetricKey::NativePrivateDirty, memory.native.private_dirty),
                (MetricKey::NativeSharedDirty, memory.native.shared_dirty),
                (MetricKey::ManagedSize, managed.size),
                (MetricKey::ManagedAllocated, managed.allocated),
                (MetricKey::ManagedFree, managed.free),
                (MetricKey::ManagedPss, memory.managed.pss),
                (MetricKey::ManagedPrivateDirty, memory.managed.private_dirty),
                (MetricKey::ManagedSharedDirty, memory.managed.shared_dirty),
                (MetricKey::OtherPss, memory.other.pss),
                (MetricKey::OtherPrivateDirty, memory.other.private_dirty),
                (MetricKey::OtherSharedDirty, memory.other.shared_dirty),
                (MetricKey::GcInvocationCount, alloc.gc_invocation_count),
                (MetricKey::GlobalAllocCount, alloc.alloc_count),
                (MetricKey::GlobalAllocSize, alloc.alloc_size),
                (MetricKey::GlobalFreedCount, alloc.freed_count),
                (MetricKey::GlobalFreedSize, alloc.freed_size),
                (MetricKey::SentTransactions, ipc.sent),
                (MetricKey::ReceivedTransactions, ipc.received),
            ],
        );

        state.baseline = Some(interval.end);
        if self.retain_snapshots
            && let Some(session) = state.session.as_mut()
        {
            session.snapshots.push(snapshot.clone());
        }

        state.notify(|writer| writer.write_trace_snapshot(&snapshot));
        Ok(snapshot)
    }

    /// Stops the running session and returns its result.
    ///
    /// Returns `Ok(None)` without side effects when idle. If a metric read
    /// fails the session keeps running. Once the session is closed its
    /// result is returned whatever the writer reports.
    pub fn stop_tracing(&self) -> Result<Option<SessionResult>, TraceError> {
        let mut state = self.lock();
        if state.session.is_none() {
            return Ok(None);
        }

        let interval = self.freeze_timing(state.baseline)?;
        // Leaves allocation counters clean for whatever runs next; the
        // values are not read back.
        self.quiesce()?;
        self.source.reset_alloc_counts()?;

        let Some(mut result) = state.session.take() else {
            return Ok(None);
        };
        result.final_execution_time = Some(interval.execution_time);
        result.final_cpu_time = Some(interval.cpu_time);
        state.baseline = Some(interval.end);

        state.notify(|writer| writer.write_trace_stop(&result));
        Ok(Some(result))
    }

    /// Quiesces, resets allocation counters and reads the clocks, uptime
    /// first and CPU time last.
    fn open_interval(&self) -> Result<Baseline, CollectError> {
        self.quiesce()?;
        self.source.reset_alloc_counts()?;
        let uptime = self.source.uptime()?;
        let cpu_time = self.source.elapsed_cpu_time()?;
        Ok(Baseline { uptime, cpu_time })
    }

    /// Reads both clocks and computes the interval since `baseline`.
    ///
    /// Without a baseline the raw readings are the interval (measured from
    /// the clock origin).
    fn freeze_timing(&self, baseline: Option<Baseline>) -> Result<Interval, CollectError> {
        let cpu_time = self.source.elapsed_cpu_time()?;
        let uptime = self.source.uptime()?;
        let start = baseline.unwrap_or(Baseline {
            uptime: 0,
            cpu_time: 0,
        });
        Ok(Interval {
            execution_time: uptime.saturating_sub(start.uptime),
            cpu_time: cpu_time.saturating_sub(start.cpu_time),
            end: Baseline { uptime, cpu_time },
        })
    }

    /// Collect, finalize, collect.
    fn quiesce(&self) -> Result<(), CollectError> {
        self.source.force_gc()?;
        self.source.run_finalization()?;
        self.source.force_gc()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::{RecordingWriter, SourceCall, StubSource, TraceEvent};

    fn tracer() -> (Tracer<StubSource>, RecordingWriter) {
        let writer = RecordingWriter::new();
        let tracer = Tracer::new(StubSource::new()).with_writer(writer.clone());
        (tracer, writer)
    }

    #[test]
    fn test_start_is_idempotent() {
        let (tracer, writer) = tracer();
        tracer.start_tracing("S1").unwrap();
        tracer.start_tracing("S2").unwrap();

        assert_eq!(writer.events(), vec![TraceEvent::Start("S1".to_string())]);
        assert_eq!(tracer.session_label().as_deref(), Some("S1"));
    }

    #[test]
    fn test_stop_while_idle_returns_none() {
        let (tracer, writer) = tracer();
        assert!(tracer.stop_tracing().unwrap().is_none());
        assert!(writer.events().is_empty());
        assert!(tracer.source().calls().is_empty());
    }

    #[test]
    fn test_start_call_order() {
        let (tracer, _writer) = tracer();
        tracer.start_tracing("S").unwrap();
        assert_eq!(
            tracer.source().calls(),
            vec![
                SourceCall::IpcCounts,
                SourceCall::ForceGc,
                SourceCall::RunFinalization,
                SourceCall::ForceGc,
                SourceCall::ResetAllocCounts,
                SourceCall::Uptime,
                SourceCall::CpuTime,
            ]
        );
    }

    #[test]
    fn test_snapshot_freezes_timing_first() {
        let (tracer, _writer) = tracer();
        tracer.add_snapshot("A").unwrap();
        assert_eq!(
            tracer.source().calls(),
            vec![
                SourceCall::CpuTime,
                SourceCall::Uptime,
                SourceCall::ForceGc,
                SourceCall::RunFinalization,
                SourceCall::ForceGc,
                SourceCall::AllocCounts,
                SourceCall::ResetAllocCounts,
                SourceCall::NativeHeap,
                SourceCall::ManagedHeap,
                SourceCall::MemoryInfo,
                SourceCall::IpcCounts,
            ]
        );
    }

    #[test]
    fn test_stop_call_order() {
        let (tracer, _writer) = tracer();
        tracer.start_tracing("S").unwrap();
        tracer.source().clear_calls();
        tracer.stop_tracing().unwrap();
        assert_eq!(
            tracer.source().calls(),
            vec![
                SourceCall::CpuTime,
                SourceCall::Uptime,
                SourceCall::ForceGc,
                SourceCall::RunFinalization,
                SourceCall::ForceGc,
                SourceCall::ResetAllocCounts,
            ]
        );
    }

    #[test]
    fn test_session_end_to_end() {
        let (tracer, writer) = tracer();
        tracer.start_tracing("S1").unwrap();
        tracer.add_snapshot("A").unwrap();
        tracer.add_snapshot("B").unwrap();
        let result = tracer.stop_tracing().unwrap().unwrap();

        assert_eq!(result.label, "S1");
        assert_eq!(result.labels().collect::<Vec<_>>(), vec!["A", "B"]);
        assert!(!tracer.is_running());

        let events = writer.events();
        assert_eq!(events.len(), 4);
        assert_eq!(events[0], TraceEvent::Start("S1".to_string()));
        assert!(matches!(&events[1], TraceEvent::Snapshot(s) if s.label() == "A"));
        assert!(matches!(&events[2], TraceEvent::Snapshot(s) if s.label() == "B"));
        assert_eq!(events[3], TraceEvent::Stop(result));
    }

    #[test]
    fn test_timing_deltas() {
        let (tracer, _writer) = tracer();
        // Baseline: uptime 1000, cpu 500. Each read advances 10 / 4 ms.
        tracer.start_tracing("S").unwrap();
        let a = tracer.add_snapshot("A").unwrap();
        let b = tracer.add_snapshot("B").unwrap();
        let result = tracer.stop_tracing().unwrap().unwrap();

        assert_eq!(a.get(MetricKey::ExecutionTime), Some(10));
        assert_eq!(a.get(MetricKey::CpuTime), Some(4));
        assert_eq!(b.get(MetricKey::ExecutionTime), Some(10));
        assert_eq!(result.final_execution_time, Some(10));
        assert_eq!(result.final_cpu_time, Some(4));
        assert_eq!(result.elapsed_since_start(), vec![10, 20]);
        assert_eq!(result.total_execution_time(), 30);
    }

    #[test]
    fn test_standalone_snapshot_measures_from_clock_origin() {
        let (tracer, writer) = tracer();
        let snapshot = tracer.add_snapshot("standalone").unwrap();

        assert_eq!(snapshot.label(), "standalone");
        assert_eq!(snapshot.get(MetricKey::ExecutionTime), Some(1000));
        assert_eq!(snapshot.get(MetricKey::CpuTime), Some(500));
        assert_eq!(snapshot.len(), 24);
        assert_eq!(writer.events(), vec![TraceEvent::Snapshot(snapshot)]);
    }

    #[test]
    fn test_allocation_counts_are_per_interval() {
        let (tracer, _writer) = tracer();
        tracer.start_tracing("S").unwrap();

        tracer.source().record_activity(10, 4096);
        let a = tracer.add_snapshot("A").unwrap();
        tracer.source().record_activity(3, 1024);
        tracer.source().record_gc(1);
        let b = tracer.add_snapshot("B").unwrap();

        assert_eq!(a.get(MetricKey::GlobalAllocCount), Some(10));
        assert_eq!(a.get(MetricKey::GlobalAllocSize), Some(4096));
        assert_eq!(a.get(MetricKey::GlobalFreedCount), Some(5));
        assert_eq!(b.get(MetricKey::GlobalAllocCount), Some(3));
        assert_eq!(b.get(MetricKey::GlobalAllocSize), Some(1024));
        assert_eq!(b.get(MetricKey::GlobalFreedSize), Some(512));
        // Forced collections of the quiescence cycle are not counted.
        assert_eq!(a.get(MetricKey::GcInvocationCount), Some(0));
        assert_eq!(b.get(MetricKey::GcInvocationCount), Some(1));
    }

    #[test]
    fn test_pre_session_transactions() {
        let (tracer, _writer) = tracer();
        tracer.source().record_transactions(7, 3);
        tracer.start_tracing("S").unwrap();
        tracer.source().record_transactions(2, 1);
        let a = tracer.add_snapshot("A").unwrap();
        let result = tracer.stop_tracing().unwrap().unwrap();

        assert_eq!(result.pre(MetricKey::PreSentTransactions), Some(7));
        assert_eq!(result.pre(MetricKey::PreReceivedTransactions), Some(3));
        assert_eq!(a.get(MetricKey::SentTransactions), Some(9));
        assert_eq!(a.get(MetricKey::ReceivedTransactions), Some(4));
    }

    #[test]
    fn test_failed_snapshot_leaves_no_trace() {
        let (tracer, writer) = tracer();
        tracer.start_tracing("S").unwrap();
        tracer.add_snapshot("A").unwrap();

        // cpu, uptime, then the allocation read fails
        tracer.source().fail_on_query(3);
        let err = tracer.add_snapshot("broken").unwrap_err();
        assert!(matches!(err, TraceError::Collect(_)));

        let b = tracer.add_snapshot("B").unwrap();
        // Measured from A's baseline: the failed call committed nothing.
        assert_eq!(b.get(MetricKey::ExecutionTime), Some(20));
        assert_eq!(b.get(MetricKey::CpuTime), Some(8));

        let result = tracer.stop_tracing().unwrap().unwrap();
        assert_eq!(result.labels().collect::<Vec<_>>(), vec!["A", "B"]);
        assert_eq!(writer.snapshot_labels(), vec!["A", "B"]);
    }

    #[test]
    fn test_failed_start_stays_idle() {
        let (tracer, writer) = tracer();
        // The pre-session IPC read fails before the writer hears anything.
        tracer.source().fail_on_query(1);
        assert!(tracer.start_tracing("S").is_err());
        assert!(!tracer.is_running());
        assert!(writer.events().is_empty());

        tracer.start_tracing("S").unwrap();
        assert!(tracer.is_running());
        tracer.stop_tracing().unwrap();
        assert_eq!(writer.session_bounds(), (1, 1));
    }

    #[test]
    fn test_failed_start_after_notify_closes_writer_session() {
        let (tracer, writer) = tracer();
        // IPC read succeeds, the baseline uptime read fails.
        tracer.source().fail_on_query(2);
        assert!(tracer.start_tracing("S").is_err());
        assert!(!tracer.is_running());

        let events = writer.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], TraceEvent::Start("S".to_string()));
        assert!(matches!(&events[1], TraceEvent::Stop(r) if r.label == "S" && r.snapshots.is_empty()));

        tracer.start_tracing("S").unwrap();
        tracer.stop_tracing().unwrap();
        assert_eq!(writer.session_bounds(), (2, 2));
    }

    #[test]
    fn test_failed_stop_keeps_running() {
        let (tracer, writer) = tracer();
        tracer.start_tracing("S").unwrap();
        tracer.source().fail_on_query(2);
        assert!(tracer.stop_tracing().is_err());
        assert!(tracer.is_running());

        assert!(tracer.stop_tracing().unwrap().is_some());
        let stops = writer
            .events()
            .into_iter()
            .filter(|e| matches!(e, TraceEvent::Stop(_)))
            .count();
        assert_eq!(stops, 1);
    }

    #[test]
    fn test_writer_start_failure_is_queued_and_session_runs() {
        let (tracer, writer) = tracer();
        writer.fail_start(true);

        tracer.start_tracing("S").unwrap();
        assert!(tracer.is_running());
        let errors = tracer.take_sink_errors();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], WriteError::Io(_)));
        assert!(tracer.take_sink_errors().is_empty());

        tracer.add_snapshot("A").unwrap();
        let result = tracer.stop_tracing().unwrap().unwrap();
        assert_eq!(result.snapshots.len(), 1);
    }

    #[test]
    fn test_writer_snapshot_failure_still_returns_snapshot() {
        let (tracer, writer) = tracer();
        tracer.start_tracing("S").unwrap();
        writer.fail_snapshot(true);

        let a = tracer.add_snapshot("A").unwrap();
        assert_eq!(a.label(), "A");
        assert_eq!(tracer.take_sink_errors().len(), 1);

        writer.fail_snapshot(false);
        tracer.add_snapshot("B").unwrap();
        let result = tracer.stop_tracing().unwrap().unwrap();
        assert_eq!(result.labels().collect::<Vec<_>>(), vec!["A", "B"]);
        assert_eq!(writer.snapshot_labels(), vec!["B"]);
    }

    #[test]
    fn test_writer_stop_failure_still_returns_result() {
        let (tracer, writer) = tracer();
        writer.fail_stop(true);
        tracer.start_tracing("S").unwrap();
        tracer.add_snapshot("A").unwrap();
        tracer.add_snapshot("B").unwrap();

        let result = tracer.stop_tracing().unwrap().unwrap();
        assert_eq!(result.labels().collect::<Vec<_>>(), vec!["A", "B"]);
        assert!(!tracer.is_running());
        assert_eq!(tracer.take_sink_errors().len(), 1);
        assert!(tracer.stop_tracing().unwrap().is_none());
    }

    #[test]
    fn test_sink_error_queue_is_bounded() {
        let (tracer, writer) = tracer();
        writer.fail_snapshot(true);
        for i in 0..(MAX_SINK_ERRORS + 5) {
            tracer.add_snapshot(&format!("s{}", i)).unwrap();
        }
        assert_eq!(tracer.take_sink_errors().len(), MAX_SINK_ERRORS);
    }

    #[test]
    fn test_without_writer() {
        let tracer = Tracer::new(StubSource::new());
        tracer.start_tracing("S").unwrap();
        tracer.add_snapshot("A").unwrap();
        let result = tracer.stop_tracing().unwrap().unwrap();
        assert_eq!(result.snapshots.len(), 1);
    }

    #[test]
    fn test_retention_disabled() {
        let writer = RecordingWriter::new();
        let tracer = Tracer::new(StubSource::new())
            .with_writer(writer.clone())
            .retain_snapshots(false);
        tracer.start_tracing("S").unwrap();
        tracer.add_snapshot("A").unwrap();
        let result = tracer.stop_tracing().unwrap().unwrap();

        assert!(result.snapshots.is_empty());
        assert_eq!(writer.snapshot_labels(), vec!["A"]);
    }

    #[test]
    fn test_new_session_gets_fresh_result() {
        let (tracer, _writer) = tracer();
        tracer.start_tracing("S1").unwrap();
        tracer.add_snapshot("A").unwrap();
        let first = tracer.stop_tracing().unwrap().unwrap();

        tracer.start_tracing("S2").unwrap();
        let second = tracer.stop_tracing().unwrap().unwrap();

        assert_eq!(first.snapshots.len(), 1);
        assert_eq!(second.label, "S2");
        assert!(second.snapshots.is_empty());
    }

    #[test]
    fn test_state_follows_start_stop_parity() {
        let (tracer, _writer) = tracer();
        let ops = [true, true, false, false, true, false, true, true, true, false];
        let mut running = false;
        for start in ops {
            if start {
                tracer.start_tracing("S").unwrap();
                running = true;
            } else {
                let result = tracer.stop_tracing().unwrap();
                assert_eq!(result.is_some(), running);
                running = false;
            }
            assert_eq!(tracer.is_running(), running);
        }
    }

    #[test]
    fn test_set_writer_swaps_sink() {
        let (tracer, first) = tracer();
        let second = RecordingWriter::new();
        let previous = tracer.set_writer(Some(Box::new(second.clone())));
        assert!(previous.is_some());

        tracer.add_snapshot("A").unwrap();
        assert!(first.events().is_empty());
        assert_eq!(second.snapshot_labels(), vec!["A"]);

        assert!(tracer.clear_writer().is_some());
        tracer.add_snapshot("B").unwrap();
        assert_eq!(second.snapshot_labels(), vec!["A"]);
    }

    #[test]
    fn test_concurrent_snapshots_are_serialized() {
        use std::sync::Arc;
        use std::thread;

        let (tracer, writer) = tracer();
        let tracer = Arc::new(tracer);
        tracer.start_tracing("S").unwrap();

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let tracer = Arc::clone(&tracer);
                thread::spawn(move || {
                    for i in 0..25 {
                        tracer.add_snapshot(&format!("t{}-{}", t, i)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let result = tracer.stop_tracing().unwrap().unwrap();
        assert_eq!(result.snapshots.len(), 200);
        assert_eq!(writer.snapshot_labels().len(), 200);
        // Every interval is exactly one clock step when calls never interleave.
        for snapshot in &result.snapshots {
            assert_eq!(snapshot.get(MetricKey::ExecutionTime), Some(10));
            assert_eq!(snapshot.get(MetricKey::CpuTime), Some(4));
        }
        let elapsed = result.elapsed_since_start();
        assert!(elapsed.windows(2).all(|w| w[0] <= w[1]));
    }
}
