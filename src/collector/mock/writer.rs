//! `ResultsWriter` that records every event in memory.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::storage::model::{SessionResult, Snapshot};
use crate::storage::writer::{ResultsWriter, WriteError};

/// One event delivered to a writer.
#[derive(Debug, Clone, PartialEq)]
pub enum TraceEvent {
    Start(String),
    Snapshot(Snapshot),
    Stop(SessionResult),
}

#[derive(Debug, Default)]
struct Recording {
    events: Vec<TraceEvent>,
    fail_start: bool,
    fail_snapshot: bool,
    fail_stop: bool,
}

fn storage_unavailable() -> WriteError {
    WriteError::Io(std::io::Error::other("storage unavailable"))
}

/// Records trace events. Clones share the same recording, so a test can
/// keep one handle and give the other to the tracer.
#[derive(Debug, Clone, Default)]
pub struct RecordingWriter {
    inner: Arc<Mutex<Recording>>,
}

impl RecordingWriter {
    pub fn new() -> Self {
        Self::default()
    }

    fn recording(&self) -> MutexGuard<'_, Recording> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes `write_trace_start` fail, as if the artifact could not be opened.
    pub fn fail_start(&self, fail: bool) {
        self.recording().fail_start = fail;
    }

    /// Makes `write_trace_snapshot` fail.
    pub fn fail_snapshot(&self, fail: bool) {
        self.recording().fail_snapshot = fail;
    }

    /// Makes `write_trace_stop` fail.
    pub fn fail_stop(&self, fail: bool) {
        self.recording().fail_stop = fail;
    }

    /// Events received so far, in order. Failed calls are not recorded.
    pub fn events(&self) -> Vec<TraceEvent> {
        self.recording().events.clone()
    }

    /// Number of start and stop events received.
    pub fn session_bounds(&self) -> (usize, usize) {
        let recording = self.recording();
        let starts = recording
            .events
            .iter()
            .filter(|e| matches!(e, TraceEvent::Start(_)))
            .count();
        let stops = recording
            .events
            .iter()
            .filter(|e| matches!(e, TraceEvent::Stop(_)))
            .count();
        (starts, stops)
    }

    /// Labels of the received snapshots, in order.
    pub fn snapshot_labels(&self) -> Vec<String> {
        self.recording()
            .events
            .iter()
            .filter_map(|event| match event {
                TraceEvent::Snapshot(snapshot) => Some(snapshot.label().to_string()),
                _ => None,
            })
            .collect()
    }
}

impl ResultsWriter for RecordingWriter {
    fn write_trace_start(&mut self, label: &str) -> Result<(), WriteError> {
        let mut recording = self.recording();
        if recording.fail_start {
            return Err(storage_unavailable());
        }
        recording.events.push(TraceEvent::Start(label.to_string()));
        Ok(())
    }

    fn write_trace_snapshot(&mut self, snapshot: &Snapshot) -> Result<(), WriteError> {
        let mut recording = self.recording();
        if recording.fail_snapshot {
            return Err(storage_unavailable());
        }
        recording.events.push(TraceEvent::Snapshot(snapshot.clone()));
        Ok(())
    }

    fn write_trace_stop(&mut self, results: &SessionResult) -> Result<(), WriteError> {
        let mut recording = self.recording();
        if recording.fail_stop {
            return Err(storage_unavailable());
        }
        recording.events.push(TraceEvent::Stop(results.clone()));
        Ok(())
    }
}
