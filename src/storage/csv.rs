//! Tabular trace writer.
//!
//! One artifact per session:
//!
//! ```text
//! <session label>
//! label,managed_allocated,managed_free,native_allocated,native_free
//! Main-OnCreate,1520,380,2048,512
//! Main-OnResume,1604,296,2052,508
//! ```
//!
//! Values are written with no escaping; metric values never contain the
//! delimiter. Every line is flushed as soon as it is written.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::model::{MetricKey, SessionResult, Snapshot};
use super::writer::{FileNaming, ResultsWriter, WriteError, open_trace_file};

const DELIMITER: &str = ",";

/// Writes the configured metric keys of each snapshot as one CSV line.
///
/// Metrics not listed in `keys` are still collected by the tracer, they are
/// just not serialized here.
pub struct CsvTraceWriter {
    keys: Vec<MetricKey>,
    output_dir: PathBuf,
    naming: FileNaming,
    out: Option<BufWriter<File>>,
    path: Option<PathBuf>,
}

impl CsvTraceWriter {
    /// Creates a writer emitting the default key set into `output_dir`.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self::with_keys(output_dir, MetricKey::DEFAULT_CSV_KEYS.to_vec())
    }

    /// Creates a writer emitting `keys`, in that order.
    pub fn with_keys(output_dir: impl Into<PathBuf>, keys: Vec<MetricKey>) -> Self {
        Self {
            keys,
            output_dir: output_dir.into(),
            naming: FileNaming::default_fixed("csv"),
            out: None,
            path: None,
        }
    }

    /// Sets the artifact naming policy.
    pub fn naming(mut self, naming: FileNaming) -> Self {
        self.naming = naming;
        self
    }

    /// Configured keys, in column order.
    pub fn keys(&self) -> &[MetricKey] {
        &self.keys
    }

    /// Path of the artifact of the current (or last) session.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Returns true while a session artifact is open and writable.
    pub fn is_active(&self) -> bool {
        self.out.is_some()
    }

    fn header(&self) -> String {
        self.keys
            .iter()
            .map(|key| key.name())
            .collect::<Vec<_>>()
            .join(DELIMITER)
    }

    fn row(&self, snapshot: &Snapshot) -> String {
        self.keys
            .iter()
            .map(|key| snapshot.render(*key))
            .collect::<Vec<_>>()
            .join(DELIMITER)
    }

    /// Writes and flushes lines; on failure the writer disables itself
    /// until the next session.
    fn write_lines(&mut self, lines: &[&str]) -> Result<(), WriteError> {
        let Some(out) = self.out.as_mut() else {
            return Ok(());
        };
        let result = lines
            .iter()
            .try_for_each(|line| writeln!(out, "{}", line))
            .and_then(|()| out.flush());
        if let Err(e) = result {
            warn!("Trace file write failed, disabling writer: {}", e);
            self.out = None;
            return Err(WriteError::Io(e));
        }
        Ok(())
    }
}

impl ResultsWriter for CsvTraceWriter {
    fn write_trace_start(&mut self, label: &str) -> Result<(), WriteError> {
        debug!("Start tracing for {}", label);
        // A session that was never stopped still gets its buffered lines.
        if let Some(mut previous) = self.out.take() {
            if let Err(e) = previous.flush() {
                warn!("Failed to flush unfinished trace file: {}", e);
            }
        }

        let file_name = self.naming.file_name("csv");
        match open_trace_file(&self.output_dir, &file_name) {
            Ok((path, out)) => {
                debug!("Trace file: {}", path.display());
                self.path = Some(path);
                self.out = Some(out);
            }
            Err(e) => {
                warn!("{}", e);
                self.path = None;
                return Err(e);
            }
        }

        let header = self.header();
        self.write_lines(&[label, &header])
    }

    fn write_trace_snapshot(&mut self, snapshot: &Snapshot) -> Result<(), WriteError> {
        if self.out.is_none() {
            return Ok(());
        }
        debug!("Write a snapshot {}", snapshot.label());
        let row = self.row(snapshot);
        self.write_lines(&[&row])
    }

    fn write_trace_stop(&mut self, results: &SessionResult) -> Result<(), WriteError> {
        debug!(
            "Stop tracing for {} ({} snapshots)",
            results.label,
            results.snapshots.len()
        );
        match self.out.take() {
            Some(mut out) => out.flush().map_err(WriteError::Io),
            None => Ok(()),
        }
    }
}
