//! JSON-lines trace writer.
//!
//! Each trace event becomes one JSON object on its own line, tagged by
//! `event`. Unlike the CSV writer, every collected metric is kept.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};

use super::model::{SessionResult, Snapshot};
use super::writer::{FileNaming, ResultsWriter, WriteError, open_trace_file};

#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum Record<'a> {
    Start {
        label: &'a str,
    },
    Snapshot {
        snapshot: &'a Snapshot,
    },
    Stop {
        label: &'a str,
        snapshots: usize,
        pre_sent_transactions: i64,
        pre_received_transactions: i64,
        final_execution_time: Option<i64>,
        final_cpu_time: Option<i64>,
    },
}

/// Writes trace events as JSON lines.
pub struct JsonTraceWriter {
    output_dir: PathBuf,
    naming: FileNaming,
    out: Option<BufWriter<File>>,
    path: Option<PathBuf>,
}

impl JsonTraceWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            naming: FileNaming::default_fixed("jsonl"),
            out: None,
            path: None,
        }
    }

    /// Sets the artifact naming policy.
    pub fn naming(mut self, naming: FileNaming) -> Self {
        self.naming = naming;
        self
    }

    /// Path of the artifact of the current (or last) session.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_active(&self) -> bool {
        self.out.is_some()
    }

    fn write_record(&mut self, record: &Record<'_>) -> Result<(), WriteError> {
        let Some(out) = self.out.as_mut() else {
            return Ok(());
        };
        let line = serde_json::to_string(record).map_err(|e| WriteError::Encode(e.to_string()))?;
        if let Err(e) = writeln!(out, "{}", line).and_then(|()| out.flush()) {
            warn!("Trace file write failed, disabling writer: {}", e);
            self.out = None;
            return Err(WriteError::Io(e));
        }
        Ok(())
    }
}

impl ResultsWriter for JsonTraceWriter {
    fn write_trace_start(&mut self, label: &str) -> Result<(), WriteError> {
        debug!("Start tracing for {}", label);
        if let Some(mut previous) = self.out.take() {
            if let Err(e) = previous.flush() {
                warn!("Failed to flush unfinished trace file: {}", e);
            }
        }

        let file_name = self.naming.file_name("jsonl");
        match open_trace_file(&self.output_dir, &file_name) {
            Ok((path, out)) => {
                self.path = Some(path);
                self.out = Some(out);
            }
            Err(e) => {
                warn!("{}", e);
                self.path = None;
                return Err(e);
            }
        }

        self.write_record(&Record::Start { label })
    }

    fn write_trace_snapshot(&mut self, snapshot: &Snapshot) -> Result<(), WriteError> {
        self.write_record(&Record::Snapshot { snapshot })
    }

    fn write_trace_stop(&mut self, results: &SessionResult) -> Result<(), WriteError> {
        debug!("Stop tracing for {}", results.label);
        self.write_record(&Record::Stop {
            label: &results.label,
            snapshots: results.snapshots.len(),
            pre_sent_transactions: results.pre_sent_transactions,
            pre_received_transactions: results.pre_received_transactions,
            final_execution_time: results.final_execution_time,
            final_cpu_time: results.final_cpu_time,
        })?;
        self.out = None;
        Ok(())
    }
}
