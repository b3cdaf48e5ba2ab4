//! Trace output configuration.

use std::path::PathBuf;

use clap::ValueEnum;

use crate::storage::csv::CsvTraceWriter;
use crate::storage::json::JsonTraceWriter;
use crate::storage::model::MetricKey;
use crate::storage::writer::{FileNaming, ResultsWriter};

/// Artifact format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Label line, header line, one comma-joined line per snapshot.
    #[default]
    Csv,
    /// One JSON record per event.
    Json,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "jsonl",
        }
    }
}

/// Everything needed to build the writer and tracer of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceConfig {
    pub output_dir: PathBuf,
    pub format: OutputFormat,
    /// `None` selects `memtrace.<ext>`.
    pub naming: Option<FileNaming>,
    /// Columns of the CSV artifact. Ignored by the JSON writer.
    pub metric_keys: Vec<MetricKey>,
    pub retain_snapshots: bool,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            format: OutputFormat::Csv,
            naming: None,
            metric_keys: MetricKey::DEFAULT_CSV_KEYS.to_vec(),
            retain_snapshots: true,
        }
    }
}

impl TraceConfig {
    /// Naming policy, resolving the default for the configured format.
    pub fn naming(&self) -> FileNaming {
        self.naming
            .clone()
            .unwrap_or_else(|| FileNaming::default_fixed(self.format.extension()))
    }

    /// Builds the results writer described by this configuration.
    pub fn build_writer(&self) -> Box<dyn ResultsWriter> {
        match self.format {
            OutputFormat::Csv => Box::new(
                CsvTraceWriter::with_keys(&self.output_dir, self.metric_keys.clone())
                    .naming(self.naming()),
            ),
            OutputFormat::Json => {
                Box::new(JsonTraceWriter::new(&self.output_dir).naming(self.naming()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::model::{SessionResult, Snapshot};
    use tempfile::TempDir;

    #[test]
    fn test_default_naming_follows_format() {
        let mut config = TraceConfig::default();
        assert_eq!(config.naming(), FileNaming::Fixed("memtrace.csv".into()));

        config.format = OutputFormat::Json;
        assert_eq!(config.naming(), FileNaming::Fixed("memtrace.jsonl".into()));

        config.naming = Some(FileNaming::Timestamped);
        assert_eq!(config.naming(), FileNaming::Timestamped);
    }

    #[test]
    fn test_build_csv_writer() {
        let dir = TempDir::new().unwrap();
        let config = TraceConfig {
            output_dir: dir.path().to_path_buf(),
            metric_keys: vec![MetricKey::Label, MetricKey::NativeFree],
            ..TraceConfig::default()
        };

        let mut writer = config.build_writer();
        writer.write_trace_start("S").unwrap();
        writer
            .write_trace_snapshot(&Snapshot::new("A", [(MetricKey::NativeFree, 12)]))
            .unwrap();
        writer.write_trace_stop(&SessionResult::default()).unwrap();

        let content = std::fs::read_to_string(dir.path().join("memtrace.csv")).unwrap();
        assert_eq!(content, "S\nlabel,native_free\nA,12\n");
    }

    #[test]
    fn test_build_json_writer() {
        let dir = TempDir::new().unwrap();
        let config = TraceConfig {
            output_dir: dir.path().to_path_buf(),
            format: OutputFormat::Json,
            ..TraceConfig::default()
        };

        let mut writer = config.build_writer();
        writer.write_trace_start("S").unwrap();
        assert!(dir.path().join("memtrace.jsonl").exists());
    }
}
