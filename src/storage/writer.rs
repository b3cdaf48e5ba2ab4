//! Results writer contract and shared artifact helpers.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use chrono::Local;

use super::model::{SessionResult, Snapshot};

/// Error type for writer failures.
#[derive(Debug)]
pub enum WriteError {
    /// The trace artifact could not be created.
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    /// I/O error while writing to an open artifact.
    Io(std::io::Error),
    /// A record could not be encoded.
    Encode(String),
}

impl std::fmt::Display for WriteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteError::Open { path, source } => {
                write!(f, "failed to open trace file {}: {}", path.display(), source)
            }
            WriteError::Io(e) => write!(f, "I/O error: {}", e),
            WriteError::Encode(msg) => write!(f, "encode error: {}", msg),
        }
    }
}

impl std::error::Error for WriteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WriteError::Open { source, .. } => Some(source),
            WriteError::Io(e) => Some(e),
            WriteError::Encode(_) => None,
        }
    }
}

impl From<std::io::Error> for WriteError {
    fn from(e: std::io::Error) -> Self {
        WriteError::Io(e)
    }
}

/// Consumer of trace events.
///
/// Calls are synchronous: the tracer does not continue until a call returns.
/// For one session the order is always one `write_trace_start`, any number of
/// `write_trace_snapshot`, then one `write_trace_stop`. Snapshots taken
/// outside a session arrive without a surrounding start/stop pair.
pub trait ResultsWriter: Send {
    /// Called once per session, before any of its snapshots.
    fn write_trace_start(&mut self, label: &str) -> Result<(), WriteError>;

    /// Called once per snapshot, in the order snapshots were taken.
    fn write_trace_snapshot(&mut self, snapshot: &Snapshot) -> Result<(), WriteError>;

    /// Called once per session, after its last snapshot.
    fn write_trace_stop(&mut self, results: &SessionResult) -> Result<(), WriteError>;
}

/// Base name of trace artifacts.
pub const TRACE_FILE_PREFIX: &str = "memtrace";

/// How a writer names the artifact it creates for each session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileNaming {
    /// Always the same file name; each session overwrites the previous one.
    Fixed(String),
    /// `memtrace_YYYYMMDD_HHMMSS.<ext>` using local time at session start.
    Timestamped,
}

impl FileNaming {
    /// Resolves the file name for a new session.
    pub fn file_name(&self, extension: &str) -> String {
        match self {
            FileNaming::Fixed(name) => name.clone(),
            FileNaming::Timestamped => format!(
                "{}_{}.{}",
                TRACE_FILE_PREFIX,
                Local::now().format("%Y%m%d_%H%M%S"),
                extension
            ),
        }
    }

    /// Fixed naming with the default file name for `extension`.
    pub fn default_fixed(extension: &str) -> Self {
        FileNaming::Fixed(format!("{}.{}", TRACE_FILE_PREFIX, extension))
    }
}

/// Creates `dir` if needed and opens a fresh artifact inside it.
pub(crate) fn open_trace_file(
    dir: &Path,
    file_name: &str,
) -> Result<(PathBuf, BufWriter<File>), WriteError> {
    let path = dir.join(file_name);
    std::fs::create_dir_all(dir).map_err(|source| WriteError::Open {
        path: path.clone(),
        source,
    })?;
    let file = File::create(&path).map_err(|source| WriteError::Open {
        path: path.clone(),
        source,
    })?;
    Ok((path, BufWriter::new(file)))
}
