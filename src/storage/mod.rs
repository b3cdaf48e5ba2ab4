//! Trace data model and writers.
//!
//! - `model` - metric schema, `Snapshot`, `SessionResult`
//! - `writer` - the `ResultsWriter` contract consumed by the tracer
//! - `csv` - tabular reference writer
//! - `json` - JSON-lines writer

pub mod csv;
pub mod json;
pub mod model;
pub mod writer;

pub use csv::CsvTraceWriter;
pub use json::JsonTraceWriter;
pub use model::{MetricKey, SessionResult, Snapshot};
pub use writer::{FileNaming, ResultsWriter, WriteError};
