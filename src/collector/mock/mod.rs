//! Mock implementations for testing.
//!
//! This module provides `MockFs` with pre-built `/proc` scenarios for
//! testing `ProcfsSource`, plus `StubSource` and `RecordingWriter` for
//! driving the tracer without a real host.

mod filesystem;
mod scenarios;
mod source;
mod writer;

pub use filesystem::MockFs;
pub use source::{SourceCall, StubSource};
pub use writer::{RecordingWriter, TraceEvent};
