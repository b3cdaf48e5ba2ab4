//! Metrics from the Linux `/proc` filesystem.
//!
//! This module provides parsers for the per-process files under
//! `/proc/self` and `ProcfsSource`, which turns them into `MetricsSource`
//! readings.

pub mod parser;
mod source;

pub use parser::ParseError;
pub use source::ProcfsSource;
