//! memtrace - checkpoint-driven memory tracing.
//!
//! A `Tracer` takes memory and runtime-activity snapshots of the current
//! process at named checkpoints, brackets them into sessions and hands them
//! to a pluggable `ResultsWriter`.
//!
//! - `collector` - metric sources (`/proc/self`, jemalloc, counting allocator)
//! - `storage` - snapshot model and trace writers (CSV, JSON lines)
//! - `tracer` - the session engine
//! - `driver` - lifecycle-callback checkpoint driver
//! - `config` - output configuration used by the `memtrace` binary

pub mod collector;
pub mod config;
pub mod driver;
pub mod storage;
pub mod tracer;

pub use driver::{CheckpointDriver, LifecycleEvent};
pub use tracer::{TraceError, Tracer};
