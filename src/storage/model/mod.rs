//! Data model for traces.
//!
//! Organized into submodules:
//! - `metric` - metric key schema shared by sources, snapshots and writers
//! - `snapshot` - `Snapshot` and `SessionResult`

mod metric;
mod snapshot;

pub use metric::{MetricKey, MetricUnit, UnknownMetricKey, parse_key_list};
pub use snapshot::{SessionResult, Snapshot};
