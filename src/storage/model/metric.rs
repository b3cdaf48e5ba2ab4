//! Metric key schema.
//!
//! Every value a snapshot can carry is named by a `MetricKey`. The same enum
//! is used by metric sources, snapshots and writers, so a writer
//! configuration can only ever request keys that exist.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Unit of a metric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricUnit {
    /// Free-form text (only the snapshot label).
    Text,
    /// Milliseconds.
    Millis,
    /// Kilobytes.
    Kilobytes,
    /// Bytes.
    Bytes,
    /// Plain event count.
    Count,
}

/// Name of a single metric.
///
/// Declaration order is the order metrics appear in a snapshot.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum MetricKey {
    /// Caller-supplied snapshot label.
    Label,
    /// Wall-clock time of the measured interval.
    ExecutionTime,
    /// CPU time of the measured interval.
    CpuTime,
    NativeSize,
    NativeAllocated,
    NativeFree,
    NativePss,
    NativePrivateDirty,
    NativeSharedDirty,
    ManagedSize,
    ManagedAllocated,
    ManagedFree,
    ManagedPss,
    ManagedPrivateDirty,
    ManagedSharedDirty,
    OtherPss,
    OtherPrivateDirty,
    OtherSharedDirty,
    /// Forced collections since the last counter reset.
    GcInvocationCount,
    GlobalAllocCount,
    GlobalAllocSize,
    GlobalFreedCount,
    GlobalFreedSize,
    SentTransactions,
    ReceivedTransactions,
    /// Transactions sent before the session started (session result only).
    PreSentTransactions,
    /// Transactions received before the session started (session result only).
    PreReceivedTransactions,
}

impl MetricKey {
    /// Every key in schema order.
    pub const ALL: [MetricKey; 27] = [
        MetricKey::Label,
        MetricKey::ExecutionTime,
        MetricKey::CpuTime,
        MetricKey::NativeSize,
        MetricKey::NativeAllocated,
        MetricKey::NativeFree,
        MetricKey::NativePss,
        MetricKey::NativePrivateDirty,
        MetricKey::NativeSharedDirty,
        MetricKey::ManagedSize,
        MetricKey::ManagedAllocated,
        MetricKey::ManagedFree,
        MetricKey::ManagedPss,
        MetricKey::ManagedPrivateDirty,
        MetricKey::ManagedSharedDirty,
        MetricKey::OtherPss,
        MetricKey::OtherPrivateDirty,
        MetricKey::OtherSharedDirty,
        MetricKey::GcInvocationCount,
        MetricKey::GlobalAllocCount,
        MetricKey::GlobalAllocSize,
        MetricKey::GlobalFreedCount,
        MetricKey::GlobalFreedSize,
        MetricKey::SentTransactions,
        MetricKey::ReceivedTransactions,
        MetricKey::PreSentTransactions,
        MetricKey::PreReceivedTransactions,
    ];

    /// Keys the CSV writer emits unless configured otherwise.
    pub const DEFAULT_CSV_KEYS: [MetricKey; 5] = [
        MetricKey::Label,
        MetricKey::ManagedAllocated,
        MetricKey::ManagedFree,
        MetricKey::NativeAllocated,
        MetricKey::NativeFree,
    ];

    /// Header name of this key, as written to trace artifacts.
    pub fn name(self) -> &'static str {
        match self {
            MetricKey::Label => "label",
            MetricKey::ExecutionTime => "execution_time",
            MetricKey::CpuTime => "cpu_time",
            MetricKey::NativeSize => "native_size",
            MetricKey::NativeAllocated => "native_allocated",
            MetricKey::NativeFree => "native_free",
            MetricKey::NativePss => "native_pss",
            MetricKey::NativePrivateDirty => "native_private_dirty",
            MetricKey::NativeSharedDirty => "native_shared_dirty",
            MetricKey::ManagedSize => "managed_size",
            MetricKey::ManagedAllocated => "managed_allocated",
            MetricKey::ManagedFree => "managed_free",
            MetricKey::ManagedPss => "managed_pss",
            MetricKey::ManagedPrivateDirty => "managed_private_dirty",
            MetricKey::ManagedSharedDirty => "managed_shared_dirty",
            MetricKey::OtherPss => "other_pss",
            MetricKey::OtherPrivateDirty => "other_private_dirty",
            MetricKey::OtherSharedDirty => "other_shared_dirty",
            MetricKey::GcInvocationCount => "gc_invocation_count",
            MetricKey::GlobalAllocCount => "global_alloc_count",
            MetricKey::GlobalAllocSize => "global_alloc_size",
            MetricKey::GlobalFreedCount => "global_freed_count",
            MetricKey::GlobalFreedSize => "global_freed_size",
            MetricKey::SentTransactions => "sent_transactions",
            MetricKey::ReceivedTransactions => "received_transactions",
            MetricKey::PreSentTransactions => "pre_sent_transactions",
            MetricKey::PreReceivedTransactions => "pre_received_transactions",
        }
    }

    /// Unit of the value stored under this key.
    pub fn unit(self) -> MetricUnit {
        match self {
            MetricKey::Label => MetricUnit::Text,
            MetricKey::ExecutionTime | MetricKey::CpuTime => MetricUnit::Millis,
            MetricKey::GlobalAllocSize | MetricKey::GlobalFreedSize => MetricUnit::Bytes,
            MetricKey::GcInvocationCount
            | MetricKey::GlobalAllocCount
            | MetricKey::GlobalFreedCount
            | MetricKey::SentTransactions
            | MetricKey::ReceivedTransactions
            | MetricKey::PreSentTransactions
            | MetricKey::PreReceivedTransactions => MetricUnit::Count,
            _ => MetricUnit::Kilobytes,
        }
    }

    /// Returns true for keys recorded once per session rather than per snapshot.
    pub fn is_session_baseline(self) -> bool {
        matches!(
            self,
            MetricKey::PreSentTransactions | MetricKey::PreReceivedTransactions
        )
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when a metric name is not part of the schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMetricKey {
    pub name: String,
}

impl fmt::Display for UnknownMetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown metric key '{}'", self.name)
    }
}

impl std::error::Error for UnknownMetricKey {}

impl FromStr for MetricKey {
    type Err = UnknownMetricKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        MetricKey::ALL
            .iter()
            .copied()
            .find(|key| key.name() == s)
            .ok_or_else(|| UnknownMetricKey {
                name: s.to_string(),
            })
    }
}

/// Parses a comma-separated list of metric names, e.g. `"label,cpu_time"`.
///
/// Empty items are skipped; order and duplicates are preserved.
pub fn parse_key_list(s: &str) -> Result<Vec<MetricKey>, UnknownMetricKey> {
    s.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(MetricKey::from_str)
        .collect()
}
