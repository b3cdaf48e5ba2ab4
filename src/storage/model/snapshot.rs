//! Snapshot structures.
//!
//! A `Snapshot` is one immutable set of metric readings taken at a
//! checkpoint. A `SessionResult` aggregates the snapshots of one
//! `start_tracing`/`stop_tracing` bracket together with the baselines
//! captured when the session began.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::metric::MetricKey;

/// A point-in-time capture of every collected metric plus a label.
///
/// Metrics are kept in schema order (the declaration order of `MetricKey`).
/// Fields are private: once built, a snapshot cannot change.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Snapshot {
    label: String,
    metrics: BTreeMap<MetricKey, i64>,
}

impl Snapshot {
    /// Builds a snapshot from a label and metric values.
    ///
    /// `MetricKey::Label` and session-baseline keys are not per-snapshot
    /// values and are dropped.
    pub fn new(
        label: impl Into<String>,
        metrics: impl IntoIterator<Item = (MetricKey, i64)>,
    ) -> Self {
        let metrics = metrics
            .into_iter()
            .filter(|(key, _)| *key != MetricKey::Label && !key.is_session_baseline())
            .collect();
        Self {
            label: label.into(),
            metrics,
        }
    }

    /// Caller-supplied label. Not required to be unique.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns the value recorded for `key`.
    pub fn get(&self, key: MetricKey) -> Option<i64> {
        self.metrics.get(&key).copied()
    }

    /// Renders the value of `key` as text; the label renders as itself.
    ///
    /// Keys not present in the snapshot render as an empty string.
    pub fn render(&self, key: MetricKey) -> String {
        match key {
            MetricKey::Label => self.label.clone(),
            _ => self
                .get(key)
                .map(|value| value.to_string())
                .unwrap_or_default(),
        }
    }

    /// Iterates over metric values in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (MetricKey, i64)> + '_ {
        self.metrics.iter().map(|(key, value)| (*key, *value))
    }

    /// Number of integer metrics in the snapshot.
    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "label={}", self.label)?;
        for (key, value) in self.iter() {
            write!(f, " {}={}", key, value)?;
        }
        Ok(())
    }
}

/// Aggregate result of one tracing session.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct SessionResult {
    /// Label passed to `start_tracing`.
    pub label: String,
    /// Snapshots taken while the session was running, in call order.
    pub snapshots: Vec<Snapshot>,
    /// Sent transaction count captured at session start.
    pub pre_sent_transactions: i64,
    /// Received transaction count captured at session start.
    pub pre_received_transactions: i64,
    /// Wall-clock time between the last checkpoint and `stop_tracing`.
    pub final_execution_time: Option<i64>,
    /// CPU time between the last checkpoint and `stop_tracing`.
    pub final_cpu_time: Option<i64>,
}

impl SessionResult {
    pub(crate) fn new(
        label: impl Into<String>,
        pre_sent_transactions: i64,
        pre_received_transactions: i64,
    ) -> Self {
        Self {
            label: label.into(),
            pre_sent_transactions,
            pre_received_transactions,
            ..Self::default()
        }
    }

    /// Returns a pre-session baseline value.
    pub fn pre(&self, key: MetricKey) -> Option<i64> {
        match key {
            MetricKey::PreSentTransactions => Some(self.pre_sent_transactions),
            MetricKey::PreReceivedTransactions => Some(self.pre_received_transactions),
            _ => None,
        }
    }

    /// Labels of the recorded snapshots, in order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.snapshots.iter().map(Snapshot::label)
    }

    /// Cumulative wall-clock time since session start after each snapshot.
    ///
    /// Non-decreasing as long as the metric source clock is monotonic.
    pub fn elapsed_since_start(&self) -> Vec<i64> {
        self.snapshots
            .iter()
            .scan(0i64, |total, snapshot| {
                *total = total
                    .saturating_add(snapshot.get(MetricKey::ExecutionTime).unwrap_or(0));
                Some(*total)
            })
            .collect()
    }

    /// Total wall-clock time of the session, including the final interval.
    pub fn total_execution_time(&self) -> i64 {
        self.elapsed_since_start()
            .last()
            .copied()
            .unwrap_or(0)
            .saturating_add(self.final_execution_time.unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(label: &str, exec: i64) -> Snapshot {
        Snapshot::new(
            label,
            [
                (MetricKey::NativeFree, 7),
                (MetricKey::ExecutionTime, exec),
                (MetricKey::Label, 99),
                (MetricKey::PreSentTransactions, 5),
            ],
        )
    }

    #[test]
    fn test_snapshot_orders_metrics_by_schema() {
        let s = snap("A", 3);
        let keys: Vec<MetricKey> = s.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![MetricKey::ExecutionTime, MetricKey::NativeFree]);
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn test_snapshot_render() {
        let s = snap("Main-OnCreate", 3);
        assert_eq!(s.render(MetricKey::Label), "Main-OnCreate");
        assert_eq!(s.render(MetricKey::NativeFree), "7");
        assert_eq!(s.render(MetricKey::CpuTime), "");
        assert_eq!(s.get(MetricKey::Label), None);
    }

    #[test]
    fn test_snapshot_display() {
        let s = snap("A", 3);
        assert_eq!(s.to_string(), "label=A execution_time=3 native_free=7");
    }

    #[test]
    fn test_session_result_elapsed() {
        let mut result = SessionResult::new("S1", 10, 20);
        result.snapshots = vec![snap("A", 3), snap("B", 0), snap("C", 4)];
        result.final_execution_time = Some(2);

        assert_eq!(result.elapsed_since_start(), vec![3, 3, 7]);
        assert_eq!(result.total_execution_time(), 9);
        assert_eq!(result.labels().collect::<Vec<_>>(), vec!["A", "B", "C"]);
        assert_eq!(result.pre(MetricKey::PreSentTransactions), Some(10));
        assert_eq!(result.pre(MetricKey::PreReceivedTransactions), Some(20));
        assert_eq!(result.pre(MetricKey::SentTransactions), None);
    }

    #[test]
    fn test_snapshot_json_round_trip() {
        let s = snap("A", 3);
        let json = serde_json::to_string(&s).unwrap();
        assert!(json.contains("\"execution_time\":3"));
        let back: Snapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
    }
}
