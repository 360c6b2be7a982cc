//! Metric Record - numeric values logged to a run

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metric Record represents a single metric data point.
///
/// Single-point metrics use step 0. Time series log the same key at
/// increasing steps.
///
/// ## Time-Series Ordering
///
/// - `run_id` + `key` identify the series
/// - `step` orders points within the series
/// - `timestamp` records wall-clock time and breaks ties between equal steps
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricRecord {
    run_id: String,
    key: String,
    step: u64,
    value: f64,
    timestamp: DateTime<Utc>,
}

impl MetricRecord {
    /// Create a new metric record stamped now.
    ///
    /// # Arguments
    ///
    /// * `run_id` - ID of the parent run
    /// * `key` - Metric name/key (e.g., "accuracy", "roc_auc")
    /// * `step` - Step index (0 for single-point metrics)
    /// * `value` - Metric value
    #[must_use]
    pub fn new(run_id: impl Into<String>, key: impl Into<String>, step: u64, value: f64) -> Self {
        Self::builder(run_id, key, step, value).build()
    }

    /// Create a builder for constructing a metric record with optional fields.
    #[must_use]
    pub fn builder(
        run_id: impl Into<String>,
        key: impl Into<String>,
        step: u64,
        value: f64,
    ) -> MetricRecordBuilder {
        MetricRecordBuilder::new(run_id, key, step, value)
    }

    /// Get the run ID.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Get the metric key/name.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Get the step number.
    #[must_use]
    pub const fn step(&self) -> u64 {
        self.step
    }

    /// Get the metric value.
    #[must_use]
    pub const fn value(&self) -> f64 {
        self.value
    }

    /// Get the timestamp when the metric was recorded.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Builder for `MetricRecord`.
#[derive(Debug)]
pub struct MetricRecordBuilder {
    run_id: String,
    key: String,
    step: u64,
    value: f64,
    timestamp: DateTime<Utc>,
}

impl MetricRecordBuilder {
    /// Create a new builder with required fields.
    #[must_use]
    pub fn new(run_id: impl Into<String>, key: impl Into<String>, step: u64, value: f64) -> Self {
        Self {
            run_id: run_id.into(),
            key: key.into(),
            step,
            value,
            timestamp: Utc::now(),
        }
    }

    /// Set a custom timestamp.
    #[must_use]
    pub const fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Build the `MetricRecord`.
    #[must_use]
    pub fn build(self) -> MetricRecord {
        MetricRecord {
            run_id: self.run_id,
            key: self.key,
            step: self.step,
            value: self.value,
            timestamp: self.timestamp,
        }
    }
}

/// Sort a series by step, keeping insertion order for equal steps.
pub(crate) fn sort_series(metrics: &mut [MetricRecord]) {
    metrics.sort_by_key(MetricRecord::step);
}
