//! Param and Tag Records - string key/value pairs attached to a run

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{MetricRecord, RunRecord};

/// An immutable key/value pair, typically a hyperparameter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParamRecord {
    run_id: String,
    key: String,
    value: String,
}

impl ParamRecord {
    /// Create a new param record.
    #[must_use]
    pub fn new(run_id: impl Into<String>, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            key: key.into(),
            value: value.into(),
        }
    }

    /// Get the run ID.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Get the key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Get the value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }
}

/// A mutable key/value pair for free-form metadata. Last write wins.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TagRecord {
    run_id: String,
    key: String,
    value: String,
}

impl TagRecord {
    /// Create a new tag record.
    #[must_use]
    pub fn new(run_id: impl Into<String>, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            key: key.into(),
            value: value.into(),
        }
    }

    /// Get the run ID.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Get the key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Get the value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }
}

/// Read-side view of everything logged to a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunData {
    /// Run metadata and status
    pub info: RunRecord,
    /// Params by key
    pub params: BTreeMap<String, String>,
    /// Tags by key
    pub tags: BTreeMap<String, String>,
    /// Latest value of each metric (highest step, last logged on ties)
    pub metrics: BTreeMap<String, f64>,
}

impl RunData {
    pub(crate) fn assemble(
        info: RunRecord,
        params: Vec<ParamRecord>,
        tags: Vec<TagRecord>,
        metrics: Vec<MetricRecord>,
    ) -> Self {
        let mut latest: BTreeMap<String, (u64, f64)> = BTreeMap::new();
        for m in metrics {
            let entry = latest.entry(m.key().to_string()).or_insert((m.step(), m.value()));
            if m.step() >= entry.0 {
                *entry = (m.step(), m.value());
            }
        }
        Self {
            info,
            params: params.into_iter().map(|p| (p.key, p.value)).collect(),
            tags: tags.into_iter().map(|t| (t.key, t.value)).collect(),
            metrics: latest.into_iter().map(|(k, (_, v))| (k, v)).collect(),
        }
    }
}
