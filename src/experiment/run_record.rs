//! Run Record - one tracked execution of an experiment

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunStatus {
    /// Run is open and accepting writes.
    Running,
    /// Run closed normally.
    Finished,
    /// Run closed after an error.
    Failed,
    /// Run was terminated by the user or system.
    Killed,
}

impl RunStatus {
    /// Whether the run is closed.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }

    /// Upper-case wire name (`RUNNING`, `FINISHED`, ...).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "RUNNING",
            Self::Finished => "FINISHED",
            Self::Failed => "FAILED",
            Self::Killed => "KILLED",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Run Record represents a single execution of an experiment.
///
/// A run is created in `Running` status and closed exactly once with a
/// terminal status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunRecord {
    run_id: String,
    experiment_id: String,
    #[serde(default)]
    run_name: Option<String>,
    status: RunStatus,
    started_at: DateTime<Utc>,
    #[serde(default)]
    ended_at: Option<DateTime<Utc>>,
}

impl RunRecord {
    /// Create a new running record started now.
    #[must_use]
    pub fn new(run_id: impl Into<String>, experiment_id: impl Into<String>) -> Self {
        Self::builder(run_id, experiment_id).build()
    }

    /// Create a builder for constructing a run record with optional fields.
    #[must_use]
    pub fn builder(
        run_id: impl Into<String>,
        experiment_id: impl Into<String>,
    ) -> RunRecordBuilder {
        RunRecordBuilder::new(run_id, experiment_id)
    }

    /// Get the run ID.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Get the parent experiment ID.
    #[must_use]
    pub fn experiment_id(&self) -> &str {
        &self.experiment_id
    }

    /// Get the human-readable run name, if set.
    #[must_use]
    pub fn run_name(&self) -> Option<&str> {
        self.run_name.as_deref()
    }

    /// Get the current run status.
    #[must_use]
    pub const fn status(&self) -> RunStatus {
        self.status
    }

    /// Get the start timestamp.
    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Get the end timestamp, if the run is closed.
    #[must_use]
    pub const fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    /// Whether the run still accepts writes.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }

    /// Close the run with the given terminal status, stamping `ended_at`.
    ///
    /// Returns `false` (and changes nothing) if the run was already closed or
    /// `status` is `Running`.
    pub fn complete(&mut self, status: RunStatus) -> bool {
        if self.status.is_terminal() || !status.is_terminal() {
            return false;
        }
        self.status = status;
        self.ended_at = Some(Utc::now());
        true
    }
}

/// Builder for `RunRecord`.
#[derive(Debug)]
#[allow(clippy::struct_field_names)]
pub struct RunRecordBuilder {
    run_id: String,
    experiment_id: String,
    run_name: Option<String>,
    started_at: DateTime<Utc>,
}

impl RunRecordBuilder {
    /// Create a new builder with required fields.
    #[must_use]
    pub fn new(run_id: impl Into<String>, experiment_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            experiment_id: experiment_id.into(),
            run_name: None,
            started_at: Utc::now(),
        }
    }

    /// Set the human-readable run name.
    #[must_use]
    pub fn run_name(mut self, name: impl Into<String>) -> Self {
        self.run_name = Some(name.into());
        self
    }

    /// Set a custom start timestamp.
    #[must_use]
    pub const fn started_at(mut self, started_at: DateTime<Utc>) -> Self {
        self.started_at = started_at;
        self
    }

    /// Build the `RunRecord` in `Running` status.
    #[must_use]
    pub fn build(self) -> RunRecord {
        RunRecord {
            run_id: self.run_id,
            experiment_id: self.experiment_id,
            run_name: self.run_name,
            status: RunStatus::Running,
            started_at: self.started_at,
            ended_at: None,
        }
    }
}
