//! Tracking backends
//!
//! A [`TrackingStore`] persists experiments, runs and everything logged to
//! them, and stores artifact bytes under per-run paths. Two backends ship:
//!
//! - [`MemoryStore`]: hash maps, lost on drop (tests, dry runs)
//! - [`FileStore`]: a local directory tree (the default for the CLI)
//!
//! Both enforce the same write policy:
//! - writes to a closed run fail with `Error::RunNotActive`
//! - re-logging a param with the same value is a no-op; a different value
//!   fails with `Error::ParamConflict`
//! - tags overwrite, metrics append
//! - metric values must be finite; NaN and infinities fail with
//!   `Error::InvalidInput` and nothing is stored (JSON has no encoding for
//!   them, so `FileStore` could not read the series back)
//! - logging an artifact to an existing path replaces it

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use std::path::Path;

use super::{ArtifactRecord, ExperimentRecord, MetricRecord, ParamRecord, RunRecord, RunStatus, TagRecord};
use crate::{Error, Result};

/// Persistence boundary for the tracking client.
///
/// Every call is synchronous; a successful return means the write is
/// durable as far as the backend is concerned. Nothing is retried.
pub trait TrackingStore {
    /// Create an experiment; the store assigns its id.
    ///
    /// Fails with `Error::InvalidParameter` if the name is taken.
    fn create_experiment(&mut self, name: &str) -> Result<ExperimentRecord>;

    /// Look up an experiment by id.
    fn get_experiment(&self, experiment_id: &str) -> Result<ExperimentRecord>;

    /// Look up an experiment by its unique name.
    fn get_experiment_by_name(&self, name: &str) -> Result<Option<ExperimentRecord>>;

    /// All experiments, ordered by id.
    fn list_experiments(&self) -> Result<Vec<ExperimentRecord>>;

    /// Open a new run in `Running` status.
    fn create_run(&mut self, experiment_id: &str, run_name: Option<&str>) -> Result<RunRecord>;

    /// Look up a run by id.
    fn get_run(&self, run_id: &str) -> Result<RunRecord>;

    /// Runs of one experiment, oldest first.
    fn list_runs(&self, experiment_id: &str) -> Result<Vec<RunRecord>>;

    /// Close a run with a terminal status.
    ///
    /// Fails with `Error::RunNotActive` if the run is already closed.
    fn end_run(&mut self, run_id: &str, status: RunStatus) -> Result<RunRecord>;

    /// Record a param (see the module docs for the duplicate-key policy).
    fn log_param(&mut self, param: ParamRecord) -> Result<()>;

    /// Set or overwrite a tag.
    fn set_tag(&mut self, tag: TagRecord) -> Result<()>;

    /// Append a metric point. Non-finite values are rejected.
    fn log_metric(&mut self, metric: MetricRecord) -> Result<()>;

    /// Params of a run, ordered by key.
    fn get_params(&self, run_id: &str) -> Result<Vec<ParamRecord>>;

    /// Tags of a run, ordered by key.
    fn get_tags(&self, run_id: &str) -> Result<Vec<TagRecord>>;

    /// Every metric point of a run, in logging order.
    fn get_metrics(&self, run_id: &str) -> Result<Vec<MetricRecord>>;

    /// Copy `local_path` into the run's artifact store at `artifact_path`
    /// (already normalised, relative, including the file name).
    fn log_artifact(
        &mut self,
        run_id: &str,
        local_path: &Path,
        artifact_path: &str,
    ) -> Result<ArtifactRecord>;

    /// Artifacts of a run, ordered by path.
    fn list_artifacts(&self, run_id: &str) -> Result<Vec<ArtifactRecord>>;

    /// Bytes of one stored artifact.
    fn read_artifact(&self, run_id: &str, artifact_path: &str) -> Result<Vec<u8>>;

    /// Points of one metric series ordered by step.
    fn get_metric_history(&self, run_id: &str, key: &str) -> Result<Vec<MetricRecord>> {
        let mut series: Vec<MetricRecord> = self
            .get_metrics(run_id)?
            .into_iter()
            .filter(|m| m.key() == key)
            .collect();
        super::metric_record::sort_series(&mut series);
        Ok(series)
    }
}

pub(crate) fn ensure_active(run: &RunRecord) -> Result<()> {
    if run.is_active() {
        Ok(())
    } else {
        Err(Error::RunNotActive {
            run_id: run.run_id().to_string(),
            status: run.status().to_string(),
        })
    }
}

/// Apply the duplicate-param policy. Returns `true` if `param` must be stored.
pub(crate) fn check_param(existing: Option<&ParamRecord>, param: &ParamRecord) -> Result<bool> {
    match existing {
        None => Ok(true),
        Some(old) if old.value() == param.value() => Ok(false),
        Some(old) => Err(Error::ParamConflict {
            run_id: param.run_id().to_string(),
            key: param.key().to_string(),
            existing: old.value().to_string(),
            attempted: param.value().to_string(),
        }),
    }
}

pub(crate) fn ensure_finite(metric: &MetricRecord) -> Result<()> {
    if metric.value().is_finite() {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "metric '{}' of run {} must be finite, got {}",
            metric.key(),
            metric.run_id(),
            metric.value()
        )))
    }
}

pub(crate) fn ensure_source_file(local_path: &Path) -> Result<()> {
    if local_path.is_file() {
        Ok(())
    } else {
        Err(Error::ArtifactNotFound(local_path.display().to_string()))
    }
}

pub(crate) fn new_run_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
