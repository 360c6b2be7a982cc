//! Tracking client
//!
//! The client owns its store. There is no process-wide "current run":
//! a run is an [`ActiveRun`] value borrowed from the client, so at most one
//! run per client can be open at a time and the borrow checker enforces it.

use std::path::PathBuf;

use tracing::{info, warn};

use super::active_run::ActiveRun;
use super::param_record::RunData;
use super::store::{FileStore, TrackingStore};
use super::{ArtifactRecord, ExperimentRecord, MetricRecord, RunRecord};
use crate::Result;

/// Handle to a tracking backend.
#[derive(Debug)]
pub struct TrackingClient<S: TrackingStore> {
    store: S,
}

impl TrackingClient<FileStore> {
    /// Client over a local directory store.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the directory cannot be created.
    pub fn local(root: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self::new(FileStore::open(root)?))
    }
}

impl<S: TrackingStore> TrackingClient<S> {
    /// Wrap a store.
    #[must_use]
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// The backing store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Mutable access to the backing store.
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Consume the client, returning the store.
    #[must_use]
    pub fn into_store(self) -> S {
        self.store
    }

    /// Create an experiment with a unique name.
    ///
    /// # Errors
    ///
    /// `Error::InvalidParameter` if the name is empty or already taken.
    pub fn create_experiment(&mut self, name: &str) -> Result<ExperimentRecord> {
        check_experiment_name(name)?;
        let experiment = self.store.create_experiment(name)?;
        info!(experiment_id = experiment.experiment_id(), name, "created experiment");
        Ok(experiment)
    }

    /// Return the experiment called `name`, creating it if absent.
    ///
    /// # Errors
    ///
    /// Store errors.
    pub fn get_or_create_experiment(&mut self, name: &str) -> Result<ExperimentRecord> {
        check_experiment_name(name)?;
        if let Some(existing) = self.store.get_experiment_by_name(name)? {
            info!(experiment_id = existing.experiment_id(), name, "using existing experiment");
            return Ok(existing);
        }
        self.create_experiment(name)
    }

    /// Look up an experiment by id.
    ///
    /// # Errors
    ///
    /// `Error::ExperimentNotFound`.
    pub fn get_experiment(&self, experiment_id: &str) -> Result<ExperimentRecord> {
        self.store.get_experiment(experiment_id)
    }

    /// Look up an experiment by name.
    ///
    /// # Errors
    ///
    /// Store errors.
    pub fn get_experiment_by_name(&self, name: &str) -> Result<Option<ExperimentRecord>> {
        self.store.get_experiment_by_name(name)
    }

    /// All experiments, ordered by id.
    ///
    /// # Errors
    ///
    /// Store errors.
    pub fn list_experiments(&self) -> Result<Vec<ExperimentRecord>> {
        self.store.list_experiments()
    }

    /// Open a run. The returned handle must be finished or failed; if it
    /// is dropped while open the run is marked `Failed`.
    ///
    /// # Errors
    ///
    /// `Error::ExperimentNotFound` and store errors.
    pub fn start_run(
        &mut self,
        experiment_id: &str,
        run_name: Option<&str>,
    ) -> Result<ActiveRun<'_, S>> {
        let run = self.store.create_run(experiment_id, run_name)?;
        info!(
            experiment_id,
            run_id = run.run_id(),
            run_name = run_name.unwrap_or(""),
            "started run"
        );
        Ok(ActiveRun::new(&mut self.store, run))
    }

    /// Run `f` inside a fresh run. The run ends `Finished` if `f` returns
    /// `Ok` and `Failed` otherwise; `f`'s error is returned unchanged.
    ///
    /// # Errors
    ///
    /// Errors from opening the run, from `f`, or from closing the run.
    pub fn with_run<T, F>(&mut self, experiment_id: &str, run_name: Option<&str>, f: F) -> Result<T>
    where
        F: FnOnce(&mut ActiveRun<'_, S>) -> Result<T>,
    {
        let mut run = self.start_run(experiment_id, run_name)?;
        match f(&mut run) {
            Ok(value) => {
                let closed = run.finish()?;
                info!(run_id = closed.run_id(), status = %closed.status(), "run closed");
                Ok(value)
            }
            Err(e) => {
                let run_id = run.run_id().to_string();
                warn!(run_id = %run_id, error = %e, "run failed");
                if let Err(close_err) = run.fail() {
                    warn!(run_id = %run_id, error = %close_err, "could not mark run failed");
                }
                Err(e)
            }
        }
    }

    /// Look up a run by id.
    ///
    /// # Errors
    ///
    /// `Error::RunNotFound`.
    pub fn get_run(&self, run_id: &str) -> Result<RunRecord> {
        self.store.get_run(run_id)
    }

    /// Runs of one experiment, oldest first.
    ///
    /// # Errors
    ///
    /// `Error::ExperimentNotFound`.
    pub fn list_runs(&self, experiment_id: &str) -> Result<Vec<RunRecord>> {
        self.store.list_runs(experiment_id)
    }

    /// Run metadata plus params, tags and the latest value of each metric.
    ///
    /// # Errors
    ///
    /// `Error::RunNotFound`.
    pub fn get_run_data(&self, run_id: &str) -> Result<RunData> {
        let info = self.store.get_run(run_id)?;
        Ok(RunData::assemble(
            info,
            self.store.get_params(run_id)?,
            self.store.get_tags(run_id)?,
            self.store.get_metrics(run_id)?,
        ))
    }

    /// Full history of one metric, ordered by step.
    ///
    /// # Errors
    ///
    /// `Error::RunNotFound`.
    pub fn get_metric_history(&self, run_id: &str, key: &str) -> Result<Vec<MetricRecord>> {
        self.store.get_metric_history(run_id, key)
    }

    /// Artifacts of a run, ordered by path.
    ///
    /// # Errors
    ///
    /// `Error::RunNotFound`.
    pub fn list_artifacts(&self, run_id: &str) -> Result<Vec<ArtifactRecord>> {
        self.store.list_artifacts(run_id)
    }

    /// Bytes of one stored artifact.
    ///
    /// # Errors
    ///
    /// `Error::ArtifactNotFound`.
    pub fn read_artifact(&self, run_id: &str, artifact_path: &str) -> Result<Vec<u8>> {
        self.store.read_artifact(run_id, artifact_path)
    }
}

fn check_experiment_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(crate::Error::InvalidParameter(
            "experiment name must not be empty".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::{MemoryStore, RunStatus};
    use crate::Error;

    #[test]
    fn test_get_or_create_is_idempotent() {
        let mut client = TrackingClient::new(MemoryStore::new());
        let a = client.get_or_create_experiment("demo").unwrap();
        let b = client.get_or_create_experiment("demo").unwrap();
        assert_eq!(a.experiment_id(), b.experiment_id());
        assert_eq!(client.list_experiments().unwrap().len(), 1);
        assert!(client.create_experiment("demo").is_err());
    }

    #[test]
    fn test_empty_experiment_name() {
        let mut client = TrackingClient::new(MemoryStore::new());
        assert!(matches!(
            client.get_or_create_experiment("  "),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_with_run_success() {
        let mut client = TrackingClient::new(MemoryStore::new());
        let exp = client.get_or_create_experiment("demo").unwrap();
        let run_id = client
            .with_run(exp.experiment_id(), Some("ok"), |run| {
                run.log_param("max_depth", 5)?;
                run.log_metric("accuracy", 0.9)?;
                Ok(run.run_id().to_string())
            })
            .unwrap();

        let data = client.get_run_data(&run_id).unwrap();
        assert_eq!(data.info.status(), RunStatus::Finished);
        assert_eq!(data.info.run_name(), Some("ok"));
        assert_eq!(data.params["max_depth"], "5");
        assert_eq!(data.metrics["accuracy"], 0.9);
    }

    #[test]
    fn test_with_run_error_marks_failed() {
        let mut client = TrackingClient::new(MemoryStore::new());
        let exp = client.get_or_create_experiment("demo").unwrap();
        let mut seen = String::new();
        let result: Result<()> = client.with_run(exp.experiment_id(), None, |run| {
            seen = run.run_id().to_string();
            Err(Error::InvalidDataset("boom".to_string()))
        });

        assert!(matches!(result, Err(Error::InvalidDataset(_))));
        assert_eq!(client.get_run(&seen).unwrap().status(), RunStatus::Failed);
    }

    #[test]
    fn test_start_run_unknown_experiment() {
        let mut client = TrackingClient::new(MemoryStore::new());
        assert!(matches!(
            client.start_run("42", None),
            Err(Error::ExperimentNotFound(_))
        ));
    }

    #[test]
    fn test_local_client() {
        let dir = tempfile::tempdir().unwrap();
        let mut client = TrackingClient::local(dir.path().join("mlruns")).unwrap();
        let exp = client.get_or_create_experiment("demo").unwrap();
        let run = client.start_run(exp.experiment_id(), None).unwrap();
        let run_id = run.run_id().to_string();
        run.finish().unwrap();

        let runs = client.list_runs(exp.experiment_id()).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].run_id(), run_id);
        assert!(client.store().root().ends_with("mlruns"));
    }
}
