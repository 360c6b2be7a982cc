//! Scoped handle for an open run

use std::fmt::Display;
use std::fs;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::bundle::{self, ModelInfo};
use super::keys::{join_artifact_path, normalize_artifact_path, validate_key, validate_param_value};
use super::store::TrackingStore;
use super::{ArtifactRecord, MetricRecord, ParamRecord, RunRecord, RunStatus, TagRecord};
use crate::{Error, Result};

/// An open run. All logging goes through this handle.
///
/// The run is closed exactly once: by [`ActiveRun::finish`] or
/// [`ActiveRun::fail`], or, if the handle is dropped while still open
/// (early `?` return, panic), by `Drop`, which marks it `Failed`.
///
/// # Example
///
/// ```rust
/// use mltrack::experiment::{MemoryStore, RunStatus, TrackingClient};
///
/// # fn main() -> mltrack::Result<()> {
/// let mut client = TrackingClient::new(MemoryStore::new());
/// let experiment = client.get_or_create_experiment("demo")?;
///
/// let mut run = client.start_run(experiment.experiment_id(), Some("first"))?;
/// run.log_param("max_depth", 5)?;
/// run.log_metric("accuracy", 0.93)?;
/// let closed = run.finish()?;
///
/// assert_eq!(closed.status(), RunStatus::Finished);
/// # Ok(())
/// # }
/// ```
#[must_use = "dropping an ActiveRun immediately marks the run as failed"]
pub struct ActiveRun<'a, S: TrackingStore> {
    store: &'a mut S,
    run: RunRecord,
    closed: bool,
}

impl<'a, S: TrackingStore> ActiveRun<'a, S> {
    pub(crate) fn new(store: &'a mut S, run: RunRecord) -> Self {
        Self {
            store,
            run,
            closed: false,
        }
    }

    /// Id of the open run.
    #[must_use]
    pub fn run_id(&self) -> &str {
        self.run.run_id()
    }

    /// Run record as it was when the run was opened.
    #[must_use]
    pub const fn record(&self) -> &RunRecord {
        &self.run
    }

    /// Read access to the backing store.
    #[must_use]
    pub fn store(&self) -> &S {
        &*self.store
    }

    /// Record a param. Logging the same key again with the same value is a
    /// no-op; a different value fails with `Error::ParamConflict`.
    ///
    /// # Errors
    ///
    /// Key validation, param conflicts and store errors.
    pub fn log_param(&mut self, key: &str, value: impl Display) -> Result<()> {
        validate_key(key)?;
        let value = value.to_string();
        validate_param_value(key, &value)?;
        self.store
            .log_param(ParamRecord::new(self.run.run_id(), key, value))
    }

    /// Record several params.
    ///
    /// # Errors
    ///
    /// Stops at the first failing param.
    pub fn log_params<K, V, I>(&mut self, params: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Display,
    {
        for (key, value) in params {
            self.log_param(key.as_ref(), value)?;
        }
        Ok(())
    }

    /// Set or overwrite a tag.
    ///
    /// # Errors
    ///
    /// Key validation and store errors.
    pub fn set_tag(&mut self, key: &str, value: impl Display) -> Result<()> {
        validate_key(key)?;
        self.store
            .set_tag(TagRecord::new(self.run.run_id(), key, value.to_string()))
    }

    /// Set several tags.
    ///
    /// # Errors
    ///
    /// Stops at the first failing tag.
    pub fn set_tags<K, V, I>(&mut self, tags: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Display,
    {
        for (key, value) in tags {
            self.set_tag(key.as_ref(), value)?;
        }
        Ok(())
    }

    /// Record a single-point metric (step 0).
    ///
    /// # Errors
    ///
    /// Key validation and store errors.
    pub fn log_metric(&mut self, key: &str, value: f64) -> Result<()> {
        self.log_metric_at(key, value, 0)
    }

    /// Record one point of a metric series.
    ///
    /// # Errors
    ///
    /// Key validation and store errors; `Error::InvalidInput` if `value`
    /// is NaN or infinite.
    pub fn log_metric_at(&mut self, key: &str, value: f64, step: u64) -> Result<()> {
        validate_key(key)?;
        self.store
            .log_metric(MetricRecord::new(self.run.run_id(), key, step, value))
    }

    /// Copy a local file into the run's artifacts under
    /// `artifact_dir/<file name>` (`artifact_dir = ""` for the root).
    ///
    /// # Errors
    ///
    /// `Error::ArtifactNotFound` if `local_path` is not a file,
    /// `Error::InvalidArtifactPath` if `artifact_dir` escapes the root.
    pub fn log_artifact(
        &mut self,
        local_path: impl AsRef<Path>,
        artifact_dir: &str,
    ) -> Result<ArtifactRecord> {
        let local_path = local_path.as_ref();
        let file_name = local_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::ArtifactNotFound(local_path.display().to_string()))?;
        let dir = normalize_artifact_path(artifact_dir)?;
        let record = self.store.log_artifact(
            self.run.run_id(),
            local_path,
            &join_artifact_path(&dir, file_name),
        )?;
        debug!(run_id = self.run.run_id(), path = record.path(), "logged artifact");
        Ok(record)
    }

    /// Copy every file under `local_dir` (recursively) into
    /// `artifact_dir`, preserving relative paths. Returns records sorted by
    /// path.
    ///
    /// # Errors
    ///
    /// IO and store errors. `Error::ArtifactNotFound` if `local_dir` is not
    /// a directory or a path below it is not valid UTF-8.
    pub fn log_artifacts(
        &mut self,
        local_dir: impl AsRef<Path>,
        artifact_dir: &str,
    ) -> Result<Vec<ArtifactRecord>> {
        let local_dir = local_dir.as_ref();
        if !local_dir.is_dir() {
            return Err(Error::ArtifactNotFound(local_dir.display().to_string()));
        }
        let base = normalize_artifact_path(artifact_dir)?;
        let mut records = Vec::new();
        for entry in WalkDir::new(local_dir).sort_by_file_name() {
            let entry = entry.map_err(std::io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let parent = entry
                .path()
                .strip_prefix(local_dir)
                .ok()
                .and_then(Path::parent)
                .and_then(Path::to_str)
                .ok_or_else(|| Error::ArtifactNotFound(entry.path().display().to_string()))?;
            let dest = normalize_artifact_path(&join_artifact_path(&base, parent))?;
            records.push(self.log_artifact(entry.path(), &dest)?);
        }
        records.sort_by(|a, b| a.path().cmp(b.path()));
        Ok(records)
    }

    /// Write `text` to a scratch file and log it at `artifact_file`
    /// (a relative path including the file name).
    ///
    /// # Errors
    ///
    /// IO, path and store errors.
    pub fn log_text(&mut self, text: &str, artifact_file: &str) -> Result<ArtifactRecord> {
        let normalized = normalize_artifact_path(artifact_file)?;
        let (dir, name) = normalized
            .rsplit_once('/')
            .unwrap_or(("", normalized.as_str()));
        if name.is_empty() {
            return Err(Error::InvalidArtifactPath(artifact_file.to_string()));
        }
        let scratch = tempfile::tempdir()?;
        let local = scratch.path().join(name);
        fs::write(&local, text)?;
        self.log_artifact(&local, dir)
    }

    /// Serialize `model` into a bundle directory at `artifact_path`:
    /// `MLmodel` manifest, `model.json` and `environment.json`.
    ///
    /// # Errors
    ///
    /// Serialization, IO and store errors.
    pub fn log_model<M: Serialize>(
        &mut self,
        model: &M,
        artifact_path: &str,
        flavor: &str,
    ) -> Result<ModelInfo> {
        let artifact_path = normalize_artifact_path(artifact_path)?;
        if artifact_path.is_empty() {
            return Err(Error::InvalidArtifactPath("model bundle needs a directory".to_string()));
        }
        let scratch = tempfile::tempdir()?;
        let info = bundle::write_bundle(scratch.path(), model, self.run.run_id(), &artifact_path, flavor)?;
        self.log_artifacts(scratch.path(), &artifact_path)?;
        debug!(run_id = self.run.run_id(), %artifact_path, flavor, "logged model bundle");
        Ok(info)
    }

    /// Close the run as `Finished`.
    ///
    /// # Errors
    ///
    /// Store errors. If closing fails the handle is still dropped, which
    /// retries with `Failed`.
    pub fn finish(mut self) -> Result<RunRecord> {
        self.close(RunStatus::Finished)
    }

    /// Close the run as `Failed`.
    ///
    /// # Errors
    ///
    /// Store errors.
    pub fn fail(mut self) -> Result<RunRecord> {
        self.close(RunStatus::Failed)
    }

    /// Close the run with any terminal status.
    ///
    /// # Errors
    ///
    /// `Error::InvalidParameter` for `Running`, plus store errors.
    pub fn end(mut self, status: RunStatus) -> Result<RunRecord> {
        self.close(status)
    }

    fn close(&mut self, status: RunStatus) -> Result<RunRecord> {
        let record = self.store.end_run(self.run.run_id(), status)?;
        self.closed = true;
        self.run = record.clone();
        Ok(record)
    }
}

impl<S: TrackingStore> Drop for ActiveRun<'_, S> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        warn!(
            run_id = self.run.run_id(),
            panicking = std::thread::panicking(),
            "run dropped while open, marking it failed"
        );
        if let Err(e) = self.close(RunStatus::Failed) {
            warn!(run_id = self.run.run_id(), error = %e, "could not close run");
        }
    }
}
