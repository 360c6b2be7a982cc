//! File-backed tracking store
//!
//! ```text
//! <root>/
//!   <experiment_id>/meta.json                 ExperimentRecord
//!   <experiment_id>/<run_id>/meta.json        RunRecord
//!   <experiment_id>/<run_id>/params.json      [ParamRecord]
//!   <experiment_id>/<run_id>/tags.json        [TagRecord]
//!   <experiment_id>/<run_id>/metrics.jsonl    one MetricRecord per line
//!   <experiment_id>/<run_id>/artifacts.json   [ArtifactRecord]
//!   <experiment_id>/<run_id>/artifacts/...    artifact bytes
//! ```
//!
//! JSON documents are replaced atomically (write to a sibling temp file,
//! then rename). Metrics are appended.

use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::{check_param, ensure_active, ensure_finite, ensure_source_file, new_run_id, TrackingStore};
use crate::experiment::keys::normalize_artifact_path;
use crate::experiment::{
    ArtifactRecord, ExperimentRecord, MetricRecord, ParamRecord, RunRecord, RunStatus, TagRecord,
};
use crate::{Error, Result};

const META: &str = "meta.json";
const PARAMS: &str = "params.json";
const TAGS: &str = "tags.json";
const METRICS: &str = "metrics.jsonl";
const ARTIFACTS_INDEX: &str = "artifacts.json";
const ARTIFACTS_DIR: &str = "artifacts";

/// Tracking store persisted as a directory tree.
///
/// # Example
///
/// ```rust
/// use mltrack::experiment::{FileStore, TrackingStore};
///
/// # fn main() -> mltrack::Result<()> {
/// let dir = tempfile::tempdir()?;
/// let mut store = FileStore::open(dir.path().join("mlruns"))?;
/// let experiment = store.create_experiment("demo")?;
/// assert_eq!(experiment.experiment_id(), "0");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the directory cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        debug!(root = %root.display(), "opened file store");
        Ok(Self { root })
    }

    /// Root directory of the store.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding a run's artifact bytes.
    ///
    /// # Errors
    ///
    /// Returns `Error::RunNotFound` for unknown runs.
    pub fn artifact_root(&self, run_id: &str) -> Result<PathBuf> {
        Ok(self.find_run(run_id)?.0.join(ARTIFACTS_DIR))
    }

    fn experiment_dir(&self, experiment_id: &str) -> PathBuf {
        self.root.join(experiment_id)
    }

    /// Numeric experiment ids present on disk, ascending.
    fn experiment_ids(&self) -> Result<Vec<u64>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let Some(id) = entry.file_name().to_str().and_then(|s| s.parse::<u64>().ok()) else {
                continue;
            };
            if entry.path().join(META).is_file() {
                ids.push(id);
            }
        }
        ids.sort_unstable();
        Ok(ids)
    }

    /// Locate a run's directory by scanning experiments.
    fn find_run(&self, run_id: &str) -> Result<(PathBuf, RunRecord)> {
        if run_id.is_empty() || !run_id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(Error::RunNotFound(run_id.to_string()));
        }
        for id in self.experiment_ids()? {
            let dir = self.experiment_dir(&id.to_string()).join(run_id);
            let meta = dir.join(META);
            if meta.is_file() {
                let run: RunRecord = read_json(&meta)?;
                return Ok((dir, run));
            }
        }
        Err(Error::RunNotFound(run_id.to_string()))
    }

    fn find_active_run(&self, run_id: &str) -> Result<PathBuf> {
        let (dir, run) = self.find_run(run_id)?;
        ensure_active(&run)?;
        Ok(dir)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = fs::File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

fn read_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    if path.is_file() {
        read_json(path)
    } else {
        Ok(T::default())
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    {
        let mut file = fs::File::create(&tmp)?;
        serde_json::to_writer_pretty(&mut file, value)?;
        file.write_all(b"\n")?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

impl TrackingStore for FileStore {
    fn create_experiment(&mut self, name: &str) -> Result<ExperimentRecord> {
        if self.get_experiment_by_name(name)?.is_some() {
            return Err(Error::InvalidParameter(format!(
                "experiment '{name}' already exists"
            )));
        }
        let id = self.experiment_ids()?.last().map_or(0, |last| last + 1);
        let record = ExperimentRecord::new(id.to_string(), name);
        let dir = self.experiment_dir(record.experiment_id());
        fs::create_dir_all(&dir)?;
        write_json(&dir.join(META), &record)?;
        debug!(experiment_id = id, name, "created experiment");
        Ok(record)
    }

    fn get_experiment(&self, experiment_id: &str) -> Result<ExperimentRecord> {
        if experiment_id.parse::<u64>().is_err() {
            return Err(Error::ExperimentNotFound(experiment_id.to_string()));
        }
        let meta = self.experiment_dir(experiment_id).join(META);
        if !meta.is_file() {
            return Err(Error::ExperimentNotFound(experiment_id.to_string()));
        }
        read_json(&meta)
    }

    fn get_experiment_by_name(&self, name: &str) -> Result<Option<ExperimentRecord>> {
        Ok(self.list_experiments()?.into_iter().find(|e| e.name() == name))
    }

    fn list_experiments(&self) -> Result<Vec<ExperimentRecord>> {
        self.experiment_ids()?
            .into_iter()
            .map(|id| self.get_experiment(&id.to_string()))
            .collect()
    }

    fn create_run(&mut self, experiment_id: &str, run_name: Option<&str>) -> Result<RunRecord> {
        self.get_experiment(experiment_id)?;
        let mut builder = RunRecord::builder(new_run_id(), experiment_id);
        if let Some(name) = run_name {
            builder = builder.run_name(name);
        }
        let run = builder.build();
        let dir = self.experiment_dir(experiment_id).join(run.run_id());
        fs::create_dir_all(dir.join(ARTIFACTS_DIR))?;
        write_json(&dir.join(META), &run)?;
        debug!(run_id = run.run_id(), experiment_id, "created run");
        Ok(run)
    }

    fn get_run(&self, run_id: &str) -> Result<RunRecord> {
        Ok(self.find_run(run_id)?.1)
    }

    fn list_runs(&self, experiment_id: &str) -> Result<Vec<RunRecord>> {
        self.get_experiment(experiment_id)?;
        let mut runs = Vec::new();
        for entry in fs::read_dir(self.experiment_dir(experiment_id))? {
            let meta = entry?.path().join(META);
            if meta.is_file() {
                runs.push(read_json::<RunRecord>(&meta)?);
            }
        }
        runs.sort_by(|a, b| {
            a.started_at()
                .cmp(&b.started_at())
                .then_with(|| a.run_id().cmp(b.run_id()))
        });
        Ok(runs)
    }

    fn end_run(&mut self, run_id: &str, status: RunStatus) -> Result<RunRecord> {
        let (dir, mut run) = self.find_run(run_id)?;
        ensure_active(&run)?;
        if !run.complete(status) {
            return Err(Error::InvalidParameter(format!(
                "{status} is not a terminal run status"
            )));
        }
        write_json(&dir.join(META), &run)?;
        debug!(run_id, %status, "ended run");
        Ok(run)
    }

    fn log_param(&mut self, param: ParamRecord) -> Result<()> {
        let path = self.find_active_run(param.run_id())?.join(PARAMS);
        let mut params: Vec<ParamRecord> = read_json_or_default(&path)?;
        let existing = params.iter().find(|p| p.key() == param.key());
        if check_param(existing, &param)? {
            params.push(param);
            params.sort_by(|a, b| a.key().cmp(b.key()));
            write_json(&path, &params)?;
        }
        Ok(())
    }

    fn set_tag(&mut self, tag: TagRecord) -> Result<()> {
        let path = self.find_active_run(tag.run_id())?.join(TAGS);
        let mut tags: Vec<TagRecord> = read_json_or_default(&path)?;
        tags.retain(|t| t.key() != tag.key());
        tags.push(tag);
        tags.sort_by(|a, b| a.key().cmp(b.key()));
        write_json(&path, &tags)
    }

    fn log_metric(&mut self, metric: MetricRecord) -> Result<()> {
        let path = self.find_active_run(metric.run_id())?.join(METRICS);
        ensure_finite(&metric)?;
        let mut line = serde_json::to_string(&metric)?;
        line.push('\n');
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    fn get_params(&self, run_id: &str) -> Result<Vec<ParamRecord>> {
        read_json_or_default(&self.find_run(run_id)?.0.join(PARAMS))
    }

    fn get_tags(&self, run_id: &str) -> Result<Vec<TagRecord>> {
        read_json_or_default(&self.find_run(run_id)?.0.join(TAGS))
    }

    fn get_metrics(&self, run_id: &str) -> Result<Vec<MetricRecord>> {
        let path = self.find_run(run_id)?.0.join(METRICS);
        if !path.is_file() {
            return Ok(Vec::new());
        }
        let mut metrics = Vec::new();
        for line in BufReader::new(fs::File::open(path)?).lines() {
            let line = line?;
            if !line.trim().is_empty() {
                metrics.push(serde_json::from_str(&line)?);
            }
        }
        Ok(metrics)
    }

    fn log_artifact(
        &mut self,
        run_id: &str,
        local_path: &Path,
        artifact_path: &str,
    ) -> Result<ArtifactRecord> {
        let run_dir = self.find_active_run(run_id)?;
        ensure_source_file(local_path)?;
        let artifact_path = normalize_artifact_path(artifact_path)?;
        if artifact_path.is_empty() {
            return Err(Error::InvalidArtifactPath("empty artifact path".to_string()));
        }

        let bytes = fs::read(local_path)?;
        let dest = run_dir.join(ARTIFACTS_DIR).join(&artifact_path);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&dest, &bytes)?;

        let record = ArtifactRecord::for_bytes(run_id, artifact_path, &bytes);
        let index = run_dir.join(ARTIFACTS_INDEX);
        let mut records: Vec<ArtifactRecord> = read_json_or_default(&index)?;
        records.retain(|r| r.path() != record.path());
        records.push(record.clone());
        records.sort_by(|a, b| a.path().cmp(b.path()));
        write_json(&index, &records)?;

        debug!(run_id, path = record.path(), size = record.size_bytes(), "stored artifact");
        Ok(record)
    }

    fn list_artifacts(&self, run_id: &str) -> Result<Vec<ArtifactRecord>> {
        read_json_or_default(&self.find_run(run_id)?.0.join(ARTIFACTS_INDEX))
    }

    fn read_artifact(&self, run_id: &str, artifact_path: &str) -> Result<Vec<u8>> {
        let normalized = normalize_artifact_path(artifact_path)?;
        let path = self.artifact_root(run_id)?.join(&normalized);
        if normalized.is_empty() || !path.is_file() {
            return Err(Error::ArtifactNotFound(format!("{run_id}/{artifact_path}")));
        }
        Ok(fs::read(path)?)
    }
}
