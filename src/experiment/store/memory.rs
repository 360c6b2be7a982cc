//! In-memory tracking store
//!
//! Data lives for the lifetime of the value. Useful for tests and for
//! running the pipeline without touching disk.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use tracing::debug;

use super::{check_param, ensure_active, ensure_finite, ensure_source_file, new_run_id, TrackingStore};
use crate::experiment::{
    ArtifactRecord, ExperimentRecord, MetricRecord, ParamRecord, RunRecord, RunStatus, TagRecord,
};
use crate::{Error, Result};

/// In-memory store for experiment tracking data.
///
/// ## Design
///
/// Hash maps give O(1) lookups by id; metrics live in one vector in logging
/// order and are filtered per query. Experiment ids are sequential decimal
/// strings starting at `"0"`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    experiments: BTreeMap<u64, ExperimentRecord>,
    runs: HashMap<String, RunRecord>,
    run_order: Vec<String>,
    params: HashMap<String, BTreeMap<String, ParamRecord>>,
    tags: HashMap<String, BTreeMap<String, TagRecord>>,
    metrics: Vec<MetricRecord>,
    artifacts: HashMap<String, BTreeMap<String, (ArtifactRecord, Vec<u8>)>>,
}

impl MemoryStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the store holds no experiments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.experiments.is_empty()
    }

    /// Get the number of experiments in the store.
    #[must_use]
    pub fn experiment_count(&self) -> usize {
        self.experiments.len()
    }

    /// Get the number of runs in the store.
    #[must_use]
    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    /// Get the number of metric points in the store.
    #[must_use]
    pub fn metric_count(&self) -> usize {
        self.metrics.len()
    }

    fn run_mut(&mut self, run_id: &str) -> Result<&mut RunRecord> {
        self.runs
            .get_mut(run_id)
            .ok_or_else(|| Error::RunNotFound(run_id.to_string()))
    }

    fn active_run(&self, run_id: &str) -> Result<&RunRecord> {
        let run = self.get_run_ref(run_id)?;
        ensure_active(run)?;
        Ok(run)
    }

    fn get_run_ref(&self, run_id: &str) -> Result<&RunRecord> {
        self.runs
            .get(run_id)
            .ok_or_else(|| Error::RunNotFound(run_id.to_string()))
    }
}

impl TrackingStore for MemoryStore {
    fn create_experiment(&mut self, name: &str) -> Result<ExperimentRecord> {
        if self.get_experiment_by_name(name)?.is_some() {
            return Err(Error::InvalidParameter(format!(
                "experiment '{name}' already exists"
            )));
        }
        let id = self.experiments.keys().next_back().map_or(0, |last| last + 1);
        let record = ExperimentRecord::new(id.to_string(), name);
        self.experiments.insert(id, record.clone());
        debug!(experiment_id = id, name, "created experiment");
        Ok(record)
    }

    fn get_experiment(&self, experiment_id: &str) -> Result<ExperimentRecord> {
        experiment_id
            .parse::<u64>()
            .ok()
            .and_then(|id| self.experiments.get(&id))
            .cloned()
            .ok_or_else(|| Error::ExperimentNotFound(experiment_id.to_string()))
    }

    fn get_experiment_by_name(&self, name: &str) -> Result<Option<ExperimentRecord>> {
        Ok(self.experiments.values().find(|e| e.name() == name).cloned())
    }

    fn list_experiments(&self) -> Result<Vec<ExperimentRecord>> {
        Ok(self.experiments.values().cloned().collect())
    }

    fn create_run(&mut self, experiment_id: &str, run_name: Option<&str>) -> Result<RunRecord> {
        self.get_experiment(experiment_id)?;
        let mut builder = RunRecord::builder(new_run_id(), experiment_id);
        if let Some(name) = run_name {
            builder = builder.run_name(name);
        }
        let run = builder.build();
        self.run_order.push(run.run_id().to_string());
        self.runs.insert(run.run_id().to_string(), run.clone());
        Ok(run)
    }

    fn get_run(&self, run_id: &str) -> Result<RunRecord> {
        self.get_run_ref(run_id).cloned()
    }

    fn list_runs(&self, experiment_id: &str) -> Result<Vec<RunRecord>> {
        self.get_experiment(experiment_id)?;
        Ok(self
            .run_order
            .iter()
            .filter_map(|id| self.runs.get(id))
            .filter(|run| run.experiment_id() == experiment_id)
            .cloned()
            .collect())
    }

    fn end_run(&mut self, run_id: &str, status: RunStatus) -> Result<RunRecord> {
        let run = self.run_mut(run_id)?;
        ensure_active(run)?;
        if !run.complete(status) {
            return Err(Error::InvalidParameter(format!(
                "{status} is not a terminal run status"
            )));
        }
        Ok(run.clone())
    }

    fn log_param(&mut self, param: ParamRecord) -> Result<()> {
        self.active_run(param.run_id())?;
        let run_params = self.params.entry(param.run_id().to_string()).or_default();
        if check_param(run_params.get(param.key()), &param)? {
            run_params.insert(param.key().to_string(), param);
        }
        Ok(())
    }

    fn set_tag(&mut self, tag: TagRecord) -> Result<()> {
        self.active_run(tag.run_id())?;
        self.tags
            .entry(tag.run_id().to_string())
            .or_default()
            .insert(tag.key().to_string(), tag);
        Ok(())
    }

    fn log_metric(&mut self, metric: MetricRecord) -> Result<()> {
        self.active_run(metric.run_id())?;
        ensure_finite(&metric)?;
        self.metrics.push(metric);
        Ok(())
    }

    fn get_params(&self, run_id: &str) -> Result<Vec<ParamRecord>> {
        self.get_run_ref(run_id)?;
        Ok(self
            .params
            .get(run_id)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default())
    }

    fn get_tags(&self, run_id: &str) -> Result<Vec<TagRecord>> {
        self.get_run_ref(run_id)?;
        Ok(self
            .tags
            .get(run_id)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default())
    }

    fn get_metrics(&self, run_id: &str) -> Result<Vec<MetricRecord>> {
        self.get_run_ref(run_id)?;
        Ok(self
            .metrics
            .iter()
            .filter(|m| m.run_id() == run_id)
            .cloned()
            .collect())
    }

    fn log_artifact(
        &mut self,
        run_id: &str,
        local_path: &Path,
        artifact_path: &str,
    ) -> Result<ArtifactRecord> {
        self.active_run(run_id)?;
        ensure_source_file(local_path)?;
        let bytes = std::fs::read(local_path)?;
        let record = ArtifactRecord::for_bytes(run_id, artifact_path, &bytes);
        self.artifacts
            .entry(run_id.to_string())
            .or_default()
            .insert(artifact_path.to_string(), (record.clone(), bytes));
        Ok(record)
    }

    fn list_artifacts(&self, run_id: &str) -> Result<Vec<ArtifactRecord>> {
        self.get_run_ref(run_id)?;
        Ok(self
            .artifacts
            .get(run_id)
            .map(|m| m.values().map(|(record, _)| record.clone()).collect())
            .unwrap_or_default())
    }

    fn read_artifact(&self, run_id: &str, artifact_path: &str) -> Result<Vec<u8>> {
        self.get_run_ref(run_id)?;
        self.artifacts
            .get(run_id)
            .and_then(|m| m.get(artifact_path))
            .map(|(_, bytes)| bytes.clone())
            .ok_or_else(|| Error::ArtifactNotFound(format!("{run_id}/{artifact_path}")))
    }
}
