//! End-to-end training run
//!
//! ```text
//! load → split → fit → predict → evaluate → render → log → close
//! ```
//!
//! Everything after the experiment lookup happens inside
//! [`TrackingClient::with_run`], so the run ends `Finished` on success and
//! `Failed` on the first error.

use serde::Serialize;
use tracing::info;

use crate::config::PipelineConfig;
use crate::dataset::Dataset;
use crate::diagnostics::{self, Evaluation};
use crate::experiment::{ActiveRun, ArtifactRecord, ModelInfo, TrackingClient, TrackingStore};
use crate::forest::{MaxFeatures, RandomForestClassifier};
use crate::Result;

/// Artifact directory of the model bundle.
pub const MODEL_ARTIFACT_PATH: &str = "model";
/// Flavor recorded in the model manifest.
pub const MODEL_FLAVOR: &str = "mltrack.random_forest";

/// What a successful pipeline run produced.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    /// Experiment the run was logged to
    pub experiment_id: String,
    /// The run
    pub run_id: String,
    /// Test-set accuracy
    pub accuracy: f64,
    /// Test-set ROC AUC
    pub roc_auc: f64,
    /// Diagnostic artifacts, in logging order
    pub artifacts: Vec<ArtifactRecord>,
    /// Model bundle manifest
    pub model: ModelInfo,
}

/// Train on the built-in dataset and log the run through `client`.
///
/// # Errors
///
/// Any error from the dataset, the forest, the metrics, rendering or the
/// store. The run, if it was opened, is marked `Failed` first.
pub fn run_pipeline<S: TrackingStore>(
    config: &PipelineConfig,
    client: &mut TrackingClient<S>,
) -> Result<PipelineReport> {
    config.validate()?;
    run_pipeline_on(config, client, &Dataset::builtin())
}

/// [`run_pipeline`] on a caller-supplied dataset.
///
/// # Errors
///
/// Same as [`run_pipeline`].
pub fn run_pipeline_on<S: TrackingStore>(
    config: &PipelineConfig,
    client: &mut TrackingClient<S>,
    data: &Dataset,
) -> Result<PipelineReport> {
    info!(
        samples = data.n_samples(),
        features = data.n_features(),
        "loaded dataset"
    );
    let split = data.train_test_split(config.test_size(), config.split_seed(), config.stratify())?;
    info!(
        train = split.train.n_samples(),
        test = split.test.n_samples(),
        stratify = config.stratify(),
        "split dataset"
    );

    let experiment = client.get_or_create_experiment(config.experiment_name())?;
    let experiment_id = experiment.experiment_id().to_string();

    client.with_run(&experiment_id, Some(config.run_name()), |run| {
        log_params(run, config)?;
        run.set_tags(config.tags())?;

        let model = RandomForestClassifier::fit(config.forest(), &split.train)?;
        info!(trees = model.trees().len(), "fitted forest");

        let y_pred = model.predict(split.test.features())?;
        let scores = model.predict_proba(split.test.features())?;
        let evaluation = Evaluation::compute(split.test.labels(), &y_pred, &scores)?;
        run.log_metric("accuracy", evaluation.accuracy)?;
        run.log_metric("roc_auc", evaluation.roc_auc)?;
        info!(
            accuracy = evaluation.accuracy,
            roc_auc = evaluation.roc_auc,
            "evaluated on test split"
        );

        let scratch = tempfile::tempdir()?;
        let rendered = diagnostics::render(
            scratch.path(),
            &evaluation,
            model.feature_importances(),
            config.top_k_features(),
        )?;
        let artifacts = rendered
            .iter()
            .map(|file| run.log_artifact(&file.local_path, file.artifact_dir))
            .collect::<Result<Vec<_>>>()?;
        info!(count = artifacts.len(), "logged artifacts");

        let model_info = run.log_model(&model, MODEL_ARTIFACT_PATH, MODEL_FLAVOR)?;
        info!(path = %model_info.artifact_path, uuid = %model_info.model_uuid, "logged model");

        Ok(PipelineReport {
            experiment_id: experiment_id.clone(),
            run_id: run.run_id().to_string(),
            accuracy: evaluation.accuracy,
            roc_auc: evaluation.roc_auc,
            artifacts,
            model: model_info,
        })
    })
}

fn log_params<S: TrackingStore>(run: &mut ActiveRun<'_, S>, config: &PipelineConfig) -> Result<()> {
    let forest = config.forest();
    run.log_param("n_estimators", forest.n_estimators)?;
    match forest.max_depth {
        Some(depth) => run.log_param("max_depth", depth)?,
        None => run.log_param("max_depth", "None")?,
    }
    run.log_param("min_samples_leaf", forest.min_samples_leaf)?;
    let max_features = match forest.max_features {
        MaxFeatures::Sqrt => "sqrt".to_string(),
        MaxFeatures::Log2 => "log2".to_string(),
        MaxFeatures::All => "all".to_string(),
        MaxFeatures::Count(k) => k.to_string(),
    };
    run.log_param("max_features", max_features)?;
    run.log_param("bootstrap", forest.bootstrap)?;
    run.log_param("random_state", forest.seed)
}
