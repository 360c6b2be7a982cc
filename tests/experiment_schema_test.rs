//! Experiment Schema Tests
//!
//! Records, their serialized form and the store contract shared by
//! `MemoryStore` and `FileStore`.

use chrono::{TimeZone, Utc};
use mltrack::experiment::{
    cas_hash, ArtifactRecord, ExperimentRecord, FileStore, MemoryStore, MetricRecord, ParamRecord,
    RunRecord, RunStatus, TagRecord, TrackingStore,
};
use mltrack::Error;

// =============================================================================
// ExperimentRecord Tests
// =============================================================================

#[test]
fn test_experiment_record_creation() {
    let record = ExperimentRecord::new("0", "My Experiment");

    assert_eq!(record.experiment_id(), "0");
    assert_eq!(record.name(), "My Experiment");
    assert!(record.created_at().timestamp() > 0);
    assert!(record.config().is_none());
}

#[test]
fn test_experiment_record_with_config() {
    let config = serde_json::json!({
        "n_estimators": 100,
        "max_depth": 5,
        "model": "random_forest"
    });

    let record = ExperimentRecord::builder("1", "Training Run")
        .config(config.clone())
        .build();

    assert_eq!(record.experiment_id(), "1");
    assert_eq!(record.config(), Some(&config));
}

#[test]
fn test_experiment_record_serialization() {
    let record = ExperimentRecord::new("2", "Serialization Test");

    let json = serde_json::to_string(&record).expect("serialization failed");
    let deserialized: ExperimentRecord =
        serde_json::from_str(&json).expect("deserialization failed");

    assert_eq!(record, deserialized);
}

// =============================================================================
// RunRecord Tests
// =============================================================================

#[test]
fn test_run_record_creation() {
    let run = RunRecord::new("run-001", "0");

    assert_eq!(run.run_id(), "run-001");
    assert_eq!(run.experiment_id(), "0");
    assert_eq!(run.status(), RunStatus::Running);
    assert!(run.is_active());
    assert!(run.run_name().is_none());
    assert!(run.ended_at().is_none());
}

#[test]
fn test_run_record_complete_once() {
    let mut run = RunRecord::new("run-002", "0");

    assert!(run.complete(RunStatus::Finished));
    let ended = run.ended_at().expect("ended_at set");
    assert!(ended >= run.started_at());

    // A closed run keeps its first terminal status.
    assert!(!run.complete(RunStatus::Failed));
    assert_eq!(run.status(), RunStatus::Finished);
    assert_eq!(run.ended_at(), Some(ended));
}

#[test]
fn test_run_record_complete_rejects_running() {
    let mut run = RunRecord::new("run-003", "0");
    assert!(!run.complete(RunStatus::Running));
    assert!(run.is_active());
}

#[test]
fn test_run_record_builder() {
    let started = Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap();
    let run = RunRecord::builder("run-004", "0")
        .run_name("random_forest_breast_cancer")
        .started_at(started)
        .build();

    assert_eq!(run.run_name(), Some("random_forest_breast_cancer"));
    assert_eq!(run.started_at(), started);
}

#[test]
fn test_run_status_wire_names() {
    let json = serde_json::to_string(&RunStatus::Finished).unwrap();
    assert_eq!(json, "\"FINISHED\"");
    let parsed: RunStatus = serde_json::from_str("\"KILLED\"").unwrap();
    assert_eq!(parsed, RunStatus::Killed);

    assert_eq!(RunStatus::Running.to_string(), "RUNNING");
    assert!(!RunStatus::Running.is_terminal());
    assert!(RunStatus::Failed.is_terminal());
}

// =============================================================================
// MetricRecord Tests (Time-Series Optimized)
// =============================================================================

#[test]
fn test_metric_record_creation() {
    let metric = MetricRecord::new("run-001", "loss", 0, 0.5);

    assert_eq!(metric.run_id(), "run-001");
    assert_eq!(metric.key(), "loss");
    assert_eq!(metric.step(), 0);
    assert!((metric.value() - 0.5).abs() < f64::EPSILON);
    assert!(metric.timestamp().timestamp() > 0);
}

#[test]
fn test_metric_record_with_explicit_timestamp() {
    let ts = Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap();

    let metric = MetricRecord::builder("run-001", "accuracy", 100, 0.95)
        .timestamp(ts)
        .build();

    assert_eq!(metric.timestamp(), ts);
}

// =============================================================================
// ArtifactRecord Tests
// =============================================================================

#[test]
fn test_artifact_record_for_bytes() {
    let artifact = ArtifactRecord::for_bytes("run-001", "reports/classification_report.txt", b"");

    assert_eq!(artifact.file_name(), "classification_report.txt");
    assert_eq!(artifact.size_bytes(), 0);
    assert_eq!(
        artifact.cas_hash(),
        "sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
    );
}

#[test]
fn test_cas_hash_depends_on_content() {
    assert_ne!(cas_hash(b"a"), cas_hash(b"b"));
    assert_eq!(cas_hash(b"a"), cas_hash(b"a"));
}

// =============================================================================
// Store contract, run against both backends
// =============================================================================

fn exercise_store<S: TrackingStore>(store: &mut S) {
    let exp = store.create_experiment("contract").unwrap();
    assert_eq!(exp.experiment_id(), "0");
    assert!(matches!(
        store.create_experiment("contract"),
        Err(Error::InvalidParameter(_))
    ));
    let other = store.create_experiment("other").unwrap();
    assert_eq!(other.experiment_id(), "1");
    assert_eq!(store.list_experiments().unwrap().len(), 2);

    let run = store.create_run(exp.experiment_id(), Some("first")).unwrap();
    let run_id = run.run_id().to_string();
    assert_eq!(store.get_run(&run_id).unwrap().status(), RunStatus::Running);

    // Params are write-once.
    store.log_param(ParamRecord::new(&run_id, "max_depth", "5")).unwrap();
    store.log_param(ParamRecord::new(&run_id, "max_depth", "5")).unwrap();
    assert!(matches!(
        store.log_param(ParamRecord::new(&run_id, "max_depth", "6")),
        Err(Error::ParamConflict { .. })
    ));
    assert_eq!(store.get_params(&run_id).unwrap().len(), 1);
    assert_eq!(store.get_params(&run_id).unwrap()[0].value(), "5");

    // Tags overwrite.
    store.set_tag(TagRecord::new(&run_id, "owner", "a")).unwrap();
    store.set_tag(TagRecord::new(&run_id, "owner", "b")).unwrap();
    let tags = store.get_tags(&run_id).unwrap();
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].value(), "b");

    // Metrics append.
    for step in [2, 0, 1] {
        store
            .log_metric(MetricRecord::new(&run_id, "loss", step, 1.0 / (step as f64 + 1.0)))
            .unwrap();
    }
    let history = store.get_metric_history(&run_id, "loss").unwrap();
    let steps: Vec<u64> = history.iter().map(MetricRecord::step).collect();
    assert_eq!(steps, vec![0, 1, 2]);

    // Non-finite values are refused and the series stays readable.
    for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
        assert!(matches!(
            store.log_metric(MetricRecord::new(&run_id, "loss", 3, bad)),
            Err(Error::InvalidInput(_))
        ));
    }
    assert_eq!(store.get_metric_history(&run_id, "loss").unwrap().len(), 3);
    assert_eq!(store.get_metrics(&run_id).unwrap().len(), 3);

    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("roc_curve.svg");
    std::fs::write(&src, "<svg/>").unwrap();
    let record = store.log_artifact(&run_id, &src, "plots/roc_curve.svg").unwrap();
    assert_eq!(record.cas_hash(), cas_hash(b"<svg/>"));
    assert_eq!(store.read_artifact(&run_id, "plots/roc_curve.svg").unwrap(), b"<svg/>");
    assert!(matches!(
        store.read_artifact(&run_id, "plots/missing.svg"),
        Err(Error::ArtifactNotFound(_))
    ));

    let closed = store.end_run(&run_id, RunStatus::Finished).unwrap();
    assert_eq!(closed.status(), RunStatus::Finished);
    assert!(closed.ended_at().is_some());
    assert!(matches!(
        store.log_metric(MetricRecord::new(&run_id, "loss", 3, 0.1)),
        Err(Error::RunNotActive { .. })
    ));
    assert!(matches!(
        store.end_run(&run_id, RunStatus::Killed),
        Err(Error::RunNotActive { .. })
    ));

    assert_eq!(store.list_runs(exp.experiment_id()).unwrap().len(), 1);
    assert!(store.list_runs(other.experiment_id()).unwrap().is_empty());
    assert!(matches!(store.get_run("ffff"), Err(Error::RunNotFound(_))));
    assert!(matches!(store.get_experiment("99"), Err(Error::ExperimentNotFound(_))));
}

#[test]
fn test_memory_store_contract() {
    exercise_store(&mut MemoryStore::new());
}

#[test]
fn test_file_store_contract() {
    let dir = tempfile::tempdir().unwrap();
    exercise_store(&mut FileStore::open(dir.path().join("mlruns")).unwrap());
}

#[test]
fn test_file_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("mlruns");
    let run_id = {
        let mut store = FileStore::open(&root).unwrap();
        let exp = store.create_experiment("persisted").unwrap();
        let run = store.create_run(exp.experiment_id(), None).unwrap();
        store.log_metric(MetricRecord::new(run.run_id(), "accuracy", 0, 0.9)).unwrap();
        store.end_run(run.run_id(), RunStatus::Finished).unwrap();
        run.run_id().to_string()
    };

    let store = FileStore::open(&root).unwrap();
    let exp = store.get_experiment_by_name("persisted").unwrap().unwrap();
    let runs = store.list_runs(exp.experiment_id()).unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].run_id(), run_id);
    assert_eq!(runs[0].status(), RunStatus::Finished);
    assert_eq!(store.get_metrics(&run_id).unwrap().len(), 1);
}
