//! Experiment tracking
//!
//! Records, stores and the client used to log a training run.
//!
//! ## Schema Overview
//!
//! ```text
//! ExperimentRecord (1) ──< RunRecord (N)
//!                              │
//!                              ├──< ParamRecord (N)  [write-once per key]
//!                              ├──< TagRecord (N)    [last write wins]
//!                              ├──< MetricRecord (N) [time-series]
//!                              └──< ArtifactRecord (N) [CAS]
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use mltrack::experiment::{MemoryStore, RunStatus, TrackingClient};
//!
//! # fn main() -> mltrack::Result<()> {
//! let mut client = TrackingClient::new(MemoryStore::new());
//! let experiment = client.get_or_create_experiment("My Experiment")?;
//!
//! let run_id = client.with_run(experiment.experiment_id(), None, |run| {
//!     run.log_param("learning_rate", 0.01)?;
//!     run.log_metric_at("loss", 0.5, 0)?;
//!     Ok(run.run_id().to_string())
//! })?;
//!
//! assert_eq!(client.get_run(&run_id)?.status(), RunStatus::Finished);
//! # Ok(())
//! # }
//! ```

mod active_run;
mod artifact_record;
mod bundle;
mod client;
mod experiment_record;
pub mod keys;
mod metric_record;
mod param_record;
mod run_record;
mod store;

pub use active_run::ActiveRun;
pub use artifact_record::{cas_hash, ArtifactRecord};
pub use bundle::{EnvironmentCapture, ModelInfo, ENVIRONMENT_FILE, MANIFEST_FILE, MODEL_FILE};
pub use client::TrackingClient;
pub use experiment_record::{ExperimentRecord, ExperimentRecordBuilder};
pub use metric_record::{MetricRecord, MetricRecordBuilder};
pub use param_record::{ParamRecord, RunData, TagRecord};
pub use run_record::{RunRecord, RunRecordBuilder, RunStatus};
pub use store::{FileStore, MemoryStore, TrackingStore};
