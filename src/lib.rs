//! # mltrack: Minimal Experiment Tracking
//!
//! **Version**: 0.1.0
//!
//! mltrack trains a random-forest classifier on a built-in binary
//! classification dataset and logs everything about the run (params, tags,
//! metrics, diagnostic plots, a text report and a model bundle) to a
//! tracking backend through an explicit client handle.
//!
//! ## Design Principles
//!
//! - **No ambient state**: the [`experiment::TrackingClient`] is a value you
//!   pass around; there is no global "current run"
//! - **Closed exactly once**: an open run is an [`experiment::ActiveRun`]
//!   guard, and dropping it without finishing marks the run `Failed`
//! - **Deterministic**: dataset, split and forest are all seeded
//! - **Fail fast**: every error propagates; nothing is retried
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use mltrack::config::PipelineConfig;
//! use mltrack::experiment::TrackingClient;
//! use mltrack::pipeline::run_pipeline;
//!
//! let config = PipelineConfig::default();
//! let mut client = TrackingClient::local(config.tracking_dir())?;
//! let report = run_pipeline(&config, &mut client)?;
//! println!("run {} accuracy {:.3}", report.run_id, report.accuracy);
//! # Ok::<(), mltrack::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod config;
pub mod dataset;
pub mod diagnostics;
pub mod error;
pub mod experiment;
pub mod forest;
pub mod metrics;
pub mod pipeline;
pub mod plot;

pub use error::{Error, Result};
