//! Error types for mltrack
//!
//! Every failure in the pipeline is fatal: errors propagate to the binary,
//! which exits non-zero. Messages name the offending value.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// mltrack error types
#[derive(Error, Debug)]
pub enum Error {
    /// Dataset shape or content is unusable
    #[error("Invalid dataset: {0}")]
    InvalidDataset(String),

    /// Model or pipeline hyperparameter out of range
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Metric inputs are empty, mismatched or degenerate
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Param/metric/tag key rejected by key validation
    #[error("Invalid key '{key}': {reason}")]
    InvalidKey {
        /// Offending key
        key: String,
        /// Why it was rejected
        reason: String,
    },

    /// A param was logged twice with different values
    #[error("Param '{key}' already logged for run {run_id} with value '{existing}', refusing to change it to '{attempted}'")]
    ParamConflict {
        /// Run the param belongs to
        run_id: String,
        /// Param key
        key: String,
        /// Value already stored
        existing: String,
        /// Value that was rejected
        attempted: String,
    },

    /// Experiment id or name is unknown to the store
    #[error("Experiment not found: {0}")]
    ExperimentNotFound(String),

    /// Run id is unknown to the store
    #[error("Run not found: {0}")]
    RunNotFound(String),

    /// Write attempted against a run that is no longer running
    #[error("Run {run_id} is not active (status: {status})")]
    RunNotActive {
        /// Run id
        run_id: String,
        /// Current status
        status: String,
    },

    /// Local file handed to `log_artifact` does not exist
    #[error("Artifact source not found: {0}")]
    ArtifactNotFound(String),

    /// Artifact destination would escape the run's artifact root
    #[error("Invalid artifact path: {0}")]
    InvalidArtifactPath(String),

    /// Plot rendering failed
    #[error("Plot error: {0}")]
    Plot(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
