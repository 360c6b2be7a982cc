//! Model bundle: serialized model plus manifest and environment capture

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Result;

/// File name of the bundle manifest.
pub const MANIFEST_FILE: &str = "MLmodel";
/// File name of the serialized model.
pub const MODEL_FILE: &str = "model.json";
/// File name of the environment capture.
pub const ENVIRONMENT_FILE: &str = "environment.json";

/// Build environment of the process that produced the bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentCapture {
    /// Producing package name
    pub package: String,
    /// Producing package version
    pub version: String,
    /// Minimum supported Rust version declared by the package
    pub rust_version: String,
    /// `target_os` of the build
    pub target_os: String,
    /// `target_arch` of the build
    pub target_arch: String,
    /// `debug` or `release`
    pub profile: String,
    /// Enabled cargo features relevant to reproducing the model
    pub features: Vec<String>,
}

impl EnvironmentCapture {
    /// Describe the running binary.
    #[must_use]
    pub fn current() -> Self {
        let mut features = Vec::new();
        if cfg!(feature = "rayon") {
            features.push("rayon".to_string());
        }
        Self {
            package: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            rust_version: env!("CARGO_PKG_RUST_VERSION").to_string(),
            target_os: std::env::consts::OS.to_string(),
            target_arch: std::env::consts::ARCH.to_string(),
            profile: if cfg!(debug_assertions) { "debug" } else { "release" }.to_string(),
            features,
        }
    }
}

/// Contents of the `MLmodel` manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Bundle directory relative to the run's artifact root
    pub artifact_path: String,
    /// Serialization flavor (e.g. `mltrack.forest`)
    pub flavor: String,
    /// Run that logged the bundle
    pub run_id: String,
    /// Unique id of this bundle
    pub model_uuid: String,
    /// When the bundle was written
    pub utc_time_created: DateTime<Utc>,
    /// Serialized model file, relative to the bundle
    pub model_file: String,
    /// Environment capture file, relative to the bundle
    pub environment_file: String,
}

/// Write the three bundle files into `dir`.
pub(crate) fn write_bundle<M: Serialize>(
    dir: &Path,
    model: &M,
    run_id: &str,
    artifact_path: &str,
    flavor: &str,
) -> Result<ModelInfo> {
    let info = ModelInfo {
        artifact_path: artifact_path.to_string(),
        flavor: flavor.to_string(),
        run_id: run_id.to_string(),
        model_uuid: uuid::Uuid::new_v4().simple().to_string(),
        utc_time_created: Utc::now(),
        model_file: MODEL_FILE.to_string(),
        environment_file: ENVIRONMENT_FILE.to_string(),
    };
    fs::write(dir.join(MODEL_FILE), serde_json::to_vec(model)?)?;
    fs::write(
        dir.join(ENVIRONMENT_FILE),
        serde_json::to_vec_pretty(&EnvironmentCapture::current())?,
    )?;
    fs::write(dir.join(MANIFEST_FILE), serde_json::to_vec_pretty(&info)?)?;
    Ok(info)
}
