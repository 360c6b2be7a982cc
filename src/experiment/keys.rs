//! Key and artifact-path validation shared by every store

use crate::{Error, Result};

/// Longest accepted param/metric/tag key, in characters.
pub const MAX_KEY_LEN: usize = 250;
/// Longest accepted param value, in characters.
pub const MAX_PARAM_VALUE_LEN: usize = 6000;

fn invalid(key: &str, reason: &str) -> Error {
    Error::InvalidKey {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

/// Check a param, metric or tag key.
///
/// Keys are 1..=250 characters of alphanumerics, `_`, `-`, `.`, space and
/// `/`, must not start with `/` and must not contain `..`.
///
/// # Errors
///
/// Returns `Error::InvalidKey` describing the first violated rule.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(invalid(key, "key is empty"));
    }
    if key.chars().count() > MAX_KEY_LEN {
        return Err(invalid(key, "key exceeds 250 characters"));
    }
    if let Some(c) = key
        .chars()
        .find(|c| !(c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ' ' | '/')))
    {
        return Err(invalid(key, &format!("character '{c}' is not allowed")));
    }
    if key.starts_with('/') || key.contains("..") {
        return Err(invalid(key, "key must be a relative path without '..'"));
    }
    Ok(())
}

/// Check a param value's length.
///
/// # Errors
///
/// Returns `Error::InvalidParameter` if the value exceeds 6000 characters.
pub fn validate_param_value(key: &str, value: &str) -> Result<()> {
    if value.chars().count() > MAX_PARAM_VALUE_LEN {
        return Err(Error::InvalidParameter(format!(
            "value of param '{key}' exceeds {MAX_PARAM_VALUE_LEN} characters"
        )));
    }
    Ok(())
}

/// Normalise a path relative to a run's artifact root.
///
/// Backslashes become `/`, empty and `.` components are dropped. An empty
/// input yields the root (`""`).
///
/// # Errors
///
/// Returns `Error::InvalidArtifactPath` for absolute paths and `..`
/// components.
pub fn normalize_artifact_path(path: &str) -> Result<String> {
    let unified = path.replace('\\', "/");
    if unified.starts_with('/') || unified.get(1..2) == Some(":") {
        return Err(Error::InvalidArtifactPath(format!("{path} is absolute")));
    }
    let mut parts = Vec::new();
    for part in unified.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                return Err(Error::InvalidArtifactPath(format!(
                    "{path} escapes the artifact root"
                )))
            }
            other => parts.push(other),
        }
    }
    Ok(parts.join("/"))
}

/// Join a normalised directory and a file name.
#[must_use]
pub fn join_artifact_path(dir: &str, file_name: &str) -> String {
    if dir.is_empty() {
        file_name.to_string()
    } else {
        format!("{dir}/{file_name}")
    }
}
