//! Mock-data resolution and normalization for the fetch phase (§4.4).

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use worker_discovery::ProjectRecord;

use crate::executor::ExecutorError;

/// Resolve which mock data file (if any) fetch should read: an explicit
/// path takes priority, then the project's own auto-discovered one.
pub fn resolve_mock_path(project: &ProjectRecord, explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        if path.is_file() {
            return Some(path.to_path_buf());
        }
    }
    project.mock_data_path.clone()
}

/// Load and normalize a mock data file into a flat list of records.
/// Acceptable shapes: a JSON array (used directly), an object with key
/// `records` (its value), or any other JSON value (wrapped into a
/// one-element list).
pub fn load_mock_records(path: &Path) -> Result<Vec<Value>, ExecutorError> {
    let text = fs::read_to_string(path).map_err(|e| ExecutorError::MockDataUnreadable(path.to_path_buf(), e))?;
    let value: Value = serde_json::from_str(&text)
        .map_err(|e| ExecutorError::MockDataInvalid(path.to_path_buf(), e.to_string()))?;
    Ok(normalize_shape(value))
}

fn normalize_shape(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Object(ref map) => match map.get("records") {
            Some(Value::Array(items)) => items.clone(),
            _ => vec![value],
        },
        other => vec![other],
    }
}
