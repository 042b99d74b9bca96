//! Data model for discovered classes and projects.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Which side of the adapter/data-client pairing a discovered class plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Adapter,
    DataClient,
}

/// A class found by static parsing of a project source file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassRecord {
    pub class_name: String,
    /// Project-relative dotted module path, e.g. `src.connectors.wiki`.
    pub module_path: String,
    /// Absolute path to the file the class was found in.
    pub file_path: PathBuf,
    /// The textual form of the single generic type argument, if any
    /// (e.g. `DocA` from `BaseConnector[DocA]`).
    pub source_type: Option<String>,
    /// Ordered leaf names of the declared base classes.
    pub base_classes: Vec<String>,
    /// Public (non-dunder) method names declared in the class body.
    pub methods: Vec<String>,
    pub docstring: Option<String>,
    pub category: Category,
    /// Class names of data-clients bound to this adapter (empty for
    /// data-clients themselves, and for adapters with no matching client).
    pub data_clients: Vec<String>,
}

/// Project-level metadata gathered at discovery time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub path: PathBuf,
    pub name: String,
    pub runtime_version: String,
    pub has_manifest: bool,
    pub has_mock_data: bool,
    pub mock_data_path: Option<PathBuf>,
}

/// Recognized mock data filenames, in lookup priority order.
pub const MOCK_DATA_FILENAMES: &[&str] = &["mock_data.json", "test_data.json", ".mock_data.json"];

/// The project manifest filename whose presence sets `has_manifest`.
pub const MANIFEST_FILENAME: &str = "pyproject.toml";
