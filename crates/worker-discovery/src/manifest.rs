//! Project manifest and mock-data detection.

use std::path::Path;

use crate::types::{ProjectRecord, MANIFEST_FILENAME, MOCK_DATA_FILENAMES};

/// Gather project-level metadata: name, manifest presence, mock data.
pub fn discover_project(root: &Path, runtime_version: &str) -> ProjectRecord {
    let path = root.to_path_buf();
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let has_manifest = root.join(MANIFEST_FILENAME).is_file();

    let mut has_mock_data = false;
    let mut mock_data_path = None;
    for candidate in MOCK_DATA_FILENAMES {
        let full = root.join(candidate);
        if full.is_file() {
            has_mock_data = true;
            mock_data_path = Some(full);
            break;
        }
    }

    ProjectRecord {
        path,
        name,
        runtime_version: runtime_version.to_string(),
        has_manifest,
        has_mock_data,
        mock_data_path,
    }
}
