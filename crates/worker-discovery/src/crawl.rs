//! Source tree crawl and the skip filter.

use std::collections::HashSet;
use std::path::Path;

use walkdir::WalkDir;

use crate::parser::parse_file;
use crate::types::ClassRecord;

/// Path substrings that disqualify a file from discovery regardless of
/// extension.
const SKIPPED_PATH_SUBSTRINGS: &[&str] = &[
    "__pycache__",
    ".venv",
    "venv",
    "node_modules",
    "site-packages",
    ".git",
];

/// Whether a `.py` file passes the skip filter (§4.2).
fn passes_skip_filter(path: &Path) -> bool {
    let path_str = path.to_string_lossy();
    if SKIPPED_PATH_SUBSTRINGS
        .iter()
        .any(|needle| path_str.contains(needle))
    {
        return false;
    }

    let file_name = match path.file_name().and_then(|n| n.to_str()) {
        Some(n) => n,
        None => return false,
    };

    if file_name.starts_with('_') {
        return false;
    }

    if file_name.to_lowercase().contains("test") {
        return false;
    }

    true
}

/// Crawl the canonical search roots (`<root>`, `<root>/src`,
/// `<root>/connectors`) for `.py` files, parse each that passes the skip
/// filter, and deduplicate by `(file_path, class_name)` — first seen wins.
///
/// Unparseable files are skipped silently; discovery never fails because of
/// one malformed source file.
pub fn discover_classes(root: &Path) -> Vec<ClassRecord> {
    let search_roots = [
        root.to_path_buf(),
        root.join("src"),
        root.join("connectors"),
    ];

    let mut seen: HashSet<(std::path::PathBuf, String)> = HashSet::new();
    let mut records = Vec::new();

    for search_root in &search_roots {
        if !search_root.is_dir() {
            continue;
        }

        for entry in WalkDir::new(search_root)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !entry.file_type().is_file() {
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some("py") {
                continue;
            }
            if !passes_skip_filter(path) {
                continue;
            }

            let found = match parse_file(path, root) {
                Ok(found) => found,
                Err(e) => {
                    log::debug!("skipping {}: {e}", path.display());
                    continue;
                }
            };

            for record in found {
                let key = (record.file_path.clone(), record.class_name.clone());
                if seen.insert(key) {
                    records.push(record);
                }
            }
        }
    }

    records
}
