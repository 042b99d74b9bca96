//! Static project discovery.
//!
//! Crawls a project tree, parses source files with a lightweight
//! line-oriented scanner (no real interpreter involved), and classifies
//! each discovered class as an adapter or a data-client, linking adapters
//! to the data-clients bound to their declared source type.

mod classify;
mod crawl;
mod manifest;
mod parser;
mod types;

pub use classify::{categorize_and_link, partition};
pub use crawl::discover_classes;
pub use manifest::discover_project;
pub use types::{Category, ClassRecord, ProjectRecord};

use std::path::Path;

/// Full discovery result: project metadata plus linked adapter records.
#[derive(Debug, Clone)]
pub struct DiscoveryResult {
    pub project: ProjectRecord,
    pub adapters: Vec<ClassRecord>,
}

/// Run full discovery against a project root: manifest scan, source crawl,
/// classification and linking. Never fails — a project with nothing in it
/// simply yields an empty adapter list.
pub fn discover(root: &Path, runtime_version: &str) -> DiscoveryResult {
    let project = discover_project(root, runtime_version);
    let all_classes = discover_classes(root);
    let adapters = categorize_and_link(all_classes);
    DiscoveryResult { project, adapters }
}
