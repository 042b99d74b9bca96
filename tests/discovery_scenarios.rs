//! End-to-end discovery scenarios against real temp-directory projects,
//! exercising the crawl -> parse -> classify -> link pipeline together
//! rather than any one stage in isolation.

use std::fs;

use tempfile::TempDir;
use worker_discovery::discover;

fn write(dir: &TempDir, rel_path: &str, content: &str) {
    let path = dir.path().join(rel_path);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

#[test]
fn empty_project_yields_no_adapters_and_no_manifest() {
    let dir = TempDir::new().unwrap();
    let result = discover(dir.path(), "1.0.0");

    assert!(result.adapters.is_empty());
    assert!(!result.project.has_manifest);
    assert!(!result.project.has_mock_data);
}

#[test]
fn two_adapters_one_shared_data_client_links_by_source_type() {
    let dir = TempDir::new().unwrap();
    write(&dir, "pyproject.toml", "[project]\nname = \"demo\"\n");
    write(
        &dir,
        "src/clients.py",
        "class WikiDataClient(BaseDataClient[DocA]):\n    def get_data(self):\n        pass\n",
    );
    write(
        &dir,
        "src/connectors.py",
        "class WikiConnector(BaseConnector[DocA]):\n    \"\"\"Wiki adapter.\"\"\"\n\n    def get_data(self):\n        pass\n\n    def transform(self, records):\n        pass\n\nclass NewsConnector(BaseConnector[DocB]):\n    def get_data(self):\n        pass\n",
    );
    write(
        &dir,
        "mock_data.json",
        r#"[{"id": "1", "title": "t"}]"#,
    );

    let result = discover(dir.path(), "1.0.0");

    assert!(result.project.has_manifest);
    assert!(result.project.has_mock_data);
    assert_eq!(result.adapters.len(), 2);

    let wiki = result
        .adapters
        .iter()
        .find(|a| a.class_name == "WikiConnector")
        .expect("WikiConnector discovered");
    assert_eq!(wiki.data_clients, vec!["WikiDataClient".to_string()]);
    assert_eq!(wiki.docstring.as_deref(), Some("Wiki adapter."));

    let news = result
        .adapters
        .iter()
        .find(|a| a.class_name == "NewsConnector")
        .expect("NewsConnector discovered");
    assert!(news.data_clients.is_empty());
}

#[test]
fn files_under_skipped_directories_are_never_discovered() {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        ".venv/lib/pkg/connector.py",
        "class VendoredConnector(BaseConnector[DocA]):\n    def get_data(self):\n        pass\n",
    );
    write(
        &dir,
        "src/test_connector.py",
        "class TestOnlyConnector(BaseConnector[DocA]):\n    def get_data(self):\n        pass\n",
    );

    let result = discover(dir.path(), "1.0.0");
    assert!(result.adapters.is_empty());
}

#[test]
fn partition_surfaces_unlinked_data_clients_for_the_real_fetch_path() {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "src/clients.py",
        "class OrphanDataClient(BaseDataClient[DocZ]):\n    def get_data(self):\n        pass\n",
    );

    let all = worker_discovery::discover_classes(dir.path());
    let (adapters, data_clients) = worker_discovery::partition(all);

    assert!(adapters.is_empty());
    assert_eq!(data_clients.len(), 1);
    assert_eq!(data_clients[0].class_name, "OrphanDataClient");
}
