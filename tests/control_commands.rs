//! Executor-level control state machine tests (pause/resume/step/abort),
//! using a step-mode execution so the background thread reliably blocks at
//! the first fetch iteration instead of racing real wall-clock work.

use std::fs;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use ingestor_worker::executor::{Executor, ExecutionState, ExecutorError};
use ingestor_worker::framing::Framing;
use tempfile::TempDir;
use worker_discovery::{ClassRecord, Category};

fn adapter_record(project_dir: &TempDir) -> ClassRecord {
    let path = project_dir.path().join("connector.py");
    fs::write(
        &path,
        "class Adapter:\n    def get_data(self):\n        return []\n\n    def transform(self, records):\n        return records\n",
    )
    .unwrap();
    ClassRecord {
        class_name: "Adapter".to_string(),
        module_path: "connector".to_string(),
        file_path: path,
        source_type: None,
        base_classes: Vec::new(),
        methods: vec!["get_data".to_string(), "transform".to_string()],
        docstring: None,
        category: Category::Adapter,
        data_clients: Vec::new(),
    }
}

fn wait_until<F: Fn() -> bool>(condition: F) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        thread::sleep(Duration::from_millis(20));
    }
    panic!("condition did not become true in time");
}

#[test]
fn commands_against_a_pending_executor_are_rejected() {
    let dir = TempDir::new().unwrap();
    let discovery = worker_discovery::discover(dir.path(), "1.0.0");
    let sink = Arc::new(Framing::stdout());
    let executor = Executor::new(discovery.project, discovery.adapters, Vec::new(), "python3".to_string(), sink);

    assert!(matches!(executor.abort(), Err(ExecutorError::NoActiveExecution)));
    assert!(matches!(executor.pause(), Err(ExecutorError::Terminal { state: ExecutionState::Pending, .. })));
    assert!(matches!(executor.resume(), Err(ExecutorError::Terminal { state: ExecutionState::Pending, .. })));
}

#[test]
fn execute_on_unknown_connector_still_reaches_error_via_execution_complete() {
    let dir = TempDir::new().unwrap();
    let discovery = worker_discovery::discover(dir.path(), "1.0.0");
    let sink = Arc::new(Framing::stdout());
    let executor = Executor::new(discovery.project, discovery.adapters, Vec::new(), "python3".to_string(), sink);

    let execution_id = executor.execute("DoesNotExist", false, None).unwrap();
    assert!(!execution_id.is_empty());
    wait_until(|| executor.state() == ExecutionState::Error);
}

#[test]
fn pause_resume_then_abort_during_step_mode_fetch_reaches_aborted() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("mock_data.json"), r#"[{"id": "1"}, {"id": "2"}]"#).unwrap();

    let adapter = adapter_record(&dir);
    let sink = Arc::new(Framing::stdout());
    let project = worker_discovery::discover(dir.path(), "1.0.0").project;
    let executor = Executor::new(project, vec![adapter], Vec::new(), "python3".to_string(), sink);

    executor.execute("Adapter", true, None).unwrap();
    wait_until(|| executor.state() == ExecutionState::Running);

    executor.pause().unwrap();
    assert_eq!(executor.state(), ExecutionState::Paused);

    executor.resume().unwrap();
    assert_eq!(executor.state(), ExecutionState::Running);

    // Still blocked on the step gate: step_mode requires an explicit permit
    // per record and none has been granted yet, so a direct abort is the
    // only way out.
    executor.abort().unwrap();
    wait_until(|| executor.state() == ExecutionState::Aborted);
}

#[test]
fn second_execute_while_running_is_rejected() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("mock_data.json"), r#"[{"id": "1"}]"#).unwrap();

    let adapter = adapter_record(&dir);
    let sink = Arc::new(Framing::stdout());
    let project = worker_discovery::discover(dir.path(), "1.0.0").project;
    let executor = Executor::new(project, vec![adapter], Vec::new(), "python3".to_string(), sink);

    executor.execute("Adapter", true, None).unwrap();
    wait_until(|| executor.state() == ExecutionState::Running);

    assert!(matches!(executor.execute("Adapter", true, None), Err(ExecutorError::AlreadyRunning)));

    executor.abort().unwrap();
    wait_until(|| executor.state() == ExecutionState::Aborted);
}
