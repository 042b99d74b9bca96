//! The executor: one live `execute()` per worker process, running
//! fetch → transform → upload in a background thread while the
//! Dispatcher's main loop stays free to answer `pause`/`resume`/`step`/
//! `abort`/`status`-style calls.

pub mod control;
pub mod fetch;
pub mod mock_data;
pub mod transform;
pub mod upload;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;
use worker_discovery::{ClassRecord, ProjectRecord};
use worker_protocol::Notification;

use crate::framing::Framing;
use crate::loader::Bridge;
use crate::python_runtime::PythonBridge;
use control::ExecutionControl;

/// Where a live execution currently sits in the control state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    Pending,
    Running,
    Paused,
    Completed,
    Aborted,
    Error,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ExecutionStats {
    pub total_records: usize,
    pub successful_records: usize,
    pub failed_records: usize,
}

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("an execution is already running")]
    AlreadyRunning,
    #[error("no execution is in progress")]
    NoActiveExecution,
    #[error("cannot {action} a terminal execution (state is {state:?})")]
    Terminal { action: &'static str, state: ExecutionState },
    #[error("step was requested but the execution is not running in step mode")]
    NotInStepMode,
    #[error("could not read mock data file {0:?}: {1}")]
    MockDataUnreadable(PathBuf, std::io::Error),
    #[error("mock data file {0:?} is not valid JSON: {1}")]
    MockDataInvalid(PathBuf, String),
    #[error("failed to start the python bridge process: {0}")]
    BridgeSpawn(std::io::Error),
    #[error("python bridge transport error: {0}")]
    Bridge(std::io::Error),
}

struct Inner {
    state: ExecutionState,
    execution_id: Option<String>,
    control: Option<Arc<ExecutionControl>>,
}

/// Everything the background execution thread needs that does not change
/// across a run, gathered once at construction time.
pub struct Executor {
    project: ProjectRecord,
    adapters: Vec<ClassRecord>,
    data_clients: Vec<ClassRecord>,
    python_executable: String,
    bridge_grace_period: Duration,
    upload_delay: Duration,
    heartbeat_threshold: Duration,
    sink: Arc<Framing>,
    inner: Arc<Mutex<Inner>>,
}

impl Executor {
    pub fn new(
        project: ProjectRecord,
        adapters: Vec<ClassRecord>,
        data_clients: Vec<ClassRecord>,
        python_executable: String,
        sink: Arc<Framing>,
    ) -> Self {
        Self {
            project,
            adapters,
            data_clients,
            python_executable,
            bridge_grace_period: Duration::from_secs(5),
            upload_delay: Duration::from_millis(100),
            heartbeat_threshold: Duration::from_millis(250),
            sink,
            inner: Arc::new(Mutex::new(Inner {
                state: ExecutionState::Pending,
                execution_id: None,
                control: None,
            })),
        }
    }

    pub fn adapters(&self) -> &[ClassRecord] {
        &self.adapters
    }

    pub fn project(&self) -> &ProjectRecord {
        &self.project
    }

    pub fn state(&self) -> ExecutionState {
        self.inner.lock().unwrap().state
    }

    /// Start a new execution. Returns the fresh `execution_id` immediately;
    /// the phases run on a background thread. An unknown `connector_name`
    /// is not rejected synchronously: the background thread still runs and
    /// emits exactly one `execution_complete(success=false)`, settling into
    /// `ExecutionState::Error`, matching the lifecycle a connector error
    /// discovered mid-run would produce.
    pub fn execute(
        &self,
        connector_name: &str,
        step_mode: bool,
        mock_data_path: Option<PathBuf>,
    ) -> Result<String, ExecutorError> {
        let mut guard = self.inner.lock().unwrap();
        if matches!(guard.state, ExecutionState::Running | ExecutionState::Paused) {
            return Err(ExecutorError::AlreadyRunning);
        }

        let adapter = self.adapters.iter().find(|a| a.class_name == connector_name).cloned();

        let execution_id = Uuid::new_v4().to_string();
        let control = Arc::new(ExecutionControl::new(step_mode));
        guard.state = ExecutionState::Running;
        guard.execution_id = Some(execution_id.clone());
        guard.control = Some(Arc::clone(&control));
        drop(guard);

        let inner = Arc::clone(&self.inner);
        let Some(adapter) = adapter else {
            let sink = Arc::clone(&self.sink);
            let connector_name = connector_name.to_string();
            let missing_id = execution_id.clone();
            thread::spawn(move || {
                log::warn!("connector '{connector_name}' not found in project");
                emit(&sink, Notification::execution_complete(&missing_id, false, 0, 0, 0, 0.0));
                inner.lock().unwrap().state = ExecutionState::Error;
            });
            return Ok(execution_id);
        };

        let run = RunContext {
            execution_id: execution_id.clone(),
            adapter,
            project: self.project.clone(),
            data_clients: self.data_clients.clone(),
            mock_data_path,
            python_executable: self.python_executable.clone(),
            bridge_grace_period: self.bridge_grace_period,
            upload_delay: self.upload_delay,
            heartbeat_threshold: self.heartbeat_threshold,
            sink: Arc::clone(&self.sink),
            control,
        };
        thread::spawn(move || {
            let final_state = run.execute();
            let mut guard = inner.lock().unwrap();
            guard.state = final_state;
        });

        Ok(execution_id)
    }

    pub fn pause(&self) -> Result<(), ExecutorError> {
        let guard = self.inner.lock().unwrap();
        match guard.state {
            ExecutionState::Running => {
                guard.control.as_ref().unwrap().pause.close();
                drop(guard);
                self.inner.lock().unwrap().state = ExecutionState::Paused;
                Ok(())
            }
            state => Err(ExecutorError::Terminal { action: "pause", state }),
        }
    }

    pub fn resume(&self) -> Result<(), ExecutorError> {
        let guard = self.inner.lock().unwrap();
        match guard.state {
            ExecutionState::Paused => {
                guard.control.as_ref().unwrap().pause.open();
                drop(guard);
                self.inner.lock().unwrap().state = ExecutionState::Running;
                Ok(())
            }
            state => Err(ExecutorError::Terminal { action: "resume", state }),
        }
    }

    pub fn step(&self) -> Result<(), ExecutorError> {
        let guard = self.inner.lock().unwrap();
        match guard.state {
            ExecutionState::Running => {
                let control = guard.control.as_ref().unwrap();
                if !control.step_mode {
                    return Err(ExecutorError::NotInStepMode);
                }
                control.step.permit_one();
                Ok(())
            }
            state => Err(ExecutorError::Terminal { action: "step", state }),
        }
    }

    pub fn abort(&self) -> Result<(), ExecutorError> {
        let guard = self.inner.lock().unwrap();
        match guard.state {
            ExecutionState::Running | ExecutionState::Paused => {
                guard.control.as_ref().unwrap().request_abort();
                Ok(())
            }
            ExecutionState::Pending => Err(ExecutorError::NoActiveExecution),
            state => Err(ExecutorError::Terminal { action: "abort", state }),
        }
    }
}

/// Immutable per-run context handed to the background thread; owns
/// everything the three phases need, including the sink they emit
/// events through.
struct RunContext {
    execution_id: String,
    adapter: ClassRecord,
    project: ProjectRecord,
    data_clients: Vec<ClassRecord>,
    mock_data_path: Option<PathBuf>,
    python_executable: String,
    bridge_grace_period: Duration,
    upload_delay: Duration,
    heartbeat_threshold: Duration,
    sink: Arc<Framing>,
    control: Arc<ExecutionControl>,
}

/// `record_id` event field: the record's own `id` if present, else a
/// positional fallback. Shared by fetch and transform, both of which
/// attach it to their per-record events.
pub(crate) fn record_id_for(record: &serde_json::Value, index: usize) -> String {
    record
        .get("id")
        .and_then(|v| v.as_str().map(String::from).or_else(|| Some(v.to_string())))
        .unwrap_or_else(|| format!("record_{index}"))
}

/// Write one notification to `sink`, logging (never panicking) on failure.
/// Shared by [`RunContext::emit`] and the connector-not-found path in
/// [`Executor::execute`], which has no `RunContext` to hang it off of.
fn emit(sink: &Framing, notification: Notification) {
    if let Err(e) = sink.emit(&notification) {
        log::warn!("failed to emit notification: {e}");
    }
}

impl RunContext {
    fn emit(&self, notification: Notification) {
        emit(&self.sink, notification);
    }

    fn spawn_bridge(&self) -> Result<PythonBridge, ExecutorError> {
        PythonBridge::spawn(&self.python_executable, self.bridge_grace_period).map_err(ExecutorError::BridgeSpawn)
    }

    /// Run fetch → transform → upload to completion, returning the final
    /// control-state. Every exit path (success, abort, connector/bridge
    /// error) emits exactly one `execution_complete`.
    fn execute(&self) -> ExecutionState {
        let start = Instant::now();
        let mut stats = ExecutionStats::default();

        let outcome = self.run_phases(&mut stats);

        let final_state = match outcome {
            Ok(()) if self.control.abort.is_set() => ExecutionState::Aborted,
            Ok(()) => ExecutionState::Completed,
            Err(ref e) => {
                log::warn!("execution {} failed: {e}", self.execution_id);
                ExecutionState::Error
            }
        };

        self.emit(Notification::execution_complete(
            &self.execution_id,
            final_state == ExecutionState::Completed,
            stats.total_records,
            stats.successful_records,
            stats.failed_records,
            start.elapsed().as_secs_f64() * 1000.0,
        ));

        final_state
    }

    fn run_phases(&self, stats: &mut ExecutionStats) -> Result<(), ExecutorError> {
        let mut bridge = self.spawn_bridge()?;
        let bridge: &mut dyn Bridge = &mut bridge;

        let records = fetch::run(self, bridge)?;
        stats.total_records = records.len();
        if self.control.abort.is_set() {
            return Ok(());
        }

        transform::run(self, bridge, &records, stats)?;
        if self.control.abort.is_set() {
            return Ok(());
        }

        upload::run(self, stats);
        Ok(())
    }
}
