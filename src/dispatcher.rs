//! The main RPC loop (§4.5): reads framed requests, dispatches by
//! method, and owns the single [`Executor`] handle for the process's
//! lifetime.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use worker_protocol::{Notification, RpcError, RpcRequest, RpcResponse};

use crate::config::{Capabilities, WorkerConfig, SERVER_VERSION};
use crate::executor::{Executor, ExecutorError};
use crate::framing::Framing;
use crate::reader::{self, Dequeued, Line};
use crate::watchdog::RunningFlag;

pub struct Dispatcher {
    config: WorkerConfig,
    executor: Executor,
    sink: Arc<Framing>,
    running: Arc<RunningFlag>,
}

#[derive(Debug, Deserialize)]
struct ExecuteParams {
    connector: String,
    #[serde(default)]
    config: ExecuteConfig,
}

#[derive(Debug, Default, Deserialize)]
struct ExecuteConfig {
    #[serde(default)]
    step_mode: bool,
    #[serde(default)]
    mock_data_path: Option<PathBuf>,
}

impl Dispatcher {
    pub fn new(config: WorkerConfig, executor: Executor, sink: Arc<Framing>, running: Arc<RunningFlag>) -> Self {
        Self {
            config,
            executor,
            sink,
            running,
        }
    }

    /// Run the main loop to completion: read requests from `rx` until
    /// EOF, the channel disconnects, or the running flag is cleared
    /// (watchdog, signal, or a successful `shutdown`).
    pub fn run(&self, rx: std::sync::mpsc::Receiver<Line>) {
        loop {
            if !self.running.is_running() {
                log::debug!("running flag cleared, exiting main loop");
                return;
            }
            match reader::dequeue(&rx) {
                Dequeued::TimedOut => continue,
                Dequeued::Disconnected => return,
                Dequeued::Line(Line::Eof) => {
                    log::debug!("stdin closed, exiting main loop");
                    return;
                }
                Dequeued::Line(Line::Text(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    self.handle_line(&line);
                }
            }
        }
    }

    fn handle_line(&self, line: &str) {
        let request: RpcRequest = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(e) => {
                log::warn!("parse error: {e}");
                self.respond(RpcResponse::error(Value::Null, RpcError::parse_error(e.to_string())));
                return;
            }
        };

        if request.id.is_none() {
            log::warn!("request missing id: {}", request.method);
            self.respond(RpcResponse::error(Value::Null, RpcError::invalid_request("missing id")));
            return;
        }
        let id = request.id.clone().unwrap();

        if !request.is_known_method() {
            log::warn!("unknown method: {}", request.method);
            self.respond(RpcResponse::error(id, RpcError::method_not_found(&request.method)));
            return;
        }

        log::debug!("accepted request: method={} id={:?}", request.method, id);
        let response = match self.dispatch(&request.method, request.params) {
            Ok(result) => RpcResponse::success(id, result),
            Err(e) => {
                log::warn!("request failed: method={} error={}", request.method, e);
                RpcResponse::error(id, e)
            }
        };
        self.respond(response);
    }

    fn dispatch(&self, method: &str, params: Option<Value>) -> Result<Value, RpcError> {
        match method {
            "initialize" => self.handle_initialize(),
            "discover" => self.handle_discover(),
            "execute" => self.handle_execute(params),
            "pause" => self.handle_control(|e| e.pause()),
            "resume" => self.handle_control(|e| e.resume()),
            "step" => self.handle_control(|e| e.step()),
            "abort" => self.handle_control(|e| e.abort()),
            "shutdown" => self.handle_shutdown(),
            other => Err(RpcError::method_not_found(other)),
        }
    }

    fn handle_initialize(&self) -> Result<Value, RpcError> {
        Ok(serde_json::json!({
            "server_version": SERVER_VERSION,
            "project": self.executor.project(),
            "connectors": self.executor.adapters(),
            "capabilities": Capabilities::default(),
            "step_mode_default": self.config.default_step_mode,
        }))
    }

    fn handle_discover(&self) -> Result<Value, RpcError> {
        Ok(serde_json::json!({ "connectors": self.executor.adapters() }))
    }

    fn handle_execute(&self, params: Option<Value>) -> Result<Value, RpcError> {
        let params: ExecuteParams = params
            .ok_or_else(|| RpcError::invalid_params("execute requires params"))
            .and_then(|v| serde_json::from_value(v).map_err(|e| RpcError::invalid_params(e.to_string())))?;

        let execution_id = self
            .executor
            .execute(&params.connector, params.config.step_mode, params.config.mock_data_path)
            .map_err(executor_error_to_rpc)?;

        Ok(serde_json::json!({ "execution_id": execution_id, "status": "started" }))
    }

    fn handle_control(&self, op: impl FnOnce(&Executor) -> Result<(), ExecutorError>) -> Result<Value, RpcError> {
        op(&self.executor).map_err(executor_error_to_rpc)?;
        Ok(serde_json::json!({ "status": "ok", "state": self.executor.state() }))
    }

    fn handle_shutdown(&self) -> Result<Value, RpcError> {
        self.running.stop();
        Ok(serde_json::json!({ "status": "ok" }))
    }

    fn respond(&self, response: RpcResponse) {
        if let Err(e) = self.sink.emit(&response) {
            log::warn!("failed to write response: {e}");
        }
    }
}

fn executor_error_to_rpc(error: ExecutorError) -> RpcError {
    RpcError::execution_error(error.to_string())
}

/// Emitted once at startup in place of a JSON-RPC response, mirroring
/// the `log` notification shape used for pipeline events — useful for a
/// host attaching before the first request arrives.
pub fn log_startup(sink: &Framing, message: &str) {
    if let Err(e) = sink.emit(&Notification::log("info", message, Some("dispatcher"))) {
        log::warn!("failed to emit startup log: {e}");
    }
}
