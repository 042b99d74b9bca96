//! Worker configuration gathered at startup (§4.5).

use std::path::PathBuf;

/// The `capabilities` block `initialize` reports: which control commands
/// this worker build actually implements.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct Capabilities {
    pub execute: bool,
    pub pause: bool,
    pub resume: bool,
    pub step: bool,
    pub abort: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            execute: true,
            pause: true,
            resume: true,
            step: true,
            abort: true,
        }
    }
}

/// Server identity string reported in `initialize`.
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Resolved startup configuration for one worker process.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub project_root: PathBuf,
    /// Whether newly started executions default to single-step mode
    /// when the `execute` request omits `step_mode`.
    pub default_step_mode: bool,
    /// Interpreter invoked to run the bootstrap bridge script.
    pub python_executable: String,
}

impl WorkerConfig {
    pub fn new(project_root: PathBuf) -> Self {
        Self {
            project_root,
            default_step_mode: false,
            python_executable: "python3".to_string(),
        }
    }
}
