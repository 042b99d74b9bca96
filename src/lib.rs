//! Control-plane worker library: discovers adapter/data-client classes in
//! a Studio project, dynamically loads and instantiates them through a
//! `python3` bridge process, and runs a fetch/transform/upload pipeline
//! over line-delimited JSON-RPC 2.0 on stdin/stdout.

pub mod config;
pub mod dispatcher;
pub mod env_file;
pub mod executor;
pub mod framing;
pub mod loader;
pub mod python_runtime;
pub mod reader;
pub mod watchdog;

pub use config::WorkerConfig;
pub use dispatcher::Dispatcher;
pub use executor::Executor;
pub use framing::Framing;
