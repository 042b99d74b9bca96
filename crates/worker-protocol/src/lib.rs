//! Wire protocol for the worker control plane.
//!
//! Defines the JSON-RPC 2.0 envelope exchanged with the host over
//! stdin/stdout, and the fixed set of notification payloads the executor
//! emits.

pub mod error;
pub mod notification;
pub mod request;
pub mod response;

pub use error::{ErrorCode, RpcError};
pub use notification::Notification;
pub use request::RpcRequest;
pub use response::RpcResponse;

/// JSON-RPC version string carried on every message.
pub const JSONRPC_VERSION: &str = "2.0";
