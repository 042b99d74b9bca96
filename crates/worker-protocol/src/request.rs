//! JSON-RPC 2.0 request envelope.

use serde::{Deserialize, Serialize};

/// A single request read from the host over stdin.
///
/// `id` is `serde_json::Value` rather than a fixed type because JSON-RPC
/// allows string or number ids and we must echo whatever the host sent
/// verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    #[serde(default)]
    pub params: Option<serde_json::Value>,
}

impl RpcRequest {
    /// Known method names accepted by the dispatcher.
    pub fn is_known_method(&self) -> bool {
        matches!(
            self.method.as_str(),
            "initialize"
                | "discover"
                | "execute"
                | "pause"
                | "resume"
                | "step"
                | "abort"
                | "shutdown"
        )
    }
}
