//! JSON-RPC 2.0 notifications the executor emits (no `id`, no response).

use serde::{Deserialize, Serialize};

use crate::JSONRPC_VERSION;

/// A notification envelope: same shape as a request but with no `id`, so
/// the host knows not to send a response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub jsonrpc: String,
    pub method: String,
    pub params: serde_json::Value,
}

impl Notification {
    fn new(method: &str, params: serde_json::Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.to_string(),
            params,
        }
    }

    pub fn phase_start(phase: &str, total: usize) -> Self {
        Self::new(
            "phase_start",
            serde_json::json!({ "phase": phase, "total": total }),
        )
    }

    pub fn phase_complete(phase: &str, records_processed: usize, success: Option<bool>) -> Self {
        let mut params = serde_json::json!({
            "phase": phase,
            "records_processed": records_processed,
        });
        if let Some(success) = success {
            params["success"] = serde_json::Value::Bool(success);
        }
        Self::new("phase_complete", params)
    }

    pub fn record_fetched(record_id: &str, index: usize, data: serde_json::Value) -> Self {
        Self::new(
            "record_fetched",
            serde_json::json!({ "record_id": record_id, "index": index, "data": data }),
        )
    }

    pub fn transform_complete(
        record_id: &str,
        index: usize,
        input: &serde_json::Value,
        output: &serde_json::Value,
        field_mappings: &[FieldMapping],
        duration_ms: f64,
    ) -> Self {
        Self::new(
            "transform_complete",
            serde_json::json!({
                "record_id": record_id,
                "index": index,
                "input": input,
                "output": output,
                "field_mappings": field_mappings,
                "duration_ms": duration_ms,
            }),
        )
    }

    pub fn transform_error(
        record_id: &str,
        index: usize,
        input: &serde_json::Value,
        error_type: &str,
        error: &str,
        traceback: &str,
    ) -> Self {
        Self::new(
            "transform_error",
            serde_json::json!({
                "record_id": record_id,
                "index": index,
                "input": input,
                "error_type": error_type,
                "error": error,
                "traceback": traceback,
            }),
        )
    }

    pub fn log(level: &str, message: &str, source: Option<&str>) -> Self {
        Self::new(
            "log",
            serde_json::json!({ "level": level, "message": message, "source": source }),
        )
    }

    pub fn execution_complete(
        execution_id: &str,
        success: bool,
        total_records: usize,
        successful_records: usize,
        failed_records: usize,
        total_duration_ms: f64,
    ) -> Self {
        Self::new(
            "execution_complete",
            serde_json::json!({
                "execution_id": execution_id,
                "success": success,
                "total_records": total_records,
                "successful_records": successful_records,
                "failed_records": failed_records,
                "total_duration_ms": total_duration_ms,
            }),
        )
    }

    pub fn heartbeat(phase: &str, elapsed_seconds: f64) -> Self {
        Self::new(
            "heartbeat",
            serde_json::json!({ "phase": phase, "elapsed_seconds": elapsed_seconds }),
        )
    }
}

/// One detected `{source_field, target_field}` pair for a transformed
/// record (see the field-mapping detection rule).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldMapping {
    pub source_field: String,
    pub target_field: String,
}
