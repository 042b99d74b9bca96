//! The transform phase (§4.4): attempt a real adapter instance through
//! three strategies (no-args; `(name, data_client)`; `(name, mock)`),
//! falling back to simulation mode when none succeed.

use std::time::Instant;

use serde_json::Value;
use worker_protocol::notification::FieldMapping;
use worker_protocol::Notification;

use crate::loader::{self, Bridge, BridgeError, BridgeTarget};

use super::fetch::select_data_client;
use super::{record_id_for, ExecutionStats, ExecutorError, RunContext};

const DEFAULT_CONFIGURATION_NAME: &str = "studio_test";

pub fn run(
    ctx: &RunContext,
    bridge: &mut dyn Bridge,
    records: &[Value],
    stats: &mut ExecutionStats,
) -> Result<(), ExecutorError> {
    let mode = resolve_adapter(ctx, bridge)?;

    ctx.emit(Notification::phase_start("transform", records.len()));
    for (index, record) in records.iter().enumerate() {
        if !ctx.control.gate() {
            break;
        }

        let record_id = record_id_for(record, index);
        let start = Instant::now();
        match &mode {
            TransformMode::Simulation => {
                let output = simulate_transform(record);
                let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
                let mappings = detect_field_mappings(record, &output);
                ctx.emit(Notification::transform_complete(&record_id, index, record, &output, &mappings, duration_ms));
                stats.successful_records += 1;
            }
            TransformMode::Real => match bridge.call_transform(record) {
                Ok(output) => {
                    let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
                    let mappings = detect_field_mappings(record, &output);
                    ctx.emit(Notification::transform_complete(&record_id, index, record, &output, &mappings, duration_ms));
                    stats.successful_records += 1;
                }
                Err(BridgeError::UserCode(e)) => {
                    ctx.emit(Notification::transform_error(&record_id, index, record, &e.error_type, &e.message, &e.traceback));
                    stats.failed_records += 1;
                }
                Err(BridgeError::Transport(e)) => return Err(ExecutorError::Bridge(e)),
            },
        }

        if !ctx.control.step_wait() {
            break;
        }
    }

    let success = stats.failed_records == 0;
    ctx.emit(Notification::phase_complete(
        "transform",
        stats.successful_records + stats.failed_records,
        Some(success),
    ));
    Ok(())
}

enum TransformMode {
    Real,
    Simulation,
}

/// Strategy 1: no-args. Strategy 2: `(name, data_client)`. Strategy 3:
/// `(name, mock)`. The first that instantiates without raising wins;
/// otherwise transform runs in simulation mode.
fn resolve_adapter(ctx: &RunContext, bridge: &mut dyn Bridge) -> Result<TransformMode, ExecutorError> {
    bridge
        .load(&ctx.adapter, BridgeTarget::Adapter, &ctx.project.path)
        .map_err(ExecutorError::Bridge)?;
    if loader::instantiate(bridge).map_err(ExecutorError::Bridge)? {
        return Ok(TransformMode::Real);
    }
    log::debug!("adapter no-args instantiation failed, trying (name, data_client)");

    if let Some(client) = select_data_client(ctx) {
        let _ = bridge.load(client, BridgeTarget::DataClient, &ctx.project.path);
        let _ = loader::instantiate(bridge);
    }

    let name = bridge
        .adapter_configuration_name()
        .map_err(ExecutorError::Bridge)?
        .unwrap_or_else(|| DEFAULT_CONFIGURATION_NAME.to_string());

    match bridge.try_adapter_with_data_client(&name) {
        Ok(outcome) if outcome.is_success() => return Ok(TransformMode::Real),
        Ok(_) => log::debug!("adapter with data-client instantiation failed, trying mock client"),
        Err(BridgeError::Transport(e)) => return Err(ExecutorError::Bridge(e)),
        Err(BridgeError::UserCode(e)) => log::debug!("adapter with data-client raised {}: {}", e.error_type, e.message),
    }

    match bridge.try_adapter_with_mock_client(&name) {
        Ok(outcome) if outcome.is_success() => Ok(TransformMode::Real),
        Ok(_) => {
            log::debug!("adapter with mock client instantiation failed, falling back to simulation mode");
            Ok(TransformMode::Simulation)
        }
        Err(BridgeError::Transport(e)) => Err(ExecutorError::Bridge(e)),
        Err(BridgeError::UserCode(e)) => {
            log::debug!("adapter with mock client raised {}: {}", e.error_type, e.message);
            Ok(TransformMode::Simulation)
        }
    }
}

/// `{id, title, body, url, metadata}` mapping used when no adapter
/// instance could be constructed.
fn simulate_transform(record: &Value) -> Value {
    let empty = serde_json::Map::new();
    let obj = record.as_object().unwrap_or(&empty);

    let id = obj.get("id").cloned().unwrap_or(Value::Null);
    let title = obj.get("title").or_else(|| obj.get("name")).cloned().unwrap_or(Value::Null);
    let body = obj.get("body").or_else(|| obj.get("content")).cloned().unwrap_or(Value::Null);
    let url = obj.get("url").cloned().unwrap_or(Value::Null);

    let consumed = ["id", "title", "name", "body", "content", "url"];
    let mut metadata = serde_json::Map::new();
    for (key, value) in obj {
        if !consumed.contains(&key.as_str()) {
            metadata.insert(key.clone(), value.clone());
        }
    }

    serde_json::json!({ "id": id, "title": title, "body": body, "url": url, "metadata": metadata })
}

/// For every output top-level key and every nested `metadata.*` key, find
/// input keys whose value equals the output value and is non-null.
/// Duplicates are allowed.
fn detect_field_mappings(input: &Value, output: &Value) -> Vec<FieldMapping> {
    let mut mappings = Vec::new();
    let (Some(input_obj), Some(output_obj)) = (input.as_object(), output.as_object()) else {
        return mappings;
    };

    for (target_field, value) in output_obj {
        if target_field == "metadata" {
            if let Some(meta_obj) = value.as_object() {
                for (meta_key, meta_value) in meta_obj {
                    collect_matches(input_obj, meta_value, &format!("metadata.{meta_key}"), &mut mappings);
                }
            }
            continue;
        }
        collect_matches(input_obj, value, target_field, &mut mappings);
    }
    mappings
}

fn collect_matches(
    input_obj: &serde_json::Map<String, Value>,
    value: &Value,
    target_field: &str,
    mappings: &mut Vec<FieldMapping>,
) {
    if value.is_null() {
        return;
    }
    for (source_field, source_value) in input_obj {
        if source_value == value {
            mappings.push(FieldMapping {
                source_field: source_field.clone(),
                target_field: target_field.to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulation_mapping_prefers_title_over_name_and_body_over_content() {
        let record = serde_json::json!({"id": "1", "name": "fallback", "content": "c", "extra": "kept"});
        let output = simulate_transform(&record);
        assert_eq!(output["title"], "fallback");
        assert_eq!(output["body"], "c");
        assert_eq!(output["metadata"]["extra"], "kept");
        assert!(output["metadata"].as_object().unwrap().get("id").is_none());
    }

    #[test]
    fn field_mapping_detects_top_level_and_metadata_matches() {
        let input = serde_json::json!({"id": "1", "title": "t", "extra": "kept"});
        let output = serde_json::json!({"id": "1", "title": "t", "metadata": {"extra": "kept"}});
        let mappings = detect_field_mappings(&input, &output);
        assert_eq!(mappings.len(), 3);
        assert!(mappings.iter().any(|m| m.source_field == "extra" && m.target_field == "metadata.extra"));
    }

    #[test]
    fn non_matching_fields_produce_no_mappings() {
        let input = serde_json::json!({"id": "1"});
        let output = serde_json::json!({"id": "2"});
        assert!(detect_field_mappings(&input, &output).is_empty());
    }

    #[test]
    fn null_output_values_never_match() {
        let input = serde_json::json!({"id": null});
        let output = serde_json::json!({"id": null});
        assert!(detect_field_mappings(&input, &output).is_empty());
    }
}
