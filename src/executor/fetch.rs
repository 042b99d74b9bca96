//! The fetch phase (§4.4): mock-driven when a mock file resolves, else a
//! real call through the adapter's linked data-client.

use serde_json::Value;
use worker_discovery::ClassRecord;
use worker_protocol::Notification;

use crate::loader::{self, Bridge, BridgeError, BridgeTarget};

use super::{mock_data, record_id_for, ExecutorError, RunContext};

pub fn run(ctx: &RunContext, bridge: &mut dyn Bridge) -> Result<Vec<Value>, ExecutorError> {
    let records = resolve_records(ctx, bridge)?;

    ctx.emit(Notification::phase_start("fetch", records.len()));
    let mut fetched = Vec::with_capacity(records.len());
    for (index, record) in records.into_iter().enumerate() {
        if !ctx.control.gate() {
            break;
        }
        let record_id = record_id_for(&record, index);
        ctx.emit(Notification::record_fetched(&record_id, index, record.clone()));
        fetched.push(record);
        if !ctx.control.step_wait() {
            break;
        }
    }
    ctx.emit(Notification::phase_complete("fetch", fetched.len(), None));

    Ok(fetched)
}

fn resolve_records(ctx: &RunContext, bridge: &mut dyn Bridge) -> Result<Vec<Value>, ExecutorError> {
    if let Some(path) = mock_data::resolve_mock_path(&ctx.project, ctx.mock_data_path.as_deref()) {
        return mock_data::load_mock_records(&path);
    }
    real_fetch(ctx, bridge)
}

/// Load and instantiate a data-client, preferring the ones the adapter
/// names, and call its data-producing operation. Absence of a usable
/// data-client is not an error — fetch simply yields no records.
fn real_fetch(ctx: &RunContext, bridge: &mut dyn Bridge) -> Result<Vec<Value>, ExecutorError> {
    let Some(client) = select_data_client(ctx) else {
        log::debug!("no data-client available for real fetch, yielding no records");
        return Ok(Vec::new());
    };

    bridge
        .load(client, BridgeTarget::DataClient, &ctx.project.path)
        .map_err(ExecutorError::Bridge)?;
    let instantiated = loader::instantiate(bridge).map_err(ExecutorError::Bridge)?;
    if !instantiated {
        log::debug!("data-client '{}' could not be instantiated", client.class_name);
        return Ok(Vec::new());
    }

    match bridge.call_data_client() {
        Ok(records) => Ok(records),
        Err(BridgeError::UserCode(e)) => {
            log::warn!("data-client '{}' raised {}: {}", client.class_name, e.error_type, e.message);
            Ok(Vec::new())
        }
        Err(BridgeError::Transport(e)) => Err(ExecutorError::Bridge(e)),
    }
}

/// Shared with the transform phase's `(name, data_client)` strategy.
pub(super) fn select_data_client(ctx: &RunContext) -> Option<&ClassRecord> {
    ctx.adapter
        .data_clients
        .iter()
        .find_map(|name| ctx.data_clients.iter().find(|c| &c.class_name == name))
        .or_else(|| ctx.data_clients.first())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_id_prefers_the_id_field() {
        let record = serde_json::json!({"id": "abc", "title": "t"});
        assert_eq!(record_id_for(&record, 4), "abc");
    }

    #[test]
    fn record_id_falls_back_to_positional_name() {
        let record = serde_json::json!({"title": "t"});
        assert_eq!(record_id_for(&record, 4), "record_4");
    }

    #[test]
    fn select_data_client_prefers_adapters_named_list() {
        let named = ClassRecord {
            class_name: "NamedClient".to_string(),
            module_path: "named".to_string(),
            file_path: "named.py".into(),
            source_type: None,
            base_classes: Vec::new(),
            methods: Vec::new(),
            docstring: None,
            category: worker_discovery::Category::DataClient,
            data_clients: Vec::new(),
        };
        let other = ClassRecord {
            class_name: "OtherClient".to_string(),
            ..named.clone()
        };
        let adapter = ClassRecord {
            class_name: "Adapter".to_string(),
            module_path: "adapter".to_string(),
            file_path: "adapter.py".into(),
            source_type: None,
            base_classes: Vec::new(),
            methods: Vec::new(),
            docstring: None,
            category: worker_discovery::Category::Adapter,
            data_clients: vec!["NamedClient".to_string()],
        };
        let ctx_data_clients = vec![other, named];
        let selected = ctx_data_clients
            .iter()
            .find_map(|c| adapter.data_clients.iter().find(|n| *n == &c.class_name).map(|_| c))
            .unwrap();
        assert_eq!(selected.class_name, "NamedClient");
    }
}
