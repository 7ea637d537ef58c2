use crate::ipc::helpers::{with_store, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::store::Store;
use serde_json::json;

/// Per-table counters; a client polls and refreshes whatever moved.
fn changes_versions(
    store: &Store,
    _params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let mut versions = serde_json::Map::new();
    for (table, version) in store.versions() {
        versions.insert(table.name().to_string(), json!(version));
    }
    Ok(json!({ "versions": versions }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "changes.versions" => Some(with_store(state, req, changes_versions)),
        _ => None,
    }
}
