use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;

use crate::error::StoreError;
use crate::ids::{day_floor, parse_day};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::models::{Record, Table};
use crate::store::Store;

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        Self {
            code: "bad_params",
            message: message.into(),
            details: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            code: "not_found",
            message: message.into(),
            details: None,
        }
    }
}

impl From<StoreError> for HandlerErr {
    fn from(e: StoreError) -> Self {
        let details = match &e {
            StoreError::ConstraintViolation { table, .. } => Some(json!({ "table": table })),
            _ => None,
        };
        Self {
            code: e.code(),
            message: e.to_string(),
            details,
        }
    }
}

/// Run `f` against the open store and wrap its result as a response.
pub fn with_store(
    state: &mut AppState,
    req: &Request,
    f: impl FnOnce(&Store, &serde_json::Value) -> Result<serde_json::Value, HandlerErr>,
) -> serde_json::Value {
    let Some(store) = state.store.get() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match f(&store, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn require_store(state: &AppState) -> Result<Arc<Store>, HandlerErr> {
    state.store.get().ok_or(HandlerErr {
        code: "no_workspace",
        message: "select a workspace first".to_string(),
        details: None,
    })
}

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

/// Required, trimmed and non-empty.
pub fn get_required_text(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    let v = get_required_str(params, key)?.trim().to_string();
    if v.is_empty() {
        return Err(HandlerErr::bad_params(format!("{} must not be empty", key)));
    }
    Ok(v)
}

/// Absent and `null` both read as `None`.
pub fn get_optional_str(
    params: &serde_json::Value,
    key: &str,
) -> Result<Option<String>, HandlerErr> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(HandlerErr::bad_params(format!("{} must be a string", key))),
    }
}

pub fn get_required_f64(params: &serde_json::Value, key: &str) -> Result<f64, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_f64())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn get_optional_i64(params: &serde_json::Value, key: &str) -> Result<Option<i64>, HandlerErr> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be an integer", key))),
    }
}

/// A day given either as `YYYY-MM-DD` or as epoch ms. Stamps inside a day
/// resolve to that day's UTC start.
pub fn get_day(params: &serde_json::Value, key: &str) -> Result<i64, HandlerErr> {
    match params.get(key) {
        Some(serde_json::Value::String(s)) => Ok(parse_day(s)?),
        Some(v) if v.is_i64() => v
            .as_i64()
            .map(day_floor)
            .ok_or_else(|| HandlerErr::bad_params(format!("{} is out of range", key))),
        _ => Err(HandlerErr::bad_params(format!(
            "missing {} (YYYY-MM-DD or epoch ms)",
            key
        ))),
    }
}

pub fn get_table(params: &serde_json::Value) -> Result<Table, HandlerErr> {
    let raw = get_required_str(params, "table")?;
    Table::parse(&raw).ok_or_else(|| HandlerErr {
        code: "bad_params",
        message: format!("unknown table: {}", raw),
        details: Some(json!({ "tables": Table::ALL })),
    })
}

pub fn parse_value<T: DeserializeOwned>(
    params: &serde_json::Value,
    key: &str,
) -> Result<T, HandlerErr> {
    let raw = params
        .get(key)
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))?;
    serde_json::from_value(raw.clone()).map_err(|e| HandlerErr {
        code: "bad_params",
        message: format!("invalid {}: {}", key, e),
        details: None,
    })
}

pub fn to_json<T: Serialize>(value: &T) -> Result<serde_json::Value, HandlerErr> {
    serde_json::to_value(value).map_err(|e| HandlerErr {
        code: "storage_unavailable",
        message: format!("failed to encode result: {}", e),
        details: None,
    })
}

/// Local edit of a full row: stamp, mark dirty, upsert.
pub fn save_row<E: Record + DeserializeOwned + Serialize>(
    store: &Store,
    params: &serde_json::Value,
    key: &str,
) -> Result<serde_json::Value, HandlerErr> {
    let mut row: E = parse_value(params, key)?;
    store.save(&mut row)?;
    Ok(json!({ key: to_json(&row)? }))
}

/// Local edit of an existing row. Reports `updated: 0` when the key is absent.
pub fn update_row<E: Record + DeserializeOwned + Serialize>(
    store: &Store,
    params: &serde_json::Value,
    key: &str,
) -> Result<serde_json::Value, HandlerErr> {
    let mut row: E = parse_value(params, key)?;
    row.set_sync_state(store.clock().now_millis(), false);
    let updated = store.update(&row)?;
    Ok(json!({ "updated": updated, key: to_json(&row)? }))
}

pub fn get_row<E: Record + Serialize>(
    store: &Store,
    key: &E::Key,
    label: &str,
) -> Result<serde_json::Value, HandlerErr> {
    match store.get::<E>(key)? {
        Some(row) => Ok(json!({ label: to_json(&row)? })),
        None => Err(HandlerErr {
            code: "not_found",
            message: format!("{} not found", label),
            details: Some(json!({ "table": E::TABLE })),
        }),
    }
}

pub fn delete_row<E: Record>(store: &Store, key: &E::Key) -> Result<serde_json::Value, HandlerErr> {
    let deleted = store.delete_by_key::<E>(key)?;
    Ok(json!({ "deleted": deleted }))
}

pub fn rows_json<T: Serialize>(label: &str, rows: &[T]) -> Result<serde_json::Value, HandlerErr> {
    Ok(json!({ label: to_json(&rows)? }))
}
