use crate::ipc::helpers::{get_table, parse_value, to_json, with_store, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::models::{Attendance, Class, Evaluation, Record, Student, StudentGrade, Table, Teacher};
use crate::store::Store;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;

/// Expand to a call of `$f::<E>(args)` for the entity type stored in `$table`.
macro_rules! for_table {
    ($table:expr, $f:ident($($arg:expr),*)) => {
        match $table {
            Table::Teachers => $f::<Teacher>($($arg),*),
            Table::Classes => $f::<Class>($($arg),*),
            Table::Students => $f::<Student>($($arg),*),
            Table::Evaluations => $f::<Evaluation>($($arg),*),
            Table::Attendance => $f::<Attendance>($($arg),*),
            Table::StudentGrades => $f::<StudentGrade>($($arg),*),
        }
    };
}

fn pending<E: Record + Serialize>(store: &Store) -> Result<serde_json::Value, HandlerErr> {
    let rows = store.pending_of::<E>()?;
    Ok(json!({ "table": E::TABLE, "rows": to_json(&rows)? }))
}

fn mark_synced<E: Record>(
    store: &Store,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr>
where
    E::Key: DeserializeOwned,
{
    let key: E::Key = parse_value(params, "key")?;
    let seen = params
        .get("lastModified")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| HandlerErr::bad_params("missing lastModified"))?;
    let synced = store.mark_synced::<E>(&key, seen)?;
    Ok(json!({ "synced": synced }))
}

fn apply_remote<E: Record + DeserializeOwned>(
    store: &Store,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let row: E = parse_value(params, "row")?;
    let outcome = store.apply_remote(&row)?;
    to_json(&outcome)
}

fn sync_pending(
    store: &Store,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    for_table!(get_table(params)?, pending(store))
}

fn sync_mark_synced(
    store: &Store,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    for_table!(get_table(params)?, mark_synced(store, params))
}

fn sync_apply_remote(
    store: &Store,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    for_table!(get_table(params)?, apply_remote(store, params))
}

fn sync_counts(
    store: &Store,
    _params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    Ok(json!({ "pending": to_json(&store.pending_counts()?)? }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "sync.pending" => Some(with_store(state, req, sync_pending)),
        "sync.markSynced" => Some(with_store(state, req, sync_mark_synced)),
        "sync.applyRemote" => Some(with_store(state, req, sync_apply_remote)),
        "sync.counts" => Some(with_store(state, req, sync_counts)),
        _ => None,
    }
}
