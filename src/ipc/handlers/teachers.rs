use crate::ipc::helpers::{
    delete_row, get_required_str, get_row, rows_json, save_row, to_json, update_row, with_store,
    HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::models::Teacher;
use crate::store::Store;
use serde_json::json;

fn teachers_list(
    store: &Store,
    _params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    rows_json("teachers", &store.teachers()?)
}

fn teachers_get(
    store: &Store,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let teacher_id = get_required_str(params, "teacherId")?;
    get_row::<Teacher>(store, &teacher_id, "teacher")
}

fn teachers_by_email(
    store: &Store,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let email = get_required_str(params, "email")?;
    let teacher = store.teacher_by_email(email.trim())?;
    Ok(json!({ "teacher": to_json(&teacher)? }))
}

fn teachers_delete(
    store: &Store,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let teacher_id = get_required_str(params, "teacherId")?;
    delete_row::<Teacher>(store, &teacher_id)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "teachers.list" => Some(with_store(state, req, teachers_list)),
        "teachers.get" => Some(with_store(state, req, teachers_get)),
        "teachers.byEmail" => Some(with_store(state, req, teachers_by_email)),
        // Teacher ids come from the remote auth service, so there is no create.
        "teachers.save" => Some(with_store(state, req, |s, p| {
            save_row::<Teacher>(s, p, "teacher")
        })),
        "teachers.update" => Some(with_store(state, req, |s, p| {
            update_row::<Teacher>(s, p, "teacher")
        })),
        "teachers.delete" => Some(with_store(state, req, teachers_delete)),
        _ => None,
    }
}
