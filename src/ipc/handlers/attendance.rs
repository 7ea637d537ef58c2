use crate::ipc::helpers::{
    delete_row, get_day, get_optional_str, get_required_str, rows_json, to_json, with_store,
    HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::models::{Attendance, AttendanceKey, AttendanceStatus};
use crate::store::Store;
use serde_json::json;

fn attendance_key(params: &serde_json::Value) -> Result<AttendanceKey, HandlerErr> {
    Ok(AttendanceKey {
        student_id: get_required_str(params, "studentId")?,
        class_id: get_required_str(params, "classId")?,
        date: get_day(params, "date")?,
    })
}

fn parse_status(params: &serde_json::Value) -> Result<AttendanceStatus, HandlerErr> {
    let raw = get_required_str(params, "status")?;
    let status = match raw.trim().to_ascii_lowercase().as_str() {
        "p" | "present" => AttendanceStatus::Present,
        "a" | "absent" => AttendanceStatus::Absent,
        "j" | "justified" => AttendanceStatus::Justified,
        _ => {
            return Err(HandlerErr {
                code: "bad_params",
                message: format!("unknown attendance status: {}", raw),
                details: Some(json!({ "allowed": ["P", "A", "J"] })),
            })
        }
    };
    Ok(status)
}

fn build_row(store: &Store, params: &serde_json::Value) -> Result<Attendance, HandlerErr> {
    let key = attendance_key(params)?;
    let status = parse_status(params)?;
    Ok(Attendance::new(
        &key.student_id,
        &key.class_id,
        key.date,
        status,
        store.clock().now_millis(),
    ))
}

/// Re-marking the same student, class and day replaces the earlier row.
fn attendance_mark(
    store: &Store,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let mut row = build_row(store, params)?;
    store.save(&mut row)?;
    Ok(json!({ "attendance": to_json(&row)? }))
}

/// Strict insert: an existing row for the key is a constraint violation.
fn attendance_insert(
    store: &Store,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let row = build_row(store, params)?;
    store.insert(&row)?;
    Ok(json!({ "attendance": to_json(&row)? }))
}

fn attendance_status(
    store: &Store,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let class_id = get_optional_str(params, "classId")?;
    let date = get_day(params, "date")?;
    let status = store.attendance_status(&student_id, class_id.as_deref(), date)?;
    Ok(json!({ "status": status.map(|s| s.code()) }))
}

fn attendance_day(
    store: &Store,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    let date = get_day(params, "date")?;
    rows_json("attendance", &store.attendance_for_class_day(&class_id, date)?)
}

fn attendance_history(
    store: &Store,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    rows_json("attendance", &store.attendance_history(&student_id)?)
}

fn attendance_months(
    store: &Store,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let months = match (
        get_optional_str(params, "classId")?,
        get_optional_str(params, "studentId")?,
    ) {
        (Some(class_id), None) => store.attendance_months_for_class(&class_id)?,
        (None, Some(student_id)) => store.attendance_months_for_student(&student_id)?,
        _ => {
            return Err(HandlerErr::bad_params(
                "pass exactly one of classId or studentId",
            ))
        }
    };
    Ok(json!({ "months": months }))
}

fn attendance_delete(
    store: &Store,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    delete_row::<Attendance>(store, &attendance_key(params)?)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attendance.mark" => Some(with_store(state, req, attendance_mark)),
        "attendance.insert" => Some(with_store(state, req, attendance_insert)),
        "attendance.status" => Some(with_store(state, req, attendance_status)),
        "attendance.day" => Some(with_store(state, req, attendance_day)),
        "attendance.history" => Some(with_store(state, req, attendance_history)),
        "attendance.months" => Some(with_store(state, req, attendance_months)),
        "attendance.delete" => Some(with_store(state, req, attendance_delete)),
        _ => None,
    }
}
