use crate::ipc::helpers::{
    delete_row, get_optional_str, get_required_f64, get_required_str, get_row, rows_json,
    to_json, with_store, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::models::{GradeKey, StudentGrade};
use crate::store::Store;
use serde_json::json;

fn grade_key(params: &serde_json::Value) -> Result<GradeKey, HandlerErr> {
    Ok(GradeKey {
        evaluation_id: get_required_str(params, "evaluationId")?,
        student_id: get_required_str(params, "studentId")?,
    })
}

fn grades_list(store: &Store, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let evaluation_id = get_required_str(params, "evaluationId")?;
    rows_json("grades", &store.grades_for_evaluation(&evaluation_id)?)
}

fn grades_get(store: &Store, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    get_row::<StudentGrade>(store, &grade_key(params)?, "grade")
}

/// Record a grade; re-submitting for the same (evaluation, student) replaces it.
fn grades_set(store: &Store, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let key = grade_key(params)?;
    let grade = get_required_f64(params, "grade")?;
    if !grade.is_finite() {
        return Err(HandlerErr::bad_params("grade must be a finite number"));
    }
    let observation = get_optional_str(params, "observation")?;

    let mut row = StudentGrade::new(
        &key.evaluation_id,
        &key.student_id,
        grade,
        observation.as_deref(),
        store.clock().now_millis(),
    );
    store.save(&mut row)?;
    Ok(json!({ "grade": to_json(&row)? }))
}

fn grades_delete(
    store: &Store,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    delete_row::<StudentGrade>(store, &grade_key(params)?)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "grades.list" => Some(with_store(state, req, grades_list)),
        "grades.get" => Some(with_store(state, req, grades_get)),
        "grades.set" => Some(with_store(state, req, grades_set)),
        "grades.delete" => Some(with_store(state, req, grades_delete)),
        _ => None,
    }
}
