use crate::ipc::helpers::{
    delete_row, get_optional_i64, get_optional_str, get_required_str, get_required_text, get_row,
    rows_json, save_row, to_json, update_row, with_store, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::models::Student;
use crate::store::Store;
use serde_json::json;

fn students_list(
    store: &Store,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    rows_json("students", &store.students_for_class(&class_id)?)
}

fn students_search(
    store: &Store,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let term = get_required_str(params, "term")?;
    rows_json("students", &store.search_students(term.trim())?)
}

fn students_by_code(
    store: &Store,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let code = get_required_text(params, "studentCode")?;
    let student = store.student_by_code(&code)?;
    Ok(json!({ "student": to_json(&student)? }))
}

fn students_get(
    store: &Store,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    get_row::<Student>(store, &student_id, "student")
}

fn students_create(
    store: &Store,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    let first_name = get_required_text(params, "firstName")?;
    let student_number = get_optional_i64(params, "studentNumber")?;
    let student_code = get_optional_str(params, "studentCode")?
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());

    let mut student = Student::new(
        &class_id,
        student_number,
        &first_name,
        student_code.as_deref(),
        store.clock().now_millis(),
    );
    store.save(&mut student)?;
    Ok(json!({ "studentId": student.student_id, "student": to_json(&student)? }))
}

fn students_delete(
    store: &Store,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    delete_row::<Student>(store, &student_id)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(with_store(state, req, students_list)),
        "students.search" => Some(with_store(state, req, students_search)),
        "students.byCode" => Some(with_store(state, req, students_by_code)),
        "students.get" => Some(with_store(state, req, students_get)),
        "students.create" => Some(with_store(state, req, students_create)),
        "students.save" => Some(with_store(state, req, |s, p| {
            save_row::<Student>(s, p, "student")
        })),
        "students.update" => Some(with_store(state, req, |s, p| {
            update_row::<Student>(s, p, "student")
        })),
        "students.delete" => Some(with_store(state, req, students_delete)),
        _ => None,
    }
}
