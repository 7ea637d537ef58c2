use crate::ipc::helpers::{
    delete_row, get_optional_str, get_required_str, get_required_text, get_row, rows_json,
    save_row, to_json, update_row, with_store, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::models::Class;
use crate::queries::ClassOrder;
use crate::store::Store;
use serde_json::json;

fn classes_list(
    store: &Store,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let teacher_id = get_required_str(params, "teacherId")?;
    let order = match get_optional_str(params, "orderBy")?.as_deref() {
        None | Some("className") => ClassOrder::ClassName,
        Some("subjectName") => ClassOrder::SubjectName,
        Some(other) => {
            return Err(HandlerErr::bad_params(format!(
                "orderBy must be className or subjectName, got {}",
                other
            )))
        }
    };
    rows_json("classes", &store.classes_for_teacher(&teacher_id, order)?)
}

fn classes_search(
    store: &Store,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let term = get_required_str(params, "term")?;
    rows_json("classes", &store.search_classes(term.trim())?)
}

fn classes_get(store: &Store, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    get_row::<Class>(store, &class_id, "class")
}

fn classes_create(
    store: &Store,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let teacher_id = get_required_str(params, "teacherId")?;
    let class_name = get_required_text(params, "className")?;
    let subject_name = get_required_text(params, "subjectName")?;

    let mut class = Class::new(&teacher_id, &class_name, &subject_name, store.clock().now_millis());
    store.save(&mut class)?;
    Ok(json!({ "classId": class.class_id, "class": to_json(&class)? }))
}

fn classes_delete(
    store: &Store,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    delete_row::<Class>(store, &class_id)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "classes.list" => Some(with_store(state, req, classes_list)),
        "classes.search" => Some(with_store(state, req, classes_search)),
        "classes.get" => Some(with_store(state, req, classes_get)),
        "classes.create" => Some(with_store(state, req, classes_create)),
        "classes.save" => Some(with_store(state, req, |s, p| save_row::<Class>(s, p, "class"))),
        "classes.update" => Some(with_store(state, req, |s, p| update_row::<Class>(s, p, "class"))),
        "classes.delete" => Some(with_store(state, req, classes_delete)),
        _ => None,
    }
}
