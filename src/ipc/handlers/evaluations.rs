use crate::ipc::helpers::{
    delete_row, get_day, get_optional_str, get_required_f64, get_required_str, get_required_text,
    get_row, rows_json, save_row, to_json, update_row, with_store, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::models::Evaluation;
use crate::store::Store;
use serde_json::json;

fn evaluations_list(
    store: &Store,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    rows_json("evaluations", &store.evaluations_for_class(&class_id)?)
}

fn evaluations_search(
    store: &Store,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let term = get_required_str(params, "term")?;
    rows_json("evaluations", &store.search_evaluations(term.trim())?)
}

fn evaluations_for_period(
    store: &Store,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    let semester = get_required_str(params, "semester")?;
    let parcial = get_optional_str(params, "parcial")?;
    rows_json(
        "evaluations",
        &store.evaluations_for_period(&class_id, &semester, parcial.as_deref())?,
    )
}

fn evaluations_get(
    store: &Store,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let evaluation_id = get_required_str(params, "evaluationId")?;
    get_row::<Evaluation>(store, &evaluation_id, "evaluation")
}

fn evaluations_create(
    store: &Store,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    let name = get_required_text(params, "name")?;
    let semester = get_required_text(params, "semester")?;
    let max_score = get_required_f64(params, "maxScore")?;
    if !max_score.is_finite() || max_score < 0.0 {
        return Err(HandlerErr {
            code: "bad_params",
            message: "maxScore must be a non-negative number".to_string(),
            details: Some(json!({ "maxScore": max_score })),
        });
    }
    let due_date = get_day(params, "dueDate")?;
    let description = get_optional_str(params, "description")?;
    let parcial = get_optional_str(params, "parcial")?;
    let document_ref = get_optional_str(params, "documentRef")?;

    let mut evaluation = Evaluation::new(
        &class_id,
        &name,
        description.as_deref(),
        max_score,
        due_date,
        &semester,
        parcial.as_deref(),
        store.clock().now_millis(),
    );
    evaluation.document_ref = document_ref;
    store.save(&mut evaluation)?;
    Ok(json!({
        "evaluationId": evaluation.evaluation_id,
        "evaluation": to_json(&evaluation)?
    }))
}

fn evaluations_delete(
    store: &Store,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let evaluation_id = get_required_str(params, "evaluationId")?;
    delete_row::<Evaluation>(store, &evaluation_id)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "evaluations.list" => Some(with_store(state, req, evaluations_list)),
        "evaluations.search" => Some(with_store(state, req, evaluations_search)),
        "evaluations.forPeriod" => Some(with_store(state, req, evaluations_for_period)),
        "evaluations.get" => Some(with_store(state, req, evaluations_get)),
        "evaluations.create" => Some(with_store(state, req, evaluations_create)),
        "evaluations.save" => Some(with_store(state, req, |s, p| {
            save_row::<Evaluation>(s, p, "evaluation")
        })),
        "evaluations.update" => Some(with_store(state, req, |s, p| {
            update_row::<Evaluation>(s, p, "evaluation")
        })),
        "evaluations.delete" => Some(with_store(state, req, evaluations_delete)),
        _ => None,
    }
}
