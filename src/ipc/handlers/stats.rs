use crate::ipc::helpers::{
    get_optional_str, get_required_str, rows_json, to_json, with_store, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::store::Store;
use serde_json::json;

struct Period {
    semester: String,
    parcial: Option<String>,
}

fn period(params: &serde_json::Value) -> Result<Period, HandlerErr> {
    Ok(Period {
        semester: get_required_str(params, "semester")?,
        parcial: get_optional_str(params, "parcial")?,
    })
}

fn stats_class_average(
    store: &Store,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    let p = period(params)?;
    let average = store.class_average(&class_id, &p.semester, p.parcial.as_deref())?;
    Ok(json!({ "average": average }))
}

fn stats_top_n(store: &Store, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    let p = period(params)?;
    let n = match params.get("n") {
        None | Some(serde_json::Value::Null) => 3,
        Some(v) => v
            .as_u64()
            .ok_or_else(|| HandlerErr::bad_params("n must be a non-negative integer"))?
            as usize,
    };
    let ascending = params
        .get("ascending")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    let ranked = store.ranked_students(&class_id, &p.semester, p.parcial.as_deref(), n, ascending)?;
    rows_json("students", &ranked)
}

fn stats_evaluation(
    store: &Store,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let evaluation_id = get_required_str(params, "evaluationId")?;
    to_json(&store.evaluation_stats(&evaluation_id)?)
}

fn stats_student_total(
    store: &Store,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let p = period(params)?;
    let total = store.student_period_total(&student_id, &p.semester, p.parcial.as_deref())?;
    Ok(json!({ "total": total }))
}

fn stats_attendance_summary(
    store: &Store,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    let month = get_optional_str(params, "month")?;
    rows_json("students", &store.attendance_summary(&class_id, month.as_deref())?)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "stats.classAverage" => Some(with_store(state, req, stats_class_average)),
        "stats.topN" => Some(with_store(state, req, stats_top_n)),
        "stats.evaluation" => Some(with_store(state, req, stats_evaluation)),
        "stats.studentTotal" => Some(with_store(state, req, stats_student_total)),
        "stats.attendanceSummary" => Some(with_store(state, req, stats_attendance_summary)),
        _ => None,
    }
}
