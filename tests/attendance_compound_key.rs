mod common;

use common::{len_at, temp_dir, Sidecar};
use serde_json::json;

#[test]
fn marking_the_same_day_twice_replaces_the_row() {
    let workspace = temp_dir("classbook-attendance");
    let mut sc = Sidecar::spawn();
    sc.open_workspace(&workspace);
    let class_id = sc.seed_class();
    let student_id = sc.create_student(&class_id, "Luis");

    let key = json!({ "studentId": student_id, "classId": class_id, "date": "2024-07-01" });
    let mut first = key.clone();
    first["status"] = json!("P");
    let mut second = key.clone();
    second["status"] = json!("justified");

    sc.request_ok("attendance.mark", first.clone());
    sc.request_ok("attendance.mark", second);

    let day = sc.request_ok(
        "attendance.day",
        json!({ "classId": class_id, "date": 1_719_792_000_000_i64 }),
    );
    assert_eq!(len_at(&day, "attendance"), 1);
    assert_eq!(day["attendance"][0]["status"], "justified");
    assert_eq!(day["attendance"][0]["date"], 1_719_792_000_000_i64);

    let status = sc.request_ok(
        "attendance.status",
        json!({ "studentId": student_id, "classId": class_id, "date": "2024-07-01" }),
    );
    assert_eq!(status["status"], "J");

    assert_eq!(
        sc.request_err("attendance.insert", first),
        "constraint_violation"
    );
    assert_eq!(
        sc.request_err(
            "attendance.mark",
            json!({
                "studentId": student_id,
                "classId": class_id,
                "date": "2024-07-02",
                "status": "late",
            }),
        ),
        "bad_params"
    );
    assert_eq!(
        sc.request_err(
            "attendance.mark",
            json!({
                "studentId": student_id,
                "classId": class_id,
                "date": "07/02/2024",
                "status": "P",
            }),
        ),
        "bad_params"
    );

    drop(sc);
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn stamps_within_one_day_share_a_row() {
    let workspace = temp_dir("classbook-attendance-stamps");
    let mut sc = Sidecar::spawn();
    sc.open_workspace(&workspace);
    let class_id = sc.seed_class();
    let student_id = sc.create_student(&class_id, "Luis");

    let midnight = 1_719_792_000_000_i64;
    let nine_am = midnight + 9 * 3_600_000;
    sc.request_ok(
        "attendance.mark",
        json!({ "studentId": student_id, "classId": class_id, "date": midnight, "status": "P" }),
    );
    let marked = sc.request_ok(
        "attendance.mark",
        json!({ "studentId": student_id, "classId": class_id, "date": nine_am, "status": "A" }),
    );
    assert_eq!(marked["attendance"]["date"], midnight);

    let history = sc.request_ok("attendance.history", json!({ "studentId": student_id }));
    assert_eq!(len_at(&history, "attendance"), 1);
    let day = sc.request_ok(
        "attendance.day",
        json!({ "classId": class_id, "date": "2024-07-01" }),
    );
    assert_eq!(len_at(&day, "attendance"), 1);
    assert_eq!(day["attendance"][0]["status"], "absent");
    let status = sc.request_ok(
        "attendance.status",
        json!({ "studentId": student_id, "date": nine_am + 3_600_000 }),
    );
    assert_eq!(status["status"], "A");

    let summary = sc.request_ok(
        "stats.attendanceSummary",
        json!({ "classId": class_id, "month": "2024-07" }),
    );
    assert_eq!(summary["students"][0]["present"], 0);
    assert_eq!(summary["students"][0]["absent"], 1);

    // Rows pulled from the remote side are not rounded; an off-day stamp is refused.
    let remote = json!({
        "studentId": student_id,
        "classId": class_id,
        "date": nine_am,
        "status": "J",
        "lastModified": 5,
    });
    assert_eq!(
        sc.request_err("sync.applyRemote", json!({ "table": "attendance", "row": remote })),
        "bad_params"
    );

    drop(sc);
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn months_and_history_come_back_newest_first() {
    let workspace = temp_dir("classbook-attendance-months");
    let mut sc = Sidecar::spawn();
    sc.open_workspace(&workspace);
    let class_id = sc.seed_class();
    let student_id = sc.create_student(&class_id, "Eva");

    for (date, status) in [("2024-05-31", "A"), ("2024-07-01", "P"), ("2024-06-10", "P")] {
        sc.request_ok(
            "attendance.mark",
            json!({ "studentId": student_id, "classId": class_id, "date": date, "status": status }),
        );
    }

    let months = sc.request_ok("attendance.months", json!({ "classId": class_id }));
    assert_eq!(months["months"], json!(["2024-07", "2024-06", "2024-05"]));
    let by_student = sc.request_ok("attendance.months", json!({ "studentId": student_id }));
    assert_eq!(by_student["months"], months["months"]);
    assert_eq!(
        sc.request_err("attendance.months", json!({})),
        "bad_params"
    );

    let history = sc.request_ok("attendance.history", json!({ "studentId": student_id }));
    assert_eq!(len_at(&history, "attendance"), 3);
    assert_eq!(history["attendance"][0]["status"], "present");
    assert_eq!(history["attendance"][2]["status"], "absent");

    let summary = sc.request_ok(
        "stats.attendanceSummary",
        json!({ "classId": class_id, "month": "2024-06" }),
    );
    assert_eq!(summary["students"][0]["present"], 1);
    assert_eq!(summary["students"][0]["absent"], 0);

    drop(sc);
    let _ = std::fs::remove_dir_all(workspace);
}
