mod common;

use common::{len_at, pending_count, temp_dir, Sidecar};
use serde_json::json;

#[test]
fn deleting_a_class_removes_its_students_evaluations_grades_and_attendance() {
    let workspace = temp_dir("classbook-cascade");
    let mut sc = Sidecar::spawn();
    sc.open_workspace(&workspace);

    let class_id = sc.seed_class();
    let other_class = sc.request_ok(
        "classes.create",
        json!({ "teacherId": "t1", "className": "6to B", "subjectName": "Historia" }),
    );
    let other_class_id = other_class["classId"].as_str().expect("classId").to_string();
    let survivor = sc.create_student(&other_class_id, "Marta");

    let students: Vec<String> = ["Luis", "Eva", "Juan"]
        .iter()
        .map(|n| sc.create_student(&class_id, n))
        .collect();
    let evaluations: Vec<String> = ["Tarea", "Examen"]
        .iter()
        .map(|n| sc.create_evaluation(&class_id, n, Some("Primer Parcial")))
        .collect();
    for s in &students {
        for e in &evaluations {
            sc.request_ok(
                "grades.set",
                json!({ "evaluationId": e, "studentId": s, "grade": 12.5 }),
            );
        }
        sc.request_ok(
            "attendance.mark",
            json!({ "studentId": s, "classId": class_id, "date": "2024-07-01", "status": "A" }),
        );
    }

    let before = sc.request_ok("sync.counts", json!({}));
    assert_eq!(pending_count(&before, "students"), 4);
    assert_eq!(pending_count(&before, "studentGrades"), 6);
    assert_eq!(pending_count(&before, "attendance"), 3);

    let deleted = sc.request_ok("classes.delete", json!({ "classId": class_id }));
    assert_eq!(deleted["deleted"], 1);

    let after = sc.request_ok("sync.counts", json!({}));
    assert_eq!(pending_count(&after, "classes"), 1);
    assert_eq!(pending_count(&after, "students"), 1);
    assert_eq!(pending_count(&after, "evaluations"), 0);
    assert_eq!(pending_count(&after, "studentGrades"), 0);
    assert_eq!(pending_count(&after, "attendance"), 0);

    let listed = sc.request_ok("students.list", json!({ "classId": class_id }));
    assert_eq!(len_at(&listed, "students"), 0);
    assert_eq!(
        sc.request_err("students.get", json!({ "studentId": students[0] })),
        "not_found"
    );
    sc.request_ok("students.get", json!({ "studentId": survivor }));

    let again = sc.request_ok("classes.delete", json!({ "classId": class_id }));
    assert_eq!(again["deleted"], 0);

    drop(sc);
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn writes_against_missing_parents_are_constraint_violations() {
    let workspace = temp_dir("classbook-fk");
    let mut sc = Sidecar::spawn();
    sc.open_workspace(&workspace);

    assert_eq!(
        sc.request_err(
            "classes.create",
            json!({ "teacherId": "ghost", "className": "X", "subjectName": "Y" }),
        ),
        "constraint_violation"
    );
    let class_id = sc.seed_class();
    assert_eq!(
        sc.request_err(
            "grades.set",
            json!({ "evaluationId": "missing", "studentId": "missing", "grade": 1 }),
        ),
        "constraint_violation"
    );
    assert_eq!(
        sc.request_err("students.create", json!({ "classId": class_id, "firstName": "  " })),
        "bad_params"
    );

    drop(sc);
    let _ = std::fs::remove_dir_all(workspace);
}
