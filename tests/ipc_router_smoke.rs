mod common;

use common::{str_at, temp_dir, Sidecar};
use serde_json::json;

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = temp_dir("classbook-router-smoke");
    let bundle_out = workspace.join("smoke-backup.zip");
    let mut sc = Sidecar::spawn();

    let health = sc.request_ok("health", json!({}));
    assert!(health.get("workspacePath").map(|v| v.is_null()).unwrap_or(false));
    assert_eq!(sc.request_err("classes.list", json!({ "teacherId": "t1" })), "no_workspace");

    sc.open_workspace(&workspace);
    let class_id = sc.seed_class();
    let student_id = sc.create_student(&class_id, "Luis");
    let evaluation_id = sc.create_evaluation(&class_id, "Examen 1", None);

    let calls = vec![
        ("teachers.list", json!({})),
        ("teachers.get", json!({ "teacherId": "t1" })),
        ("teachers.byEmail", json!({ "email": "ana@example.com" })),
        ("classes.list", json!({ "teacherId": "t1", "orderBy": "subjectName" })),
        ("classes.search", json!({ "term": "5to" })),
        ("classes.get", json!({ "classId": class_id })),
        ("students.list", json!({ "classId": class_id })),
        ("students.search", json!({ "term": "lu" })),
        ("students.byCode", json!({ "studentCode": "none" })),
        ("students.get", json!({ "studentId": student_id })),
        ("evaluations.list", json!({ "classId": class_id })),
        ("evaluations.search", json!({ "term": "exam" })),
        (
            "evaluations.forPeriod",
            json!({ "classId": class_id, "semester": "Primer Semestre" }),
        ),
        ("evaluations.get", json!({ "evaluationId": evaluation_id })),
        (
            "grades.set",
            json!({ "evaluationId": evaluation_id, "studentId": student_id, "grade": 17 }),
        ),
        ("grades.list", json!({ "evaluationId": evaluation_id })),
        (
            "grades.get",
            json!({ "evaluationId": evaluation_id, "studentId": student_id }),
        ),
        (
            "attendance.mark",
            json!({
                "studentId": student_id,
                "classId": class_id,
                "date": "2024-07-01",
                "status": "P",
            }),
        ),
        (
            "attendance.status",
            json!({ "studentId": student_id, "date": "2024-07-01" }),
        ),
        ("attendance.day", json!({ "classId": class_id, "date": "2024-07-01" })),
        ("attendance.history", json!({ "studentId": student_id })),
        ("attendance.months", json!({ "classId": class_id })),
        ("sync.pending", json!({ "table": "students" })),
        ("sync.counts", json!({})),
        (
            "stats.classAverage",
            json!({ "classId": class_id, "semester": "Primer Semestre" }),
        ),
        (
            "stats.topN",
            json!({ "classId": class_id, "semester": "Primer Semestre", "n": 3 }),
        ),
        ("stats.evaluation", json!({ "evaluationId": evaluation_id })),
        (
            "stats.studentTotal",
            json!({ "studentId": student_id, "semester": "Primer Semestre" }),
        ),
        (
            "stats.attendanceSummary",
            json!({ "classId": class_id, "month": "2024-07" }),
        ),
        ("changes.versions", json!({})),
        ("backup.export", json!({ "outPath": bundle_out.to_string_lossy() })),
    ];
    for (method, params) in calls {
        sc.request_ok(method, params);
    }
    assert!(bundle_out.is_file());

    let unknown = sc.request("nope.method", json!({}));
    assert_eq!(
        unknown
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str()),
        Some("not_implemented")
    );

    let closed = sc.request_ok("workspace.close", json!({}));
    assert_eq!(closed.get("closed").and_then(|v| v.as_bool()), Some(true));
    assert_eq!(sc.request_err("sync.counts", json!({})), "no_workspace");

    drop(sc);
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn malformed_lines_get_bad_json_and_the_loop_keeps_going() {
    use std::io::{BufRead, BufReader, Write};
    use std::process::{Command, Stdio};

    let mut child = Command::new(env!("CARGO_BIN_EXE_classbookd"))
        .arg("--config")
        .arg(temp_dir("classbook-badjson").join("absent.yaml"))
        .env_remove("CLASSBOOK_WORKSPACE")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn classbookd");
    let mut stdin = child.stdin.take().expect("stdin");
    let mut reader = BufReader::new(child.stdout.take().expect("stdout"));

    writeln!(stdin, "{{not json").expect("write");
    writeln!(stdin, "{}", json!({ "id": "h", "method": "health" })).expect("write");
    stdin.flush().expect("flush");

    let mut first = String::new();
    reader.read_line(&mut first).expect("read");
    let first: serde_json::Value = serde_json::from_str(first.trim()).expect("json");
    assert_eq!(first["error"]["code"], "bad_json");

    let mut second = String::new();
    reader.read_line(&mut second).expect("read");
    let second: serde_json::Value = serde_json::from_str(second.trim()).expect("json");
    assert_eq!(str_at(&second, "id"), "h");
    assert_eq!(second["ok"], true);

    let _ = child.kill();
    let _ = child.wait();
}

#[test]
fn command_line_flags_are_parsed() {
    let exe = env!("CARGO_BIN_EXE_classbookd");
    let version = std::process::Command::new(exe)
        .arg("--version")
        .output()
        .expect("run --version");
    assert!(version.status.success());
    assert!(String::from_utf8_lossy(&version.stdout).contains(env!("CARGO_PKG_VERSION")));

    let bogus = std::process::Command::new(exe)
        .arg("--no-such-flag")
        .output()
        .expect("run with unknown flag");
    assert!(!bogus.status.success());

    let config = temp_dir("classbook-flags").join("config.yaml");
    std::fs::write(&config, "log_filter: warn\n").expect("write config");
    let mut short = std::process::Command::new(exe)
        .arg("-c")
        .arg(&config)
        .env_remove("CLASSBOOK_WORKSPACE")
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .expect("spawn with -c");
    assert!(short.wait().expect("wait").success());
}

#[test]
fn full_row_edits_require_a_creation_date() {
    let workspace = temp_dir("classbook-creation-date");
    let mut sc = Sidecar::spawn();
    sc.open_workspace(&workspace);
    let class_id = sc.seed_class();
    let student_id = sc.create_student(&class_id, "Luis");

    let got = sc.request_ok("students.get", json!({ "studentId": student_id }));
    let created = got["student"]["creationDate"].clone();
    assert!(created.as_i64().unwrap_or(0) > 0);

    let mut edited = got["student"].clone();
    edited["firstName"] = json!("Luis Alberto");
    edited
        .as_object_mut()
        .expect("student object")
        .remove("creationDate");
    assert_eq!(
        sc.request_err("students.update", json!({ "student": edited.clone() })),
        "bad_params"
    );
    assert_eq!(
        sc.request_err("students.save", json!({ "student": edited })),
        "bad_params"
    );

    let after = sc.request_ok("students.get", json!({ "studentId": student_id }));
    assert_eq!(after["student"]["firstName"], "Luis");
    assert_eq!(after["student"]["creationDate"], created);

    drop(sc);
    let _ = std::fs::remove_dir_all(workspace);
}
