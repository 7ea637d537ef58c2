#![allow(dead_code)]

use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}-{}",
        prefix,
        std::process::id(),
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

pub struct Sidecar {
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
    next_id: u64,
}

impl Sidecar {
    /// Spawn the daemon with no config file and no workspace from the environment.
    pub fn spawn() -> Self {
        let exe = env!("CARGO_BIN_EXE_classbookd");
        let config = temp_dir("classbook-noconfig").join("absent.yaml");
        let mut child = Command::new(exe)
            .arg("--config")
            .arg(&config)
            .env_remove("CLASSBOOK_WORKSPACE")
            .env("CLASSBOOK_LOG", "warn")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn classbookd");
        let stdin = child.stdin.take().expect("child stdin");
        let stdout = child.stdout.take().expect("child stdout");
        Self {
            child,
            stdin,
            reader: BufReader::new(stdout),
            next_id: 0,
        }
    }

    pub fn request(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        self.next_id += 1;
        let id = self.next_id.to_string();
        let payload = json!({
            "id": id,
            "method": method,
            "params": params,
        });
        writeln!(self.stdin, "{}", payload).expect("write request");
        self.stdin.flush().expect("flush request");

        let mut line = String::new();
        self.reader.read_line(&mut line).expect("read response line");
        assert!(!line.trim().is_empty(), "empty response for {}", method);
        let value: serde_json::Value =
            serde_json::from_str(line.trim()).expect("parse response json");
        assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id.as_str()));
        value
    }

    pub fn request_ok(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        let value = self.request(method, params);
        assert_eq!(
            value.get("ok").and_then(|v| v.as_bool()),
            Some(true),
            "{} failed: {}",
            method,
            value
        );
        value.get("result").cloned().unwrap_or_default()
    }

    /// The error code of a request that is expected to fail.
    pub fn request_err(&mut self, method: &str, params: serde_json::Value) -> String {
        let value = self.request(method, params);
        assert_eq!(
            value.get("ok").and_then(|v| v.as_bool()),
            Some(false),
            "{} unexpectedly succeeded: {}",
            method,
            value
        );
        value
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string()
    }

    pub fn open_workspace(&mut self, path: &std::path::Path) {
        self.request_ok("workspace.select", json!({ "path": path.to_string_lossy() }));
    }

    /// Teacher `t1` plus one class; returns the class id.
    pub fn seed_class(&mut self) -> String {
        self.request_ok(
            "teachers.save",
            json!({ "teacher": {
                "teacherId": "t1",
                "name": "Ana Ruiz",
                "email": "ana@example.com",
                "username": "ana"
            }}),
        );
        let created = self.request_ok(
            "classes.create",
            json!({ "teacherId": "t1", "className": "5to A", "subjectName": "Matematicas" }),
        );
        str_at(&created, "classId")
    }

    pub fn create_student(&mut self, class_id: &str, first_name: &str) -> String {
        let created = self.request_ok(
            "students.create",
            json!({ "classId": class_id, "firstName": first_name }),
        );
        str_at(&created, "studentId")
    }

    pub fn create_evaluation(
        &mut self,
        class_id: &str,
        name: &str,
        parcial: Option<&str>,
    ) -> String {
        let created = self.request_ok(
            "evaluations.create",
            json!({
                "classId": class_id,
                "name": name,
                "maxScore": 20.0,
                "dueDate": "2024-07-15",
                "semester": "Primer Semestre",
                "parcial": parcial
            }),
        );
        str_at(&created, "evaluationId")
    }
}

impl Drop for Sidecar {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

pub fn str_at(value: &serde_json::Value, key: &str) -> String {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or_else(|| panic!("missing string {} in {}", key, value))
        .to_string()
}

pub fn len_at(value: &serde_json::Value, key: &str) -> usize {
    value
        .get(key)
        .and_then(|v| v.as_array())
        .map(|a| a.len())
        .unwrap_or_else(|| panic!("missing array {} in {}", key, value))
}

pub fn pending_count(counts: &serde_json::Value, table: &str) -> i64 {
    counts
        .get("pending")
        .and_then(|v| v.as_array())
        .and_then(|rows| {
            rows.iter()
                .find(|r| r.get("table").and_then(|t| t.as_str()) == Some(table))
        })
        .and_then(|r| r.get("count"))
        .and_then(|v| v.as_i64())
        .unwrap_or_else(|| panic!("no pending count for {} in {}", table, counts))
}
