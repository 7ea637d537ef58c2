//! Entity types and their table bindings.
//!
//! Every entity carries `last_modified` (epoch ms, set by the writer) and
//! `synced_to_cloud` (false while the row still has to be pushed). The
//! [`Record`] trait ties a type to its table, key columns and row codec so the
//! store and the sync queue can stay generic over the six tables.

use std::fmt;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, Value, ValueRef};
use rusqlite::Row;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};
use crate::ids::{day_floor, is_day_stamp, new_id};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Table {
    Teachers,
    Classes,
    Students,
    Evaluations,
    Attendance,
    StudentGrades,
}

impl Table {
    pub const ALL: [Table; 6] = [
        Table::Teachers,
        Table::Classes,
        Table::Students,
        Table::Evaluations,
        Table::Attendance,
        Table::StudentGrades,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Table::Teachers => "teachers",
            Table::Classes => "classes",
            Table::Students => "students",
            Table::Evaluations => "evaluations",
            Table::Attendance => "attendance",
            Table::StudentGrades => "student_grades",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// Tables whose rows can disappear when a row of `self` is deleted.
    pub fn cascades_to(self) -> &'static [Table] {
        match self {
            Table::Teachers => &[
                Table::Classes,
                Table::Students,
                Table::Evaluations,
                Table::Attendance,
                Table::StudentGrades,
            ],
            Table::Classes => &[
                Table::Students,
                Table::Evaluations,
                Table::Attendance,
                Table::StudentGrades,
            ],
            Table::Students => &[Table::Attendance, Table::StudentGrades],
            Table::Evaluations => &[Table::StudentGrades],
            Table::Attendance | Table::StudentGrades => &[],
        }
    }

    pub fn parse(raw: &str) -> Option<Table> {
        Table::ALL
            .into_iter()
            .find(|t| t.name() == raw || t.camel_name() == raw)
    }

    fn camel_name(self) -> &'static str {
        match self {
            Table::StudentGrades => "studentGrades",
            other => other.name(),
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Binds an entity type to its table.
pub trait Record: Clone + PartialEq + Send + Sized + 'static {
    type Key: Clone + fmt::Debug + Send;

    const TABLE: Table;
    /// Every column, in the order [`Record::values`] produces them.
    const COLUMNS: &'static [&'static str];
    const KEY_COLUMNS: &'static [&'static str];

    fn key(&self) -> Self::Key;
    fn key_values(key: &Self::Key) -> Vec<Value>;
    fn values(&self) -> Vec<Value>;
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;

    fn last_modified(&self) -> i64;
    fn synced_to_cloud(&self) -> bool;
    fn set_sync_state(&mut self, last_modified: i64, synced_to_cloud: bool);

    /// Row-level rules the schema cannot express. Runs before every write.
    fn check(&self) -> Result<()> {
        Ok(())
    }
}

fn opt_text(v: &Option<String>) -> Value {
    match v {
        Some(s) => Value::Text(s.clone()),
        None => Value::Null,
    }
}

fn flag(b: bool) -> Value {
    Value::Integer(b as i64)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Teacher {
    /// Matches the remote auth id.
    pub teacher_id: String,
    pub name: String,
    pub email: String,
    pub username: String,
    #[serde(default)]
    pub last_modified: i64,
    #[serde(default)]
    pub synced_to_cloud: bool,
}

impl Teacher {
    pub fn new(teacher_id: &str, name: &str, email: &str, username: &str, now: i64) -> Self {
        Self {
            teacher_id: teacher_id.to_string(),
            name: name.to_string(),
            email: email.to_string(),
            username: username.to_string(),
            last_modified: now,
            synced_to_cloud: false,
        }
    }
}

impl Record for Teacher {
    type Key = String;
    const TABLE: Table = Table::Teachers;
    const COLUMNS: &'static [&'static str] = &[
        "teacher_id",
        "name",
        "email",
        "username",
        "last_modified",
        "synced_to_cloud",
    ];
    const KEY_COLUMNS: &'static [&'static str] = &["teacher_id"];

    fn key(&self) -> String {
        self.teacher_id.clone()
    }

    fn key_values(key: &String) -> Vec<Value> {
        vec![Value::Text(key.clone())]
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.teacher_id.clone()),
            Value::Text(self.name.clone()),
            Value::Text(self.email.clone()),
            Value::Text(self.username.clone()),
            Value::Integer(self.last_modified),
            flag(self.synced_to_cloud),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            teacher_id: row.get("teacher_id")?,
            name: row.get("name")?,
            email: row.get("email")?,
            username: row.get("username")?,
            last_modified: row.get("last_modified")?,
            synced_to_cloud: row.get("synced_to_cloud")?,
        })
    }

    fn last_modified(&self) -> i64 {
        self.last_modified
    }

    fn synced_to_cloud(&self) -> bool {
        self.synced_to_cloud
    }

    fn set_sync_state(&mut self, last_modified: i64, synced_to_cloud: bool) {
        self.last_modified = last_modified;
        self.synced_to_cloud = synced_to_cloud;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Class {
    pub class_id: String,
    pub teacher_id: String,
    pub class_name: String,
    pub subject_name: String,
    pub creation_date: i64,
    #[serde(default)]
    pub last_modified: i64,
    #[serde(default)]
    pub synced_to_cloud: bool,
}

impl Class {
    pub fn new(teacher_id: &str, class_name: &str, subject_name: &str, now: i64) -> Self {
        Self {
            class_id: new_id(),
            teacher_id: teacher_id.to_string(),
            class_name: class_name.to_string(),
            subject_name: subject_name.to_string(),
            creation_date: now,
            last_modified: now,
            synced_to_cloud: false,
        }
    }
}

impl Record for Class {
    type Key = String;
    const TABLE: Table = Table::Classes;
    const COLUMNS: &'static [&'static str] = &[
        "class_id",
        "teacher_id",
        "class_name",
        "subject_name",
        "creation_date",
        "last_modified",
        "synced_to_cloud",
    ];
    const KEY_COLUMNS: &'static [&'static str] = &["class_id"];

    fn key(&self) -> String {
        self.class_id.clone()
    }

    fn key_values(key: &String) -> Vec<Value> {
        vec![Value::Text(key.clone())]
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.class_id.clone()),
            Value::Text(self.teacher_id.clone()),
            Value::Text(self.class_name.clone()),
            Value::Text(self.subject_name.clone()),
            Value::Integer(self.creation_date),
            Value::Integer(self.last_modified),
            flag(self.synced_to_cloud),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            class_id: row.get("class_id")?,
            teacher_id: row.get("teacher_id")?,
            class_name: row.get("class_name")?,
            subject_name: row.get("subject_name")?,
            creation_date: row.get("creation_date")?,
            last_modified: row.get("last_modified")?,
            synced_to_cloud: row.get("synced_to_cloud")?,
        })
    }

    fn last_modified(&self) -> i64 {
        self.last_modified
    }

    fn synced_to_cloud(&self) -> bool {
        self.synced_to_cloud
    }

    fn set_sync_state(&mut self, last_modified: i64, synced_to_cloud: bool) {
        self.last_modified = last_modified;
        self.synced_to_cloud = synced_to_cloud;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub student_id: String,
    pub class_id: String,
    /// Position on the class list, if the teacher numbers students.
    #[serde(default)]
    pub student_number: Option<i64>,
    pub first_name: String,
    #[serde(default)]
    pub student_code: Option<String>,
    pub creation_date: i64,
    #[serde(default)]
    pub last_modified: i64,
    #[serde(default)]
    pub synced_to_cloud: bool,
}

impl Student {
    pub fn new(
        class_id: &str,
        student_number: Option<i64>,
        first_name: &str,
        student_code: Option<&str>,
        now: i64,
    ) -> Self {
        Self {
            student_id: new_id(),
            class_id: class_id.to_string(),
            student_number,
            first_name: first_name.to_string(),
            student_code: student_code.map(str::to_string),
            creation_date: now,
            last_modified: now,
            synced_to_cloud: false,
        }
    }
}

impl Record for Student {
    type Key = String;
    const TABLE: Table = Table::Students;
    const COLUMNS: &'static [&'static str] = &[
        "student_id",
        "class_id",
        "student_number",
        "first_name",
        "student_code",
        "creation_date",
        "last_modified",
        "synced_to_cloud",
    ];
    const KEY_COLUMNS: &'static [&'static str] = &["student_id"];

    fn key(&self) -> String {
        self.student_id.clone()
    }

    fn key_values(key: &String) -> Vec<Value> {
        vec![Value::Text(key.clone())]
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.student_id.clone()),
            Value::Text(self.class_id.clone()),
            self.student_number.map(Value::Integer).unwrap_or(Value::Null),
            Value::Text(self.first_name.clone()),
            opt_text(&self.student_code),
            Value::Integer(self.creation_date),
            Value::Integer(self.last_modified),
            flag(self.synced_to_cloud),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            student_id: row.get("student_id")?,
            class_id: row.get("class_id")?,
            student_number: row.get("student_number")?,
            first_name: row.get("first_name")?,
            student_code: row.get("student_code")?,
            creation_date: row.get("creation_date")?,
            last_modified: row.get("last_modified")?,
            synced_to_cloud: row.get("synced_to_cloud")?,
        })
    }

    fn last_modified(&self) -> i64 {
        self.last_modified
    }

    fn synced_to_cloud(&self) -> bool {
        self.synced_to_cloud
    }

    fn set_sync_state(&mut self, last_modified: i64, synced_to_cloud: bool) {
        self.last_modified = last_modified;
        self.synced_to_cloud = synced_to_cloud;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    pub evaluation_id: String,
    pub class_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub max_score: f64,
    pub creation_date: i64,
    pub due_date: i64,
    /// e.g. "Primer Semestre".
    pub semester: String,
    /// Period inside the semester; none for semester-wide work.
    #[serde(default)]
    pub parcial: Option<String>,
    /// URL or path of an attached document; the file itself lives elsewhere.
    #[serde(default)]
    pub document_ref: Option<String>,
    #[serde(default)]
    pub last_modified: i64,
    #[serde(default)]
    pub synced_to_cloud: bool,
}

impl Evaluation {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        class_id: &str,
        name: &str,
        description: Option<&str>,
        max_score: f64,
        due_date: i64,
        semester: &str,
        parcial: Option<&str>,
        now: i64,
    ) -> Self {
        Self {
            evaluation_id: new_id(),
            class_id: class_id.to_string(),
            name: name.to_string(),
            description: description.map(str::to_string),
            max_score,
            creation_date: now,
            due_date,
            semester: semester.to_string(),
            parcial: parcial.map(str::to_string),
            document_ref: None,
            last_modified: now,
            synced_to_cloud: false,
        }
    }
}

impl Record for Evaluation {
    type Key = String;
    const TABLE: Table = Table::Evaluations;
    const COLUMNS: &'static [&'static str] = &[
        "evaluation_id",
        "class_id",
        "name",
        "description",
        "max_score",
        "creation_date",
        "due_date",
        "semester",
        "parcial",
        "document_ref",
        "last_modified",
        "synced_to_cloud",
    ];
    const KEY_COLUMNS: &'static [&'static str] = &["evaluation_id"];

    fn key(&self) -> String {
        self.evaluation_id.clone()
    }

    fn key_values(key: &String) -> Vec<Value> {
        vec![Value::Text(key.clone())]
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.evaluation_id.clone()),
            Value::Text(self.class_id.clone()),
            Value::Text(self.name.clone()),
            opt_text(&self.description),
            Value::Real(self.max_score),
            Value::Integer(self.creation_date),
            Value::Integer(self.due_date),
            Value::Text(self.semester.clone()),
            opt_text(&self.parcial),
            opt_text(&self.document_ref),
            Value::Integer(self.last_modified),
            flag(self.synced_to_cloud),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            evaluation_id: row.get("evaluation_id")?,
            class_id: row.get("class_id")?,
            name: row.get("name")?,
            description: row.get("description")?,
            max_score: row.get("max_score")?,
            creation_date: row.get("creation_date")?,
            due_date: row.get("due_date")?,
            semester: row.get("semester")?,
            parcial: row.get("parcial")?,
            document_ref: row.get("document_ref")?,
            last_modified: row.get("last_modified")?,
            synced_to_cloud: row.get("synced_to_cloud")?,
        })
    }

    fn last_modified(&self) -> i64 {
        self.last_modified
    }

    fn synced_to_cloud(&self) -> bool {
        self.synced_to_cloud
    }

    fn set_sync_state(&mut self, last_modified: i64, synced_to_cloud: bool) {
        self.last_modified = last_modified;
        self.synced_to_cloud = synced_to_cloud;
    }
}

/// Stored as the single-letter codes `P`, `A`, `J`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    #[serde(alias = "P")]
    Present,
    #[serde(alias = "A")]
    Absent,
    #[serde(alias = "J")]
    Justified,
}

impl AttendanceStatus {
    pub fn code(self) -> &'static str {
        match self {
            AttendanceStatus::Present => "P",
            AttendanceStatus::Absent => "A",
            AttendanceStatus::Justified => "J",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "P" => Some(AttendanceStatus::Present),
            "A" => Some(AttendanceStatus::Absent),
            "J" => Some(AttendanceStatus::Justified),
            _ => None,
        }
    }
}

impl ToSql for AttendanceStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.code()))
    }
}

impl FromSql for AttendanceStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let code = value.as_str()?;
        AttendanceStatus::from_code(code).ok_or_else(|| {
            FromSqlError::Other(format!("unknown attendance status {code:?}").into())
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceKey {
    pub student_id: String,
    pub class_id: String,
    pub date: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attendance {
    pub student_id: String,
    pub class_id: String,
    /// UTC midnight of the day, epoch ms.
    pub date: i64,
    pub status: AttendanceStatus,
    #[serde(default)]
    pub last_modified: i64,
    #[serde(default)]
    pub synced_to_cloud: bool,
}

impl Attendance {
    pub fn new(
        student_id: &str,
        class_id: &str,
        date: i64,
        status: AttendanceStatus,
        now: i64,
    ) -> Self {
        Self {
            student_id: student_id.to_string(),
            class_id: class_id.to_string(),
            date: day_floor(date),
            status,
            last_modified: now,
            synced_to_cloud: false,
        }
    }
}

impl Record for Attendance {
    type Key = AttendanceKey;
    const TABLE: Table = Table::Attendance;
    const COLUMNS: &'static [&'static str] = &[
        "student_id",
        "class_id",
        "date",
        "status",
        "last_modified",
        "synced_to_cloud",
    ];
    const KEY_COLUMNS: &'static [&'static str] = &["student_id", "class_id", "date"];

    fn key(&self) -> AttendanceKey {
        AttendanceKey {
            student_id: self.student_id.clone(),
            class_id: self.class_id.clone(),
            date: self.date,
        }
    }

    fn key_values(key: &AttendanceKey) -> Vec<Value> {
        vec![
            Value::Text(key.student_id.clone()),
            Value::Text(key.class_id.clone()),
            Value::Integer(key.date),
        ]
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.student_id.clone()),
            Value::Text(self.class_id.clone()),
            Value::Integer(self.date),
            Value::Text(self.status.code().to_string()),
            Value::Integer(self.last_modified),
            flag(self.synced_to_cloud),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            student_id: row.get("student_id")?,
            class_id: row.get("class_id")?,
            date: row.get("date")?,
            status: row.get("status")?,
            last_modified: row.get("last_modified")?,
            synced_to_cloud: row.get("synced_to_cloud")?,
        })
    }

    fn last_modified(&self) -> i64 {
        self.last_modified
    }

    fn synced_to_cloud(&self) -> bool {
        self.synced_to_cloud
    }

    fn set_sync_state(&mut self, last_modified: i64, synced_to_cloud: bool) {
        self.last_modified = last_modified;
        self.synced_to_cloud = synced_to_cloud;
    }

    /// One row per student, class and day: the date must be a UTC midnight.
    fn check(&self) -> Result<()> {
        if is_day_stamp(self.date) {
            Ok(())
        } else {
            Err(StoreError::InvalidInput(format!(
                "attendance date must be a UTC day start, got {}",
                self.date
            )))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeKey {
    pub evaluation_id: String,
    pub student_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentGrade {
    pub evaluation_id: String,
    pub student_id: String,
    pub grade: f64,
    #[serde(default)]
    pub observation: Option<String>,
    #[serde(default)]
    pub last_modified: i64,
    #[serde(default)]
    pub synced_to_cloud: bool,
}

impl StudentGrade {
    pub fn new(
        evaluation_id: &str,
        student_id: &str,
        grade: f64,
        observation: Option<&str>,
        now: i64,
    ) -> Self {
        Self {
            evaluation_id: evaluation_id.to_string(),
            student_id: student_id.to_string(),
            grade,
            observation: observation.map(str::to_string),
            last_modified: now,
            synced_to_cloud: false,
        }
    }
}

impl Record for StudentGrade {
    type Key = GradeKey;
    const TABLE: Table = Table::StudentGrades;
    const COLUMNS: &'static [&'static str] = &[
        "evaluation_id",
        "student_id",
        "grade",
        "observation",
        "last_modified",
        "synced_to_cloud",
    ];
    const KEY_COLUMNS: &'static [&'static str] = &["evaluation_id", "student_id"];

    fn key(&self) -> GradeKey {
        GradeKey {
            evaluation_id: self.evaluation_id.clone(),
            student_id: self.student_id.clone(),
        }
    }

    fn key_values(key: &GradeKey) -> Vec<Value> {
        vec![
            Value::Text(key.evaluation_id.clone()),
            Value::Text(key.student_id.clone()),
        ]
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.evaluation_id.clone()),
            Value::Text(self.student_id.clone()),
            Value::Real(self.grade),
            opt_text(&self.observation),
            Value::Integer(self.last_modified),
            flag(self.synced_to_cloud),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            evaluation_id: row.get("evaluation_id")?,
            student_id: row.get("student_id")?,
            grade: row.get("grade")?,
            observation: row.get("observation")?,
            last_modified: row.get("last_modified")?,
            synced_to_cloud: row.get("synced_to_cloud")?,
        })
    }

    fn last_modified(&self) -> i64 {
        self.last_modified
    }

    fn synced_to_cloud(&self) -> bool {
        self.synced_to_cloud
    }

    fn set_sync_state(&mut self, last_modified: i64, synced_to_cloud: bool) {
        self.last_modified = last_modified;
        self.synced_to_cloud = synced_to_cloud;
    }
}
