//! Read-only aggregates over evaluations, grades and students.
//!
//! Everything is computed from committed rows on each call. Empty inputs
//! produce `None` or empty lists, never NaN and never an error.

use std::cmp::Ordering;

use chrono::NaiveDate;
use rusqlite::OptionalExtension;
use serde::Serialize;

use crate::error::{Result, StoreError};
use crate::models::{Record, Student};
use crate::store::Store;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationStats {
    pub count: usize,
    pub average: Option<f64>,
    pub max: Option<f64>,
    pub min: Option<f64>,
    pub median: Option<f64>,
    /// Average as a percentage of the evaluation's max score.
    pub average_percent: Option<f64>,
    pub top5: Vec<f64>,
    pub bottom3: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedStudent {
    pub student: Student,
    pub average: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceTally {
    pub student_id: String,
    pub first_name: String,
    pub present: i64,
    pub absent: i64,
    pub justified: i64,
}

/// Aggregate one evaluation's grades. `max_score <= 0` leaves the percentage out.
pub fn summarize_grades(grades: &[f64], max_score: f64) -> EvaluationStats {
    let mut sorted = grades.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let count = sorted.len();
    let average = if count > 0 {
        Some(sorted.iter().sum::<f64>() / count as f64)
    } else {
        None
    };
    let average_percent = match average {
        Some(avg) if max_score > 0.0 => Some(100.0 * avg / max_score),
        _ => None,
    };
    EvaluationStats {
        count,
        average,
        max: sorted.last().copied(),
        min: sorted.first().copied(),
        median: compute_median(&sorted),
        average_percent,
        top5: sorted.iter().rev().take(5).copied().collect(),
        bottom3: sorted.iter().take(3).copied().collect(),
    }
}

// Expects sorted input.
fn compute_median(sorted: &[f64]) -> Option<f64> {
    let n = sorted.len();
    if n == 0 {
        return None;
    }
    if n % 2 == 1 {
        Some(sorted[n / 2])
    } else {
        Some((sorted[(n / 2) - 1] + sorted[n / 2]) / 2.0)
    }
}

fn check_month(month: &str) -> Result<()> {
    NaiveDate::parse_from_str(&format!("{month}-01"), "%Y-%m-%d")
        .map(|_| ())
        .map_err(|_| StoreError::InvalidInput(format!("month must be YYYY-MM: {month}")))
}

impl Store {
    /// Mean of every grade in the class's evaluations for the period.
    /// `parcial: None` spans the whole semester.
    pub fn class_average(
        &self,
        class_id: &str,
        semester: &str,
        parcial: Option<&str>,
    ) -> Result<Option<f64>> {
        self.read(|conn| {
            let avg = conn.query_row(
                "SELECT AVG(sg.grade)
                 FROM student_grades sg
                 INNER JOIN evaluations e ON sg.evaluation_id = e.evaluation_id
                 WHERE e.class_id = ?1 AND e.semester = ?2 AND (?3 IS NULL OR e.parcial = ?3)",
                (class_id, semester, parcial),
                |r| r.get::<_, Option<f64>>(0),
            )?;
            Ok(avg)
        })
    }

    /// Students ranked by their own mean grade over the period, best first
    /// unless `ascending`. Ties go to the lower student id.
    pub fn ranked_students(
        &self,
        class_id: &str,
        semester: &str,
        parcial: Option<&str>,
        n: usize,
        ascending: bool,
    ) -> Result<Vec<RankedStudent>> {
        let direction = if ascending { "ASC" } else { "DESC" };
        let columns = Student::COLUMNS
            .iter()
            .map(|c| format!("s.{c} AS {c}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT {columns}, AVG(sg.grade) AS average_grade
             FROM students s
             INNER JOIN student_grades sg ON s.student_id = sg.student_id
             INNER JOIN evaluations e ON sg.evaluation_id = e.evaluation_id
             WHERE s.class_id = ?1 AND e.semester = ?2 AND (?3 IS NULL OR e.parcial = ?3)
             GROUP BY s.student_id
             ORDER BY average_grade {direction}, s.student_id ASC
             LIMIT ?4"
        );
        self.read(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map((class_id, semester, parcial, n as i64), |r| {
                    Ok(RankedStudent {
                        student: Student::from_row(r)?,
                        average: r.get("average_grade")?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    pub fn top_n(
        &self,
        class_id: &str,
        semester: &str,
        parcial: Option<&str>,
        n: usize,
        ascending: bool,
    ) -> Result<Vec<Student>> {
        Ok(self
            .ranked_students(class_id, semester, parcial, n, ascending)?
            .into_iter()
            .map(|r| r.student)
            .collect())
    }

    /// Aggregates over one evaluation's grades. An unknown evaluation reads as
    /// one with no grades.
    pub fn evaluation_stats(&self, evaluation_id: &str) -> Result<EvaluationStats> {
        self.read(|conn| {
            let max_score: f64 = conn
                .query_row(
                    "SELECT max_score FROM evaluations WHERE evaluation_id = ?1",
                    [evaluation_id],
                    |r| r.get(0),
                )
                .optional()?
                .unwrap_or(0.0);
            let mut stmt =
                conn.prepare("SELECT grade FROM student_grades WHERE evaluation_id = ?1")?;
            let grades = stmt
                .query_map([evaluation_id], |r| r.get::<_, f64>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(summarize_grades(&grades, max_score))
        })
    }

    /// Sum of a student's grades over the period's evaluations.
    pub fn student_period_total(
        &self,
        student_id: &str,
        semester: &str,
        parcial: Option<&str>,
    ) -> Result<Option<f64>> {
        self.read(|conn| {
            let total = conn.query_row(
                "SELECT SUM(sg.grade)
                 FROM student_grades sg
                 INNER JOIN evaluations e ON sg.evaluation_id = e.evaluation_id
                 WHERE sg.student_id = ?1 AND e.semester = ?2 AND (?3 IS NULL OR e.parcial = ?3)",
                (student_id, semester, parcial),
                |r| r.get::<_, Option<f64>>(0),
            )?;
            Ok(total)
        })
    }

    /// Present/absent/justified counts for every student of the class,
    /// optionally limited to one `YYYY-MM` month. Students with no rows get zeros.
    pub fn attendance_summary(
        &self,
        class_id: &str,
        month: Option<&str>,
    ) -> Result<Vec<AttendanceTally>> {
        if let Some(m) = month {
            check_month(m)?;
        }
        self.read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT s.student_id, s.first_name,
                        COALESCE(SUM(CASE WHEN a.status = 'P' THEN 1 ELSE 0 END), 0),
                        COALESCE(SUM(CASE WHEN a.status = 'A' THEN 1 ELSE 0 END), 0),
                        COALESCE(SUM(CASE WHEN a.status = 'J' THEN 1 ELSE 0 END), 0)
                 FROM students s
                 LEFT JOIN attendance a
                   ON a.student_id = s.student_id
                  AND a.class_id = s.class_id
                  AND (?2 IS NULL OR strftime('%Y-%m', a.date / 1000, 'unixepoch') = ?2)
                 WHERE s.class_id = ?1
                 GROUP BY s.student_id
                 ORDER BY s.first_name ASC, s.student_id ASC",
            )?;
            let rows = stmt
                .query_map((class_id, month), |r| {
                    Ok(AttendanceTally {
                        student_id: r.get(0)?,
                        first_name: r.get(1)?,
                        present: r.get(2)?,
                        absent: r.get(3)?,
                        justified: r.get(4)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }
}
