//! Named queries for the screens that list, search and look up rows.

use rusqlite::OptionalExtension;

use crate::error::Result;
use crate::models::{
    Attendance, AttendanceStatus, Class, Evaluation, GradeKey, Student, StudentGrade, Teacher,
};
use crate::query::{Direction, Query};
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClassOrder {
    #[default]
    ClassName,
    SubjectName,
}

impl Store {
    pub fn teachers(&self) -> Result<Vec<Teacher>> {
        self.query(&Query::new().order_by("name", Direction::Asc))
    }

    pub fn teacher_by_email(&self, email: &str) -> Result<Option<Teacher>> {
        Ok(self
            .query::<Teacher>(&Query::new().eq("email", email.to_string()).limit(1))?
            .into_iter()
            .next())
    }

    pub fn classes_for_teacher(&self, teacher_id: &str, order: ClassOrder) -> Result<Vec<Class>> {
        let column = match order {
            ClassOrder::ClassName => "class_name",
            ClassOrder::SubjectName => "subject_name",
        };
        self.query(
            &Query::new()
                .eq("teacher_id", teacher_id.to_string())
                .order_by(column, Direction::Asc),
        )
    }

    /// Classes whose name or subject contains `term`.
    pub fn search_classes(&self, term: &str) -> Result<Vec<Class>> {
        self.query(
            &Query::new()
                .contains(&["class_name", "subject_name"], term)
                .order_by("class_name", Direction::Asc),
        )
    }

    pub fn students_for_class(&self, class_id: &str) -> Result<Vec<Student>> {
        self.query(
            &Query::new()
                .eq("class_id", class_id.to_string())
                .order_by("first_name", Direction::Asc),
        )
    }

    pub fn search_students(&self, term: &str) -> Result<Vec<Student>> {
        self.query(
            &Query::new()
                .contains(&["first_name"], term)
                .order_by("first_name", Direction::Asc),
        )
    }

    /// Codes are not unique across classes; the lowest id wins.
    pub fn student_by_code(&self, code: &str) -> Result<Option<Student>> {
        Ok(self
            .query::<Student>(&Query::new().eq("student_code", code.to_string()).limit(1))?
            .into_iter()
            .next())
    }

    /// Latest due date first.
    pub fn evaluations_for_class(&self, class_id: &str) -> Result<Vec<Evaluation>> {
        self.query(
            &Query::new()
                .eq("class_id", class_id.to_string())
                .order_by("due_date", Direction::Desc),
        )
    }

    pub fn search_evaluations(&self, term: &str) -> Result<Vec<Evaluation>> {
        self.query(
            &Query::new()
                .contains(&["name"], term)
                .order_by("due_date", Direction::Desc),
        )
    }

    /// Evaluations of one semester, optionally narrowed to one parcial, oldest first.
    pub fn evaluations_for_period(
        &self,
        class_id: &str,
        semester: &str,
        parcial: Option<&str>,
    ) -> Result<Vec<Evaluation>> {
        self.query(
            &Query::new()
                .eq("class_id", class_id.to_string())
                .eq("semester", semester.to_string())
                .eq_opt("parcial", parcial.map(str::to_string))
                .order_by("due_date", Direction::Asc),
        )
    }

    /// Status recorded for a student on a day, in a specific class or any.
    pub fn attendance_status(
        &self,
        student_id: &str,
        class_id: Option<&str>,
        date: i64,
    ) -> Result<Option<AttendanceStatus>> {
        self.read(|conn| {
            let status = conn
                .query_row(
                    "SELECT status FROM attendance
                     WHERE student_id = ?1 AND date = ?2 AND (?3 IS NULL OR class_id = ?3)
                     ORDER BY class_id
                     LIMIT 1",
                    (student_id, date, class_id),
                    |r| r.get(0),
                )
                .optional()?;
            Ok(status)
        })
    }

    pub fn attendance_for_class_day(&self, class_id: &str, date: i64) -> Result<Vec<Attendance>> {
        self.query(
            &Query::new()
                .eq("class_id", class_id.to_string())
                .eq("date", date)
                .order_by("student_id", Direction::Asc),
        )
    }

    /// Newest day first.
    pub fn attendance_history(&self, student_id: &str) -> Result<Vec<Attendance>> {
        self.query(
            &Query::new()
                .eq("student_id", student_id.to_string())
                .order_by("date", Direction::Desc),
        )
    }

    /// `YYYY-MM` months with any attendance in the class, newest first.
    pub fn attendance_months_for_class(&self, class_id: &str) -> Result<Vec<String>> {
        self.attendance_months("class_id", class_id)
    }

    pub fn attendance_months_for_student(&self, student_id: &str) -> Result<Vec<String>> {
        self.attendance_months("student_id", student_id)
    }

    fn attendance_months(&self, column: &'static str, id: &str) -> Result<Vec<String>> {
        let sql = format!(
            "SELECT strftime('%Y-%m', date / 1000, 'unixepoch') AS month
             FROM attendance
             WHERE {column} = ?
             GROUP BY month
             ORDER BY month DESC"
        );
        self.read(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let months = stmt
                .query_map([id], |r| r.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(months)
        })
    }

    pub fn grades_for_evaluation(&self, evaluation_id: &str) -> Result<Vec<StudentGrade>> {
        self.query(
            &Query::new()
                .eq("evaluation_id", evaluation_id.to_string())
                .order_by("student_id", Direction::Asc),
        )
    }

    pub fn grade_for(&self, evaluation_id: &str, student_id: &str) -> Result<Option<StudentGrade>> {
        self.get(&GradeKey {
            evaluation_id: evaluation_id.to_string(),
            student_id: student_id.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::parse_day;
    use crate::models::Record;

    fn store_with_class() -> (Store, Class) {
        let store = Store::open_in_memory().expect("store");
        store
            .upsert(&Teacher::new("t1", "Ana", "ana@example.com", "ana", 1))
            .expect("teacher");
        let class = Class::new("t1", "Quimica", "Ciencias", 1);
        store.upsert(&class).expect("class");
        (store, class)
    }

    #[test]
    fn classes_order_by_name_or_subject() {
        let (store, _) = store_with_class();
        store
            .upsert(&Class::new("t1", "Algebra", "Matematicas", 1))
            .expect("class");
        let by_name: Vec<String> = store
            .classes_for_teacher("t1", ClassOrder::ClassName)
            .expect("classes")
            .into_iter()
            .map(|c| c.class_name)
            .collect();
        assert_eq!(by_name, vec!["Algebra", "Quimica"]);
        let by_subject: Vec<String> = store
            .classes_for_teacher("t1", ClassOrder::SubjectName)
            .expect("classes")
            .into_iter()
            .map(|c| c.subject_name)
            .collect();
        assert_eq!(by_subject, vec!["Ciencias", "Matematicas"]);
        assert_eq!(store.search_classes("mate").expect("search").len(), 1);
    }

    #[test]
    fn evaluations_for_period_honours_optional_parcial() {
        let (store, class) = store_with_class();
        let e1 = Evaluation::new(
            &class.class_id,
            "P1",
            None,
            20.0,
            300,
            "S1",
            Some("Primer Parcial"),
            1,
        );
        let e2 = Evaluation::new(
            &class.class_id,
            "P2",
            None,
            20.0,
            100,
            "S1",
            Some("Segundo Parcial"),
            1,
        );
        let e3 = Evaluation::new(&class.class_id, "Otro", None, 20.0, 200, "S2", None, 1);
        for e in [&e1, &e2, &e3] {
            store.upsert(e).expect("eval");
        }
        let all: Vec<String> = store
            .evaluations_for_period(&class.class_id, "S1", None)
            .expect("period")
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(all, vec!["P2", "P1"]);
        let first = store
            .evaluations_for_period(&class.class_id, "S1", Some("Primer Parcial"))
            .expect("period");
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].key(), e1.evaluation_id);

        let newest_first: Vec<String> = store
            .evaluations_for_class(&class.class_id)
            .expect("class evals")
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(newest_first, vec!["P1", "Otro", "P2"]);
    }

    #[test]
    fn attendance_months_are_distinct_newest_first() {
        let (store, class) = store_with_class();
        let s = Student::new(&class.class_id, None, "Luis", Some("X1"), 1);
        store.upsert(&s).expect("student");
        for day in ["2024-06-03", "2024-07-01", "2024-07-02"] {
            store
                .upsert(&Attendance::new(
                    &s.student_id,
                    &class.class_id,
                    parse_day(day).expect("day"),
                    AttendanceStatus::Present,
                    1,
                ))
                .expect("attendance");
        }
        assert_eq!(
            store
                .attendance_months_for_class(&class.class_id)
                .expect("months"),
            vec!["2024-07", "2024-06"]
        );
        assert_eq!(
            store.attendance_months_for_student(&s.student_id).expect("months"),
            vec!["2024-07", "2024-06"]
        );
        let day = parse_day("2024-07-01").expect("day");
        assert_eq!(
            store
                .attendance_status(&s.student_id, Some(&class.class_id), day)
                .expect("status"),
            Some(AttendanceStatus::Present)
        );
        assert_eq!(
            store.attendance_status(&s.student_id, None, day + 1).expect("status"),
            None
        );
        assert_eq!(store.attendance_history(&s.student_id).expect("history")[0].date,
            parse_day("2024-07-02").expect("day"));
        assert_eq!(
            store.student_by_code("X1").expect("code").map(|st| st.student_id),
            Some(s.student_id)
        );
    }
}
