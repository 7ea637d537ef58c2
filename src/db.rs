use rusqlite::Connection;
use std::path::Path;

use crate::error::Result;

pub const DB_FILE_NAME: &str = "classbook.sqlite3";

pub fn db_path(workspace: &Path) -> std::path::PathBuf {
    workspace.join(DB_FILE_NAME)
}

pub fn open_db(workspace: &Path) -> Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let conn = Connection::open(db_path(workspace))?;
    conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
    conn.busy_timeout(std::time::Duration::from_secs(5))?;
    ensure_schema(&conn)?;
    Ok(conn)
}

pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    ensure_schema(&conn)?;
    Ok(conn)
}

pub fn ensure_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS teachers(
            teacher_id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL,
            username TEXT NOT NULL,
            last_modified INTEGER NOT NULL,
            synced_to_cloud INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_teachers_email ON teachers(email)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS classes(
            class_id TEXT PRIMARY KEY,
            teacher_id TEXT NOT NULL,
            class_name TEXT NOT NULL,
            subject_name TEXT NOT NULL,
            creation_date INTEGER NOT NULL,
            last_modified INTEGER NOT NULL,
            synced_to_cloud INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY(teacher_id) REFERENCES teachers(teacher_id) ON DELETE CASCADE
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_classes_teacher ON classes(teacher_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            student_id TEXT PRIMARY KEY,
            class_id TEXT NOT NULL,
            student_number INTEGER,
            first_name TEXT NOT NULL,
            student_code TEXT,
            creation_date INTEGER NOT NULL,
            last_modified INTEGER NOT NULL,
            synced_to_cloud INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY(class_id) REFERENCES classes(class_id) ON DELETE CASCADE
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_class ON students(class_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_code ON students(student_code)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS evaluations(
            evaluation_id TEXT PRIMARY KEY,
            class_id TEXT NOT NULL,
            name TEXT NOT NULL,
            description TEXT,
            max_score REAL NOT NULL,
            creation_date INTEGER NOT NULL,
            due_date INTEGER NOT NULL,
            semester TEXT NOT NULL,
            parcial TEXT,
            last_modified INTEGER NOT NULL,
            synced_to_cloud INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY(class_id) REFERENCES classes(class_id) ON DELETE CASCADE
        )",
        [],
    )?;
    // Files created before attachments existed lack document_ref.
    ensure_evaluations_document_ref(conn)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_evaluations_class ON evaluations(class_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_evaluations_class_semester
         ON evaluations(class_id, semester, parcial)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS attendance(
            student_id TEXT NOT NULL,
            class_id TEXT NOT NULL,
            date INTEGER NOT NULL,
            status TEXT NOT NULL CHECK(status IN ('P', 'A', 'J')),
            last_modified INTEGER NOT NULL,
            synced_to_cloud INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY(student_id, class_id, date),
            FOREIGN KEY(student_id) REFERENCES students(student_id) ON DELETE CASCADE,
            FOREIGN KEY(class_id) REFERENCES classes(class_id) ON DELETE CASCADE
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_class_date ON attendance(class_id, date)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS student_grades(
            evaluation_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            grade REAL NOT NULL,
            observation TEXT,
            last_modified INTEGER NOT NULL,
            synced_to_cloud INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY(evaluation_id, student_id),
            FOREIGN KEY(evaluation_id) REFERENCES evaluations(evaluation_id) ON DELETE CASCADE,
            FOREIGN KEY(student_id) REFERENCES students(student_id) ON DELETE CASCADE
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_student_grades_student ON student_grades(student_id)",
        [],
    )?;

    for table in [
        "teachers",
        "classes",
        "students",
        "evaluations",
        "attendance",
        "student_grades",
    ] {
        conn.execute(
            &format!(
                "CREATE INDEX IF NOT EXISTS idx_{table}_unsynced ON {table}(synced_to_cloud)"
            ),
            [],
        )?;
    }

    Ok(())
}

fn ensure_evaluations_document_ref(conn: &Connection) -> rusqlite::Result<()> {
    if table_has_column(conn, "evaluations", "document_ref")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE evaluations ADD COLUMN document_ref TEXT", [])?;
    Ok(())
}

pub fn table_has_column(conn: &Connection, table: &str, column: &str) -> rusqlite::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
