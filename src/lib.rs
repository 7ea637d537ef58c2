//! Local classroom store: teachers, classes, students, evaluations, grades and
//! attendance in one SQLite file, with dirty-row bookkeeping for an external
//! synchronizer and read-only statistics over committed state.

pub mod backup;
pub mod changes;
pub mod config;
pub mod db;
pub mod error;
pub mod ids;
pub mod ipc;
pub mod models;
pub mod queries;
pub mod query;
pub mod stats;
pub mod store;
pub mod sync;

pub use changes::{Change, ChangeKind, Subscription};
pub use error::StoreError;
pub use ids::Clock;
pub use models::{
    Attendance, AttendanceKey, AttendanceStatus, Class, Evaluation, GradeKey, Record, Student,
    StudentGrade, Table, Teacher,
};
pub use queries::ClassOrder;
pub use query::{Direction, Query};
pub use stats::{AttendanceTally, EvaluationStats, RankedStudent};
pub use store::{Store, StoreSlot};
pub use sync::{PendingCount, RemoteOutcome};
