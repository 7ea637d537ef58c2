pub mod attendance;
pub mod backup;
pub mod changes;
pub mod classes;
pub mod core;
pub mod evaluations;
pub mod grades;
pub mod stats;
pub mod students;
pub mod sync;
pub mod teachers;
