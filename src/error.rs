use rusqlite::ErrorCode;
use thiserror::Error;

/// Errors surfaced by the entity store and everything layered on it.
///
/// Absent rows are not errors: lookups return `Option` and mutations return a
/// row count of zero.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A foreign key, primary key or NOT NULL rule rejected the write. Nothing
    /// was changed.
    #[error("constraint violation on {table}: {message}")]
    ConstraintViolation {
        table: &'static str,
        message: String,
    },

    /// The storage layer failed. Committed rows are untouched; callers may retry.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[source] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Rejected before touching storage (unknown query column, bad date, ...).
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl StoreError {
    /// Classify a rusqlite error raised while writing to `table`.
    pub fn from_sqlite(table: &'static str, err: rusqlite::Error) -> Self {
        if matches!(
            err.sqlite_error_code(),
            Some(ErrorCode::ConstraintViolation)
        ) {
            StoreError::ConstraintViolation {
                table,
                message: err.to_string(),
            }
        } else {
            StoreError::StorageUnavailable(err)
        }
    }

    /// Stable machine-readable code used on the IPC surface.
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::ConstraintViolation { .. } => "constraint_violation",
            StoreError::StorageUnavailable(_) | StoreError::Io(_) => "storage_unavailable",
            StoreError::InvalidInput(_) => "bad_params",
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::StorageUnavailable(err)
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
