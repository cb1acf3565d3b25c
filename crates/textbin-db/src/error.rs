use thiserror::Error;

use crate::validator::ValidationErrors;

/// Outcomes of a store operation other than success.
///
/// `NotFound` and `EditConflict` are expected results the caller branches on
/// (surface as absent, re-fetch and retry). Everything from `Timeout` down is
/// an infrastructure failure and is never retried here.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Every violated field, not just the first.
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    /// Absent, hidden from the requester, expired, or not owned by them.
    #[error("record not found")]
    NotFound,

    /// The stored version moved on since the caller read it.
    #[error("edit conflict")]
    EditConflict,

    /// The slug was taken between allocation and insert.
    #[error("slug already exists")]
    ConstraintViolation,

    /// Slug allocation kept colliding at insert time.
    #[error("could not allocate a unique slug")]
    AllocationExhausted,

    #[error("storage call timed out")]
    Timeout,

    /// The caller stopped waiting; any write in flight was rolled back.
    #[error("storage call abandoned")]
    Cancelled,

    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

impl StoreError {
    /// Whether the caller may reasonably retry the same call.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::EditConflict
                | Self::ConstraintViolation
                | Self::Timeout
                | Self::Cancelled
                | Self::Unavailable(_)
        )
    }
}

/// Extended SQLite result code for a failed constraint, if this is one.
pub(crate) fn constraint_code(err: &rusqlite::Error) -> Option<i32> {
    match err {
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Some(e.extended_code)
        }
        _ => None,
    }
}
