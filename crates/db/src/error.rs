use sakuya_core::error::CoreError;

/// Errors returned by the soft-delete store.
///
/// Domain failures (`NotFound`, `MultipleMatches`, `Unpersisted`, ...) arrive
/// as [`CoreError`]; anything raised by the backend is passed through
/// untouched as [`sqlx::Error`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    /// The domain error, if this is one.
    pub fn as_core(&self) -> Option<&CoreError> {
        match self {
            StoreError::Core(core) => Some(core),
            StoreError::Database(_) => None,
        }
    }
}

/// SQLSTATE class 23: integrity constraint violation.
const INTEGRITY_CONSTRAINT_CLASS: &str = "23";
/// SQLSTATE class 25: invalid transaction state.
const INVALID_TRANSACTION_STATE_CLASS: &str = "25";
/// SQLSTATE 40001: serialization failure.
const SERIALIZATION_FAILURE: &str = "40001";

/// Returns `true` if `err` means a concurrent writer got there first.
///
/// Covers unique/integrity violations, an aborted or otherwise unusable
/// transaction, and serialization failures under `SERIALIZABLE`.
pub fn is_race_conflict(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err
            .code()
            .is_some_and(|code| is_race_sqlstate(&code)),
        _ => false,
    }
}

fn is_race_sqlstate(code: &str) -> bool {
    code.starts_with(INTEGRITY_CONSTRAINT_CLASS)
        || code.starts_with(INVALID_TRANSACTION_STATE_CLASS)
        || code == SERIALIZATION_FAILURE
}
