use thiserror::Error;

/// Errors surfaced by the lease coordinator. Shortage of a single attempt
/// is internal (see [`AttemptOutcome`](crate::pool::coordinator)); only
/// exhausted retries become an error.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("execution '{id}' already exists")]
    DuplicateExecution { id: String },

    #[error(
        "could not acquire {required} '{role}' account(s) after {attempts} attempt(s): {available} available"
    )]
    AcquisitionTimedOut {
        role: String,
        required: i32,
        available: i32,
        attempts: i32,
    },

    #[error("invalid requirements: {0}")]
    InvalidRequirements(String),

    #[error("store unavailable")]
    StoreUnavailable(#[from] sqlx::Error),
}

/// Which role came up short in a failed attempt, and by how much.
#[derive(Debug, Clone)]
pub struct Shortage {
    pub role: String,
    pub required: i32,
    pub observed: i32,
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err.as_database_error().map(|db| db.kind()),
        Some(sqlx::error::ErrorKind::UniqueViolation)
    )
}
