use thiserror::Error;

/// Error taxonomy for every core operation. The HTTP layer owns the mapping
/// to status codes; nothing here knows about axum.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Caller-supplied data is unusable (empty message, missing room name).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Missing or invalid identity token on a write path.
    #[error("unauthorized")]
    Unauthorized,

    /// Unknown room, message, or device.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Underlying persistence failure. Surfaced as a generic 5xx and logged;
    /// retry policy belongs to the caller.
    #[error("storage failure: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("database lock poisoned")]
    LockPoisoned,
}

pub type StoreResult<T> = Result<T, StoreError>;
