pub mod notify;
pub mod payment;

/// Engine-wide error taxonomy. Validation is the caller's fault, Conflict
/// means state moved underneath a valid request, External is a dependency
/// failure that left engine state untouched.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("State has moved: {0}")]
    Conflict(String),
    #[error("External dependency failed: {0}")]
    External(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

/// Errors surfaced by persistence backends.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(String),
    #[error("Concurrent modification: {0}")]
    Conflict(String),
    #[error("Storage backend error: {0}")]
    Backend(String),
}
