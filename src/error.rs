use thiserror::Error;

/// Failures at the alert persistence boundary. These are caught in the
/// dispatch workers and must never take down a monitoring task.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("alert storage unavailable: {0}")]
    Unavailable(String),

    #[error("alert rejected by storage: {0}")]
    Rejected(String),
}
