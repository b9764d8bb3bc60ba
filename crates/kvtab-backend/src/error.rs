/// Errors from backend operations.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The endpoint could not be reached or the connection dropped.
    #[error("connection to {endpoint} failed: {reason}")]
    Connection { endpoint: String, reason: String },

    /// The endpoint rejected or failed a command.
    #[error("{command} failed on {endpoint}: {reason}")]
    Command {
        endpoint: String,
        command: &'static str,
        reason: String,
    },

    /// A batched transaction was aborted; none of its commands applied.
    #[error("transaction aborted on {endpoint}: {reason}")]
    Transaction { endpoint: String, reason: String },

    /// The endpoint is marked down (test outage or explicit shutdown).
    #[error("endpoint {0} is unavailable")]
    Unavailable(String),

    /// Invalid endpoint description.
    #[error("invalid endpoint configuration: {0}")]
    Config(String),
}

impl BackendError {
    /// `true` for failures that say nothing about the data, only about
    /// reachability.
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            BackendError::Connection { .. } | BackendError::Unavailable(_)
        )
    }
}

/// Result alias for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;
