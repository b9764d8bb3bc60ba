use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("{what} must not be empty")]
    Empty { what: &'static str },

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("unknown {kind}: {value}")]
    UnknownVariant { kind: &'static str, value: String },
}
