use kvtab_backend::BackendError;

/// Errors from shard routing and coordination.
#[derive(Debug, thiserror::Error)]
pub enum ShardError {
    /// Invalid shard set or run mode. Raised at construction only.
    #[error("shard configuration error: {0}")]
    Config(String),

    /// Every shard is quarantined, so nothing could serve the call.
    #[error("no active shard available for {op}")]
    NoActiveShard { op: &'static str },

    #[error("shard {shard} failed: {source}")]
    Backend {
        shard: String,
        #[source]
        source: BackendError,
    },
}

/// Result alias for shard operations.
pub type ShardResult<T> = Result<T, ShardError>;
