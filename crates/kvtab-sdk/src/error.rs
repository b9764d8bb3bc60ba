use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("backend error: {0}")]
    Backend(#[from] kvtab_backend::BackendError),

    #[error("shard error: {0}")]
    Shard(#[from] kvtab_shard::ShardError),

    #[error("table error: {0}")]
    Table(#[from] kvtab_table::TableError),
}

pub type SdkResult<T> = Result<T, SdkError>;
