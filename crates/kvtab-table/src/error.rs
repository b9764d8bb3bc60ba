use kvtab_shard::ShardError;
use kvtab_types::{Sentinel, TypeError};

/// Errors produced by table store operations.
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    /// A required argument was empty. Nothing was sent to the backend.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("table not found: {0}")]
    TableNotFound(String),

    /// The table was missing and creating it on the fly did not work.
    #[error("could not create table {table}: {reason}")]
    AutoCreateFailed { table: String, reason: String },

    /// The value does not map onto a flat set of fields.
    #[error("unsupported row shape: {0}")]
    UnsupportedShape(String),

    #[error("codec error: {0}")]
    Codec(String),

    #[error(transparent)]
    Shard(#[from] ShardError),
}

impl TableError {
    /// The compatibility code this error folds into.
    pub fn sentinel(&self) -> Sentinel {
        match self {
            TableError::InvalidArgument(_) | TableError::TableNotFound(_) => {
                Sentinel::InvalidArgument
            }
            TableError::AutoCreateFailed { .. } => Sentinel::AutoCreateFailed,
            TableError::UnsupportedShape(_) => Sentinel::UnsupportedShape,
            TableError::Codec(_) | TableError::Shard(_) => Sentinel::Internal,
        }
    }
}

impl From<TypeError> for TableError {
    fn from(e: TypeError) -> Self {
        match e {
            TypeError::Empty { .. } => TableError::InvalidArgument(e.to_string()),
            other => TableError::Codec(other.to_string()),
        }
    }
}

/// Result alias for table store operations.
pub type TableResult<T> = Result<T, TableError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_mapping() {
        assert_eq!(
            TableError::InvalidArgument("x".into()).sentinel().code(),
            -1
        );
        assert_eq!(TableError::TableNotFound("t".into()).sentinel().code(), -1);
        let auto = TableError::AutoCreateFailed {
            table: "db.t".into(),
            reason: "down".into(),
        };
        assert_eq!(auto.sentinel().code(), -2);
        assert_eq!(TableError::UnsupportedShape("[]".into()).sentinel().code(), -8);
        assert_eq!(TableError::Codec("bad".into()).sentinel().code(), -9);
        let shard = TableError::from(ShardError::NoActiveShard { op: "HSET" });
        assert_eq!(shard.sentinel().code(), -9);
    }

    #[test]
    fn empty_name_is_invalid_argument() {
        let err = TableError::from(TypeError::Empty { what: "table" });
        assert!(matches!(err, TableError::InvalidArgument(_)));
    }
}
