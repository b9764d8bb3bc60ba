use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ShardError, ShardResult};

/// How writes are spread over the configured shards. Fixed per store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Each key lives on exactly one shard, picked by the hash ring.
    Distributed,
    /// Every write goes to every active shard.
    Mirrored,
}

impl RunMode {
    /// Pick the run mode for `shard_count` shards.
    ///
    /// A single shard only supports [`RunMode::Mirrored`]. With several
    /// shards the default is [`RunMode::Distributed`].
    pub fn resolve(requested: Option<RunMode>, shard_count: usize) -> ShardResult<RunMode> {
        match (requested, shard_count) {
            (_, 0) => Err(ShardError::Config("at least one shard is required".into())),
            (Some(RunMode::Distributed), 1) => Err(ShardError::Config(
                "distributed mode needs more than one shard".into(),
            )),
            (None, 1) => Ok(RunMode::Mirrored),
            (None, _) => Ok(RunMode::Distributed),
            (Some(mode), _) => Ok(mode),
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Distributed => f.write_str("distributed"),
            RunMode::Mirrored => f.write_str("mirrored"),
        }
    }
}

impl FromStr for RunMode {
    type Err = ShardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "distributed" => Ok(RunMode::Distributed),
            "mirrored" => Ok(RunMode::Mirrored),
            other => Err(ShardError::Config(format!("unknown run mode: {other}"))),
        }
    }
}
