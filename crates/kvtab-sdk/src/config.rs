use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use kvtab_backend::PoolOptions;
use kvtab_shard::RunMode;
use kvtab_types::KeyMode;

use crate::error::{SdkError, SdkResult};

/// One backend endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardConfig {
    /// Defaults to the endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// `redis://host:port/db`
    pub endpoint: String,
}

impl ShardConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            name: None,
            endpoint: endpoint.into(),
        }
    }

    pub fn named(name: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            endpoint: endpoint.into(),
        }
    }

    pub fn resolved_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.endpoint)
    }
}

/// Store configuration, usually loaded from TOML.
///
/// ```toml
/// mode = "mirrored"
/// key_mode = "structured"
/// probe_interval_secs = 60
///
/// [[shards]]
/// name = "primary"
/// endpoint = "redis://127.0.0.1:6379/0"
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Omitted: mirrored for one shard, distributed for more.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<RunMode>,
    pub key_mode: KeyMode,
    pub probe_interval_secs: u64,
    pub pool_max_idle: usize,
    pub connect_timeout_ms: u64,
    pub io_timeout_ms: u64,
    pub shards: Vec<ShardConfig>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            mode: None,
            key_mode: KeyMode::Structured,
            probe_interval_secs: 60,
            pool_max_idle: 8,
            connect_timeout_ms: 2_000,
            io_timeout_ms: 5_000,
            shards: Vec::new(),
        }
    }
}

impl StoreConfig {
    /// A configuration for the given endpoints, everything else default.
    pub fn with_endpoints<I, S>(endpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            shards: endpoints.into_iter().map(ShardConfig::new).collect(),
            ..Self::default()
        }
    }

    pub fn from_toml_str(text: &str) -> SdkResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> SdkResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| SdkError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Reject configurations that cannot be opened.
    pub fn validate(&self) -> SdkResult<()> {
        if self.shards.is_empty() {
            return Err(SdkError::Config("at least one shard is required".into()));
        }
        let mut names = HashSet::new();
        for shard in &self.shards {
            if shard.endpoint.trim().is_empty() {
                return Err(SdkError::Config("shard endpoint must not be empty".into()));
            }
            if !names.insert(shard.resolved_name()) {
                return Err(SdkError::Config(format!(
                    "duplicate shard name: {}",
                    shard.resolved_name()
                )));
            }
        }
        if self.mode == Some(RunMode::Distributed) && self.shards.len() < 2 {
            return Err(SdkError::Config(
                "distributed mode needs more than one shard".into(),
            ));
        }
        if self.probe_interval_secs == 0 {
            return Err(SdkError::Config(
                "probe_interval_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs)
    }

    pub fn pool_options(&self) -> PoolOptions {
        PoolOptions {
            max_idle: self.pool_max_idle,
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            io_timeout: Duration::from_millis(self.io_timeout_ms),
            ..PoolOptions::default()
        }
    }
}
