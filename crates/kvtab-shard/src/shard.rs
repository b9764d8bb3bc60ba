use std::fmt;
use std::sync::Arc;

use kvtab_backend::KeyValueBackend;

/// Whether a shard currently takes part in mirrored traffic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShardHealth {
    Active,
    /// Removed from the active set after a failure, waiting for the probe.
    Quarantined,
}

/// One named backend endpoint.
#[derive(Clone)]
pub struct Shard {
    name: String,
    backend: Arc<dyn KeyValueBackend>,
}

impl Shard {
    pub fn new(name: impl Into<String>, backend: Arc<dyn KeyValueBackend>) -> Self {
        Self {
            name: name.into(),
            backend,
        }
    }

    /// A shard named after its backend's endpoint.
    pub fn unnamed(backend: Arc<dyn KeyValueBackend>) -> Self {
        let name = backend.endpoint().to_string();
        Self { name, backend }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn backend(&self) -> &dyn KeyValueBackend {
        self.backend.as_ref()
    }
}

impl fmt::Debug for Shard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shard")
            .field("name", &self.name)
            .field("endpoint", &self.backend.endpoint())
            .finish()
    }
}
