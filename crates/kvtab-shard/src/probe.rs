use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::registry::ShardRegistry;

/// Default time between two probe passes.
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Default)]
struct Flags {
    running: bool,
    stopped: bool,
}

struct Inner {
    registry: Arc<ShardRegistry>,
    interval: Duration,
    flags: Mutex<Flags>,
    wake: Condvar,
}

/// Background task that brings quarantined shards back.
///
/// The worker thread exists only while something is quarantined. Each
/// pass pings every quarantined shard and promotes the ones that answer.
/// Promoted shards are not backfilled with writes they missed.
pub struct RecoveryProbe {
    inner: Arc<Inner>,
}

impl RecoveryProbe {
    pub fn new(registry: Arc<ShardRegistry>, interval: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry,
                interval,
                flags: Mutex::new(Flags::default()),
                wake: Condvar::new(),
            }),
        }
    }

    pub fn interval(&self) -> Duration {
        self.inner.interval
    }

    /// `true` while the worker thread is alive.
    pub fn is_running(&self) -> bool {
        self.inner.flags.lock().expect("lock poisoned").running
    }

    /// Start the worker unless it is already running. Call after every
    /// quarantine.
    pub fn ensure_running(&self) {
        let mut flags = self.inner.flags.lock().expect("lock poisoned");
        if flags.running || flags.stopped {
            return;
        }
        let inner = Arc::clone(&self.inner);
        let spawned = thread::Builder::new()
            .name("kvtab-probe".into())
            .spawn(move || inner.run());
        match spawned {
            Ok(_) => {
                flags.running = true;
                info!(interval_secs = self.inner.interval.as_secs(), "recovery probe started");
            }
            Err(e) => error!(error = %e, "failed to start recovery probe"),
        }
    }

    /// Run one pass on the calling thread. Returns the promoted shards.
    pub fn probe_now(&self) -> Vec<String> {
        self.inner.pass()
    }
}

impl Drop for RecoveryProbe {
    fn drop(&mut self) {
        let mut flags = self.inner.flags.lock().expect("lock poisoned");
        flags.stopped = true;
        self.inner.wake.notify_all();
    }
}

impl Inner {
    fn run(&self) {
        loop {
            {
                let flags = self.flags.lock().expect("lock poisoned");
                let (flags, _) = self
                    .wake
                    .wait_timeout_while(flags, self.interval, |f| !f.stopped)
                    .expect("lock poisoned");
                if flags.stopped {
                    return;
                }
            }

            self.pass();

            // Decide to exit under the lock so a concurrent quarantine
            // either sees `running == false` or is seen here.
            let mut flags = self.flags.lock().expect("lock poisoned");
            if flags.stopped || !self.registry.has_quarantined() {
                flags.running = false;
                info!("recovery probe stopped");
                return;
            }
        }
    }

    fn pass(&self) -> Vec<String> {
        let mut promoted = Vec::new();
        for shard in self.registry.quarantined() {
            match shard.backend().ping() {
                Ok(()) => {
                    if self.registry.clear_exception(shard.name()) {
                        info!(shard = %shard.name(), "shard recovered");
                        promoted.push(shard.name().to_string());
                    }
                }
                Err(e) => debug!(shard = %shard.name(), error = %e, "shard still down"),
            }
        }
        promoted
    }
}
