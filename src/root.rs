// ============================================================================
// File: src/root.rs
// ----------------------------------------------------------------------------
// The public entry point. Wires together the Store, the Manager actor and a
// shared `CancellationToken`, then hands the embedder exactly two operations:
// `store` (routed through the Manager) and `get` (read straight off the
// Store, never touching the Manager — this is what makes `get` wait-free).
// ============================================================================

use std::any::Any;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::CacheError;
use crate::key::CacheKey;
use crate::manager::{self, ManagerHandle};
use crate::store::{Status, Store};

/// Default TTL applied by [`SupervisionRoot::store_default_ttl`] — the Rust
/// stand-in for the distilled spec's `store(key, value, ttl_seconds = 3600)`
/// default parameter, since Rust has none.
pub const DEFAULT_TTL_SECONDS: f64 = 3600.0;

/// Outcome of a [`SupervisionRoot::get`] lookup.
#[derive(Clone)]
pub enum GetOutcome {
    /// The key has a computed value available right now.
    Ready(Arc<dyn Any + Send + Sync>),
    /// The key is known but its first computation hasn't landed yet.
    Busy,
    /// No Worker has ever been started for this key (or it has expired).
    Unknown,
}

/// The cache. One instance owns one Store, one Manager actor and the Worker
/// Supervisors the Manager spawns underneath it. Cloning is not provided —
/// construct one `SupervisionRoot` per embedder and share it behind an
/// `Arc` if multiple callers need it.
pub struct SupervisionRoot {
    store: Store,
    manager: ManagerHandle,
    cancel: CancellationToken,
}

impl SupervisionRoot {
    /// Build a fresh, independent cache. Takes `Config` directly rather than
    /// going through the process-wide global so that a test binary can spin
    /// up multiple roots with different refresh intervals side by side; see
    /// [`crate::config::global_config`] for the optional singleton path.
    pub fn new(config: Config) -> Self {
        let store = Store::new();
        let cancel = CancellationToken::new();
        let manager = manager::spawn(store.clone(), config.refresh_interval_ms(), cancel.clone());
        Self {
            store,
            manager,
            cancel,
        }
    }

    /// Install `value` under `key` with a TTL of `ttl_seconds`, starting a
    /// Worker Supervisor for the key if one isn't already running. Returns
    /// once the write is visible in the Store, not once any value has been
    /// computed.
    pub async fn store(
        &self,
        key: impl Into<CacheKey>,
        value: Arc<dyn Any + Send + Sync>,
        ttl_seconds: f64,
    ) -> Result<(), CacheError> {
        self.manager.store(key.into(), value, ttl_seconds).await
    }

    /// Two-argument form of `store`: installs `value` under `key` with the
    /// default TTL ([`DEFAULT_TTL_SECONDS`], 3600s).
    pub async fn store_default_ttl(
        &self,
        key: impl Into<CacheKey>,
        value: Arc<dyn Any + Send + Sync>,
    ) -> Result<(), CacheError> {
        self.store(key, value, DEFAULT_TTL_SECONDS).await
    }

    /// Wait-free lookup: reads the Store directly, never the Manager actor,
    /// so a slow or backed-up Manager can never add latency to a read.
    pub fn get(&self, key: impl Into<CacheKey>) -> GetOutcome {
        let key = key.into();
        match self.store.status(&key) {
            Some(Status::Ready) => GetOutcome::Ready(
                self.store
                    .value(&key)
                    .expect("status == Ready implies value.is_some(), upheld by every Store mutator"),
            ),
            Some(Status::Busy) => GetOutcome::Busy,
            None => GetOutcome::Unknown,
        }
    }

    /// Signal every Worker and the Manager actor to stop. Workers finish
    /// their current tick and exit with [`crate::worker::WorkerExit::Shutdown`];
    /// no Records are deleted. Idempotent.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}
