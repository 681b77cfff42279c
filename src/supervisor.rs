// ============================================================================
// File: src/supervisor.rs
// ----------------------------------------------------------------------------
// One-for-one supervision for a single key: respawn a fresh Worker whenever
// the current generation's task panics, give up once it exits on purpose.
// Mirrors restart_policy = :transient from the spec, translated the way the
// teacher handles restart in its own dynamic-pool idioms (see task.rs's
// worker-thread loop) but over `tokio::spawn`/`JoinHandle` instead of
// `std::thread`.
// ============================================================================

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::key::CacheKey;
use crate::manager::ManagerHandle;
use crate::store::Store;
use crate::worker::{Worker, WorkerExit};

pub struct WorkerSupervisor {
    key: CacheKey,
    ttl_ms: u64,
    refresh_interval_ms: u64,
    store: Store,
    manager: ManagerHandle,
    cancel: CancellationToken,
}

impl WorkerSupervisor {
    pub fn new(
        key: CacheKey,
        ttl_ms: u64,
        refresh_interval_ms: u64,
        store: Store,
        manager: ManagerHandle,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            key,
            ttl_ms,
            refresh_interval_ms,
            store,
            manager,
            cancel,
        }
    }

    pub async fn run(self) {
        loop {
            let worker = Worker::new(
                self.key.clone(),
                self.ttl_ms,
                self.refresh_interval_ms,
                self.store.clone(),
                self.manager.clone(),
                self.cancel.clone(),
            );

            match tokio::spawn(worker.run()).await {
                Ok(WorkerExit::Normal) => {
                    info!(key = %self.key, "worker exited normally, supervisor standing down");
                    return;
                }
                Ok(WorkerExit::Shutdown) => {
                    info!(key = %self.key, "worker exited for shutdown, supervisor standing down");
                    return;
                }
                Err(join_err) if join_err.is_panic() => {
                    warn!(key = %self.key, "worker panicked, restarting (transient)");
                    continue;
                }
                Err(join_err) => {
                    warn!(key = %self.key, %join_err, "worker task was cancelled, supervisor standing down");
                    return;
                }
            }
        }
    }
}
