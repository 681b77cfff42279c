// ============================================================================
// File: src/worker.rs
// ----------------------------------------------------------------------------
// The per-key timer loop: Initializing -> Timing -> Deciding -> (Computing |
// Terminating), run as a plain owned async fn rather than an explicit state
// machine type — the match in `decide` plays the role of the teacher's
// `ExecutionFlow::handle` dispatch (see state.rs), just inlined since there
// is no external event stream to react to, only the clock.
// ============================================================================

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::key::CacheKey;
use crate::manager::ManagerHandle;
use crate::producer::RecipeOutcome;
use crate::store::{Status, Store};

/// Why a Worker's `run` future resolved. The Supervisor restarts on neither
/// variant — both are terminal for this generation, distinguishing them is
/// purely for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// The key's TTL window elapsed with no producer activity; the Record
    /// was deleted and the Supervisor should not restart.
    Normal,
    /// The cache-wide cancellation token fired.
    Shutdown,
}

pub struct Worker {
    key: CacheKey,
    ttl_ms: u64,
    refresh_interval_ms: u64,
    store: Store,
    manager: ManagerHandle,
    cancel: CancellationToken,
    ttl_stamp: u64,
    refresh_stamp: u64,
    counter: u64,
}

impl Worker {
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
            ttl_stamp: 0,
            refresh_stamp: 0,
            counter: 0,
        }
    }

    pub async fn run(mut self) -> WorkerExit {
        // Initializing: anchor the TTL window to whatever timestamp the
        // Record already carries (set by the Manager's upsert that spawned
        // us). `refresh_stamp` starts at the sentinel 0 rather than the same
        // value — real timestamps from `next_tick` start at 1 and only grow,
        // so this guarantees the very first refresh tick always computes
        // once instead of mistaking "never observed" for "no new input".
        let initial = self.store.timestamp(&self.key).unwrap_or(0);
        self.ttl_stamp = initial;
        self.refresh_stamp = 0;
        self.counter = 0;
        debug!(key = %self.key, ttl_ms = self.ttl_ms, "worker initialized");

        loop {
            // Timing
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!(key = %self.key, "worker shutting down on cache shutdown");
                    return WorkerExit::Shutdown;
                }
                _ = tokio::time::sleep(Duration::from_millis(self.refresh_interval_ms)) => {}
            }

            // Deciding
            if let Some(exit) = self.decide().await {
                return exit;
            }
        }
    }

    /// Steps 1-5 of the Deciding phase. Returns `Some(exit)` only when the
    /// key has just expired; otherwise the loop in `run` ticks again.
    async fn decide(&mut self) -> Option<WorkerExit> {
        let steps = self.refresh_interval_ms * self.counter.max(1);

        if steps >= self.ttl_ms {
            // TTL parity reached: a full window's worth of ticks has
            // elapsed since the last reset. Check whether anything moved
            // the Record's timestamp during that window.
            let current = self.store.timestamp(&self.key).unwrap_or(self.ttl_stamp);
            if current == self.ttl_stamp {
                self.expire().await;
                return Some(WorkerExit::Normal);
            }

            // Not stale: a store() landed sometime during the window. Run
            // the ordinary refresh-tick check against the pre-reset
            // refresh_stamp, then open a fresh TTL window.
            self.refresh_tick(current).await;
            self.ttl_stamp = current;
            self.refresh_stamp = current;
            self.counter = 0;
        } else {
            let current = self.store.timestamp(&self.key).unwrap_or(self.refresh_stamp);
            self.refresh_tick(current).await;
            self.refresh_stamp = current;
            self.counter += 1;
        }

        None
    }

    /// Invoke the recipe only if the Record's timestamp moved since the
    /// last tick; otherwise there is nothing new to compute.
    async fn refresh_tick(&mut self, current_timestamp: u64) {
        if current_timestamp == self.refresh_stamp {
            debug!(key = %self.key, "no new input since last tick, skipping compute");
            return;
        }

        let recipe = match self.store.recipe(&self.key) {
            Some(recipe) => recipe,
            None => return,
        };

        match recipe.invoke().await {
            Ok(RecipeOutcome::Ok(value)) => {
                self.store
                    .update_fields(&self.key, None, Some(value), None, Some(Status::Ready));
                debug!(key = %self.key, "recipe computed a fresh value");
            }
            Ok(RecipeOutcome::Err(reason)) => {
                debug!(key = %self.key, %reason, "recipe reported a recoverable error, keeping prior value");
            }
            Err(join_err) => {
                // Surface the crash on our own task so the Supervisor sees
                // it via our JoinHandle and restarts us.
                panic!("recipe for key {} panicked: {join_err}", self.key);
            }
        }
    }

    async fn expire(&mut self) {
        self.store.delete(&self.key);
        self.manager.terminate(self.key.clone()).await;
        info!(key = %self.key, "worker expired: no producer activity within ttl window");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::producer::{wrap, FaultPolicy};
    use crate::store::next_tick;

    /// A real Manager actor backed by its own Store, used only so `terminate`
    /// calls from these Worker-focused tests have somewhere harmless to land.
    fn test_manager() -> ManagerHandle {
        crate::manager::spawn(Store::new(), 50, CancellationToken::new())
    }

    #[tokio::test(start_paused = true)]
    async fn expires_when_no_store_activity_within_ttl() {
        let store = Store::new();
        let key = CacheKey::from("HEL");
        let recipe = wrap(Arc::new(1i32), FaultPolicy::AlwaysSucceed);
        store.insert_new(key.clone(), recipe, next_tick());

        let manager = test_manager();
        let cancel = CancellationToken::new();
        let worker = Worker::new(key.clone(), 100, 50, store.clone(), manager, cancel);

        let handle = tokio::spawn(worker.run());
        tokio::time::advance(Duration::from_millis(250)).await;

        let exit = handle.await.expect("worker must not panic");
        assert_eq!(exit, WorkerExit::Normal);
        assert!(!store.member(&key));
    }

    #[tokio::test(start_paused = true)]
    async fn shuts_down_on_cancellation_without_deleting_the_record() {
        let store = Store::new();
        let key = CacheKey::from("HEL");
        let recipe = wrap(Arc::new(1i32), FaultPolicy::AlwaysSucceed);
        store.insert_new(key.clone(), recipe, next_tick());

        let manager = test_manager();
        let cancel = CancellationToken::new();
        let worker = Worker::new(key.clone(), 10_000, 50, store.clone(), manager, cancel.clone());

        let handle = tokio::spawn(worker.run());
        tokio::time::advance(Duration::from_millis(10)).await;
        cancel.cancel();

        let exit = handle.await.expect("worker must not panic");
        assert_eq!(exit, WorkerExit::Shutdown);
        assert!(store.member(&key), "shutdown must not delete the record");
    }

    #[tokio::test(start_paused = true)]
    async fn refreshes_and_resets_ttl_window_when_store_lands_mid_window() {
        let store = Store::new();
        let key = CacheKey::from("HEL");
        let recipe = wrap(Arc::new(1i32), FaultPolicy::AlwaysSucceed);
        store.insert_new(key.clone(), recipe.clone(), next_tick());

        let manager = test_manager();
        let cancel = CancellationToken::new();
        let worker = Worker::new(key.clone(), 150, 50, store.clone(), manager, cancel.clone());
        let handle = tokio::spawn(worker.run());

        // One tick in, simulate a fresh store() landing.
        tokio::time::advance(Duration::from_millis(50)).await;
        store.upsert(key.clone(), recipe, next_tick());

        // Enough ticks to have expired the original window, but the
        // refreshed record should keep the worker alive.
        tokio::time::advance(Duration::from_millis(150)).await;
        assert!(store.member(&key), "record must survive due to mid-window refresh");

        cancel.cancel();
        let exit = handle.await.expect("worker must not panic");
        assert_eq!(exit, WorkerExit::Shutdown);
    }
}
