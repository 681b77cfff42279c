// ============================================================================
// File: src/manager.rs
// ----------------------------------------------------------------------------
// The single coordinator. Modeled as an actor: a background task owning all
// mutable coordination state, reachable only through the cloneable
// `ManagerHandle` (an `mpsc::Sender`). Expensive per-request work (the Store
// upsert) is off-loaded to a spawned task — the "task pool" — so the actor's
// own `run` loop never blocks on it.
// ============================================================================

use std::any::Any;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::CacheError;
use crate::key::CacheKey;
use crate::producer::{self, FaultPolicy};
use crate::store::{next_tick, Store, UpsertOutcome};
use crate::supervisor::WorkerSupervisor;

/// Requests the Manager actor understands. `Store` carries a reply channel
/// so the caller can await the outcome; `Terminate` is fire-and-forget,
/// matching the spec's "asynchronous teardown request from an expiring
/// Worker."
pub enum ManagerMsg {
    Store {
        key: CacheKey,
        value: Arc<dyn Any + Send + Sync>,
        ttl_seconds: f64,
        reply: oneshot::Sender<Result<(), CacheError>>,
    },
    Terminate {
        key: CacheKey,
    },
}

/// What a spawned install task reports back to the Manager's own loop.
enum TaskOutcome {
    Updated {
        reply: oneshot::Sender<Result<(), CacheError>>,
    },
    New {
        key: CacheKey,
        ttl_ms: u64,
        reply: oneshot::Sender<Result<(), CacheError>>,
    },
}

/// Converts a TTL expressed in (possibly fractional) seconds into
/// milliseconds, truncating rather than rounding — matching
/// `sec_to_ms(1.5) == 1500` and `sec_to_ms(0.00015) == 0`.
pub fn sec_to_ms(seconds: f64) -> u64 {
    (seconds * 1000.0).trunc() as u64
}

/// Cheap-to-clone handle to the Manager actor. Held by [`crate::SupervisionRoot`]
/// and by every Worker (so a Worker can send `Terminate` on TTL expiry).
#[derive(Clone)]
pub struct ManagerHandle {
    tx: mpsc::Sender<ManagerMsg>,
}

impl ManagerHandle {
    /// Install `value` under `key` with the given TTL. Returns only after
    /// the recipe is visible in the Store — matches the spec's ordering
    /// guarantee that `store` publishes work, not a computed result.
    pub async fn store(
        &self,
        key: CacheKey,
        value: Arc<dyn Any + Send + Sync>,
        ttl_seconds: f64,
    ) -> Result<(), CacheError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(ManagerMsg::Store {
                key,
                value,
                ttl_seconds,
                reply: reply_tx,
            })
            .await
            .map_err(|_| CacheError::ManagerUnavailable)?;
        reply_rx
            .await
            .unwrap_or_else(|_| Err(CacheError::InstallationFailed {
                reason: "install task terminated before reporting an outcome".into(),
            }))
    }

    /// Ask the Manager to reap the Worker Supervisor for `key`. Fire and
    /// forget: the Worker sending this is already exiting and cannot wait
    /// for the round trip.
    pub async fn terminate(&self, key: CacheKey) {
        let _ = self.tx.send(ManagerMsg::Terminate { key }).await;
    }
}

/// The Manager's private state. Never touched outside `run` — that's what
/// "single-writer coordinator" means in practice.
struct Manager {
    store: Store,
    refresh_interval_ms: u64,
    cancel: CancellationToken,
    /// The "dynamic supervisor" and "name registry" from the spec, rolled
    /// into one map: at most one entry per live key, each pointing at the
    /// `JoinHandle` of that key's Worker Supervisor task.
    registry: DashMap<CacheKey, JoinHandle<()>>,
    self_handle: ManagerHandle,
    msg_rx: mpsc::Receiver<ManagerMsg>,
    task_tx: mpsc::Sender<TaskOutcome>,
    task_rx: mpsc::Receiver<TaskOutcome>,
}

/// Start the Manager actor and return a handle to it. The actor runs until
/// `cancel` fires.
pub fn spawn(store: Store, refresh_interval_ms: u64, cancel: CancellationToken) -> ManagerHandle {
    let (tx, msg_rx) = mpsc::channel(1024);
    let (task_tx, task_rx) = mpsc::channel(1024);
    let self_handle = ManagerHandle { tx };

    let manager = Manager {
        store,
        refresh_interval_ms,
        cancel,
        registry: DashMap::new(),
        self_handle: self_handle.clone(),
        msg_rx,
        task_tx,
        task_rx,
    };

    tokio::spawn(manager.run());
    self_handle
}

impl Manager {
    async fn run(mut self) {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("manager shutting down");
                    break;
                }
                msg = self.msg_rx.recv() => {
                    match msg {
                        Some(msg) => self.handle_msg(msg).await,
                        None => break,
                    }
                }
                outcome = self.task_rx.recv() => {
                    match outcome {
                        Some(outcome) => self.handle_task_outcome(outcome),
                        None => break,
                    }
                }
            }
        }
    }

    async fn handle_msg(&mut self, msg: ManagerMsg) {
        match msg {
            ManagerMsg::Store {
                key,
                value,
                ttl_seconds,
                reply,
            } => self.handle_store(key, value, ttl_seconds, reply),
            ManagerMsg::Terminate { key } => self.handle_terminate(key),
        }
    }

    fn handle_store(
        &mut self,
        key: CacheKey,
        value: Arc<dyn Any + Send + Sync>,
        ttl_seconds: f64,
        reply: oneshot::Sender<Result<(), CacheError>>,
    ) {
        if !(ttl_seconds > 0.0) {
            let _ = reply.send(Err(CacheError::TtlNotPositive { ttl_seconds }));
            return;
        }

        let ttl_ms = sec_to_ms(ttl_seconds);
        if ttl_ms <= self.refresh_interval_ms {
            let _ = reply.send(Err(CacheError::TtlTooLow {
                refresh_interval_ms: self.refresh_interval_ms,
            }));
            return;
        }

        let recipe = producer::wrap(value, FaultPolicy::AlwaysSucceed);
        let store = self.store.clone();
        let task_tx = self.task_tx.clone();
        let task_key = key.clone();

        // Task pool: off-load the Store mutation so the actor's own loop
        // never blocks on it.
        tokio::spawn(async move {
            let outcome = store.upsert(task_key.clone(), recipe, next_tick());
            let task_outcome = match outcome {
                UpsertOutcome::Updated => TaskOutcome::Updated { reply },
                UpsertOutcome::Inserted => TaskOutcome::New {
                    key: task_key,
                    ttl_ms,
                    reply,
                },
            };
            let _ = task_tx.send(task_outcome).await;
        });
    }

    fn handle_task_outcome(&mut self, outcome: TaskOutcome) {
        match outcome {
            TaskOutcome::Updated { reply } => {
                let _ = reply.send(Ok(()));
            }
            TaskOutcome::New { key, ttl_ms, reply } => {
                let _ = reply.send(Ok(()));
                self.start_supervisor(key, ttl_ms);
            }
        }
    }

    fn start_supervisor(&mut self, key: CacheKey, ttl_ms: u64) {
        debug!(%key, ttl_ms, "first sighting of key, starting worker supervisor");
        let supervisor = WorkerSupervisor::new(
            key.clone(),
            ttl_ms,
            self.refresh_interval_ms,
            self.store.clone(),
            self.self_handle.clone(),
            self.cancel.clone(),
        );
        let handle = tokio::spawn(supervisor.run());
        self.registry.insert(key, handle);
    }

    fn handle_terminate(&mut self, key: CacheKey) {
        debug!(%key, "reaping worker supervisor for reclaimed key");
        self.registry.remove(&key);
    }
}
