// ============================================================================
// File: src/store.rs
// ----------------------------------------------------------------------------
// The shared table mapping key -> record.
//
// Built on `dashmap::DashMap`, the same lock-free-registry idiom the teacher
// uses for its plugin/tool registries: any number of readers and writers on
// distinct keys proceed without contention, and a single key's shard lock
// gives us the per-key atomic multi-field updates the spec requires.
// ============================================================================

use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::key::CacheKey;
use crate::producer::Recipe;

/// Whether a [`Record`] has ever been populated with a successfully
/// computed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Busy,
    Ready,
}

/// One entry in the [`Store`]. See the data model in SPEC_FULL.md — the
/// invariant `status == Ready` implies `value.is_some()` is upheld by every
/// mutator in this module; there is no path that sets one without the other.
pub struct Record {
    pub recipe: Arc<dyn Recipe>,
    pub value: Option<Arc<dyn Any + Send + Sync>>,
    pub timestamp: u64,
    pub status: Status,
}

/// Outcome of [`Store::upsert`] — which branch of the "try-update-else-insert"
/// idiom actually fired. The Manager uses `Inserted` as the signal to spawn a
/// new Worker Supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// Process-wide monotonic tick source. Every successful `store` draws the
/// next tick, giving the strictly-increasing `timestamp` the data model
/// requires without depending on wall-clock resolution.
static TICK: AtomicU64 = AtomicU64::new(0);

pub fn next_tick() -> u64 {
    TICK.fetch_add(1, Ordering::Relaxed) + 1
}

/// The shared table. Cheap to clone (an `Arc` around the map), so it can be
/// handed to the Manager, every Worker, and every embedder-facing handle
/// alike without any of them owning it exclusively.
#[derive(Clone, Default)]
pub struct Store {
    map: Arc<DashMap<CacheKey, Record>>,
}

impl Store {
    pub fn new() -> Self {
        Self {
            map: Arc::new(DashMap::new()),
        }
    }

    pub fn member(&self, key: &CacheKey) -> bool {
        self.map.contains_key(key)
    }

    pub fn status(&self, key: &CacheKey) -> Option<Status> {
        self.map.get(key).map(|r| r.status)
    }

    pub fn value(&self, key: &CacheKey) -> Option<Arc<dyn Any + Send + Sync>> {
        self.map.get(key).and_then(|r| r.value.clone())
    }

    pub fn timestamp(&self, key: &CacheKey) -> Option<u64> {
        self.map.get(key).map(|r| r.timestamp)
    }

    pub fn recipe(&self, key: &CacheKey) -> Option<Arc<dyn Recipe>> {
        self.map.get(key).map(|r| r.recipe.clone())
    }

    /// Atomic multi-field update. Every `Some` field is written under one
    /// shard lock; returns `false` without writing anything if `key` is
    /// absent.
    pub fn update_fields(
        &self,
        key: &CacheKey,
        recipe: Option<Arc<dyn Recipe>>,
        value: Option<Arc<dyn Any + Send + Sync>>,
        timestamp: Option<u64>,
        status: Option<Status>,
    ) -> bool {
        match self.map.get_mut(key) {
            Some(mut record) => {
                if let Some(recipe) = recipe {
                    record.recipe = recipe;
                }
                if let Some(value) = value {
                    record.value = Some(value);
                }
                if let Some(timestamp) = timestamp {
                    record.timestamp = timestamp;
                }
                if let Some(status) = status {
                    record.status = status;
                }
                true
            }
            None => false,
        }
    }

    /// Race-free replacement for the spec's two-step
    /// `update_fields`-else-`insert_new` idiom: a single atomic `entry()`
    /// call resolves the "does this key already have a Worker" question
    /// without a window where two concurrent `store` calls for a brand-new
    /// key could both observe "absent" and both try to insert. See
    /// DESIGN.md for the grounding.
    pub fn upsert(&self, key: CacheKey, recipe: Arc<dyn Recipe>, timestamp: u64) -> UpsertOutcome {
        match self.map.entry(key) {
            Entry::Occupied(mut entry) => {
                let record = entry.get_mut();
                record.recipe = recipe;
                record.timestamp = timestamp;
                UpsertOutcome::Updated
            }
            Entry::Vacant(entry) => {
                entry.insert(Record {
                    recipe,
                    value: None,
                    timestamp,
                    status: Status::Busy,
                });
                UpsertOutcome::Inserted
            }
        }
    }

    /// Unconditional insert, used directly only by tests that want to seed
    /// a Record without going through the Manager.
    pub fn insert_new(&self, key: CacheKey, recipe: Arc<dyn Recipe>, timestamp: u64) {
        self.map.insert(
            key,
            Record {
                recipe,
                value: None,
                timestamp,
                status: Status::Busy,
            },
        );
    }

    pub fn delete(&self, key: &CacheKey) -> bool {
        self.map.remove(key).is_some()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.map.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::producer::{wrap, FaultPolicy};

    fn dummy_recipe() -> Arc<dyn Recipe> {
        wrap(Arc::new(7i32), FaultPolicy::AlwaysSucceed)
    }

    #[test]
    fn upsert_inserts_once_then_updates() {
        let store = Store::new();
        let key = CacheKey::from("HEL");

        let first = store.upsert(key.clone(), dummy_recipe(), next_tick());
        assert_eq!(first, UpsertOutcome::Inserted);
        assert_eq!(store.status(&key), Some(Status::Busy));

        let t1 = store.timestamp(&key).unwrap();
        let second = store.upsert(key.clone(), dummy_recipe(), next_tick());
        assert_eq!(second, UpsertOutcome::Updated);
        let t2 = store.timestamp(&key).unwrap();
        assert!(t2 > t1, "timestamp must strictly increase across stores");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn update_fields_is_noop_on_absent_key() {
        let store = Store::new();
        let key = CacheKey::from("missing");
        let wrote = store.update_fields(&key, None, Some(Arc::new(1i32)), None, None);
        assert!(!wrote);
        assert!(!store.member(&key));
    }

    #[test]
    fn ready_implies_value_present() {
        let store = Store::new();
        let key = CacheKey::from("HEL");
        store.upsert(key.clone(), dummy_recipe(), next_tick());

        store.update_fields(&key, None, Some(Arc::new(99i32)), None, Some(Status::Ready));
        assert_eq!(store.status(&key), Some(Status::Ready));
        assert!(store.value(&key).is_some());
    }

    #[test]
    fn delete_removes_the_only_record_for_a_key() {
        let store = Store::new();
        let key = CacheKey::from("HEL");
        store.upsert(key.clone(), dummy_recipe(), next_tick());
        assert!(store.delete(&key));
        assert!(!store.member(&key));
        assert!(!store.delete(&key));
    }
}
