//! An in-process, self-rehydrating key/value cache.
//!
//! Every stored key gets its own supervised Worker that wakes on a fixed
//! interval, invokes the caller-supplied recipe again once its TTL window
//! has passed with no new writes, and deletes the key outright once a full
//! TTL window passes with no writes at all. Reads never block on a Worker
//! and never touch the coordinating actor: [`SupervisionRoot::get`] is a
//! direct, wait-free lookup against the shared [`Store`].
//!
//! ```no_run
//! use std::sync::Arc;
//! use rehydrate::{Config, GetOutcome, SupervisionRoot};
//!
//! # async fn run() {
//! let root = SupervisionRoot::new(Config::default());
//! root.store("greeting", Arc::new("hello".to_string()), 30.0).await.unwrap();
//!
//! match root.get("greeting") {
//!     GetOutcome::Ready(value) => println!("{}", value.downcast_ref::<String>().unwrap()),
//!     GetOutcome::Busy => println!("still computing"),
//!     GetOutcome::Unknown => println!("no such key"),
//! }
//! # }
//! ```

mod config;
mod error;
mod key;
mod manager;
mod producer;
mod root;
mod store;
mod supervisor;
mod worker;

pub use config::{global_config, init_global_config, Config};
pub use error::CacheError;
pub use key::CacheKey;
pub use producer::{FaultPolicy, Recipe, RecipeOutcome};
pub use root::{GetOutcome, SupervisionRoot, DEFAULT_TTL_SECONDS};
pub use store::Status;
