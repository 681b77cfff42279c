// ============================================================================
// File: src/producer.rs
// ----------------------------------------------------------------------------
// The Producer Adapter: wraps a caller-supplied value into a deferred,
// zero-argument computation (a "recipe") that a Worker invokes on each
// refresh tick.
//
// Follows the teacher's "AsyncTask, never `async fn` in the trait" idiom
// (see `backends::ExecutionBackend::execute_code`): `Recipe::invoke` returns
// a `tokio::task::JoinHandle` rather than being an `async fn` itself, so a
// panicking recipe body surfaces to the caller as `Err(JoinError)` instead
// of unwinding across a trait-object boundary.
// ============================================================================

use std::any::Any;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

/// What a recipe produced on a single invocation.
#[derive(Clone)]
pub enum RecipeOutcome {
    Ok(Arc<dyn Any + Send + Sync>),
    Err(String),
}

/// A deferred, zero-argument computation. Production adapters implement
/// this directly to substitute the real, expensive computation; the cache
/// core only ever calls `invoke` and never inspects how the outcome was
/// produced.
pub trait Recipe: Send + Sync {
    fn invoke(&self) -> JoinHandle<RecipeOutcome>;
}

/// Governs how [`ValueRecipe`] behaves on each invocation. Only meaningful
/// for the default adapter built by [`wrap`] — a real production `Recipe`
/// impl is free to ignore this entirely.
#[derive(Debug, Clone)]
pub enum FaultPolicy {
    /// Always succeeds, optionally after a bounded simulated compute delay.
    AlwaysSucceed,
    /// Sleeps a duration drawn uniformly from `[min, max]` before
    /// succeeding — for exercising the "busy" window before first success.
    SimulatedLatency { min: Duration, max: Duration },
    /// Panics on the first `remaining` invocations, then succeeds forever
    /// after. Used to exercise crash isolation (a recipe that raises once
    /// and recovers on retry).
    RaiseThenSucceed { remaining: u32 },
    /// Returns `RecipeOutcome::Err` with probability `rate` (0.0..=1.0),
    /// succeeding otherwise.
    IntermittentError { rate: f64 },
}

/// The default Producer Adapter: a fixed, already-computed value, replayed
/// on every invocation according to a [`FaultPolicy`]. This is the "wrap a
/// caller-supplied value" case from the spec — a mock/test-mode adapter
/// would compose a different `FaultPolicy`; a production adapter would
/// implement [`Recipe`] directly instead of using `ValueRecipe` at all.
pub struct ValueRecipe {
    value: Arc<dyn Any + Send + Sync>,
    policy: FaultPolicy,
    invocations: AtomicU32,
}

impl Recipe for ValueRecipe {
    fn invoke(&self) -> JoinHandle<RecipeOutcome> {
        let value = Arc::clone(&self.value);
        let policy = self.policy.clone();
        let attempt = self.invocations.fetch_add(1, Ordering::SeqCst);

        tokio::spawn(async move {
            match policy {
                FaultPolicy::AlwaysSucceed => RecipeOutcome::Ok(value),
                FaultPolicy::SimulatedLatency { min, max } => {
                    let millis = if max > min {
                        min.as_millis() as u64
                            + fastrand::u64(0..=(max - min).as_millis() as u64)
                    } else {
                        min.as_millis() as u64
                    };
                    tokio::time::sleep(Duration::from_millis(millis)).await;
                    RecipeOutcome::Ok(value)
                }
                FaultPolicy::RaiseThenSucceed { remaining } => {
                    if attempt < remaining {
                        panic!("recipe raised on invocation {attempt} (simulated fault)");
                    }
                    RecipeOutcome::Ok(value)
                }
                FaultPolicy::IntermittentError { rate } => {
                    if fastrand::f64() < rate {
                        RecipeOutcome::Err(format!("simulated recoverable error on invocation {attempt}"))
                    } else {
                        RecipeOutcome::Ok(value)
                    }
                }
            }
        })
    }
}

/// Wrap a caller-supplied value into a recipe. Capture is by value — the
/// caller hands over an owned `Arc`, so mutations to whatever the caller
/// derived that `Arc` from can never become visible through the recipe:
/// snapshot semantics fall out of ordinary `Arc` ownership.
pub fn wrap(value: Arc<dyn Any + Send + Sync>, policy: FaultPolicy) -> Arc<dyn Recipe> {
    Arc::new(ValueRecipe {
        value,
        policy,
        invocations: AtomicU32::new(0),
    })
}
