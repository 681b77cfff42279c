use thiserror::Error;

/// Errors surfaced by the public [`crate::SupervisionRoot::store`] operation.
///
/// `get` never fails with this type — a miss or an in-flight compute is a
/// normal outcome, represented by [`crate::GetOutcome`] instead.
#[derive(Debug, Error, Clone)]
pub enum CacheError {
    #[error("TTL too low. Should be greater than refresh_interval: {refresh_interval_ms}ms")]
    TtlTooLow { refresh_interval_ms: u64 },

    #[error("ttl_seconds must be positive, got {ttl_seconds}")]
    TtlNotPositive { ttl_seconds: f64 },

    #[error("installation of key failed: {reason}")]
    InstallationFailed { reason: String },

    #[error("cache manager is no longer running")]
    ManagerUnavailable,
}

pub type Result<T, E = CacheError> = std::result::Result<T, E>;
