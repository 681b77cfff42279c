// ============================================================================
// File: src/config.rs
// ----------------------------------------------------------------------------
// Process-global, write-once startup configuration.
//
// Mirrors the teacher's `platform::PLATFORM_INFO` / `instance_manager`
// global-singleton convention: a `OnceLock` published exactly once at
// startup, read everywhere thereafter without further synchronization.
// ============================================================================

use std::sync::OnceLock;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Cadence at which every Worker wakes to re-evaluate its key, and the
/// divisor used to convert a TTL into a tick count. Read once at startup,
/// never reconfigured at runtime.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Config {
    pub refresh_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(4),
        }
    }
}

impl Config {
    pub fn refresh_interval_ms(&self) -> u64 {
        self.refresh_interval.as_millis() as u64
    }
}

static GLOBAL_CONFIG: OnceLock<Config> = OnceLock::new();

/// Initialize the process-global configuration. May only succeed once;
/// subsequent calls are rejected so a cache can't be silently reconfigured
/// underneath live Workers.
pub fn init_global_config(config: Config) -> Result<(), &'static str> {
    GLOBAL_CONFIG
        .set(config)
        .map_err(|_| "global config already initialized")
}

/// The process-global configuration, falling back to [`Config::default`]
/// if nothing called [`init_global_config`] yet.
pub fn global_config() -> &'static Config {
    GLOBAL_CONFIG.get_or_init(Config::default)
}
