//! Configuration for the ledger subsystem.

use std::time::Duration;

use serde::Deserialize;

use crate::cache::DEFAULT_CACHE_TTL;

/// Tunables for the ledger: how long cached lists live and how long store
/// calls may wait on a locked database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Seconds a cached transaction list stays valid.
    pub cache_ttl_seconds: u64,
    /// Milliseconds a store call may wait on a locked database before the
    /// request fails.
    pub store_busy_timeout_ms: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            cache_ttl_seconds: DEFAULT_CACHE_TTL.as_secs(),
            store_busy_timeout_ms: 5_000,
        }
    }
}

impl LedgerConfig {
    /// The cache TTL as a [Duration].
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }

    /// The store busy timeout as a [Duration].
    pub fn store_busy_timeout(&self) -> Duration {
        Duration::from_millis(self.store_busy_timeout_ms)
    }
}

#[cfg(test)]
mod config_tests {
    use super::LedgerConfig;

    #[test]
    fn defaults_fill_missing_fields() {
        let config: LedgerConfig = serde_json::from_str("{}").unwrap();

        assert_eq!(config, LedgerConfig::default());
    }

    #[test]
    fn supplied_fields_override_defaults() {
        let config: LedgerConfig =
            serde_json::from_str(r#"{"cache_ttl_seconds": 60}"#).unwrap();

        assert_eq!(config.cache_ttl_seconds, 60);
        assert_eq!(
            config.store_busy_timeout_ms,
            LedgerConfig::default().store_busy_timeout_ms
        );
    }
}
