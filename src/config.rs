//! Global manager configuration
//!
//! Runtime-mutable defaults applied to every transactional call, plus the
//! reclaimer tuning knobs.

use serde::Serialize;

use crate::options::IsolationLevel;

/// Global configuration for the transaction manager
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManagerConfig {
    /// Default per-call timeout in milliseconds, filled into options that
    /// leave it unset
    pub default_timeout_ms: Option<u64>,
    /// Default isolation level, filled into options that leave it unset
    pub default_isolation: Option<IsolationLevel>,
    /// Maximum nested-scope depth before a NESTED call is rejected
    pub max_nested_depth: u32,
    /// Whether statistics are collected
    pub enable_stats: bool,
    /// Whether per-call debug logging is emitted
    pub enable_logging: bool,
    /// How often the stale-context reclaimer scans, in milliseconds
    pub cleanup_interval_ms: u64,
    /// Contexts older than this are forcibly rolled back and released,
    /// in milliseconds
    pub max_context_age_ms: u64,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: None,
            default_isolation: None,
            max_nested_depth: 10,
            enable_stats: true,
            enable_logging: false,
            cleanup_interval_ms: 5 * 60 * 1000,
            max_context_age_ms: 30 * 60 * 1000,
        }
    }
}

/// Partial configuration merged into the global config by `configure`
#[derive(Debug, Clone, Default)]
pub struct ConfigUpdate {
    pub default_timeout_ms: Option<u64>,
    pub default_isolation: Option<IsolationLevel>,
    pub max_nested_depth: Option<u32>,
    pub enable_stats: Option<bool>,
    pub enable_logging: Option<bool>,
    pub cleanup_interval_ms: Option<u64>,
    pub max_context_age_ms: Option<u64>,
}

impl ManagerConfig {
    /// Merge a partial update into this configuration
    pub fn apply(&mut self, update: &ConfigUpdate) {
        if let Some(timeout) = update.default_timeout_ms {
            self.default_timeout_ms = Some(timeout);
        }
        if let Some(isolation) = update.default_isolation {
            self.default_isolation = Some(isolation);
        }
        if let Some(depth) = update.max_nested_depth {
            self.max_nested_depth = depth;
        }
        if let Some(stats) = update.enable_stats {
            self.enable_stats = stats;
        }
        if let Some(logging) = update.enable_logging {
            self.enable_logging = logging;
        }
        if let Some(interval) = update.cleanup_interval_ms {
            self.cleanup_interval_ms = interval;
        }
        if let Some(age) = update.max_context_age_ms {
            self.max_context_age_ms = age;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ManagerConfig::default();
        assert!(config.default_timeout_ms.is_none());
        assert!(config.default_isolation.is_none());
        assert_eq!(config.max_nested_depth, 10);
        assert!(config.enable_stats);
        assert!(!config.enable_logging);
        assert_eq!(config.cleanup_interval_ms, 300_000);
        assert_eq!(config.max_context_age_ms, 1_800_000);
    }

    #[test]
    fn test_partial_merge() {
        let mut config = ManagerConfig::default();
        config.apply(&ConfigUpdate {
            default_timeout_ms: Some(2_000),
            max_nested_depth: Some(3),
            ..Default::default()
        });

        assert_eq!(config.default_timeout_ms, Some(2_000));
        assert_eq!(config.max_nested_depth, 3);
        // Untouched fields keep their values
        assert!(config.enable_stats);
        assert_eq!(config.cleanup_interval_ms, 300_000);
    }

    #[test]
    fn test_merge_is_cumulative() {
        let mut config = ManagerConfig::default();
        config.apply(&ConfigUpdate {
            enable_stats: Some(false),
            ..Default::default()
        });
        config.apply(&ConfigUpdate {
            default_isolation: Some(IsolationLevel::Serializable),
            ..Default::default()
        });

        assert!(!config.enable_stats);
        assert_eq!(config.default_isolation, Some(IsolationLevel::Serializable));
    }
}
