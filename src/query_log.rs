//! Query log adapter
//!
//! Forwards the ORM's query, slow-query, schema and migration events to the
//! application logger. The enabled flag is captured at construction so the
//! hot path is a single branch when logging is off.

use serde_json::Value as JsonValue;
use tracing::{debug, error, info, warn};

const DEFAULT_SLOW_QUERY_THRESHOLD_MS: u64 = 1_000;

/// Pass-through adapter from ORM events to `tracing`
#[derive(Debug, Clone)]
pub struct QueryLogger {
    enabled: bool,
    slow_query_threshold_ms: u64,
}

impl QueryLogger {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            slow_query_threshold_ms: DEFAULT_SLOW_QUERY_THRESHOLD_MS,
        }
    }

    pub fn with_slow_query_threshold(mut self, threshold_ms: u64) -> Self {
        self.slow_query_threshold_ms = threshold_ms;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether a duration crosses the slow-query threshold
    pub fn is_slow(&self, duration_ms: u64) -> bool {
        duration_ms >= self.slow_query_threshold_ms
    }

    /// A completed query; promoted to a slow-query warning past the
    /// threshold
    pub fn query(&self, sql: &str, params: Option<&[JsonValue]>, duration_ms: u64) {
        if !self.enabled {
            return;
        }
        if self.is_slow(duration_ms) {
            self.slow_query(sql, params, duration_ms);
        } else {
            debug!(duration_ms, params = ?params, "query: {}", sql);
        }
    }

    pub fn slow_query(&self, sql: &str, params: Option<&[JsonValue]>, duration_ms: u64) {
        if !self.enabled {
            return;
        }
        warn!(duration_ms, params = ?params, "slow query: {}", sql);
    }

    pub fn query_error(&self, sql: &str, message: &str) {
        if !self.enabled {
            return;
        }
        error!("query failed: {} ({})", sql, message);
    }

    pub fn schema_build(&self, message: &str) {
        if !self.enabled {
            return;
        }
        info!("schema: {}", message);
    }

    pub fn migration(&self, message: &str) {
        if !self.enabled {
            return;
        }
        info!("migration: {}", message);
    }
}
