//! Global transaction manager surface
//!
//! Owns the process-wide configuration, statistics, live-context registry
//! and the stale-context reclaimer task, and exposes the ambient helpers
//! that read the current transaction context.

use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use once_cell::sync::Lazy;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::{ConfigUpdate, ManagerConfig};
use crate::context::registry::ContextRegistry;
use crate::context::store;
use crate::metadata;
use crate::options::TransactionOptions;
use crate::session::{Datasource, EntityManagerHandle, SessionHandle};
use crate::stats::{StatsSnapshot, TransactionStats};

static CONFIG: Lazy<RwLock<ManagerConfig>> = Lazy::new(|| RwLock::new(ManagerConfig::default()));
static STATS: Lazy<TransactionStats> = Lazy::new(TransactionStats::new);
static REGISTRY: Lazy<ContextRegistry> = Lazy::new(ContextRegistry::new);
static CLEANUP_TASK: Lazy<Mutex<Option<JoinHandle<()>>>> = Lazy::new(|| Mutex::new(None));

pub(crate) fn config_snapshot() -> ManagerConfig {
    CONFIG.read().unwrap_or_else(|e| e.into_inner()).clone()
}

pub(crate) fn registry() -> &'static ContextRegistry {
    &REGISTRY
}

/// Record one finished transactional call; a no-op while statistics are
/// disabled.
pub(crate) fn record_call(duration_ms: u64, success: bool) {
    if config_snapshot().enable_stats {
        STATS.update(duration_ms, success);
    }
}

/// Start the reclaimer loop if it is not running and a runtime is available
pub(crate) fn ensure_cleanup_task() {
    let mut task = CLEANUP_TASK.lock().unwrap_or_else(|e| e.into_inner());
    if task.is_some() {
        return;
    }
    if tokio::runtime::Handle::try_current().is_err() {
        return;
    }
    *task = Some(spawn_cleanup_loop());
}

fn spawn_cleanup_loop() -> JoinHandle<()> {
    tokio::spawn(async {
        loop {
            let (interval_ms, max_age_ms) = {
                let config = config_snapshot();
                (config.cleanup_interval_ms, config.max_context_age_ms)
            };
            tokio::time::sleep(Duration::from_millis(interval_ms)).await;
            let reclaimed = REGISTRY.reclaim_expired(max_age_ms).await;
            if reclaimed > 0 {
                info!("Context reclaimer removed {} stale context(s)", reclaimed);
            }
        }
    })
}

#[cfg(test)]
pub(crate) fn replace_config(config: ManagerConfig) {
    *CONFIG.write().unwrap_or_else(|e| e.into_inner()) = config;
}

/// Connection-pool status for the current context's datasource
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolStatus {
    pub initialized: bool,
    pub has_metadata: bool,
}

/// Process-wide transaction manager facade
pub struct TransactionManager;

impl TransactionManager {
    /// Merge a partial configuration into the global config.
    ///
    /// Changing the cleanup interval restarts the reclaimer so the new
    /// cadence applies immediately.
    pub fn configure(update: ConfigUpdate) {
        debug!("Applying transaction manager configuration: {:?}", update);
        let interval_changed = update.cleanup_interval_ms.is_some();
        {
            let mut config = CONFIG.write().unwrap_or_else(|e| e.into_inner());
            config.apply(&update);
        }
        if interval_changed {
            Self::stop_cleanup();
            ensure_cleanup_task();
        }
    }

    /// Read-only snapshot of the global configuration
    pub fn get_config() -> ManagerConfig {
        config_snapshot()
    }

    /// Snapshot of the collected statistics
    pub fn get_stats() -> StatsSnapshot {
        STATS.snapshot()
    }

    /// Clear all statistics counters
    pub fn reset_stats() {
        STATS.reset();
    }

    /// Stop the stale-context reclaimer; it restarts lazily with the next
    /// transactional call.
    pub fn stop_cleanup() {
        let handle = CLEANUP_TASK
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }

    /// Number of live transaction contexts
    pub fn live_context_count() -> usize {
        REGISTRY.len()
    }

    /// Ids of all live transaction contexts, for diagnostics
    pub fn live_context_ids() -> Vec<String> {
        REGISTRY.context_ids()
    }

    /// Pool status for the current context's datasource, or `None` outside
    /// any transaction
    pub fn get_connection_pool_status() -> Option<PoolStatus> {
        let ctx = store::current()?;
        let datasource = ctx.datasource();
        Some(PoolStatus {
            initialized: datasource.is_initialized(),
            has_metadata: metadata::get_metadata(&ctx.options().datasource_name).is_some(),
        })
    }
}

/// Session handle of the current transaction, or `None` outside one
pub fn current_session() -> Option<SessionHandle> {
    store::current().map(|ctx| ctx.session().clone())
}

/// Entity-manager handle attached to the current session, if any
pub fn current_entity_manager() -> Option<EntityManagerHandle> {
    store::current().and_then(|ctx| ctx.entity_manager())
}

/// Datasource owning the current transaction's session
pub fn current_datasource() -> Option<Arc<dyn Datasource>> {
    store::current().map(|ctx| ctx.datasource())
}

/// Effective options of the current transaction
pub fn current_options() -> Option<TransactionOptions> {
    store::current().map(|ctx| ctx.options().clone())
}

/// Wall-clock start time of the current transaction, in epoch milliseconds
pub fn current_start_time() -> Option<u64> {
    store::current().map(|ctx| ctx.start_time_ms())
}

/// Milliseconds the current transaction has been running
pub fn current_duration() -> Option<u64> {
    store::current().map(|ctx| ctx.elapsed_ms())
}

/// Context id of the current transaction
pub fn current_context_id() -> Option<String> {
    store::current().map(|ctx| ctx.context_id().to_string())
}

/// Whether the calling task runs inside a transaction
pub fn in_transaction() -> bool {
    store::current().is_some()
}
