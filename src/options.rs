//! Per-call transaction options
//!
//! Provides isolation levels, propagation modes, lifecycle hooks and the
//! option set merged with the global configuration before each
//! transactional call.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::ManagerConfig;
use crate::error::TxResult;
use crate::metadata::DEFAULT_DATASOURCE_NAME;

/// Isolation level applied when a transaction begins.
///
/// The enum variant is the canonical form throughout the crate;
/// [`IsolationLevel::as_sql`] yields the spelling drivers expect in
/// `SET TRANSACTION` statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IsolationLevel {
    /// Statements may observe rows other transactions have not committed
    ReadUncommitted,
    /// Each statement sees only data committed before it started
    ReadCommitted,
    /// Rows read once return the same values for the whole transaction
    RepeatableRead,
    /// The outcome is as if all transactions ran one after another
    Serializable,
}

impl IsolationLevel {
    /// Spaced SQL spelling passed through to the driver
    pub fn as_sql(&self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

/// Propagation policy applied when a transactional call observes (or does
/// not observe) an ambient transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Propagation {
    /// Join the ambient transaction, or create one when none exists
    Required,
    /// Always create a new transaction; an ambient one stays open alongside
    RequiresNew,
    /// Join the ambient transaction when present, otherwise run plain
    Supports,
    /// Run outside any transaction; an ambient one is hidden for the call
    NotSupported,
    /// Reject the call when an ambient transaction exists
    Never,
    /// Reject the call when no ambient transaction exists
    Mandatory,
    /// Run in a savepoint-backed scope of the ambient transaction, or create
    /// a new transaction when none exists
    Nested,
}

impl Default for Propagation {
    fn default() -> Self {
        Propagation::Required
    }
}

/// Boxed future returned by hook callbacks
pub type HookFuture = Pin<Box<dyn Future<Output = TxResult<()>> + Send>>;

/// A lifecycle hook callback
pub type Hook = Arc<dyn Fn() -> HookFuture + Send + Sync>;

/// Lifecycle hooks fired around commit and rollback.
///
/// `before_commit` fires once the transaction has begun, before the wrapped
/// body runs; its failure aborts the call and takes the rollback path. The
/// three remaining hooks are observational: their failures are logged and
/// swallowed.
#[derive(Clone, Default)]
pub struct TransactionHooks {
    pub before_commit: Option<Hook>,
    pub after_commit: Option<Hook>,
    pub before_rollback: Option<Hook>,
    pub after_rollback: Option<Hook>,
}

impl TransactionHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_before_commit<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TxResult<()>> + Send + 'static,
    {
        self.before_commit = Some(Arc::new(move || Box::pin(hook())));
        self
    }

    pub fn on_after_commit<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TxResult<()>> + Send + 'static,
    {
        self.after_commit = Some(Arc::new(move || Box::pin(hook())));
        self
    }

    pub fn on_before_rollback<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TxResult<()>> + Send + 'static,
    {
        self.before_rollback = Some(Arc::new(move || Box::pin(hook())));
        self
    }

    pub fn on_after_rollback<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TxResult<()>> + Send + 'static,
    {
        self.after_rollback = Some(Arc::new(move || Box::pin(hook())));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.before_commit.is_none()
            && self.after_commit.is_none()
            && self.before_rollback.is_none()
            && self.after_rollback.is_none()
    }
}

impl std::fmt::Debug for TransactionHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionHooks")
            .field("before_commit", &self.before_commit.as_ref().map(|_| "<hook>"))
            .field("after_commit", &self.after_commit.as_ref().map(|_| "<hook>"))
            .field("before_rollback", &self.before_rollback.as_ref().map(|_| "<hook>"))
            .field("after_rollback", &self.after_rollback.as_ref().map(|_| "<hook>"))
            .finish()
    }
}

/// Options for a single transactional call
#[derive(Debug, Clone)]
pub struct TransactionOptions {
    /// Transaction isolation level; unset uses the database default
    pub isolation: Option<IsolationLevel>,
    /// Per-call timeout in milliseconds
    pub timeout_ms: Option<u64>,
    /// Whether the transaction is read-only
    pub read_only: bool,
    /// Propagation policy
    pub propagation: Propagation,
    /// Name of the registered datasource to run against
    pub datasource_name: String,
    /// Lifecycle hooks
    pub hooks: TransactionHooks,
    /// Free-form label used in logs and diagnostics
    pub name: Option<String>,
}

impl Default for TransactionOptions {
    fn default() -> Self {
        Self {
            isolation: None,
            timeout_ms: None,
            read_only: false,
            propagation: Propagation::Required,
            datasource_name: DEFAULT_DATASOURCE_NAME.to_string(),
            hooks: TransactionHooks::default(),
            name: None,
        }
    }
}

impl TransactionOptions {
    /// Fill unset fields from the global configuration.
    ///
    /// Only `isolation` and `timeout_ms` take global defaults; all other
    /// fields already carry their own.
    pub fn effective(mut self, config: &ManagerConfig) -> Self {
        if self.isolation.is_none() {
            self.isolation = config.default_isolation;
        }
        if self.timeout_ms.is_none() {
            self.timeout_ms = config.default_timeout_ms;
        }
        self
    }

    /// Label used in logs: the configured name or the datasource name
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.datasource_name)
    }
}
