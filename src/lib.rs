//! # txscope: Declarative transaction management for async data access
//!
//! Wraps asynchronous data-access code with transaction demarcation the way
//! an around-aspect would: each call declares its propagation mode,
//! isolation level, timeout and hooks, and the coordinator reuses, creates,
//! suspends or nests transactions accordingly.
//!
//! - `context/` - ambient transaction context, task-local store, live
//!   registry and stale-context reclamation
//! - `aspect` - the coordinator applied around every transactional call
//! - `session` - the contracts the underlying data-access layer implements
//! - `metadata` - named-datasource registry consumed by the aspect
//! - `bootstrap` - datasource configuration merge, validation and install
//! - `manager` - global configuration, statistics and ambient helpers
//! - `query_log` - forwards ORM query events to the application logger
//!
//! ## Example
//!
//! ```no_run
//! use txscope::{transactional, TransactionOptions, TxResult};
//!
//! async fn transfer(amount: i64) -> TxResult<i64> {
//!     transactional(TransactionOptions::default(), || async move {
//!         // queries issued here run on the transaction's session,
//!         // discoverable through txscope::current_session()
//!         Ok(amount)
//!     })
//!     .await
//! }
//! ```

pub mod aspect;
pub mod bootstrap;
pub mod config;
pub mod context;
pub mod error;
pub mod manager;
pub mod metadata;
pub mod options;
pub mod query_log;
pub mod session;
pub mod stats;



// Error handling
pub use error::{TxError, TxResult};

// Options and isolation
pub use options::{IsolationLevel, Propagation, TransactionHooks, TransactionOptions};

// The aspect
pub use aspect::{transactional, Transactional};

// Context
pub use context::TransactionContext;

// Global surface and ambient helpers
pub use config::{ConfigUpdate, ManagerConfig};
pub use manager::{
    current_context_id, current_datasource, current_duration, current_entity_manager,
    current_options, current_session, current_start_time, in_transaction, PoolStatus,
    TransactionManager,
};

// External collaborator contracts
pub use metadata::{
    datasource_names, get_metadata, register_datasource, remove_datasource, DatasourceMetadata,
    DEFAULT_DATASOURCE_NAME,
};
pub use session::{Datasource, EntityManagerHandle, Session, SessionHandle};

// Statistics
pub use stats::StatsSnapshot;

// Bootstrap and logging adapter
pub use bootstrap::{DatasourceConfig, DatasourcePlugin};
pub use query_log::QueryLogger;
