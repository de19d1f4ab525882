//! Database session and datasource contracts
//!
//! These traits abstract the underlying data-access layer. The transaction
//! manager never builds SQL beyond savepoint and read-only statements; it
//! drives sessions through this interface and leaves query execution to the
//! ORM that implements it.

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::TxResult;
use crate::options::IsolationLevel;

/// Opaque handle to the ORM's higher-level access object for a session
pub type EntityManagerHandle = Arc<dyn Any + Send + Sync>;

/// A single stateful channel to the database.
///
/// A session is exclusively owned by one transaction context for its entire
/// lifetime: acquired, begun, committed or rolled back, then released.
#[async_trait]
pub trait Session: Send + Sync {
    /// Establish the underlying connection
    async fn connect(&mut self) -> TxResult<()>;

    /// Begin a transaction, optionally at the given isolation level
    async fn begin(&mut self, isolation: Option<IsolationLevel>) -> TxResult<()>;

    /// Commit the active transaction
    async fn commit(&mut self) -> TxResult<()>;

    /// Roll back the active transaction
    async fn rollback(&mut self) -> TxResult<()>;

    /// Return the session to its datasource
    async fn release(&mut self) -> TxResult<()>;

    /// Execute a raw statement and return the affected row count
    async fn execute(&mut self, statement: &str) -> TxResult<u64>;

    /// Whether the session currently reports an open transaction
    fn is_transaction_active(&self) -> bool;

    /// Whether the session has been returned to its datasource
    fn is_released(&self) -> bool;

    /// The ORM's entity-manager handle attached to this session, if any
    fn entity_manager(&self) -> Option<EntityManagerHandle> {
        None
    }
}

/// A source of database sessions, registered under a name in the metadata
/// registry.
#[async_trait]
pub trait Datasource: Send + Sync {
    /// The datasource name as registered
    fn name(&self) -> &str;

    /// Whether the datasource has completed initialisation
    fn is_initialized(&self) -> bool;

    /// Acquire a fresh session
    async fn create_session(&self) -> TxResult<Box<dyn Session>>;

    /// Tear down the datasource, destroying its sessions
    async fn close(&self) -> TxResult<()>;
}

/// Shared, lockable session handle as stored on a transaction context
pub type SessionHandle = Arc<tokio::sync::Mutex<Box<dyn Session>>>;
