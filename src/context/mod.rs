//! Transaction context
//!
//! The per-transaction record binding one logical transaction to one
//! database session, its effective options and its savepoint stack.

pub mod registry;
pub mod store;

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use crate::options::TransactionOptions;
use crate::session::{Datasource, EntityManagerHandle, Session, SessionHandle};

static CONTEXT_SEQ: AtomicU64 = AtomicU64::new(0);

fn generate_context_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let seq = CONTEXT_SEQ.fetch_add(1, Ordering::Relaxed);
    let salt: u16 = rand::random();
    format!("tx_{}_{}_{:04x}", millis, seq, salt)
}

/// The per-transaction record.
///
/// A context exclusively owns its session for its entire lifetime. Nested
/// scopes share the context and mark their extent with savepoints.
pub struct TransactionContext {
    context_id: String,
    session: SessionHandle,
    entity_manager: Option<EntityManagerHandle>,
    datasource: Arc<dyn Datasource>,
    options: TransactionOptions,
    started_at: Instant,
    start_time_ms: u64,
    parent: Option<Weak<TransactionContext>>,
    savepoints: Mutex<Vec<String>>,
    savepoint_seq: AtomicU32,
    base_depth: u32,
    active: AtomicBool,
}

impl TransactionContext {
    /// Compose a context around a freshly acquired session.
    ///
    /// The entity-manager handle is captured here, while the session is
    /// still exclusively held, so ambient lookups never need the lock.
    pub fn new(
        session: Box<dyn Session>,
        datasource: Arc<dyn Datasource>,
        options: TransactionOptions,
        parent: Option<&Arc<TransactionContext>>,
    ) -> Self {
        let entity_manager = session.entity_manager();
        let base_depth = parent.map(|p| p.depth() + 1).unwrap_or(0);
        Self {
            context_id: generate_context_id(),
            session: Arc::new(tokio::sync::Mutex::new(session)),
            entity_manager,
            datasource,
            options,
            started_at: Instant::now(),
            start_time_ms: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or_default(),
            parent: parent.map(Arc::downgrade),
            savepoints: Mutex::new(Vec::new()),
            savepoint_seq: AtomicU32::new(0),
            base_depth,
            active: AtomicBool::new(false),
        }
    }

    pub fn context_id(&self) -> &str {
        &self.context_id
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    pub fn entity_manager(&self) -> Option<EntityManagerHandle> {
        self.entity_manager.clone()
    }

    pub fn datasource(&self) -> Arc<dyn Datasource> {
        self.datasource.clone()
    }

    pub fn options(&self) -> &TransactionOptions {
        &self.options
    }

    /// Wall-clock creation time in milliseconds since the Unix epoch
    pub fn start_time_ms(&self) -> u64 {
        self.start_time_ms
    }

    /// Milliseconds elapsed since the context was created
    pub fn elapsed_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }

    pub fn parent(&self) -> Option<Arc<TransactionContext>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    /// Current nesting depth: the creation depth plus one per outstanding
    /// savepoint scope
    pub fn depth(&self) -> u32 {
        let outstanding = self
            .savepoints
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len() as u32;
        self.base_depth + outstanding
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Release);
    }

    /// Next deterministic savepoint name for this context.
    ///
    /// The sequence is monotonic per context, so a released savepoint's
    /// name is never reissued within the same transaction.
    pub fn next_savepoint_name(&self) -> String {
        let seq = self.savepoint_seq.fetch_add(1, Ordering::Relaxed);
        format!("sp_{}_{}", self.context_id, seq)
    }

    pub fn push_savepoint(&self, name: &str) {
        self.savepoints
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(name.to_string());
    }

    /// Remove a released savepoint from the stack; later entries remain
    pub fn release_savepoint(&self, name: &str) {
        let mut savepoints = self.savepoints.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(position) = savepoints.iter().position(|sp| sp == name) {
            savepoints.remove(position);
        }
    }

    /// Truncate the stack at a savepoint that was rolled back to.
    ///
    /// Rolling back to a savepoint invalidates it and every savepoint
    /// created after it.
    pub fn rollback_savepoint(&self, name: &str) {
        let mut savepoints = self.savepoints.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(position) = savepoints.iter().position(|sp| sp == name) {
            savepoints.truncate(position);
        }
    }

    pub fn savepoint_count(&self) -> usize {
        self.savepoints
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::error::TxResult;
    use crate::options::IsolationLevel;
    use async_trait::async_trait;

    pub(crate) struct StubSession {
        pub tx_active: bool,
        pub released: bool,
    }

    impl StubSession {
        pub(crate) fn new() -> Self {
            Self {
                tx_active: false,
                released: false,
            }
        }
    }

    #[async_trait]
    impl Session for StubSession {
        async fn connect(&mut self) -> TxResult<()> {
            Ok(())
        }

        async fn begin(&mut self, _isolation: Option<IsolationLevel>) -> TxResult<()> {
            self.tx_active = true;
            Ok(())
        }

        async fn commit(&mut self) -> TxResult<()> {
            self.tx_active = false;
            Ok(())
        }

        async fn rollback(&mut self) -> TxResult<()> {
            self.tx_active = false;
            Ok(())
        }

        async fn release(&mut self) -> TxResult<()> {
            self.released = true;
            Ok(())
        }

        async fn execute(&mut self, _statement: &str) -> TxResult<u64> {
            Ok(0)
        }

        fn is_transaction_active(&self) -> bool {
            self.tx_active
        }

        fn is_released(&self) -> bool {
            self.released
        }
    }

    pub(crate) struct StubDatasource {
        pub name: String,
    }

    #[async_trait]
    impl Datasource for StubDatasource {
        fn name(&self) -> &str {
            &self.name
        }

        fn is_initialized(&self) -> bool {
            true
        }

        async fn create_session(&self) -> TxResult<Box<dyn Session>> {
            Ok(Box::new(StubSession::new()))
        }

        async fn close(&self) -> TxResult<()> {
            Ok(())
        }
    }

    pub(crate) fn stub_context() -> Arc<TransactionContext> {
        let datasource = Arc::new(StubDatasource {
            name: "stub".to_string(),
        });
        Arc::new(TransactionContext::new(
            Box::new(StubSession::new()),
            datasource,
            TransactionOptions::default(),
            None,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::testing::stub_context;
    use super::*;

    #[test]
    fn test_context_ids_are_unique() {
        let a = stub_context();
        let b = stub_context();
        assert_ne!(a.context_id(), b.context_id());
        assert!(a.context_id().starts_with("tx_"));
    }

    #[test]
    fn test_root_context_shape() {
        let ctx = stub_context();
        assert_eq!(ctx.depth(), 0);
        assert!(ctx.parent().is_none());
        assert!(!ctx.is_active());
        assert_eq!(ctx.savepoint_count(), 0);
        assert!(ctx.start_time_ms() > 0);
    }

    #[test]
    fn test_child_depth_follows_parent() {
        let parent = stub_context();
        let child = TransactionContext::new(
            Box::new(testing::StubSession::new()),
            parent.datasource(),
            TransactionOptions::default(),
            Some(&parent),
        );
        assert_eq!(child.depth(), 1);
        assert!(child.parent().is_some());
    }

    #[test]
    fn test_savepoint_names_never_repeat() {
        let ctx = stub_context();
        let first = ctx.next_savepoint_name();
        ctx.push_savepoint(&first);
        ctx.release_savepoint(&first);

        let second = ctx.next_savepoint_name();
        assert_ne!(first, second);
        assert!(first.ends_with("_0"));
        assert!(second.ends_with("_1"));
    }

    #[test]
    fn test_release_removes_only_named_entry() {
        let ctx = stub_context();
        let a = ctx.next_savepoint_name();
        let b = ctx.next_savepoint_name();
        ctx.push_savepoint(&a);
        ctx.push_savepoint(&b);

        ctx.release_savepoint(&a);
        assert_eq!(ctx.savepoint_count(), 1);
        assert_eq!(ctx.depth(), 1);
    }

    #[test]
    fn test_rollback_truncates_later_entries() {
        let ctx = stub_context();
        let a = ctx.next_savepoint_name();
        let b = ctx.next_savepoint_name();
        let c = ctx.next_savepoint_name();
        ctx.push_savepoint(&a);
        ctx.push_savepoint(&b);
        ctx.push_savepoint(&c);
        assert_eq!(ctx.depth(), 3);

        ctx.rollback_savepoint(&b);
        assert_eq!(ctx.savepoint_count(), 1);
        assert_eq!(ctx.depth(), 1);
    }

    #[test]
    fn test_active_flag_transitions() {
        let ctx = stub_context();
        ctx.set_active(true);
        assert!(ctx.is_active());
        ctx.set_active(false);
        assert!(!ctx.is_active());
    }
}
