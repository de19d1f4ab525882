//! Live-context registry
//!
//! Process-wide mapping from context id to live contexts, used for leak
//! detection and forced reclamation of contexts older than the configured
//! age. Every context is removed no later than its final release.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::{error, warn};

use super::TransactionContext;

/// Registry of live transaction contexts
#[derive(Default)]
pub struct ContextRegistry {
    contexts: RwLock<HashMap<String, Arc<TransactionContext>>>,
}

impl ContextRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, ctx: Arc<TransactionContext>) {
        self.contexts
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(ctx.context_id().to_string(), ctx);
    }

    pub fn remove(&self, context_id: &str) -> Option<Arc<TransactionContext>> {
        self.contexts
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(context_id)
    }

    pub fn get(&self, context_id: &str) -> Option<Arc<TransactionContext>> {
        self.contexts
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(context_id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.contexts
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn context_ids(&self) -> Vec<String> {
        self.contexts
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect()
    }

    fn snapshot(&self) -> Vec<Arc<TransactionContext>> {
        self.contexts
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect()
    }

    /// Roll back, release and remove every context older than `max_age_ms`.
    ///
    /// Reclamation errors are logged, never surfaced. Returns the number of
    /// contexts reclaimed.
    pub async fn reclaim_expired(&self, max_age_ms: u64) -> usize {
        let stale: Vec<_> = self
            .snapshot()
            .into_iter()
            .filter(|ctx| ctx.elapsed_ms() > max_age_ms)
            .collect();

        let mut reclaimed = 0;
        for ctx in stale {
            warn!(
                "Reclaiming stale transaction context {} (age {}ms, datasource '{}')",
                ctx.context_id(),
                ctx.elapsed_ms(),
                ctx.options().datasource_name
            );
            reclaim_one(&ctx).await;
            self.remove(ctx.context_id());
            reclaimed += 1;
        }
        reclaimed
    }
}

async fn reclaim_one(ctx: &TransactionContext) {
    let mut session = ctx.session().lock().await;
    if session.is_transaction_active() {
        if let Err(e) = session.rollback().await {
            error!(
                "Failed to roll back stale context {}: {}",
                ctx.context_id(),
                e
            );
        }
    }
    if !session.is_released() {
        if let Err(e) = session.release().await {
            error!(
                "Failed to release session of stale context {}: {}",
                ctx.context_id(),
                e
            );
        }
    }
    ctx.set_active(false);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::testing::stub_context;

    #[test]
    fn test_insert_get_remove() {
        let registry = ContextRegistry::new();
        assert!(registry.is_empty());

        let ctx = stub_context();
        let id = ctx.context_id().to_string();
        registry.insert(ctx);

        assert_eq!(registry.len(), 1);
        assert!(registry.get(&id).is_some());
        assert!(registry.context_ids().contains(&id));

        assert!(registry.remove(&id).is_some());
        assert!(registry.get(&id).is_none());
        assert!(registry.remove(&id).is_none());
    }

    #[tokio::test]
    async fn test_reclaim_skips_fresh_contexts() {
        let registry = ContextRegistry::new();
        registry.insert(stub_context());

        let reclaimed = registry.reclaim_expired(60_000).await;
        assert_eq!(reclaimed, 0);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_reclaim_rolls_back_and_removes_stale_contexts() {
        let registry = ContextRegistry::new();
        let ctx = stub_context();
        let id = ctx.context_id().to_string();
        {
            let mut session = ctx.session().lock().await;
            session.begin(None).await.unwrap();
        }
        ctx.set_active(true);
        registry.insert(ctx.clone());

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let reclaimed = registry.reclaim_expired(1).await;

        assert_eq!(reclaimed, 1);
        assert!(registry.get(&id).is_none());
        assert!(!ctx.is_active());
        let session = ctx.session().lock().await;
        assert!(!session.is_transaction_active());
        assert!(session.is_released());
    }
}
