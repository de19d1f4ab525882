//! Ambient context propagation
//!
//! Task-local storage binding the currently-executing asynchronous task to
//! at most one transaction context. The binding follows the task across
//! every await, which makes this the only cross-await correlation mechanism
//! in the crate; module-level mutable state would coalesce concurrent
//! transactions.

use std::future::Future;
use std::sync::Arc;

use super::TransactionContext;

tokio::task_local! {
    static CURRENT_CONTEXT: Option<Arc<TransactionContext>>;
}

/// The transaction context bound to the current task, if any.
///
/// Cheap and side-effect free; returns `None` outside any binding.
pub fn current() -> Option<Arc<TransactionContext>> {
    CURRENT_CONTEXT.try_with(|ctx| ctx.clone()).ok().flatten()
}

/// Run a future with `ctx` as the ambient context.
///
/// Every asynchronous continuation inside the future observes `ctx` from
/// [`current`], until the future completes. Nested bindings override within
/// their extent and the outer binding is restored afterwards.
pub async fn run_in<F>(ctx: Arc<TransactionContext>, fut: F) -> F::Output
where
    F: Future,
{
    CURRENT_CONTEXT.scope(Some(ctx), fut).await
}

/// Run a future with no ambient context, hiding any outer binding.
///
/// This is a true suspension for the full asynchronous extent of the
/// future, so database calls issued inside do not enrol in the surrounding
/// transaction.
pub async fn run_outside<F>(fut: F) -> F::Output
where
    F: Future,
{
    CURRENT_CONTEXT.scope(None, fut).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::testing::stub_context;

    #[tokio::test]
    async fn test_current_is_none_without_binding() {
        assert!(current().is_none());
    }

    #[tokio::test]
    async fn test_run_in_binds_across_awaits() {
        let ctx = stub_context();
        let id = ctx.context_id().to_string();

        let observed = run_in(ctx, async move {
            tokio::task::yield_now().await;
            current().map(|c| c.context_id().to_string())
        })
        .await;

        assert_eq!(observed, Some(id));
        assert!(current().is_none());
    }

    #[tokio::test]
    async fn test_nested_run_in_overrides_and_restores() {
        let outer = stub_context();
        let inner = stub_context();
        let outer_id = outer.context_id().to_string();
        let inner_id = inner.context_id().to_string();

        run_in(outer, async move {
            assert_eq!(
                current().map(|c| c.context_id().to_string()),
                Some(outer_id.clone())
            );

            run_in(inner, async {
                assert_eq!(
                    current().map(|c| c.context_id().to_string()),
                    Some(inner_id)
                );
            })
            .await;

            assert_eq!(
                current().map(|c| c.context_id().to_string()),
                Some(outer_id)
            );
        })
        .await;
    }

    #[tokio::test]
    async fn test_run_outside_hides_outer_binding() {
        let ctx = stub_context();
        let id = ctx.context_id().to_string();

        run_in(ctx, async move {
            run_outside(async {
                tokio::task::yield_now().await;
                assert!(current().is_none());
            })
            .await;

            assert_eq!(current().map(|c| c.context_id().to_string()), Some(id));
        })
        .await;
    }

    #[tokio::test]
    async fn test_concurrent_tasks_see_their_own_context() {
        let a = stub_context();
        let b = stub_context();
        let a_id = a.context_id().to_string();
        let b_id = b.context_id().to_string();

        let task_a = tokio::spawn(run_in(a, async move {
            tokio::task::yield_now().await;
            current().map(|c| c.context_id().to_string())
        }));
        let task_b = tokio::spawn(run_in(b, async move {
            tokio::task::yield_now().await;
            current().map(|c| c.context_id().to_string())
        }));

        let (seen_a, seen_b) = (task_a.await.unwrap(), task_b.await.unwrap());
        assert_eq!(seen_a, Some(a_id));
        assert_eq!(seen_b, Some(b_id));
    }
}
