//! Transaction aspect
//!
//! The coordinator wrapped around every transactional call. It observes the
//! ambient context, applies the propagation policy, drives the session
//! lifecycle for new transactions, manages savepoint scopes for nested
//! calls, races the body against the configured timeout and keeps the
//! statistics current.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, warn};

use crate::config::ManagerConfig;
use crate::context::{store, TransactionContext};
use crate::error::{TxError, TxResult};
use crate::manager;
use crate::metadata;
use crate::options::{Hook, IsolationLevel, Propagation, TransactionHooks, TransactionOptions};

/// Execute `body` under the transaction semantics selected by `options`.
///
/// This is the around-advice applied to every transactional method: the
/// body is the method's own code, handed in as a closure producing its
/// future.
pub async fn transactional<R, F, Fut>(options: TransactionOptions, body: F) -> TxResult<R>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = TxResult<R>>,
{
    let config = manager::config_snapshot();
    let options = options.effective(&config);
    let started = Instant::now();

    let result = dispatch(options, &config, body).await;

    manager::record_call(started.elapsed().as_millis() as u64, result.is_ok());
    result
}

async fn dispatch<R, F, Fut>(
    options: TransactionOptions,
    config: &ManagerConfig,
    body: F,
) -> TxResult<R>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = TxResult<R>>,
{
    match (options.propagation, store::current()) {
        (Propagation::Required, None) => run_root(options, config, None, body).await,
        (Propagation::Required, Some(_)) => body().await,
        (Propagation::RequiresNew, outer) => run_root(options, config, outer, body).await,
        (Propagation::Supports, _) => body().await,
        (Propagation::NotSupported, None) => body().await,
        (Propagation::NotSupported, Some(_)) => store::run_outside(body()).await,
        (Propagation::Never, None) => body().await,
        (Propagation::Never, Some(ctx)) => Err(TxError::propagation(format!(
            "propagation NEVER invoked inside active transaction {}",
            ctx.context_id()
        ))),
        (Propagation::Mandatory, Some(_)) => body().await,
        (Propagation::Mandatory, None) => Err(TxError::propagation(
            "propagation MANDATORY requires an active transaction",
        )),
        (Propagation::Nested, None) => run_root(options, config, None, body).await,
        (Propagation::Nested, Some(ctx)) => run_nested(ctx, config, body).await,
    }
}

/// Create a new root context and drive its full lifecycle around the body.
async fn run_root<R, F, Fut>(
    options: TransactionOptions,
    config: &ManagerConfig,
    parent: Option<Arc<TransactionContext>>,
    body: F,
) -> TxResult<R>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = TxResult<R>>,
{
    let meta = metadata::get_metadata(&options.datasource_name).ok_or_else(|| {
        TxError::datasource_unavailable(&options.datasource_name, "not registered")
    })?;
    let datasource = meta.datasource;
    if !datasource.is_initialized() {
        return Err(TxError::datasource_unavailable(
            &options.datasource_name,
            "not initialized",
        ));
    }

    let session = datasource.create_session().await?;
    let ctx = Arc::new(TransactionContext::new(
        session,
        datasource,
        options,
        parent.as_ref(),
    ));

    if config.enable_logging {
        debug!(
            "Starting transaction {} ({})",
            ctx.context_id(),
            ctx.options().label()
        );
    }

    if let Err(begin_err) = begin_phase(&ctx).await {
        rollback_if_active(&ctx).await;
        release_session(&ctx).await;
        return Err(begin_err);
    }

    // Fires once the transaction has begun, before the body runs; its
    // failure aborts the call through the rollback path.
    let hook_result =
        run_guarded_hook(ctx.options().hooks.before_commit.as_ref(), "before_commit").await;

    ctx.set_active(true);
    manager::registry().insert(ctx.clone());
    manager::ensure_cleanup_task();

    let body_result: TxResult<R> = match hook_result {
        Err(hook_err) => Err(hook_err),
        Ok(()) => {
            let scoped = store::run_in(ctx.clone(), body());
            match ctx.options().timeout_ms {
                Some(timeout_ms) => {
                    match tokio::time::timeout(Duration::from_millis(timeout_ms), scoped).await {
                        Ok(result) => result,
                        Err(_) => Err(TxError::Timeout {
                            timeout_ms,
                            context_id: ctx.context_id().to_string(),
                        }),
                    }
                }
                None => scoped.await,
            }
        }
    };

    let outcome: TxResult<R> = match body_result {
        Ok(value) => {
            let commit_result = { ctx.session().lock().await.commit().await };
            match commit_result {
                Ok(()) => {
                    ctx.set_active(false);
                    if config.enable_logging {
                        debug!("Committed transaction {}", ctx.context_id());
                    }
                    run_logged_hook(ctx.options().hooks.after_commit.as_ref(), "after_commit")
                        .await;
                    Ok(value)
                }
                Err(commit_err) => {
                    warn!(
                        "Commit failed for transaction {}: {}",
                        ctx.context_id(),
                        commit_err
                    );
                    rollback_if_active(&ctx).await;
                    ctx.set_active(false);
                    Err(commit_err)
                }
            }
        }
        Err(body_err) => {
            run_logged_hook(
                ctx.options().hooks.before_rollback.as_ref(),
                "before_rollback",
            )
            .await;
            rollback_if_active(&ctx).await;
            ctx.set_active(false);
            if config.enable_logging {
                debug!(
                    "Rolled back transaction {}: {}",
                    ctx.context_id(),
                    body_err
                );
            }
            run_logged_hook(
                ctx.options().hooks.after_rollback.as_ref(),
                "after_rollback",
            )
            .await;
            Err(body_err)
        }
    };

    release_session(&ctx).await;
    manager::registry().remove(ctx.context_id());
    outcome
}

/// Run the body in a savepoint-backed scope of the ambient transaction.
async fn run_nested<R, F, Fut>(
    ctx: Arc<TransactionContext>,
    config: &ManagerConfig,
    body: F,
) -> TxResult<R>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = TxResult<R>>,
{
    let depth = ctx.depth();
    if depth >= config.max_nested_depth {
        return Err(TxError::NestingLimitExceeded {
            depth: depth + 1,
            limit: config.max_nested_depth,
        });
    }

    let savepoint = ctx.next_savepoint_name();
    {
        let mut session = ctx.session().lock().await;
        session.execute(&format!("SAVEPOINT {}", savepoint)).await?;
    }
    ctx.push_savepoint(&savepoint);
    if config.enable_logging {
        debug!("Created savepoint {} at depth {}", savepoint, depth + 1);
    }

    match body().await {
        Ok(value) => {
            {
                let mut session = ctx.session().lock().await;
                session
                    .execute(&format!("RELEASE SAVEPOINT {}", savepoint))
                    .await?;
            }
            ctx.release_savepoint(&savepoint);
            Ok(value)
        }
        Err(body_err) => {
            {
                let mut session = ctx.session().lock().await;
                if let Err(rollback_err) = session
                    .execute(&format!("ROLLBACK TO SAVEPOINT {}", savepoint))
                    .await
                {
                    error!(
                        "Failed to roll back to savepoint {}: {}",
                        savepoint, rollback_err
                    );
                }
            }
            ctx.rollback_savepoint(&savepoint);
            Err(body_err)
        }
    }
}

async fn begin_phase(ctx: &TransactionContext) -> TxResult<()> {
    let mut session = ctx.session().lock().await;
    session.connect().await?;
    session.begin(ctx.options().isolation).await?;
    if ctx.options().read_only {
        session.execute("SET TRANSACTION READ ONLY").await?;
    }
    Ok(())
}

async fn rollback_if_active(ctx: &TransactionContext) {
    let mut session = ctx.session().lock().await;
    if session.is_transaction_active() {
        if let Err(e) = session.rollback().await {
            error!(
                "Rollback failed for transaction {}: {}",
                ctx.context_id(),
                e
            );
        }
    }
}

async fn release_session(ctx: &TransactionContext) {
    let mut session = ctx.session().lock().await;
    if !session.is_released() {
        if let Err(e) = session.release().await {
            error!(
                "Failed to release session of transaction {}: {}",
                ctx.context_id(),
                e
            );
        }
    }
}

/// A failing guarded hook aborts the call; the error surfaces to the caller.
async fn run_guarded_hook(hook: Option<&Hook>, name: &str) -> TxResult<()> {
    match hook {
        None => Ok(()),
        Some(hook) => hook().await.map_err(|e| {
            warn!("Hook '{}' failed: {}", name, e);
            TxError::hook(name, e.to_string())
        }),
    }
}

/// A failing logged hook is recorded and swallowed.
async fn run_logged_hook(hook: Option<&Hook>, name: &str) {
    if let Some(hook) = hook {
        if let Err(e) = hook().await {
            warn!("Hook '{}' failed (ignored): {}", name, e);
        }
    }
}

/// Fluent builder for configuring and running a transactional call
pub struct Transactional {
    options: TransactionOptions,
}

impl Transactional {
    pub fn new() -> Self {
        Self {
            options: TransactionOptions::default(),
        }
    }

    pub fn propagation(mut self, propagation: Propagation) -> Self {
        self.options.propagation = propagation;
        self
    }

    pub fn isolation(mut self, level: IsolationLevel) -> Self {
        self.options.isolation = Some(level);
        self
    }

    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.options.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.options.read_only = read_only;
        self
    }

    pub fn datasource(mut self, name: impl Into<String>) -> Self {
        self.options.datasource_name = name.into();
        self
    }

    pub fn named(mut self, label: impl Into<String>) -> Self {
        self.options.name = Some(label.into());
        self
    }

    pub fn hooks(mut self, hooks: TransactionHooks) -> Self {
        self.options.hooks = hooks;
        self
    }

    pub fn into_options(self) -> TransactionOptions {
        self.options
    }

    /// Run the body under the configured options
    pub async fn run<R, F, Fut>(self, body: F) -> TxResult<R>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = TxResult<R>>,
    {
        transactional(self.options, body).await
    }
}

impl Default for Transactional {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_collects_options() {
        let options = Transactional::new()
            .propagation(Propagation::RequiresNew)
            .isolation(IsolationLevel::Serializable)
            .timeout_ms(250)
            .read_only(true)
            .datasource("analytics")
            .named("report.rebuild")
            .into_options();

        assert_eq!(options.propagation, Propagation::RequiresNew);
        assert_eq!(options.isolation, Some(IsolationLevel::Serializable));
        assert_eq!(options.timeout_ms, Some(250));
        assert!(options.read_only);
        assert_eq!(options.datasource_name, "analytics");
        assert_eq!(options.name.as_deref(), Some("report.rebuild"));
    }

    #[test]
    fn test_builder_defaults_match_options_defaults() {
        let options = Transactional::default().into_options();
        assert_eq!(options.propagation, Propagation::Required);
        assert_eq!(options.datasource_name, "DB");
        assert!(options.hooks.is_empty());
    }
}
