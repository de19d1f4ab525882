//! Transaction usage examples
//!
//! Demonstrates propagation modes, hooks and statistics against an
//! in-memory datasource, so the example runs without a database server.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use txscope::{
    current_context_id, in_transaction, transactional, DatasourceConfig, DatasourcePlugin,
    IsolationLevel, Propagation, Session, TransactionHooks, TransactionManager,
    TransactionOptions, Transactional, TxError, TxResult,
};

/// A session that only tracks its own lifecycle state
struct MemorySession {
    tx_active: bool,
    released: bool,
}

#[async_trait]
impl Session for MemorySession {
    async fn connect(&mut self) -> TxResult<()> {
        Ok(())
    }

    async fn begin(&mut self, isolation: Option<IsolationLevel>) -> TxResult<()> {
        if let Some(level) = isolation {
            println!("  [session] BEGIN ({})", level.as_sql());
        } else {
            println!("  [session] BEGIN");
        }
        self.tx_active = true;
        Ok(())
    }

    async fn commit(&mut self) -> TxResult<()> {
        println!("  [session] COMMIT");
        self.tx_active = false;
        Ok(())
    }

    async fn rollback(&mut self) -> TxResult<()> {
        println!("  [session] ROLLBACK");
        self.tx_active = false;
        Ok(())
    }

    async fn release(&mut self) -> TxResult<()> {
        self.released = true;
        Ok(())
    }

    async fn execute(&mut self, statement: &str) -> TxResult<u64> {
        println!("  [session] {}", statement);
        Ok(0)
    }

    fn is_transaction_active(&self) -> bool {
        self.tx_active
    }

    fn is_released(&self) -> bool {
        self.released
    }
}

struct MemoryDatasource {
    name: String,
    initialized: AtomicBool,
}

#[async_trait]
impl txscope::Datasource for MemoryDatasource {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Relaxed)
    }

    async fn create_session(&self) -> TxResult<Box<dyn Session>> {
        Ok(Box::new(MemorySession {
            tx_active: false,
            released: false,
        }))
    }

    async fn close(&self) -> TxResult<()> {
        self.initialized.store(false, Ordering::Relaxed);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> TxResult<()> {
    let plugin = DatasourcePlugin::new(DatasourceConfig::new("memory").with_logging(true))?;
    plugin.install(Arc::new(MemoryDatasource {
        name: "DB".to_string(),
        initialized: AtomicBool::new(true),
    }));
    println!(
        "installed datasource '{}', registered: {:?}\n",
        plugin.config().name,
        txscope::datasource_names()
    );

    // Basic commit path
    let total = transactional(TransactionOptions::default(), || async {
        println!("  crediting account inside {:?}", current_context_id());
        Ok::<i64, TxError>(100)
    })
    .await?;
    println!("credited: {}\n", total);

    // Nested scope: the inner failure rolls back to a savepoint while the
    // outer transaction commits
    transactional(TransactionOptions::default(), || async {
        let audit = transactional(
            TransactionOptions {
                propagation: Propagation::Nested,
                ..Default::default()
            },
            || async { Err::<(), TxError>(TxError::application("audit trail offline")) },
        )
        .await;
        println!("  audit skipped: {}\n", audit.unwrap_err());
        Ok::<(), TxError>(())
    })
    .await?;

    // Builder form with isolation, hooks and an independent inner transaction
    Transactional::new()
        .isolation(IsolationLevel::Serializable)
        .named("orders.place")
        .hooks(TransactionHooks::new().on_after_commit(|| async {
            println!("  [hook] order confirmation queued");
            Ok(())
        }))
        .run(|| async {
            Transactional::new()
                .propagation(Propagation::RequiresNew)
                .named("metrics.bump")
                .run(|| async { Ok::<(), TxError>(()) })
                .await?;
            assert!(in_transaction());
            Ok::<(), TxError>(())
        })
        .await?;

    let stats = TransactionManager::get_stats();
    println!(
        "\ntransactions: {} total, {} succeeded, {} failed (avg {:.1}ms)",
        stats.total, stats.succeeded, stats.failed, stats.avg_duration_ms
    );

    TransactionManager::stop_cleanup();
    plugin.shutdown().await
}
