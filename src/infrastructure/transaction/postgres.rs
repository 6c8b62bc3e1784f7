//! PostgreSQL transaction for sending chains against a database

use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgConnection, PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::DatabaseConfig;
use crate::domain::{
    ChainError, ChainOutput, ChainTransaction, MediatorChain, TransactionalSender,
};

type PgTransaction = Transaction<'static, Postgres>;

/// Open a connection pool for the configured database
pub async fn connect_pool(config: &DatabaseConfig) -> Result<PgPool, ChainError> {
    let url = config
        .url
        .as_deref()
        .ok_or_else(|| ChainError::storage("No database URL configured"))?;

    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .connect(url)
        .await
        .map_err(|e| ChainError::storage(format!("Failed to connect to PostgreSQL: {}", e)))
}

/// Quote a savepoint name as a PostgreSQL identifier
fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Chain transaction backed by a PostgreSQL transaction
///
/// Clones share the same underlying transaction, so handlers can hold a
/// clone and run their statements through [`connection`](Self::connection)
/// while the chain is being sent.
#[derive(Clone)]
pub struct PostgresChainTransaction {
    /// None once committed or rolled back
    tx: Arc<Mutex<Option<PgTransaction>>>,
}

impl Debug for PostgresChainTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let completed = self.tx.try_lock().map(|tx| tx.is_none()).ok();

        f.debug_struct("PostgresChainTransaction")
            .field("completed", &completed)
            .finish()
    }
}

impl PostgresChainTransaction {
    /// Begin a new transaction on the pool
    pub async fn begin(pool: &PgPool) -> Result<Self, ChainError> {
        let tx = pool
            .begin()
            .await
            .map_err(|e| ChainError::storage(format!("Failed to begin transaction: {}", e)))?;

        debug!("Began PostgreSQL transaction");
        Ok(Self::from_transaction(tx))
    }

    /// Wrap a transaction the caller already started
    pub fn from_transaction(tx: PgTransaction) -> Self {
        Self {
            tx: Arc::new(Mutex::new(Some(tx))),
        }
    }

    /// Lock the connection of the open transaction
    ///
    /// The guard must be dropped before the chain moves on to the next step.
    pub async fn connection(&self) -> Result<MappedMutexGuard<'_, PgConnection>, ChainError> {
        let guard = self.tx.lock().await;

        MutexGuard::try_map(guard, |tx| tx.as_mut().map(|tx| &mut **tx))
            .map_err(|_| ChainError::storage("transaction already completed"))
    }

    pub async fn is_completed(&self) -> bool {
        self.tx.lock().await.is_none()
    }

    /// Roll back the whole transaction
    pub async fn rollback(&self) -> Result<(), ChainError> {
        let tx = self
            .tx
            .lock()
            .await
            .take()
            .ok_or_else(|| ChainError::storage("transaction already completed"))?;

        tx.rollback()
            .await
            .map_err(|e| ChainError::storage(format!("Failed to roll back transaction: {}", e)))?;

        info!("Rolled back PostgreSQL transaction");
        Ok(())
    }

    async fn execute(&self, statement: &str) -> Result<(), ChainError> {
        let mut guard = self.tx.lock().await;
        let tx = guard
            .as_mut()
            .ok_or_else(|| ChainError::storage("transaction already completed"))?;

        sqlx::query(statement)
            .execute(&mut **tx)
            .await
            .map_err(|e| ChainError::storage(format!("Failed to execute '{}': {}", statement, e)))?;

        Ok(())
    }
}

#[async_trait]
impl ChainTransaction for PostgresChainTransaction {
    async fn create_savepoint(&self, name: &str) -> Result<(), ChainError> {
        self.execute(&format!("SAVEPOINT {}", quote_identifier(name)))
            .await?;

        debug!(savepoint = name, "Created savepoint");
        Ok(())
    }

    async fn rollback_to_savepoint(&self, name: &str) -> Result<(), ChainError> {
        self.execute(&format!("ROLLBACK TO SAVEPOINT {}", quote_identifier(name)))
            .await?;

        debug!(savepoint = name, "Rolled back to savepoint");
        Ok(())
    }

    async fn commit(&self) -> Result<(), ChainError> {
        let tx = self
            .tx
            .lock()
            .await
            .take()
            .ok_or_else(|| ChainError::storage("transaction already completed"))?;

        tx.commit()
            .await
            .map_err(|e| ChainError::storage(format!("Failed to commit transaction: {}", e)))?;

        debug!("Committed PostgreSQL transaction");
        Ok(())
    }
}

/// Send a chain inside a savepoint of a transaction begun on `pool`
///
/// `build` receives the new transaction so handlers can share it. A chain
/// that fails or faults leaves the transaction uncommitted, and it is rolled
/// back when the last handle to it is dropped.
pub async fn send_in_new_transaction_with<T, F, Fut>(
    pool: &PgPool,
    sender: &TransactionalSender,
    cancel: &CancellationToken,
    build: F,
) -> Result<ChainOutput, ChainError>
where
    T: 'static,
    F: FnOnce(PostgresChainTransaction) -> Fut,
    Fut: Future<Output = Result<MediatorChain<T>, ChainError>>,
{
    let transaction = PostgresChainTransaction::begin(pool).await?;
    let chain = build(transaction.clone()).await?;

    let output = sender.send_untyped(&chain, &transaction, cancel).await;

    if !transaction.is_completed().await {
        debug!("Dropping uncommitted PostgreSQL transaction");
    }

    output
}

/// Send a chain inside a savepoint of a transaction begun on `pool`
///
/// For chains whose handlers do not need the transaction itself.
pub async fn send_in_new_transaction<T: 'static, R: 'static>(
    chain: &MediatorChain<T>,
    pool: &PgPool,
    sender: &TransactionalSender,
    cancel: &CancellationToken,
) -> Result<Option<R>, ChainError> {
    let output =
        send_in_new_transaction_with(pool, sender, cancel, |_| async { Ok(chain.clone()) })
            .await?;

    Ok(output.into_value())
}
