//! Transactional sending - wraps one chain send in a savepoint

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use super::builder::MediatorChain;
use super::executor::ChainOutput;
use crate::domain::{ChainError, ChainTransaction};

/// Prefix of generated savepoint names
pub const DEFAULT_SAVEPOINT_PREFIX: &str = "mediator_chain";

/// Sends chains inside a savepoint of a caller-owned transaction
///
/// On success the transaction is committed, so the sender is meant for the
/// caller that owns the transaction's outcome. On a fault or a failed chain
/// only the savepoint is rolled back and the outer transaction stays usable.
#[derive(Debug, Clone)]
pub struct TransactionalSender {
    savepoint_prefix: String,
}

impl Default for TransactionalSender {
    fn default() -> Self {
        Self::new(DEFAULT_SAVEPOINT_PREFIX)
    }
}

impl TransactionalSender {
    pub fn new(savepoint_prefix: impl Into<String>) -> Self {
        Self {
            savepoint_prefix: savepoint_prefix.into(),
        }
    }

    pub fn savepoint_prefix(&self) -> &str {
        &self.savepoint_prefix
    }

    /// A savepoint name unique to one invocation
    pub fn savepoint_name(&self) -> String {
        format!("{}_{}", self.savepoint_prefix, Uuid::new_v4().simple())
    }

    /// Send the chain inside a fresh savepoint and return the raw result
    ///
    /// - fault: roll back to the savepoint (best effort) and return the fault
    /// - failed chain: roll back to the savepoint and return the failed output
    /// - otherwise: commit
    pub async fn send_untyped<T: 'static>(
        &self,
        chain: &MediatorChain<T>,
        transaction: &dyn ChainTransaction,
        cancel: &CancellationToken,
    ) -> Result<ChainOutput, ChainError> {
        let savepoint = self.savepoint_name();
        transaction.create_savepoint(&savepoint).await?;

        let output = match chain.send_untyped(cancel).await {
            Ok(output) => output,
            Err(error) => {
                if let Err(rollback_error) = transaction.rollback_to_savepoint(&savepoint).await {
                    warn!(
                        savepoint = %savepoint,
                        error = %rollback_error,
                        "Failed to roll back savepoint after chain fault"
                    );
                }

                return Err(error);
            }
        };

        if output.is_failed() {
            info!(savepoint = %savepoint, halt = ?output.halt(), "Chain failed, rolling back savepoint");
            transaction.rollback_to_savepoint(&savepoint).await?;
            return Ok(output);
        }

        transaction.commit().await?;
        info!(savepoint = %savepoint, dispatched = output.dispatched(), "Chain committed");

        Ok(output)
    }

    /// Send the chain inside a fresh savepoint and convert the result to `R`
    pub async fn send<T: 'static, R: 'static>(
        &self,
        chain: &MediatorChain<T>,
        transaction: &dyn ChainTransaction,
        cancel: &CancellationToken,
    ) -> Result<Option<R>, ChainError> {
        Ok(self
            .send_untyped(chain, transaction, cancel)
            .await?
            .into_value())
    }
}

impl<T: 'static> MediatorChain<T> {
    /// Send inside a savepoint of `transaction` using the default sender
    pub async fn send_in_transaction<R: 'static>(
        &self,
        transaction: &dyn ChainTransaction,
        cancel: &CancellationToken,
    ) -> Result<Option<R>, ChainError> {
        TransactionalSender::default()
            .send(self, transaction, cancel)
            .await
    }
}
