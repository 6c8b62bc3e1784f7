//! Transactional resource a chain can be wrapped in

use async_trait::async_trait;

use super::ChainError;

#[cfg(test)]
use mockall::automock;

/// Savepoint-capable transaction owned by the caller for one send
///
/// Methods take `&self`; implementations hold the underlying transaction
/// behind interior mutability so handlers can share it while the chain runs.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ChainTransaction: Send + Sync {
    /// Open a named savepoint inside the ambient transaction
    async fn create_savepoint(&self, name: &str) -> Result<(), ChainError>;

    /// Undo everything done since the named savepoint was opened
    async fn rollback_to_savepoint(&self, name: &str) -> Result<(), ChainError>;

    /// Commit the ambient transaction
    async fn commit(&self) -> Result<(), ChainError>;
}
