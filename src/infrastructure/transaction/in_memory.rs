//! In-memory transaction implementation

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tracing::debug;

use crate::domain::{ChainError, ChainTransaction};

/// Something that happened to an [`InMemoryTransaction`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionEvent {
    SavepointCreated(String),
    RolledBackTo(String),
    Committed,
}

#[derive(Debug, Default)]
struct TransactionState {
    /// Open savepoints with the number of writes made before each
    savepoints: Vec<(String, usize)>,
    writes: Vec<String>,
    events: Vec<TransactionEvent>,
    committed: bool,
}

impl TransactionState {
    fn ensure_active(&self) -> Result<(), ChainError> {
        if self.committed {
            return Err(ChainError::storage("transaction already completed"));
        }

        Ok(())
    }
}

/// Savepoint-aware transaction kept in memory
///
/// Writes recorded through [`write`](Self::write) are discarded when rolling
/// back past them. Useful for testing and development. Clones share the same
/// transaction.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTransaction {
    state: Arc<RwLock<TransactionState>>,
}

impl InMemoryTransaction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a write made inside the transaction
    pub fn write(&self, entry: impl Into<String>) -> Result<(), ChainError> {
        let mut state = self.state.write().map_err(|e| {
            ChainError::storage(format!("Failed to acquire write lock: {}", e))
        })?;
        state.ensure_active()?;
        state.writes.push(entry.into());

        Ok(())
    }

    /// Writes that survived every rollback so far
    pub fn writes(&self) -> Result<Vec<String>, ChainError> {
        let state = self.state.read().map_err(|e| {
            ChainError::storage(format!("Failed to acquire read lock: {}", e))
        })?;

        Ok(state.writes.clone())
    }

    /// Journal of savepoint, rollback and commit calls, in order
    pub fn events(&self) -> Result<Vec<TransactionEvent>, ChainError> {
        let state = self.state.read().map_err(|e| {
            ChainError::storage(format!("Failed to acquire read lock: {}", e))
        })?;

        Ok(state.events.clone())
    }

    pub fn is_committed(&self) -> Result<bool, ChainError> {
        let state = self.state.read().map_err(|e| {
            ChainError::storage(format!("Failed to acquire read lock: {}", e))
        })?;

        Ok(state.committed)
    }
}

#[async_trait]
impl ChainTransaction for InMemoryTransaction {
    async fn create_savepoint(&self, name: &str) -> Result<(), ChainError> {
        let mut state = self.state.write().map_err(|e| {
            ChainError::storage(format!("Failed to acquire write lock: {}", e))
        })?;
        state.ensure_active()?;

        let mark = state.writes.len();
        state.savepoints.push((name.to_string(), mark));
        state
            .events
            .push(TransactionEvent::SavepointCreated(name.to_string()));

        debug!(savepoint = name, "Created in-memory savepoint");
        Ok(())
    }

    async fn rollback_to_savepoint(&self, name: &str) -> Result<(), ChainError> {
        let mut state = self.state.write().map_err(|e| {
            ChainError::storage(format!("Failed to acquire write lock: {}", e))
        })?;
        state.ensure_active()?;

        let position = state
            .savepoints
            .iter()
            .rposition(|(savepoint, _)| savepoint == name)
            .ok_or_else(|| ChainError::storage(format!("Savepoint '{}' does not exist", name)))?;

        // The savepoint stays open; later ones are released.
        let mark = state.savepoints[position].1;
        state.savepoints.truncate(position + 1);
        state.writes.truncate(mark);
        state
            .events
            .push(TransactionEvent::RolledBackTo(name.to_string()));

        debug!(savepoint = name, "Rolled back in-memory savepoint");
        Ok(())
    }

    async fn commit(&self) -> Result<(), ChainError> {
        let mut state = self.state.write().map_err(|e| {
            ChainError::storage(format!("Failed to acquire write lock: {}", e))
        })?;
        state.ensure_active()?;

        state.committed = true;
        state.savepoints.clear();
        state.events.push(TransactionEvent::Committed);

        debug!(writes = state.writes.len(), "Committed in-memory transaction");
        Ok(())
    }
}
