//! Transaction implementations for transactional chain sends

mod in_memory;
mod postgres;

pub use in_memory::{InMemoryTransaction, TransactionEvent};
pub use postgres::{
    connect_pool, send_in_new_transaction, send_in_new_transaction_with, PostgresChainTransaction,
};
