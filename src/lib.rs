//! mediator-chain
//!
//! Typed request pipelines over a mediator:
//! - Chains of requests where each step may be built from the previous response
//! - Short circuit on a `fail_when` guard or on a response that reports failure
//! - Transactional sends wrapped in a savepoint of a caller-owned transaction
//! - In-process handler registry, in-memory and PostgreSQL transactions

pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;
pub use domain::{
    ChainError, ChainOutput, ChainTransaction, Dispatcher, DispatcherExt, Halt, MediatorChain,
    Outcome, Request, TransactionalSender,
};
pub use infrastructure::dispatcher::{HandlerRegistry, RequestHandler};
