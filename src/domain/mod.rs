//! Domain layer - Requests, dispatching and mediator chains

pub mod chain;
pub mod dispatcher;
pub mod error;
pub mod outcome;
pub mod request;
pub mod transaction;

pub use chain::{
    ChainOutput, ChainStep, Empty, Halt, MediatorChain, StepKind, TransactionalSender,
    DEFAULT_SAVEPOINT_PREFIX,
};
pub use dispatcher::{Dispatcher, DispatcherExt};
pub use error::ChainError;
pub use outcome::Outcome;
pub use request::{AnyRequest, AnyResponse, Request};
pub use transaction::ChainTransaction;

#[cfg(test)]
pub use dispatcher::MockDispatcher;
#[cfg(test)]
pub use transaction::MockChainTransaction;
