//! Mediator chain domain - typed request pipelines over a dispatcher
//!
//! A chain is built by repeated `add`/`add_with`/`fail_when` calls and run
//! by a single send. Each step's request may be built from the previous
//! step's response:
//!
//! ```ignore
//! let greeting = dispatcher
//!     .chain()
//!     .add(Greet("Hello".into()))
//!     .add_with(|hello: String| Pair(hello, "World".into()))
//!     .send_last(&CancellationToken::new())
//!     .await?;
//! ```

mod builder;
mod executor;
mod step;
mod transactional;

pub use builder::{Empty, MediatorChain};
pub use executor::{ChainOutput, Halt};
pub use step::{ChainStep, StepKind};
pub use transactional::{TransactionalSender, DEFAULT_SAVEPOINT_PREFIX};

#[cfg(test)]
pub mod mock;
