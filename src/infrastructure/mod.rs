//! Infrastructure layer - Dispatcher, transaction and logging implementations

pub mod dispatcher;
pub mod logging;
pub mod transaction;
