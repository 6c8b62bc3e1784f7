use thiserror::Error;

/// Errors raised while building, sending or committing a mediator chain.
///
/// Business failures (a `fail_when` guard firing, a response reporting failure)
/// are never errors; they come back as a failed [`ChainOutput`](super::ChainOutput).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChainError {
    #[error("Dispatch error: {request} - {message}")]
    Dispatch { request: String, message: String },

    #[error("No handler registered for request: {request}")]
    HandlerNotFound { request: String },

    #[error("Chain execution cancelled")]
    Cancelled,

    #[error("Type mismatch at step {step}: expected {expected}, found {found}")]
    TypeMismatch {
        step: usize,
        expected: String,
        found: String,
    },

    #[error("Storage error: {message}")]
    Storage { message: String },
}

impl ChainError {
    pub fn dispatch(request: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Dispatch {
            request: request.into(),
            message: message.into(),
        }
    }

    pub fn handler_not_found(request: impl Into<String>) -> Self {
        Self::HandlerNotFound {
            request: request.into(),
        }
    }

    pub fn type_mismatch(
        step: usize,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        Self::TypeMismatch {
            step,
            expected: expected.into(),
            found: found.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Whether this error is the cancellation fault
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
