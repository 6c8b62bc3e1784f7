//! Chain steps - deferred operations over type-erased results

use std::any::{type_name, TypeId};
use std::fmt;
use std::sync::Arc;

use crate::domain::{AnyRequest, AnyResponse, ChainError};

/// Builds the next request from the previous result
pub(crate) type BuildRequest =
    Arc<dyn Fn(Option<AnyResponse>) -> Result<AnyRequest, ChainError> + Send + Sync>;

/// Decides whether the chain halts after the previous result
pub(crate) type Guard =
    Arc<dyn Fn(Option<&AnyResponse>) -> Result<bool, ChainError> + Send + Sync>;

/// Kind of a chain step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    /// Build a request from the prior result and dispatch it
    Add,
    /// Evaluate a guard against the prior result and halt when it holds
    FailWhen,
}

#[derive(Clone)]
pub(crate) enum StepOperation {
    Add {
        build: BuildRequest,
        response_type: TypeId,
        response_name: &'static str,
    },
    FailWhen {
        guard: Guard,
    },
}

/// A single deferred step in a mediator chain
///
/// Operations are reference-counted so a send can snapshot the log and run it
/// without holding the lock.
#[derive(Clone)]
pub struct ChainStep {
    index: usize,
    operation: StepOperation,
}

impl ChainStep {
    /// An `Add` step whose request declares `Resp` as its response type
    pub(crate) fn add<Resp, F>(index: usize, build: F) -> Self
    where
        Resp: 'static,
        F: Fn(Option<AnyResponse>) -> Result<AnyRequest, ChainError> + Send + Sync + 'static,
    {
        Self {
            index,
            operation: StepOperation::Add {
                build: Arc::new(build),
                response_type: TypeId::of::<Resp>(),
                response_name: type_name::<Resp>(),
            },
        }
    }

    pub(crate) fn fail_when<F>(index: usize, guard: F) -> Self
    where
        F: Fn(Option<&AnyResponse>) -> Result<bool, ChainError> + Send + Sync + 'static,
    {
        Self {
            index,
            operation: StepOperation::FailWhen {
                guard: Arc::new(guard),
            },
        }
    }

    /// Position of this step in the chain
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn kind(&self) -> StepKind {
        match self.operation {
            StepOperation::Add { .. } => StepKind::Add,
            StepOperation::FailWhen { .. } => StepKind::FailWhen,
        }
    }

    pub(crate) fn operation(&self) -> &StepOperation {
        &self.operation
    }
}

impl fmt::Debug for ChainStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("ChainStep");
        debug.field("index", &self.index).field("kind", &self.kind());

        if let StepOperation::Add { response_name, .. } = &self.operation {
            debug.field("response", response_name);
        }

        debug.finish()
    }
}

const NOTHING: &str = "nothing";

/// Reinterpret the prior result as `T`, taking ownership of it
pub(crate) fn take_prior<T: 'static>(
    step: usize,
    prior: Option<AnyResponse>,
) -> Result<T, ChainError> {
    let prior = prior.ok_or_else(|| ChainError::type_mismatch(step, type_name::<T>(), NOTHING))?;
    let found = prior.type_name();

    prior
        .downcast::<T>()
        .map_err(|_| ChainError::type_mismatch(step, type_name::<T>(), found))
}

/// Reinterpret the prior result as `&T`
pub(crate) fn view_prior<T: 'static>(
    step: usize,
    prior: Option<&AnyResponse>,
) -> Result<&T, ChainError> {
    let prior = prior.ok_or_else(|| ChainError::type_mismatch(step, type_name::<T>(), NOTHING))?;

    prior
        .downcast_ref::<T>()
        .ok_or_else(|| ChainError::type_mismatch(step, type_name::<T>(), prior.type_name()))
}
