//! Mediator chain - typed builder over a shared, append-only step log

use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::step::{take_prior, view_prior, ChainStep, StepKind};
use crate::domain::{AnyRequest, Dispatcher, Outcome, Request};

/// Type of an empty chain's (absent) result
///
/// Uninhabited: no value of this type ever exists, so a chain handle typed
/// `MediatorChain<Empty>` has produced nothing yet and only offers `add`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Empty {}

/// A typed view onto a growing log of chain steps
///
/// `T` is the response type produced by the most recently added request.
/// Every handle derived from one root shares the same log: appending through
/// any handle is visible to all of them. Building is pure data accumulation;
/// nothing is dispatched until the chain is sent.
///
/// A chain must be built from one handle at a time. Branching two handles off
/// the same root appends both branches to the same log.
pub struct MediatorChain<T> {
    dispatcher: Arc<dyn Dispatcher>,
    steps: Arc<Mutex<Vec<ChainStep>>>,
    _response: PhantomData<fn() -> T>,
}

impl MediatorChain<Empty> {
    /// Create an empty chain over a dispatcher
    pub fn new(dispatcher: Arc<dyn Dispatcher>) -> Self {
        Self {
            dispatcher,
            steps: Arc::new(Mutex::new(Vec::new())),
            _response: PhantomData,
        }
    }
}

impl<T: 'static> MediatorChain<T> {
    /// Add a request that does not depend on the prior result
    ///
    /// The request is cloned each time the chain is sent.
    pub fn add<R>(&self, request: R) -> MediatorChain<R::Response>
    where
        R: Request + Clone,
    {
        self.append(|index| {
            ChainStep::add::<R::Response, _>(index, move |_prior| {
                Ok(AnyRequest::new(request.clone()))
            })
        });

        self.view()
    }
}

/// Steps that consume the prior result
///
/// Only available once a request has been added: `Empty` is not an
/// [`Outcome`], so a root chain cannot start with a factory or a guard.
///
/// ```compile_fail
/// use std::sync::Arc;
/// use mediator_chain::{Dispatcher, DispatcherExt, HandlerRegistry};
///
/// let dispatcher: Arc<dyn Dispatcher> = Arc::new(HandlerRegistry::new());
/// dispatcher.chain().fail_when(|_| true);
/// ```
impl<T: Outcome + 'static> MediatorChain<T> {
    /// Add a request built from the prior result
    pub fn add_with<R, F>(&self, factory: F) -> MediatorChain<R::Response>
    where
        R: Request,
        F: Fn(T) -> R + Send + Sync + 'static,
    {
        self.append(|index| {
            ChainStep::add::<R::Response, _>(index, move |prior| {
                let prior = take_prior::<T>(index, prior)?;
                Ok(AnyRequest::new(factory(prior)))
            })
        });

        self.view()
    }

    /// Halt the chain when the predicate holds for the prior result
    ///
    /// The returned handle keeps the prior result type, so further steps can
    /// still be built from it.
    pub fn fail_when<F>(&self, predicate: F) -> MediatorChain<T>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.append(|index| {
            ChainStep::fail_when(index, move |prior| {
                let prior = view_prior::<T>(index, prior)?;
                Ok(predicate(prior))
            })
        });

        self.view()
    }
}

impl<T> MediatorChain<T> {
    /// Number of steps in the shared log
    pub fn len(&self) -> usize {
        self.log().len()
    }

    pub fn is_empty(&self) -> bool {
        self.log().is_empty()
    }

    pub fn step_kinds(&self) -> Vec<StepKind> {
        self.log().iter().map(ChainStep::kind).collect()
    }

    pub(crate) fn dispatcher(&self) -> &Arc<dyn Dispatcher> {
        &self.dispatcher
    }

    /// Copy of the current steps; the log itself is never cloned
    pub(crate) fn snapshot(&self) -> Vec<ChainStep> {
        self.log().clone()
    }

    fn append(&self, make: impl FnOnce(usize) -> ChainStep) {
        let mut steps = self.log();
        let index = steps.len();
        steps.push(make(index));
    }

    fn view<U>(&self) -> MediatorChain<U> {
        MediatorChain {
            dispatcher: self.dispatcher.clone(),
            steps: self.steps.clone(),
            _response: PhantomData,
        }
    }

    // Append-only, so a poisoned log is still consistent.
    fn log(&self) -> MutexGuard<'_, Vec<ChainStep>> {
        self.steps.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Clone for MediatorChain<T> {
    fn clone(&self) -> Self {
        self.view()
    }
}

impl<T> fmt::Debug for MediatorChain<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediatorChain")
            .field("response", &std::any::type_name::<T>())
            .field("steps", &*self.log())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::chain::mock::{Greet, Pair, RecordingDispatcher};
    use crate::domain::chain::step::StepOperation;

    fn root() -> (Arc<RecordingDispatcher>, MediatorChain<Empty>) {
        let dispatcher = Arc::new(RecordingDispatcher::new());
        let chain = MediatorChain::new(dispatcher.clone());
        (dispatcher, chain)
    }

    #[test]
    fn test_add_appends_one_step() {
        let (dispatcher, chain) = root();

        let next: MediatorChain<String> = chain.add(Greet("Hello".to_string()));

        assert_eq!(chain.len(), 1);
        assert_eq!(next.step_kinds(), vec![StepKind::Add]);
        assert_eq!(dispatcher.call_count(), 0);
    }

    #[test]
    fn test_handles_share_one_log() {
        let (_, chain) = root();

        let first = chain.add(Greet("Hello".to_string()));
        let second = first.add_with(|greeting: String| Pair(greeting, "World".to_string()));
        let guarded = second.fail_when(|_| false);

        assert_eq!(chain.len(), 3);
        assert_eq!(first.len(), 3);
        assert_eq!(guarded.len(), 3);
        assert_eq!(
            chain.step_kinds(),
            vec![StepKind::Add, StepKind::Add, StepKind::FailWhen]
        );
    }

    #[test]
    fn test_clone_shares_log() {
        let (_, chain) = root();
        let copy = chain.clone();

        copy.add(Greet("Hello".to_string()));

        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn test_add_step_builds_request_without_prior() {
        let (_, chain) = root();
        chain.add(Greet("Hello".to_string()));

        let steps = chain.snapshot();
        let StepOperation::Add { build, .. } = steps[0].operation() else {
            panic!("Expected Add step");
        };

        let request = build(None).unwrap();
        assert!(request.is::<Greet>());
    }

    #[test]
    fn test_add_with_step_requires_prior() {
        let (_, chain) = root();
        chain
            .add(Greet("Hello".to_string()))
            .add_with(|greeting: String| Pair(greeting, "World".to_string()));

        let steps = chain.snapshot();
        let StepOperation::Add { build, .. } = steps[1].operation() else {
            panic!("Expected Add step");
        };

        assert!(build(None).is_err());
    }
}
