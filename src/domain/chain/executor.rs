//! Chain executor - sends every step in order, threading each result into the next

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::builder::MediatorChain;
use super::step::StepOperation;
use crate::domain::{AnyResponse, ChainError};

/// Why a chain stopped before its last step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Halt {
    /// A `fail_when` guard held at this step
    FailWhen { step: usize },
    /// The response dispatched at this step reported failure
    Outcome { step: usize },
}

impl Halt {
    pub fn step(&self) -> usize {
        match self {
            Self::FailWhen { step } | Self::Outcome { step } => *step,
        }
    }
}

/// Result of sending a chain, before conversion to a caller type
#[derive(Debug, Default)]
pub struct ChainOutput {
    value: Option<AnyResponse>,
    halt: Option<Halt>,
    dispatched: usize,
}

impl ChainOutput {
    /// The last response produced, if any
    pub fn value(&self) -> Option<&AnyResponse> {
        self.value.as_ref()
    }

    pub fn halt(&self) -> Option<Halt> {
        self.halt
    }

    /// Whether the chain halted on a guard or a failing response
    pub fn is_failed(&self) -> bool {
        self.halt.is_some()
    }

    /// Number of requests that went through the dispatcher
    pub fn dispatched(&self) -> usize {
        self.dispatched
    }

    /// Convert the last response to `R`
    ///
    /// Absent when nothing was produced or the response is not an `R`.
    pub fn into_value<R: 'static>(self) -> Option<R> {
        self.value?.downcast::<R>().ok()
    }

    pub fn into_inner(self) -> Option<AnyResponse> {
        self.value
    }
}

impl<T: 'static> MediatorChain<T> {
    /// Send every step and return the raw, untyped result
    ///
    /// Dispatch faults, cancellation and internal type mismatches are returned
    /// as errors. A guard that holds or a response that reports failure stops
    /// the chain and is returned as a failed [`ChainOutput`].
    ///
    /// Sending again re-runs every step, including every dispatch.
    pub async fn send_untyped(
        &self,
        cancel: &CancellationToken,
    ) -> Result<ChainOutput, ChainError> {
        let steps = self.snapshot();
        let mut output = ChainOutput::default();

        debug!(steps = steps.len(), "Sending mediator chain");

        for step in &steps {
            match step.operation() {
                StepOperation::Add {
                    build,
                    response_type,
                    response_name,
                } => {
                    if cancel.is_cancelled() {
                        return Err(ChainError::Cancelled);
                    }

                    let request = build(output.value.take())?;
                    let request_name = request.type_name();

                    debug!(step = step.index(), request = request_name, "Dispatching chain step");

                    let response = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(ChainError::Cancelled),
                        response = self.dispatcher().send(request, cancel) => response?,
                    };
                    output.dispatched += 1;

                    if response.type_id() != *response_type {
                        return Err(ChainError::type_mismatch(
                            step.index(),
                            *response_name,
                            response.type_name(),
                        ));
                    }

                    let failed = response.is_failure();
                    output.value = Some(response);

                    if failed {
                        info!(
                            step = step.index(),
                            request = request_name,
                            "Response reported failure, halting chain"
                        );
                        output.halt = Some(Halt::Outcome { step: step.index() });
                        break;
                    }
                }
                StepOperation::FailWhen { guard } => {
                    if guard(output.value.as_ref())? {
                        info!(step = step.index(), "Fail condition met, halting chain");
                        output.halt = Some(Halt::FailWhen { step: step.index() });
                        break;
                    }
                }
            }
        }

        Ok(output)
    }

    /// Send the chain and convert the final result to `R`
    ///
    /// Returns `Ok(None)` for an empty chain or when the last response is not
    /// an `R`.
    pub async fn send<R: 'static>(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Option<R>, ChainError> {
        Ok(self.send_untyped(cancel).await?.into_value())
    }

    /// Send the chain and return the result as the handle's own type
    pub async fn send_last(&self, cancel: &CancellationToken) -> Result<Option<T>, ChainError> {
        self.send::<T>(cancel).await
    }

    /// [`send_untyped`](Self::send_untyped) with a token nobody cancels
    pub async fn send_untyped_uncancelled(&self) -> Result<ChainOutput, ChainError> {
        self.send_untyped(&CancellationToken::new()).await
    }

    /// [`send`](Self::send) with a token nobody cancels
    pub async fn send_uncancelled<R: 'static>(&self) -> Result<Option<R>, ChainError> {
        self.send::<R>(&CancellationToken::new()).await
    }
}
