//! Dispatcher trait - executes a single request and returns its response

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::chain::{Empty, MediatorChain};
use super::{AnyRequest, AnyResponse, ChainError, Request};

#[cfg(test)]
use mockall::automock;

/// Sends one type-erased request to whatever handles it
///
/// Implementations must answer with a response whose runtime type is the
/// request's declared `Request::Response`.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn send(
        &self,
        request: AnyRequest,
        cancel: &CancellationToken,
    ) -> Result<AnyResponse, ChainError>;
}

/// Typed helpers over a shared dispatcher
#[async_trait]
pub trait DispatcherExt {
    /// Lift the dispatcher into an empty chain
    fn chain(&self) -> MediatorChain<Empty>;

    /// Dispatch a single typed request outside of a chain
    async fn send_request<R: Request>(
        &self,
        request: R,
        cancel: &CancellationToken,
    ) -> Result<R::Response, ChainError>;
}

#[async_trait]
impl DispatcherExt for Arc<dyn Dispatcher> {
    fn chain(&self) -> MediatorChain<Empty> {
        MediatorChain::new(self.clone())
    }

    async fn send_request<R: Request>(
        &self,
        request: R,
        cancel: &CancellationToken,
    ) -> Result<R::Response, ChainError> {
        let response = self.send(AnyRequest::new(request), cancel).await?;
        let found = response.type_name();

        response.downcast::<R::Response>().map_err(|_| {
            ChainError::type_mismatch(0, std::any::type_name::<R::Response>(), found)
        })
    }
}
