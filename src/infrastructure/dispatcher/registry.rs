//! Handler registry
//!
//! In-process dispatcher that routes each request to the single handler
//! registered for its type.

use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::{AnyRequest, AnyResponse, ChainError, Dispatcher, Request};

/// Handles one request type
#[async_trait]
pub trait RequestHandler<R: Request>: Send + Sync {
    async fn handle(
        &self,
        request: R,
        cancel: &CancellationToken,
    ) -> Result<R::Response, ChainError>;
}

/// Handler over erased requests, keyed by request type in the registry
#[async_trait]
trait ErasedHandler: Send + Sync {
    async fn handle(
        &self,
        request: AnyRequest,
        cancel: &CancellationToken,
    ) -> Result<AnyResponse, ChainError>;
}

struct TypedHandler<R, H> {
    handler: H,
    _request: PhantomData<fn(R)>,
}

#[async_trait]
impl<R, H> ErasedHandler for TypedHandler<R, H>
where
    R: Request,
    H: RequestHandler<R>,
{
    async fn handle(
        &self,
        request: AnyRequest,
        cancel: &CancellationToken,
    ) -> Result<AnyResponse, ChainError> {
        let request = request.downcast::<R>().map_err(|request| {
            ChainError::type_mismatch(0, type_name::<R>(), request.type_name())
        })?;

        let response = self.handler.handle(request, cancel).await?;
        Ok(AnyResponse::new(response))
    }
}

/// Adapts an async closure into a [`RequestHandler`]
///
/// The closure receives a clone of the send's cancellation token.
struct FnHandler<F> {
    handle: F,
}

#[async_trait]
impl<R, F, Fut> RequestHandler<R> for FnHandler<F>
where
    R: Request,
    F: Fn(R, CancellationToken) -> Fut + Send + Sync,
    Fut: Future<Output = Result<R::Response, ChainError>> + Send,
{
    async fn handle(
        &self,
        request: R,
        cancel: &CancellationToken,
    ) -> Result<R::Response, ChainError> {
        (self.handle)(request, cancel.clone()).await
    }
}

struct HandlerEntry {
    request_name: &'static str,
    handler: Arc<dyn ErasedHandler>,
}

/// Registry of request handlers, one per request type
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<TypeId, HandlerEntry>>,
}

impl HandlerRegistry {
    /// Create a new empty handler registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the handler for `R`, replacing any previous one
    pub async fn register<R, H>(&self, handler: H)
    where
        R: Request,
        H: RequestHandler<R> + 'static,
    {
        let request_name = type_name::<R>();
        let entry = HandlerEntry {
            request_name,
            handler: Arc::new(TypedHandler {
                handler,
                _request: PhantomData,
            }),
        };

        let mut handlers = self.handlers.write().await;

        if handlers.insert(TypeId::of::<R>(), entry).is_some() {
            warn!(request = request_name, "Replacing registered request handler");
        } else {
            info!(request = request_name, "Registering request handler");
        }
    }

    /// Register an async closure as the handler for `R`
    pub async fn register_fn<R, F, Fut>(&self, handle: F)
    where
        R: Request,
        F: Fn(R, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R::Response, ChainError>> + Send + 'static,
    {
        self.register::<R, _>(FnHandler { handle }).await;
    }

    /// Whether a handler is registered for `R`
    pub async fn contains<R: Request>(&self) -> bool {
        self.handlers.read().await.contains_key(&TypeId::of::<R>())
    }

    /// Number of registered handlers
    pub async fn len(&self) -> usize {
        self.handlers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.handlers.read().await.is_empty()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("HandlerRegistry");

        match self.handlers.try_read() {
            Ok(handlers) => {
                let names: Vec<_> = handlers.values().map(|e| e.request_name).collect();
                debug.field("handlers", &names);
            }
            Err(_) => {
                debug.field("handlers", &"<locked>");
            }
        }

        debug.finish()
    }
}

#[async_trait]
impl Dispatcher for HandlerRegistry {
    async fn send(
        &self,
        request: AnyRequest,
        cancel: &CancellationToken,
    ) -> Result<AnyResponse, ChainError> {
        let handler = {
            let handlers = self.handlers.read().await;

            handlers
                .get(&request.type_id())
                .map(|entry| entry.handler.clone())
                .ok_or_else(|| ChainError::handler_not_found(request.type_name()))?
        };

        debug!(request = request.type_name(), "Dispatching request");

        handler.handle(request, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::domain::{DispatcherExt, Outcome};

    #[derive(Debug, Clone)]
    struct CreateOrder {
        quantity: u32,
    }

    #[derive(Debug, Clone, PartialEq)]
    struct OrderCreated {
        id: u64,
        quantity: u32,
    }

    impl Outcome for OrderCreated {}

    impl Request for CreateOrder {
        type Response = OrderCreated;
    }

    #[derive(Debug, Clone)]
    struct ShipOrder {
        id: u64,
    }

    impl Request for ShipOrder {
        type Response = Result<String, String>;
    }

    #[derive(Debug, Default)]
    struct CreateOrderHandler {
        next_id: AtomicUsize,
    }

    #[async_trait]
    impl RequestHandler<CreateOrder> for CreateOrderHandler {
        async fn handle(
            &self,
            request: CreateOrder,
            _cancel: &CancellationToken,
        ) -> Result<OrderCreated, ChainError> {
            let id = self.next_id.fetch_add(1, Ordering::SeqCst) as u64 + 1;

            Ok(OrderCreated {
                id,
                quantity: request.quantity,
            })
        }
    }

    async fn registry() -> Arc<dyn Dispatcher> {
        let registry = HandlerRegistry::new();
        registry
            .register::<CreateOrder, _>(CreateOrderHandler::default())
            .await;
        registry
            .register_fn(|request: ShipOrder, _| async move {
                if request.id == 0 {
                    Ok(Err("unknown order".to_string()))
                } else {
                    Ok(Ok(format!("order {} shipped", request.id)))
                }
            })
            .await;

        Arc::new(registry)
    }

    #[tokio::test]
    async fn test_register_and_contains() {
        let registry = HandlerRegistry::new();
        assert!(registry.is_empty().await);

        registry
            .register::<CreateOrder, _>(CreateOrderHandler::default())
            .await;

        assert!(registry.contains::<CreateOrder>().await);
        assert!(!registry.contains::<ShipOrder>().await);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_register_replaces_existing_handler() {
        let registry = HandlerRegistry::new();
        registry
            .register::<CreateOrder, _>(CreateOrderHandler::default())
            .await;
        registry
            .register_fn(|request: CreateOrder, _| async move {
                Ok(OrderCreated {
                    id: 99,
                    quantity: request.quantity,
                })
            })
            .await;
        let dispatcher: Arc<dyn Dispatcher> = Arc::new(registry);

        let created = dispatcher
            .send_request(CreateOrder { quantity: 1 }, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(created.id, 99);
    }

    #[tokio::test]
    async fn test_closure_handler_sees_cancellation() {
        let registry = HandlerRegistry::new();
        registry
            .register_fn(|request: ShipOrder, cancel: CancellationToken| async move {
                if cancel.is_cancelled() {
                    return Err(ChainError::Cancelled);
                }

                Ok(Ok(format!("order {} shipped", request.id)))
            })
            .await;
        let dispatcher: Arc<dyn Dispatcher> = Arc::new(registry);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let error = dispatcher
            .send_request(ShipOrder { id: 7 }, &cancel)
            .await
            .unwrap_err();

        assert!(error.is_cancelled());
    }

    #[tokio::test]
    async fn test_missing_handler() {
        let dispatcher: Arc<dyn Dispatcher> = Arc::new(HandlerRegistry::new());

        let error = dispatcher
            .send_request(ShipOrder { id: 1 }, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(error, ChainError::HandlerNotFound { request } if request.ends_with("ShipOrder")));
    }

    #[tokio::test]
    async fn test_chain_through_registry() {
        let dispatcher = registry().await;

        let shipped = dispatcher
            .chain()
            .add(CreateOrder { quantity: 3 })
            .add_with(|created: OrderCreated| ShipOrder { id: created.id })
            .send_last(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(shipped, Some(Ok("order 1 shipped".to_string())));
    }

    #[tokio::test]
    async fn test_chain_halts_on_failed_shipment() {
        let dispatcher = registry().await;

        let output = dispatcher
            .chain()
            .add(ShipOrder { id: 0 })
            .add_with(|_: Result<String, String>| CreateOrder { quantity: 1 })
            .send_untyped(&CancellationToken::new())
            .await
            .unwrap();

        assert!(output.is_failed());
        assert_eq!(
            output.into_value::<Result<String, String>>(),
            Some(Err("unknown order".to_string()))
        );
    }
}
