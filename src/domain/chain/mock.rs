//! Test requests and dispatchers for chain tests

use std::sync::Mutex;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::domain::{AnyRequest, AnyResponse, ChainError, Dispatcher, Request};

#[derive(Debug, Clone)]
pub struct Greet(pub String);

impl Request for Greet {
    type Response = String;
}

#[derive(Debug, Clone)]
pub struct Pair(pub String, pub String);

impl Request for Pair {
    type Response = (String, String);
}

#[derive(Debug, Clone)]
pub struct Triple(pub String, pub String, pub String);

impl Request for Triple {
    type Response = (String, String, String);
}

/// Fails with an outcome (not a fault) when the input is empty
#[derive(Debug, Clone)]
pub struct Validate(pub String);

impl Request for Validate {
    type Response = Result<String, String>;
}

/// Dispatcher that handles the test requests and records every call
#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    calls: Mutex<Vec<String>>,
    fail_on: Option<String>,
    greet_with_number: bool,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise a dispatch fault for the named request type
    pub fn failing_on(mut self, request: impl Into<String>) -> Self {
        self.fail_on = Some(request.into());
        self
    }

    /// Answer `Greet` with a number instead of a `String`
    pub fn answering_greet_with_number(mut self) -> Self {
        self.greet_with_number = true;
        self
    }

    /// Short type names of every dispatched request, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Dispatcher for RecordingDispatcher {
    async fn send(
        &self,
        request: AnyRequest,
        _cancel: &CancellationToken,
    ) -> Result<AnyResponse, ChainError> {
        let name = request
            .type_name()
            .rsplit("::")
            .next()
            .unwrap_or_default()
            .to_string();
        self.calls.lock().unwrap().push(name.clone());

        if self.fail_on.as_deref() == Some(name.as_str()) {
            return Err(ChainError::dispatch(name, "handler exploded"));
        }

        let request = match request.downcast::<Greet>() {
            Ok(_) if self.greet_with_number => return Ok(AnyResponse::new(42u64)),
            Ok(Greet(text)) => return Ok(AnyResponse::new(text)),
            Err(request) => request,
        };

        let request = match request.downcast::<Pair>() {
            Ok(Pair(first, second)) => return Ok(AnyResponse::new((first, second))),
            Err(request) => request,
        };

        let request = match request.downcast::<Triple>() {
            Ok(Triple(first, second, third)) => {
                return Ok(AnyResponse::new((first, second, third)))
            }
            Err(request) => request,
        };

        match request.downcast::<Validate>() {
            Ok(Validate(input)) if input.is_empty() => Ok(AnyResponse::new::<
                Result<String, String>,
            >(Err("empty input".to_string()))),
            Ok(Validate(input)) => Ok(AnyResponse::new::<Result<String, String>>(Ok(input))),
            Err(request) => Err(ChainError::handler_not_found(request.type_name())),
        }
    }
}

/// Dispatcher whose requests never complete
#[derive(Debug)]
pub struct PendingDispatcher;

#[async_trait]
impl Dispatcher for PendingDispatcher {
    async fn send(
        &self,
        _request: AnyRequest,
        _cancel: &CancellationToken,
    ) -> Result<AnyResponse, ChainError> {
        std::future::pending().await
    }
}
