//! Requests, responses and their type-erased runtime forms

use std::any::{type_name, Any, TypeId};
use std::fmt;

use super::Outcome;

/// A request tagged at compile time with the response it produces
///
/// One request type maps to exactly one response type.
pub trait Request: Send + Sync + 'static {
    type Response: Outcome + Send + 'static;
}

/// A request with its static type erased
pub struct AnyRequest {
    value: Box<dyn Any + Send>,
    type_id: TypeId,
    type_name: &'static str,
}

impl AnyRequest {
    pub fn new<R: Request>(request: R) -> Self {
        Self {
            value: Box::new(request),
            type_id: TypeId::of::<R>(),
            type_name: type_name::<R>(),
        }
    }

    /// `TypeId` of the concrete request
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn is<R: Request>(&self) -> bool {
        self.type_id == TypeId::of::<R>()
    }

    /// Recover the concrete request, handing the erased value back on mismatch
    pub fn downcast<R: Request>(self) -> Result<R, Self> {
        if !self.is::<R>() {
            return Err(self);
        }

        let Self {
            value,
            type_id,
            type_name,
        } = self;

        value.downcast::<R>().map(|request| *request).map_err(|value| Self {
            value,
            type_id,
            type_name,
        })
    }
}

impl fmt::Debug for AnyRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyRequest")
            .field("type_name", &self.type_name)
            .finish()
    }
}

/// A dispatched response with its static type erased
///
/// The failure flag is captured from [`Outcome`] while the type is still known.
pub struct AnyResponse {
    value: Box<dyn Any + Send>,
    type_id: TypeId,
    type_name: &'static str,
    failure: bool,
}

impl AnyResponse {
    pub fn new<T: Outcome + Send + 'static>(response: T) -> Self {
        let failure = response.is_failure();

        Self {
            value: Box::new(response),
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            failure,
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Whether the response reported itself as a failure
    pub fn is_failure(&self) -> bool {
        self.failure
    }

    pub fn is<T: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// Recover the concrete response, handing the erased value back on mismatch
    pub fn downcast<T: 'static>(self) -> Result<T, Self> {
        let Self {
            value,
            type_id,
            type_name,
            failure,
        } = self;

        value.downcast::<T>().map(|response| *response).map_err(|value| Self {
            value,
            type_id,
            type_name,
            failure,
        })
    }
}

impl fmt::Debug for AnyResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyResponse")
            .field("type_name", &self.type_name)
            .field("failure", &self.failure)
            .finish()
    }
}
