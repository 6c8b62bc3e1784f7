//! Dispatcher infrastructure - in-process request handling

mod registry;

pub use registry::{HandlerRegistry, RequestHandler};
