//! The request handler seam.

use std::future::Future;
use std::pin::Pin;

use aptmethod_protocol::records::Request;

use crate::error::HandlerError;
use crate::writer::MessageWriter;

/// Result type for handler functions.
pub type HandlerResult = Result<(), HandlerError>;

/// Boxed future for handler results.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Fetches resources for the parent.
///
/// Called once per URI Acquire, concurrently with other requests. The handler
/// reports progress and completion through `writer` (`uri_start`,
/// `uri_done`, ...). Returning `Ok` writes nothing further; an error is
/// reported for the request as described on [`HandlerError`].
pub trait Handler: Send + Sync + 'static {
    fn acquire_resource(&self, writer: MessageWriter, request: Request) -> BoxFuture<'static, HandlerResult>;
}

/// Adapter turning an async closure into a [`Handler`].
pub struct HandlerFn<F> {
    f: F,
}

/// Wraps `f` as a [`Handler`].
///
/// ```rust
/// use aptmethod_runtime::{handler_fn, HandlerError};
/// use aptmethod_protocol::records::UriFailure;
///
/// let handler = handler_fn(|_writer, request| async move {
///     Err(HandlerError::from(UriFailure::new(request.source.as_str(), "unsupported scheme")))
/// });
/// # let _ = handler;
/// ```
pub fn handler_fn<F, Fut>(f: F) -> HandlerFn<F>
where
    F: Fn(MessageWriter, Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    HandlerFn { f }
}

impl<F, Fut> Handler for HandlerFn<F>
where
    F: Fn(MessageWriter, Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn acquire_resource(&self, writer: MessageWriter, request: Request) -> BoxFuture<'static, HandlerResult> {
        Box::pin((self.f)(writer, request))
    }
}
