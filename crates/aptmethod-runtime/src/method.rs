//! The method lifecycle: handshake, serving, draining.
//!
//! ```text
//! Created ─► Handshaking ─► Serving ─► Draining ─► Stopped
//! ```
//!
//! While serving, three long-lived tasks cooperate:
//!
//! - the reader (the `run` future itself) decodes inbound messages, queues
//!   URI Acquires, merges configuration and routes interrupt answers;
//! - the dispatcher spawns one task per queued request;
//! - the writer task serializes everything sent to the parent.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, PoisonError};

use aptmethod_protocol::records::{
    AuthorizationCredentials, Capabilities, GeneralFailure, MediaChanged, Request, UriFailure,
};
use aptmethod_protocol::{Message, MessageCodec, Record, StatusCode};
use futures_util::{FutureExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{OwnedSemaphorePermit, Semaphore, mpsc, watch};
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, Span, debug, error, info, info_span, warn};

use crate::config::MethodConfig;
use crate::error::{HandlerError, MethodError, MethodResult};
use crate::handler::Handler;
use crate::writer::{MessageWriter, Shared, spawn_with_shared};

/// Lifecycle state of a [`Method`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodState {
    Created,
    Handshaking,
    Serving,
    Draining,
    Stopped,
}

/// Builder for a [`Method`].
pub struct MethodBuilder {
    version: String,
    capabilities: Capabilities,
    handler: Option<Arc<dyn Handler>>,
    config: MethodConfig,
    cancel: CancellationToken,
    span: Span,
}

impl MethodBuilder {
    /// Capabilities to announce. `Send-Config` and `Version` are always set.
    pub fn capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn handler(mut self, handler: impl Handler) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    pub fn config(mut self, config: MethodConfig) -> Self {
        self.config = config;
        self
    }

    /// Token that stops the method when cancelled.
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Parent span for everything the method logs.
    pub fn span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn build(self) -> MethodResult<Method> {
        let handler = self.handler.ok_or(MethodError::MissingHandler)?;
        let (state, _) = watch::channel(MethodState::Created);
        Ok(Method {
            version: self.version,
            capabilities: self.capabilities,
            handler,
            config: self.config,
            cancel: self.cancel,
            span: self.span,
            state,
        })
    }
}

/// A transport method serving one parent.
pub struct Method {
    version: String,
    capabilities: Capabilities,
    handler: Arc<dyn Handler>,
    config: MethodConfig,
    cancel: CancellationToken,
    span: Span,
    state: watch::Sender<MethodState>,
}

impl Method {
    /// Starts building a method announcing `version`.
    pub fn builder(version: impl Into<String>) -> MethodBuilder {
        MethodBuilder {
            version: version.into(),
            capabilities: Capabilities::default(),
            handler: None,
            config: MethodConfig::default(),
            cancel: CancellationToken::new(),
            span: Span::none(),
        }
    }

    /// Watches the lifecycle state.
    pub fn subscribe(&self) -> watch::Receiver<MethodState> {
        self.state.subscribe()
    }

    /// Token that stops [`run`](Self::run) when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Serves the parent on process stdin/stdout.
    ///
    /// Install logging with [`init_tracing`](crate::init_tracing) first: its
    /// subscriber writes to stderr, leaving stdout to the protocol.
    pub async fn run_stdio(self) -> MethodResult<()> {
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Serves the parent over a duplex byte channel.
    ///
    /// Returns `Ok` on end of input or cancellation, and the error otherwise.
    pub async fn run<S>(self, stream: S) -> MethodResult<()>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (input, output) = tokio::io::split(stream);
        self.serve(input, output).await
    }

    async fn serve<R, W>(self, input: R, output: W) -> MethodResult<()>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let span = self.span.clone();
        self.serve_inner(input, output).instrument(span).await
    }

    async fn serve_inner<R, W>(self, input: R, output: W) -> MethodResult<()>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let Method {
            version,
            mut capabilities,
            handler,
            config,
            cancel,
            span: _,
            state,
        } = self;

        state.send_replace(MethodState::Handshaking);
        let max_frame_size = config.max_frame_size;
        let semaphore = config
            .max_concurrent_requests
            .map(|max| Arc::new(Semaphore::new(max)));
        let shared = Arc::new(Shared::new(config));
        let (writer, writer_task) = spawn_with_shared(output, shared);

        capabilities.send_config = true;
        capabilities.version = version;
        if let Err(e) = writer.send_flushed(&capabilities).await {
            error!(error = %e, "Failed to send capabilities");
            drop(writer);
            let e = match writer_task.await {
                Ok(Err(io)) => MethodError::from(io),
                _ => e,
            };
            state.send_replace(MethodState::Stopped);
            return Err(e);
        }
        info!(version = %capabilities.version, "Capabilities sent");

        state.send_replace(MethodState::Serving);
        let (intake, queue) = mpsc::unbounded_channel();
        let stop_dispatch = cancel.child_token();
        let tracker = TaskTracker::new();
        let dispatcher = tokio::spawn(
            dispatch_loop(
                queue,
                handler,
                writer.clone(),
                semaphore,
                tracker.clone(),
                stop_dispatch.clone(),
            )
            .in_current_span(),
        );

        let mut frames = FramedRead::new(input, MessageCodec::with_max_frame_size(max_frame_size));
        let outcome = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Cancellation requested");
                    break Ok(());
                }
                next = frames.next() => match next {
                    Some(Ok(message)) => route(message, &writer, &intake),
                    Some(Err(e)) => {
                        error!(error = %e, "Failed to read message");
                        stop_dispatch.cancel();
                        break Err(MethodError::from(e));
                    }
                    None => {
                        info!("End of input");
                        break Ok(());
                    }
                },
            }
        };

        state.send_replace(MethodState::Draining);
        drop(frames);
        drop(intake);
        writer.shared().authz.close();
        writer.shared().media.close();

        if let Err(e) = dispatcher.await {
            error!(error = %e, "Dispatcher task failed");
        }
        tracker.close();
        tracker.wait().await;
        debug!("In-flight requests finished");

        drop(writer);
        let flushed = match writer_task.await {
            Ok(Ok(_output)) => Ok(()),
            Ok(Err(e)) => Err(MethodError::from(e)),
            Err(e) => Err(MethodError::Io(std::io::Error::other(e))),
        };

        state.send_replace(MethodState::Stopped);
        info!("Method stopped");
        outcome.and(flushed)
    }
}

/// Handles one inbound message while serving.
fn route(message: Message, writer: &MessageWriter, intake: &mpsc::UnboundedSender<Request>) {
    match message.status() {
        Some(StatusCode::UriAcquire) => match Request::from_message(&message) {
            Ok(request) => {
                debug!(uri = %request.source, "Queued request");
                let _ = intake.send(request);
            }
            Err(e) => {
                let uri = message.fields().get("URI").unwrap_or_default();
                warn!(uri, error = %e, "Rejecting malformed URI Acquire");
                if let Err(e) = writer.uri_failure(&UriFailure::new(uri, e.to_string())) {
                    warn!(error = %e, "Failed to report malformed URI Acquire");
                }
            }
        },
        Some(StatusCode::Configuration) => {
            let rejected = writer
                .shared()
                .configuration
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .merge_fields(message.fields());
            for item in rejected {
                warn!(item = %item, "Ignoring configuration item without '='");
                if let Err(e) = writer.log_fmt(format_args!("Ignoring configuration item {item:?}: missing '='")) {
                    warn!(error = %e, "Failed to report configuration item");
                }
            }
            debug!("Configuration merged");
        }
        Some(StatusCode::AuthorizationCredentials) => {
            match AuthorizationCredentials::from_message(&message) {
                Ok(credentials) => {
                    if let Err(credentials) = writer.shared().authz.deliver(credentials) {
                        warn!(site = %credentials.site, "Dropping credentials nobody asked for");
                    }
                }
                Err(e) => warn!(error = %e, "Ignoring malformed Authorization Credentials"),
            }
        }
        Some(StatusCode::MediaChanged) => match MediaChanged::from_message(&message) {
            Ok(changed) => {
                if let Err(changed) = writer.shared().media.deliver(changed) {
                    warn!(media = %changed.media, "Dropping unexpected Media Changed");
                }
            }
            Err(e) => warn!(error = %e, "Ignoring malformed Media Changed"),
        },
        _ => debug!(
            code = message.status_code(),
            summary = message.summary(),
            "Ignoring message"
        ),
    }
}

async fn dispatch_loop(
    mut queue: mpsc::UnboundedReceiver<Request>,
    handler: Arc<dyn Handler>,
    writer: MessageWriter,
    semaphore: Option<Arc<Semaphore>>,
    tracker: TaskTracker,
    stop: CancellationToken,
) {
    loop {
        let request = tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            request = queue.recv() => match request {
                Some(request) => request,
                None => break,
            },
        };

        let permit = match &semaphore {
            Some(semaphore) => tokio::select! {
                biased;
                _ = stop.cancelled() => break,
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => Some(permit),
                    Err(_) => break,
                },
            },
            None => None,
        };

        let span = info_span!("request", uri = %request.source);
        tracker.spawn(
            handle_request(handler.clone(), writer.clone(), request, permit).instrument(span),
        );
    }
    debug!("Dispatcher finished");
}

async fn handle_request(
    handler: Arc<dyn Handler>,
    writer: MessageWriter,
    request: Request,
    _permit: Option<OwnedSemaphorePermit>,
) {
    let uri = request.source.to_string();
    let task_writer = writer.clone();
    // The call itself sits inside the future so a panic raised before the
    // handler returns its future is caught too.
    let outcome = AssertUnwindSafe(async move {
        handler.acquire_resource(task_writer, request).await
    })
    .catch_unwind()
    .await;

    let reported = match outcome {
        Ok(Ok(())) => {
            debug!("Request finished");
            Ok(())
        }
        Ok(Err(HandlerError::UriFailure(mut failure))) => {
            debug!(message = %failure.message, "Request failed");
            failure.uri = single_line(&failure.uri);
            failure.message = single_line(&failure.message);
            failure.fail_reason = single_line(&failure.fail_reason);
            writer.uri_failure(&failure)
        }
        Ok(Err(HandlerError::GeneralFailure(failure))) => {
            warn!(message = %failure, "Handler reported a general failure");
            writer.send(&GeneralFailure::new(single_line(failure.as_str())))
        }
        Ok(Err(HandlerError::Other(e))) => {
            warn!(error = %e, "Handler failed");
            let text = single_line(&e.to_string());
            let text = if text.trim().is_empty() { "handler failed".to_string() } else { text };
            writer.send(&GeneralFailure::new(text))
        }
        Err(panic) => {
            let reason = single_line(panic_message(panic.as_ref()));
            error!(reason = %reason, "Handler panicked");
            writer.uri_failure(&UriFailure::new(uri, format!("handler panicked: {reason}")))
        }
    };

    if let Err(e) = reported {
        warn!(error = %e, "Failed to report request outcome");
    }
}

/// Folds line breaks into spaces so handler text fits in one field.
fn single_line(text: &str) -> String {
    text.replace(['\r', '\n'], " ")
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(text) = payload.downcast_ref::<&'static str>() {
        text
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text
    } else {
        "unknown panic"
    }
}
