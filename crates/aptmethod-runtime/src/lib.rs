//! Runtime for package manager transport methods.
//!
//! A [`Method`] announces its capabilities, reads requests from the parent and
//! runs a [`Handler`] for each of them concurrently. Handlers talk back through
//! a [`MessageWriter`], which also carries the authorization and media change
//! prompts.
//!
//! # Example
//!
//! ```rust,no_run
//! use aptmethod_protocol::records::UriDone;
//! use aptmethod_runtime::{Method, TracingConfig, handler_fn, init_tracing};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     init_tracing(TracingConfig::default())?;
//!
//!     let method = Method::builder("1.0")
//!         .handler(handler_fn(|writer, request| async move {
//!             let target = request.target.to_string_lossy().into_owned();
//!             writer.uri_done(&UriDone::new(request.source.as_str(), target))?;
//!             Ok(())
//!         }))
//!         .build()?;
//!     method.run_stdio().await?;
//!     Ok(())
//! }
//! ```

mod authz;
mod config;
mod error;
mod handler;
mod media;
mod method;
mod writer;

pub use aptmethod_core::{LogFormat, TracingConfig, init_tracing};
pub use config::MethodConfig;
pub use error::{HandlerError, MethodError, MethodResult};
pub use handler::{BoxFuture, Handler, HandlerFn, HandlerResult, handler_fn};
pub use media::MediaAccess;
pub use method::{Method, MethodBuilder, MethodState};
pub use writer::{MessageWriter, spawn_writer_task};
