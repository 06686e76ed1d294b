//! Runtime error types.

use std::io;

use aptmethod_protocol::records::{GeneralFailure, UriFailure};
use aptmethod_protocol::{CodecError, ProtocolError};
use thiserror::Error;

/// Result type for runtime operations.
pub type MethodResult<T> = Result<T, MethodError>;

/// Errors raised by the method runtime and its writer.
#[derive(Debug, Error)]
pub enum MethodError {
    /// IO error on the byte channel.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Protocol error (framing, encoding, record conversion).
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The writer task or the parent is gone.
    #[error("connection to the parent is closed")]
    ConnectionClosed,

    /// The builder was finished without a handler.
    #[error("no request handler configured")]
    MissingHandler,

    /// No credentials arrived in time.
    #[error("timed out waiting for credentials for {site:?}")]
    AuthorizationTimeout { site: String },

    /// No media change confirmation arrived in time.
    #[error("timed out waiting for media {media:?}")]
    MediaChangeTimeout { media: String },

    /// The parent answered a media change with `Fail: true`.
    #[error("media change to {media:?} was aborted")]
    MediaChangeAborted { media: String },
}

impl From<CodecError> for MethodError {
    fn from(err: CodecError) -> Self {
        Self::Protocol(err.into())
    }
}

impl MethodError {
    /// Creates an authorization timeout error.
    pub fn authorization_timeout(site: impl Into<String>) -> Self {
        Self::AuthorizationTimeout { site: site.into() }
    }

    /// Creates a media change timeout error.
    pub fn media_change_timeout(media: impl Into<String>) -> Self {
        Self::MediaChangeTimeout {
            media: media.into(),
        }
    }

    /// Creates a media change aborted error.
    pub fn media_change_aborted(media: impl Into<String>) -> Self {
        Self::MediaChangeAborted {
            media: media.into(),
        }
    }
}

/// What a handler reports when a request does not succeed.
///
/// [`HandlerError::UriFailure`] and [`HandlerError::GeneralFailure`] are
/// written to the parent as they are. Anything else becomes a General Failure
/// carrying the error text.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    UriFailure(#[from] UriFailure),

    #[error(transparent)]
    GeneralFailure(#[from] GeneralFailure),

    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl HandlerError {
    /// Wraps any other error.
    pub fn other(err: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>) -> Self {
        Self::Other(err.into())
    }
}

impl From<MethodError> for HandlerError {
    fn from(err: MethodError) -> Self {
        Self::Other(Box::new(err))
    }
}

impl From<io::Error> for HandlerError {
    fn from(err: io::Error) -> Self {
        Self::Other(Box::new(err))
    }
}
