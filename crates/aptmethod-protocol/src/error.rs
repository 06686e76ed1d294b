//! Protocol error types.

use thiserror::Error;

use crate::codec::CodecError;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while framing, encoding or decoding messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The frame has no status line at all.
    #[error("message header not found")]
    HeaderNotFound,

    /// The status line is not `<3-digit code> <summary>`.
    #[error("message header malformed: {line:?}")]
    MalformedHeader { line: String },

    /// A field line has no `:` separator.
    #[error("header field entry is invalid: {line:?}")]
    InvalidFieldEntry { line: String },

    /// Refusing to encode a message without fields.
    #[error("header fields are empty")]
    FieldsEmpty,

    /// A field key or value would break the line structure of the frame.
    #[error("header field {key:?} contains a line break")]
    InvalidFieldValue { key: String },

    /// The summary would break the status line.
    #[error("message summary contains a line break: {summary:?}")]
    InvalidSummary { summary: String },

    /// The frame is not valid UTF-8.
    #[error("message is not valid UTF-8")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// The stream ended in the middle of a frame.
    #[error("unexpected end of stream: {pending} bytes without a message terminator")]
    UnexpectedEof { pending: usize },

    /// A pending frame outgrew the configured limit.
    #[error("frame too large: {size} bytes (max: {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// IO error while reading frames.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Typed record conversion failed.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl ProtocolError {
    /// Creates a malformed header error.
    pub fn malformed_header(line: impl Into<String>) -> Self {
        Self::MalformedHeader { line: line.into() }
    }

    /// Creates an invalid field entry error.
    pub fn invalid_field_entry(line: impl Into<String>) -> Self {
        Self::InvalidFieldEntry { line: line.into() }
    }
}
