//! Per-resource records: URI Acquire (600) in, URI Start (200), URI Done
//! (201) and URI Failure (400) out.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use url::Url;

use crate::codec::{CodecError, CodecResult, Record, UnmarshalFields};
use crate::field_record;
use crate::fields::Fields;
use crate::message::Message;
use crate::status::StatusCode;

field_record! {
    /// Request to fetch `uri` into `filename`, as sent by the parent.
    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    pub struct UriAcquire {
        pub uri: String as "URI",
        pub filename: String,
        pub last_modified: Option<DateTime<Utc>>,
    }
}

impl Record for UriAcquire {
    const STATUS: StatusCode = StatusCode::UriAcquire;
}

field_record! {
    /// The fetch of `uri` has begun.
    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    pub struct UriStart {
        pub uri: String as "URI",
        pub size: Option<u64>,
        pub last_modified: Option<DateTime<Utc>>,
        pub resume_point: Option<u64>,
    }
}

impl UriStart {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            ..Default::default()
        }
    }
}

impl Record for UriStart {
    const STATUS: StatusCode = StatusCode::UriStart;
}

field_record! {
    /// `uri` has been stored at `filename`.
    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    pub struct UriDone {
        pub uri: String as "URI",
        pub filename: String,
        pub size: Option<u64>,
        pub last_modified: Option<DateTime<Utc>>,
        /// The parent's copy is current and nothing was downloaded.
        pub ims_hit: bool as "IMS-Hit",
        pub md5_hash: String as "MD5-Hash",
        pub sha256_hash: String as "SHA256-Hash",
    }
}

impl UriDone {
    pub fn new(uri: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            filename: filename.into(),
            ..Default::default()
        }
    }
}

impl Record for UriDone {
    const STATUS: StatusCode = StatusCode::UriDone;
}

field_record! {
    /// Fetching `uri` failed.
    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    pub struct UriFailure {
        pub uri: String as "URI",
        pub message: String,
        pub fail_reason: String as "FailReason",
        pub transient_failure: bool as "Transient-Failure",
    }
}

impl UriFailure {
    pub fn new(uri: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            message: message.into(),
            ..Default::default()
        }
    }

    /// Marks the failure as worth retrying.
    #[must_use]
    pub fn transient(mut self) -> Self {
        self.transient_failure = true;
        self
    }

    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.fail_reason = reason.into();
        self
    }
}

impl fmt::Display for UriFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failure acquiring uri {:?}: {}", self.uri, self.message)
    }
}

impl std::error::Error for UriFailure {}

impl Record for UriFailure {
    const STATUS: StatusCode = StatusCode::UriFailure;
}

/// A URI Acquire as handed to the handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Resource to fetch.
    pub source: Url,
    /// Where the parent expects the result.
    pub target: PathBuf,
    /// Timestamp of the parent's copy, for conditional fetches.
    pub modified: Option<DateTime<Utc>>,
}

impl Request {
    pub fn new(source: Url, target: impl Into<PathBuf>) -> Self {
        Self {
            source,
            target: target.into(),
            modified: None,
        }
    }

    /// Decodes a 600 message.
    pub fn from_message(message: &Message) -> CodecResult<Self> {
        UriAcquire::from_message(message)?.try_into()
    }

    /// Decodes the fields of a 600 message.
    pub fn from_fields(fields: &Fields) -> CodecResult<Self> {
        let mut acquire = UriAcquire::default();
        acquire.unmarshal_fields(fields)?;
        acquire.try_into()
    }
}

impl TryFrom<UriAcquire> for Request {
    type Error = CodecError;

    fn try_from(acquire: UriAcquire) -> CodecResult<Self> {
        if acquire.uri.is_empty() {
            return Err(CodecError::MissingField {
                record: "UriAcquire",
                field: "URI".to_string(),
            });
        }
        if acquire.filename.is_empty() {
            return Err(CodecError::MissingField {
                record: "UriAcquire",
                field: "Filename".to_string(),
            });
        }
        let source = Url::parse(&acquire.uri).map_err(|source| CodecError::Parse {
            record: "UriAcquire",
            member: "uri",
            field: "URI".to_string(),
            type_name: std::any::type_name::<Url>(),
            source: Box::new(source),
        })?;
        Ok(Self {
            source,
            target: PathBuf::from(acquire.filename),
            modified: acquire.last_modified,
        })
    }
}

impl From<&Request> for UriAcquire {
    fn from(request: &Request) -> Self {
        Self {
            uri: request.source.to_string(),
            filename: request.target.to_string_lossy().into_owned(),
            last_modified: request.modified,
        }
    }
}
