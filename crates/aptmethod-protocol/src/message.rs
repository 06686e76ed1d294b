//! Raw messages and their wire encoding.
//!
//! ```text
//! 600 URI Acquire\n
//! URI: http://deb.debian.org/debian/dists/stable/InRelease\n
//! Filename: /var/lib/apt/lists/partial/deb.debian.org_debian_dists_stable_InRelease\n
//! \n
//! ```
//!
//! A raw [`Message`] does not validate its code, summary or fields beyond the
//! layout; typed records in [`crate::records`] give them meaning.

use crate::error::{ProtocolError, ProtocolResult};
use crate::fields::{Fields, has_line_break};
use crate::status::StatusCode;

/// One framed protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    status_code: u16,
    summary: String,
    fields: Fields,
}

impl Message {
    /// Creates a message for a known status code, using its standard summary.
    pub fn new(status: StatusCode, fields: Fields) -> Self {
        Self {
            status_code: status.code(),
            summary: status.summary().to_string(),
            fields,
        }
    }

    /// Creates a message with an arbitrary code and summary.
    pub fn with_code(status_code: u16, summary: impl Into<String>, fields: Fields) -> Self {
        Self {
            status_code,
            summary: summary.into(),
            fields,
        }
    }

    /// Numeric status code.
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    /// Known status, if the code is part of the vocabulary.
    pub fn status(&self) -> Option<StatusCode> {
        StatusCode::from_code(self.status_code)
    }

    /// Summary text following the code.
    pub fn summary(&self) -> &str {
        &self.summary
    }

    /// Field block.
    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    /// Consumes the message, returning its fields.
    pub fn into_fields(self) -> Fields {
        self.fields
    }

    /// 1xx: capabilities, log, status, redirect, warning.
    pub fn is_informational(&self) -> bool {
        (100..200).contains(&self.status_code)
    }

    /// 2xx: URI start and done.
    pub fn is_successful(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// 351: auxiliary file request.
    pub fn is_aux_request(&self) -> bool {
        self.status_code == StatusCode::AuxRequest.code()
    }

    /// 4xx: fatal to the current operation.
    pub fn is_failure(&self) -> bool {
        (400..500).contains(&self.status_code)
    }

    /// 6xx: sent by the parent.
    pub fn is_response(&self) -> bool {
        (600..700).contains(&self.status_code)
    }

    /// Encodes the message including its terminating blank line.
    ///
    /// Fails when the summary, a key or a value contains a line break, since
    /// continuation lines are not supported.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        if has_line_break(&self.summary) {
            return Err(ProtocolError::InvalidSummary {
                summary: self.summary.clone(),
            });
        }
        let mut text = format!("{:03} {}\n", self.status_code, self.summary);
        self.fields.encode_into(&mut text)?;
        text.push('\n');
        Ok(text.into_bytes())
    }

    /// Decodes one frame, without its terminating blank line.
    ///
    /// A frame with no newline is a lone status line. Only the layout is
    /// checked: a well-formed frame may still carry an unknown code.
    pub fn decode(frame: &[u8]) -> ProtocolResult<Self> {
        let text = std::str::from_utf8(frame)?;
        if text.trim().is_empty() {
            return Err(ProtocolError::HeaderNotFound);
        }

        let (header, rest) = text.split_once('\n').unwrap_or((text, ""));
        let (status_code, summary) = parse_status_line(header)?;
        let fields = Fields::parse(rest)?;

        Ok(Self {
            status_code,
            summary: summary.to_string(),
            fields,
        })
    }
}

fn parse_status_line(line: &str) -> ProtocolResult<(u16, &str)> {
    let malformed = || ProtocolError::malformed_header(line);

    let (code, summary) = line.split_once(' ').ok_or_else(malformed)?;
    let summary = summary.trim();
    if code.len() != 3 || !code.bytes().all(|b| b.is_ascii_digit()) || summary.is_empty() {
        return Err(malformed());
    }
    let code = code.parse().map_err(|_| malformed())?;
    Ok((code, summary))
}
