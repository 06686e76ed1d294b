//! RFC 1123 timestamps as they appear in `Last-Modified` fields.
//!
//! Methods always emit the `GMT` form (`Tue, 31 Mar 1998 00:00:00 GMT`). On
//! input the `UTC` zone name and numeric RFC 2822 offsets are accepted as well,
//! since parents have been seen sending either.

use chrono::{DateTime, NaiveDateTime, Utc};
use thiserror::Error;

/// `strftime` layout of an RFC 1123 date without its zone name.
const RFC1123_LAYOUT: &str = "%a, %d %b %Y %H:%M:%S";

/// A field value that is not an RFC 1123 timestamp.
#[derive(Debug, Error)]
#[error("invalid RFC 1123 timestamp {input:?}: {source}")]
pub struct TimestampError {
    /// The rejected text.
    pub input: String,
    #[source]
    source: chrono::ParseError,
}

/// Formats a timestamp as `Tue, 31 Mar 1998 00:00:00 GMT`.
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    format!("{} GMT", timestamp.format(RFC1123_LAYOUT))
}

/// Parses an RFC 1123 timestamp into UTC.
pub fn parse_timestamp(text: &str) -> Result<DateTime<Utc>, TimestampError> {
    let text = text.trim();
    let named_zone = text
        .strip_suffix(" GMT")
        .or_else(|| text.strip_suffix(" UTC"));

    let parsed = match named_zone {
        Some(rest) => NaiveDateTime::parse_from_str(rest, RFC1123_LAYOUT).map(|naive| naive.and_utc()),
        None => DateTime::parse_from_rfc2822(text).map(|dt| dt.with_timezone(&Utc)),
    };

    parsed.map_err(|source| TimestampError {
        input: text.to_string(),
        source,
    })
}
