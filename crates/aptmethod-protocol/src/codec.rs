//! Mapping between typed records and [`Fields`].
//!
//! Records are declared with [`field_record!`](crate::field_record), which
//! builds a field table for the struct (member name plus an optional wire
//! name override) and implements [`MarshalFields`] and [`UnmarshalFields`] by
//! walking it. Each member type plugs in through [`FieldValue`]:
//!
//! - on encode, the member exposes its best text capability as a
//!   [`FieldText`], tried in the order string, timestamp, `Display`, text
//!   serialization;
//! - on decode, its [`FieldKind`] selects the conversion. Strings take every
//!   value joined with a comma, timestamps rejoin the date the value split
//!   cut apart, every other kind parses the first value.
//!
//! Sequences are rejected in both directions. A type that needs a different
//! shape (a sequence, a map, a single free-form field) implements
//! [`MarshalFields`] / [`UnmarshalFields`] by hand, which bypasses the table
//! entirely.
//!
//! ```rust
//! use aptmethod_protocol::{field_record, codec::{MarshalFields, from_fields}};
//!
//! field_record! {
//!     #[derive(Debug, Default, PartialEq)]
//!     pub struct Sample {
//!         pub resume_point: u64,
//!         pub uri: String as "URI",
//!     }
//! }
//!
//! let sample = Sample { resume_point: 42, uri: "http://example.com".into() };
//! let fields = sample.marshal_fields().unwrap();
//! assert_eq!(fields.get("Resume-Point"), Some("42"));
//! assert_eq!(from_fields::<Sample>(&fields).unwrap(), sample);
//! ```

use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt;
use std::str::FromStr;

use aptmethod_core::time::{format_timestamp, parse_timestamp};
use chrono::{DateTime, Utc};
use thiserror::Error;
use url::Url;

use crate::fields::Fields;
use crate::message::Message;
use crate::status::StatusCode;

/// Boxed conversion error carried inside [`CodecError`].
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Result type for record conversions.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors raised while converting between records and fields.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The member's type has no field encoding.
    #[error("cannot marshal member {member:?} of {record} to field {field:?}: no field encoding for {type_name}")]
    Marshal {
        record: &'static str,
        member: &'static str,
        field: String,
        type_name: &'static str,
    },

    /// The member's own text serialization failed.
    #[error("cannot marshal member {member:?} of {record}: {source}")]
    MarshalText {
        record: &'static str,
        member: &'static str,
        #[source]
        source: BoxError,
    },

    /// The member's type cannot be assigned from a field.
    #[error("cannot assign field {field:?} to member {member:?} of {record}: no known conversion for {type_name}")]
    NoKnownConversion {
        record: &'static str,
        member: &'static str,
        field: String,
        type_name: &'static str,
    },

    /// The field value did not parse as the member's type.
    #[error("cannot parse field {field:?} into member {member:?} of {record} ({type_name}): {source}")]
    Parse {
        record: &'static str,
        member: &'static str,
        field: String,
        type_name: &'static str,
        #[source]
        source: BoxError,
    },

    /// A field the record cannot do without is absent.
    #[error("{record} requires field {field:?}")]
    MissingField { record: &'static str, field: String },

    /// Log, Status, Warning and General Failure must carry text.
    #[error("informational message is empty ({record})")]
    EmptyInformational { record: &'static str },

    /// The message carries a different status than the record expects.
    #[error("expected status {expected}, got {actual}")]
    UnexpectedStatus { expected: StatusCode, actual: u16 },
}

/// Conversion class of a member type, used when decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Unknown,
    Unsigned,
    Integer,
    Boolean,
    String,
    Float,
    Time,
    Uri,
}

/// Text capability a member exposes when encoding.
pub enum FieldText<'a> {
    /// Already a string.
    Str(&'a str),
    /// A timestamp, written in RFC 1123 form.
    Time(&'a DateTime<Utc>),
    /// Anything with a `Display` rendering.
    Display(&'a dyn fmt::Display),
    /// The result of the type's own text serialization.
    Text(Result<String, BoxError>),
    /// No field encoding.
    Unsupported,
}

impl FieldText<'_> {
    fn render(self) -> Option<Result<String, BoxError>> {
        match self {
            Self::Str(text) => Some(Ok(text.to_string())),
            Self::Time(timestamp) => Some(Ok(format_timestamp(timestamp))),
            Self::Display(value) => Some(Ok(value.to_string())),
            Self::Text(result) => Some(result),
            Self::Unsupported => None,
        }
    }
}

/// A member type that can live in a field.
pub trait FieldValue: Sized {
    /// How values of this type are decoded.
    fn kind() -> FieldKind;

    /// The text capability used to encode this value.
    fn field_text(&self) -> FieldText<'_>;

    /// Unset values are left out of the encoded fields.
    fn is_unset(&self) -> bool {
        false
    }

    /// Builds a value from the values of its field.
    ///
    /// Only called for kinds other than [`FieldKind::Unknown`].
    fn from_values(values: &[String]) -> Result<Self, BoxError>;
}

/// Encodes a value into a field block.
pub trait MarshalFields {
    /// Encodes `self` into a new field block.
    fn marshal_fields(&self) -> CodecResult<Fields>;
}

/// Decodes a field block into an existing value.
pub trait UnmarshalFields {
    /// Assigns every member whose field is present. Absent fields leave the
    /// member untouched.
    fn unmarshal_fields(&mut self, fields: &Fields) -> CodecResult<()>;
}

/// Decodes a field block into a fresh value.
pub fn from_fields<T: UnmarshalFields + Default>(fields: &Fields) -> CodecResult<T> {
    let mut value = T::default();
    value.unmarshal_fields(fields)?;
    Ok(value)
}

/// A record bound to one status code.
pub trait Record: MarshalFields {
    /// The status code this record travels under.
    const STATUS: StatusCode;

    /// Builds the message carrying this record.
    fn to_message(&self) -> CodecResult<Message> {
        Ok(Message::new(Self::STATUS, self.marshal_fields()?))
    }

    /// Decodes this record from a message with the matching status code.
    fn from_message(message: &Message) -> CodecResult<Self>
    where
        Self: UnmarshalFields + Default,
    {
        if message.status_code() != Self::STATUS.code() {
            return Err(CodecError::UnexpectedStatus {
                expected: Self::STATUS,
                actual: message.status_code(),
            });
        }
        from_fields(message.fields())
    }
}

/// One entry of a record's field table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Rust member name.
    pub member: &'static str,
    /// Explicit wire name, if the member overrides it.
    pub wire: Option<&'static str>,
}

impl FieldSpec {
    pub const fn new(member: &'static str, wire: Option<&'static str>) -> Self {
        Self { member, wire }
    }

    /// The name the field travels under: the override if any, otherwise the
    /// member name with underscores turned into hyphens.
    pub fn wire_name(&self) -> Cow<'static, str> {
        match self.wire {
            Some(wire) => Cow::Borrowed(wire),
            None => Cow::Owned(self.member.replace('_', "-")),
        }
    }
}

/// Encodes one record member. Used by [`field_record!`](crate::field_record).
pub fn encode_member<T: FieldValue>(
    fields: &mut Fields,
    record: &'static str,
    spec: &FieldSpec,
    value: &T,
) -> CodecResult<()> {
    if value.is_unset() {
        return Ok(());
    }
    let field = spec.wire_name();
    let content = match value.field_text().render() {
        Some(Ok(content)) => content,
        Some(Err(source)) => {
            return Err(CodecError::MarshalText {
                record,
                member: spec.member,
                source,
            });
        }
        None => {
            return Err(CodecError::Marshal {
                record,
                member: spec.member,
                field: field.into_owned(),
                type_name: std::any::type_name::<T>(),
            });
        }
    };
    fields.add(&field, content);
    Ok(())
}

/// Decodes one record member. Used by [`field_record!`](crate::field_record).
pub fn decode_member<T: FieldValue>(
    fields: &Fields,
    record: &'static str,
    spec: &FieldSpec,
    destination: &mut T,
) -> CodecResult<()> {
    let field = spec.wire_name();
    if !fields.contains(&field) {
        return Ok(());
    }
    if T::kind() == FieldKind::Unknown {
        return Err(CodecError::NoKnownConversion {
            record,
            member: spec.member,
            field: field.into_owned(),
            type_name: std::any::type_name::<T>(),
        });
    }
    *destination = T::from_values(fields.values(&field)).map_err(|source| CodecError::Parse {
        record,
        member: spec.member,
        field: field.into_owned(),
        type_name: std::any::type_name::<T>(),
        source,
    })?;
    Ok(())
}

fn first(values: &[String]) -> Result<&str, BoxError> {
    values
        .first()
        .map(String::as_str)
        .ok_or_else(|| "field has no value".into())
}

fn parse_unsigned<T>(text: &str) -> Result<T, BoxError>
where
    T: FromStr,
    T::Err: StdError + Send + Sync + 'static,
{
    if text.starts_with('+') {
        return Err(format!("invalid unsigned integer {text:?}").into());
    }
    Ok(text.parse()?)
}

fn parse_bool(text: &str) -> Result<bool, BoxError> {
    match text {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(false),
        _ => Err(format!("invalid boolean {text:?}").into()),
    }
}

impl FieldValue for String {
    fn kind() -> FieldKind {
        FieldKind::String
    }

    fn field_text(&self) -> FieldText<'_> {
        FieldText::Str(self)
    }

    fn is_unset(&self) -> bool {
        self.is_empty()
    }

    fn from_values(values: &[String]) -> Result<Self, BoxError> {
        Ok(values.join(","))
    }
}

impl FieldValue for bool {
    fn kind() -> FieldKind {
        FieldKind::Boolean
    }

    fn field_text(&self) -> FieldText<'_> {
        FieldText::Display(self)
    }

    fn is_unset(&self) -> bool {
        !*self
    }

    fn from_values(values: &[String]) -> Result<Self, BoxError> {
        parse_bool(first(values)?)
    }
}

macro_rules! numeric_field_value {
    ($kind:ident, $parse:expr, $($ty:ty),+) => {
        $(
            impl FieldValue for $ty {
                fn kind() -> FieldKind {
                    FieldKind::$kind
                }

                fn field_text(&self) -> FieldText<'_> {
                    FieldText::Display(self)
                }

                fn from_values(values: &[String]) -> Result<Self, BoxError> {
                    $parse(first(values)?)
                }
            }
        )+
    };
}

numeric_field_value!(Unsigned, parse_unsigned, u8, u16, u32, u64, usize);
numeric_field_value!(
    Integer,
    |text: &str| -> Result<_, BoxError> { Ok(text.parse()?) },
    i8,
    i16,
    i32,
    i64,
    isize
);
numeric_field_value!(
    Float,
    |text: &str| -> Result<_, BoxError> { Ok(text.parse()?) },
    f32,
    f64
);

impl FieldValue for DateTime<Utc> {
    fn kind() -> FieldKind {
        FieldKind::Time
    }

    fn field_text(&self) -> FieldText<'_> {
        FieldText::Time(self)
    }

    /// The comma after the weekday splits an RFC 1123 date into two values;
    /// they are rejoined before parsing.
    fn from_values(values: &[String]) -> Result<Self, BoxError> {
        first(values)?;
        Ok(parse_timestamp(&values.join(", "))?)
    }
}

impl FieldValue for Url {
    fn kind() -> FieldKind {
        FieldKind::Uri
    }

    fn field_text(&self) -> FieldText<'_> {
        FieldText::Display(self)
    }

    fn from_values(values: &[String]) -> Result<Self, BoxError> {
        Ok(Url::parse(first(values)?)?)
    }
}

impl<T: FieldValue> FieldValue for Option<T> {
    fn kind() -> FieldKind {
        T::kind()
    }

    fn field_text(&self) -> FieldText<'_> {
        match self {
            Some(value) => value.field_text(),
            None => FieldText::Str(""),
        }
    }

    fn is_unset(&self) -> bool {
        self.as_ref().is_none_or(FieldValue::is_unset)
    }

    fn from_values(values: &[String]) -> Result<Self, BoxError> {
        T::from_values(values).map(Some)
    }
}

/// Sequences never map onto a single field.
impl<T> FieldValue for Vec<T> {
    fn kind() -> FieldKind {
        FieldKind::Unknown
    }

    fn field_text(&self) -> FieldText<'_> {
        FieldText::Unsupported
    }

    fn from_values(_values: &[String]) -> Result<Self, BoxError> {
        Err("sequences have no field conversion".into())
    }
}

/// Declares a record struct together with its field table and its
/// [`MarshalFields`] / [`UnmarshalFields`] implementations.
///
/// A member may override its wire name with `as "Wire-Name"`; otherwise the
/// member name is used with underscores turned into hyphens. Every member
/// type must implement [`FieldValue`].
#[macro_export]
macro_rules! field_record {
    (@wire) => { None };
    (@wire $wire:literal) => { Some($wire) };
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$member_meta:meta])*
                $member_vis:vis $member:ident : $ty:ty $(as $wire:literal)?
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $(
                $(#[$member_meta])*
                $member_vis $member: $ty,
            )*
        }

        impl $name {
            /// Field table of this record, in encoding order.
            pub const FIELD_TABLE: &'static [$crate::codec::FieldSpec] = &[
                $(
                    $crate::codec::FieldSpec::new(
                        stringify!($member),
                        $crate::field_record!(@wire $($wire)?),
                    ),
                )*
            ];
        }

        impl $crate::codec::MarshalFields for $name {
            fn marshal_fields(&self) -> $crate::codec::CodecResult<$crate::Fields> {
                let mut fields = $crate::Fields::new();
                $(
                    $crate::codec::encode_member(
                        &mut fields,
                        stringify!($name),
                        &$crate::codec::FieldSpec::new(
                            stringify!($member),
                            $crate::field_record!(@wire $($wire)?),
                        ),
                        &self.$member,
                    )?;
                )*
                Ok(fields)
            }
        }

        impl $crate::codec::UnmarshalFields for $name {
            fn unmarshal_fields(
                &mut self,
                fields: &$crate::Fields,
            ) -> $crate::codec::CodecResult<()> {
                $(
                    $crate::codec::decode_member(
                        fields,
                        stringify!($name),
                        &$crate::codec::FieldSpec::new(
                            stringify!($member),
                            $crate::field_record!(@wire $($wire)?),
                        ),
                        &mut self.$member,
                    )?;
                )*
                Ok(())
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    crate::field_record! {
        #[derive(Debug, Default, Clone, PartialEq)]
        struct Dynamic {
            last_modified: Option<DateTime<Utc>> as "Last-Modified",
            uri: Option<Url> as "URI",
            password: String,
            needs_cleanup: bool,
            size: u64,
            offset: i32,
            ratio: f64,
        }
    }

    crate::field_record! {
        #[derive(Debug, Default)]
        struct WithSequence {
            alt_uris: Vec<String> as "Alt-URIs",
        }
    }

    /// Exposes only a text serialization capability.
    #[derive(Debug, Default, PartialEq)]
    struct Checksum(Vec<u8>);

    impl FieldValue for Checksum {
        fn kind() -> FieldKind {
            FieldKind::Unknown
        }

        fn field_text(&self) -> FieldText<'_> {
            if self.0.is_empty() {
                return FieldText::Text(Err("empty checksum".into()));
            }
            FieldText::Text(Ok(self.0.iter().map(|b| format!("{b:02x}")).collect()))
        }

        fn from_values(_values: &[String]) -> Result<Self, BoxError> {
            Err("unreachable".into())
        }
    }

    crate::field_record! {
        #[derive(Debug, Default)]
        struct WithChecksum {
            md5_hash: Checksum as "MD5-Hash",
        }
    }

    fn apt_release() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(1998, 3, 31, 0, 0, 0).unwrap()
    }

    #[test]
    fn field_table_names() {
        let names: Vec<_> = Dynamic::FIELD_TABLE
            .iter()
            .map(FieldSpec::wire_name)
            .collect();
        assert_eq!(
            names,
            ["Last-Modified", "URI", "password", "needs-cleanup", "size", "offset", "ratio"]
        );
    }

    #[test]
    fn marshal_uses_overrides_and_canonical_keys() {
        let record = Dynamic {
            uri: Some(Url::parse("http://example.com/").unwrap()),
            last_modified: Some(apt_release()),
            needs_cleanup: true,
            ..Default::default()
        };
        let fields = record.marshal_fields().unwrap();
        assert_eq!(fields.get("Last-Modified"), Some("Tue, 31 Mar 1998 00:00:00 GMT"));
        assert_eq!(fields.get("Uri"), Some("http://example.com/"));
        assert_eq!(fields.get("Needs-Cleanup"), Some("true"));
        assert!(!fields.contains("Password"));
        assert_eq!(fields.get("Size"), Some("0"));
    }

    #[test]
    fn unmarshal_dynamic() {
        let fields: Fields = [
            ("Last-Modified", "Tue, 31 Mar 1998 00:00:00 GMT"),
            ("URI", "test://testing.example.whatever"),
            ("Password", "hunter2"),
            ("Needs-Cleanup", "true"),
            ("Offset", "-12"),
        ]
        .into_iter()
        .collect();

        let dynamic: Dynamic = from_fields(&fields).unwrap();
        assert_eq!(dynamic.last_modified, Some(apt_release()));
        assert_eq!(
            dynamic.uri.as_ref().map(Url::as_str),
            Some("test://testing.example.whatever")
        );
        assert_eq!(dynamic.password, "hunter2");
        assert!(dynamic.needs_cleanup);
        assert_eq!(dynamic.offset, -12);
    }

    #[test]
    fn symmetric_roundtrip() {
        let record = Dynamic {
            last_modified: Some(apt_release()),
            uri: Some(Url::parse("https://deb.debian.org/debian/pool/main/a.deb").unwrap()),
            password: "hunter2".into(),
            needs_cleanup: true,
            size: 1_048_576,
            offset: -3,
            ratio: 0.25,
        };
        let fields = record.marshal_fields().unwrap();
        assert_eq!(from_fields::<Dynamic>(&fields).unwrap(), record);
    }

    #[test]
    fn string_members_join_all_values() {
        let fields: Fields = [("Password", "a"), ("Password", "b")].into_iter().collect();
        let dynamic: Dynamic = from_fields(&fields).unwrap();
        assert_eq!(dynamic.password, "a,b");
    }

    #[test]
    fn absent_fields_leave_members_untouched() {
        let mut dynamic = Dynamic {
            password: "kept".into(),
            ..Default::default()
        };
        let fields: Fields = [("Size", "7")].into_iter().collect();
        dynamic.unmarshal_fields(&fields).unwrap();
        assert_eq!(dynamic.password, "kept");
        assert_eq!(dynamic.size, 7);
    }

    #[test]
    fn strict_number_parsing() {
        for bad in ["+7", "0x10", "7 ", "-1"] {
            let fields: Fields = [("Size", bad)].into_iter().collect();
            let err = from_fields::<Dynamic>(&fields).unwrap_err();
            assert!(
                matches!(err, CodecError::Parse { member: "size", .. }),
                "{bad:?} accepted: {err:?}"
            );
        }
    }

    #[test]
    fn parse_failures_name_the_member() {
        let fields: Fields = [("Needs-Cleanup", "maybe")].into_iter().collect();
        let err = from_fields::<Dynamic>(&fields).unwrap_err();
        match err {
            CodecError::Parse {
                record,
                member,
                field,
                ..
            } => {
                assert_eq!(record, "Dynamic");
                assert_eq!(member, "needs_cleanup");
                assert_eq!(field, "needs-cleanup");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let fields: Fields = [("Last-Modified", "yesterday")].into_iter().collect();
        assert!(matches!(
            from_fields::<Dynamic>(&fields),
            Err(CodecError::Parse { member: "last_modified", .. })
        ));

        let fields: Fields = [("URI", "not a uri")].into_iter().collect();
        assert!(matches!(
            from_fields::<Dynamic>(&fields),
            Err(CodecError::Parse { member: "uri", .. })
        ));
    }

    #[test]
    fn sequences_are_rejected() {
        let record = WithSequence {
            alt_uris: vec!["http://a".into()],
        };
        let err = record.marshal_fields().unwrap_err();
        assert!(matches!(err, CodecError::Marshal { member: "alt_uris", .. }));
        assert!(err.to_string().contains("Vec<"));

        let fields: Fields = [("Alt-URIs", "http://a")].into_iter().collect();
        assert!(matches!(
            from_fields::<WithSequence>(&fields),
            Err(CodecError::NoKnownConversion { member: "alt_uris", .. })
        ));
    }

    #[test]
    fn text_capability_is_used_and_its_errors_surface() {
        let fields = WithChecksum {
            md5_hash: Checksum(vec![0xde, 0xad]),
        }
        .marshal_fields()
        .unwrap();
        assert_eq!(fields.get("Md5-Hash"), Some("dead"));

        let err = WithChecksum::default().marshal_fields().unwrap_err();
        assert!(matches!(err, CodecError::MarshalText { member: "md5_hash", .. }));
    }

    #[test]
    fn bool_literals() {
        for (text, expected) in [("1", true), ("T", true), ("True", true), ("0", false), ("false", false)] {
            assert_eq!(parse_bool(text).unwrap(), expected);
        }
        assert!(parse_bool("yes").is_err());
    }
}
