//! Single-field informational records: Log, Status, Warning and General
//! Failure. Each carries one `Message` field that must not be empty.

use std::fmt;

use crate::codec::{CodecError, CodecResult, MarshalFields, Record, UnmarshalFields};
use crate::fields::Fields;
use crate::status::StatusCode;

const MESSAGE: &str = "Message";

macro_rules! text_record {
    ($(#[$meta:meta])* $name:ident => $status:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(text: impl Into<String>) -> Self {
                Self(text.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(text: String) -> Self {
                Self(text)
            }
        }

        impl From<&str> for $name {
            fn from(text: &str) -> Self {
                Self(text.to_string())
            }
        }

        impl MarshalFields for $name {
            fn marshal_fields(&self) -> CodecResult<Fields> {
                if self.0.is_empty() {
                    return Err(CodecError::EmptyInformational {
                        record: stringify!($name),
                    });
                }
                let mut fields = Fields::new();
                fields.add(MESSAGE, self.0.as_str());
                Ok(fields)
            }
        }

        impl UnmarshalFields for $name {
            fn unmarshal_fields(&mut self, fields: &Fields) -> CodecResult<()> {
                if fields.contains(MESSAGE) {
                    self.0 = fields.values(MESSAGE).join(",");
                }
                Ok(())
            }
        }

        impl Record for $name {
            const STATUS: StatusCode = StatusCode::$status;
        }
    };
}

text_record! {
    /// Debug output for the parent's log (101).
    Log => Log
}

text_record! {
    /// Progress text shown to the user (102).
    Status => Status
}

text_record! {
    /// Non-fatal problem (104).
    Warning => Warning
}

text_record! {
    /// Failure of the method as a whole (401).
    GeneralFailure => GeneralFailure
}

impl std::error::Error for GeneralFailure {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::from_fields;

    #[test]
    fn encodes_message_field() {
        let message = Status::new("Connecting to mirror").to_message().unwrap();
        assert_eq!(message.status_code(), 102);
        assert_eq!(message.summary(), "Status");
        assert_eq!(message.fields().get("Message"), Some("Connecting to mirror"));
    }

    #[test]
    fn empty_text_is_rejected() {
        for err in [
            Log::default().to_message().unwrap_err(),
            Warning::default().to_message().unwrap_err(),
            GeneralFailure::new("").to_message().unwrap_err(),
        ] {
            assert!(matches!(err, CodecError::EmptyInformational { .. }));
        }
    }

    #[test]
    fn general_failure_is_an_error() {
        let failure = GeneralFailure::from("disk on fire");
        let err: Box<dyn std::error::Error> = Box::new(failure.clone());
        assert_eq!(err.to_string(), "disk on fire");
        assert_eq!(failure.to_message().unwrap().summary(), "General Failure");
    }

    #[test]
    fn decodes_text_with_commas() {
        let fields: Fields = [("Message", "a, b")].into_iter().collect();
        let log: Log = from_fields(&fields).unwrap();
        assert_eq!(log.as_str(), "a,b");
    }
}
