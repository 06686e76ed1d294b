//! Wire format of package manager transport methods.
//!
//! A method talks to its parent over stdin/stdout with RFC 822 style
//! messages, each a status line, a block of `Key: value` fields and a blank
//! line:
//!
//! ```text
//! 100 Capabilities
//! Send-Config: true
//! Version: 1.0
//!
//! ```
//!
//! - [`Fields`] and [`Message`] model one message and its encoding.
//! - [`framing`] splits a byte stream into messages.
//! - [`codec`] maps typed [`records`] onto fields.
//!
//! # Example
//!
//! ```rust
//! use aptmethod_protocol::{Message, codec::Record, records::Capabilities};
//!
//! let capabilities = Capabilities { send_config: true, ..Capabilities::new("1.0") };
//! let bytes = capabilities.to_message().unwrap().encode().unwrap();
//! let frame = &bytes[..bytes.len() - 2];
//! let decoded = Capabilities::from_message(&Message::decode(frame).unwrap()).unwrap();
//! assert_eq!(decoded, capabilities);
//! ```

pub mod codec;
mod error;
mod fields;
pub mod framing;
mod message;
pub mod records;
mod status;

pub use codec::{CodecError, CodecResult, MarshalFields, Record, UnmarshalFields};
pub use error::{ProtocolError, ProtocolResult};
pub use fields::{Fields, canonical_key};
pub use framing::{DEFAULT_MAX_FRAME_SIZE, FrameCodec, MessageCodec, MessageScanner, scan_frame};
pub use message::Message;
pub use status::{StatusCode, status_text};
