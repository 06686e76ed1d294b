//! Splitting a byte stream into message frames.
//!
//! A frame is everything up to the first blank line:
//!
//! ```text
//! +--------------------------+------+
//! | status line + fields     | \n\n |
//! +--------------------------+------+
//! ```
//!
//! The terminator is consumed and not part of the frame. [`scan_frame`] is the
//! pure split step; [`FrameCodec`] and [`MessageCodec`] drive it from a
//! `tokio_util` [`FramedRead`](tokio_util::codec::FramedRead), and
//! [`MessageScanner`] drives it over a blocking reader.

use std::io::{ErrorKind, Read};

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{ProtocolError, ProtocolResult};
use crate::message::Message;

/// Default upper bound for a single pending frame: 1 MiB.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1_048_576;

const TERMINATOR: &[u8] = b"\n\n";

/// Finds the next frame in `data`.
///
/// Returns the number of bytes to consume together with the frame, or `None`
/// when more data is needed. At end of input an empty buffer is a clean end
/// and anything else is [`ProtocolError::UnexpectedEof`].
pub fn scan_frame(data: &[u8], at_eof: bool) -> ProtocolResult<Option<(usize, &[u8])>> {
    if let Some(index) = find_terminator(data, 0) {
        return Ok(Some((index + TERMINATOR.len(), &data[..index])));
    }
    if at_eof && !data.is_empty() {
        return Err(ProtocolError::UnexpectedEof {
            pending: data.len(),
        });
    }
    Ok(None)
}

fn find_terminator(data: &[u8], from: usize) -> Option<usize> {
    data.get(from..)?
        .windows(TERMINATOR.len())
        .position(|window| window == TERMINATOR)
        .map(|index| index + from)
}

/// Decoder yielding raw frames.
#[derive(Debug)]
pub struct FrameCodec {
    max_frame_size: usize,
    searched: usize,
}

impl FrameCodec {
    /// Creates a codec with the [`DEFAULT_MAX_FRAME_SIZE`] limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_frame_size(DEFAULT_MAX_FRAME_SIZE)
    }

    /// Creates a codec rejecting pending frames longer than `max_frame_size`.
    #[must_use]
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            max_frame_size,
            searched: 0,
        }
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = Bytes;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> ProtocolResult<Option<Bytes>> {
        // Resume one byte early: the terminator may straddle two reads.
        let from = self.searched.saturating_sub(1);
        match find_terminator(src, from) {
            Some(index) => {
                self.searched = 0;
                let frame = src.split_to(index).freeze();
                let _ = src.split_to(TERMINATOR.len());
                Ok(Some(frame))
            }
            None if src.len() > self.max_frame_size => Err(ProtocolError::FrameTooLarge {
                size: src.len(),
                max: self.max_frame_size,
            }),
            None => {
                self.searched = src.len();
                Ok(None)
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> ProtocolResult<Option<Bytes>> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() => Ok(None),
            None => Err(ProtocolError::UnexpectedEof { pending: src.len() }),
        }
    }
}

/// Codec yielding decoded [`Message`]s and encoding them back.
#[derive(Debug, Default)]
pub struct MessageCodec {
    frames: FrameCodec,
}

impl MessageCodec {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            frames: FrameCodec::with_max_frame_size(max_frame_size),
        }
    }
}

impl Decoder for MessageCodec {
    type Item = Message;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> ProtocolResult<Option<Message>> {
        self.frames
            .decode(src)?
            .map(|frame| Message::decode(&frame))
            .transpose()
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> ProtocolResult<Option<Message>> {
        self.frames
            .decode_eof(src)?
            .map(|frame| Message::decode(&frame))
            .transpose()
    }
}

impl Encoder<Message> for MessageCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> ProtocolResult<()> {
        dst.extend_from_slice(&item.encode()?);
        Ok(())
    }
}

/// Blocking iterator over the messages of a reader.
///
/// Yields `Err` once on the first read, framing or decoding failure and ends
/// after it.
pub struct MessageScanner<R> {
    reader: R,
    buffer: BytesMut,
    codec: MessageCodec,
    done: bool,
}

impl<R: Read> MessageScanner<R> {
    pub fn new(reader: R) -> Self {
        Self::with_codec(reader, MessageCodec::new())
    }

    pub fn with_codec(reader: R, codec: MessageCodec) -> Self {
        Self {
            reader,
            buffer: BytesMut::new(),
            codec,
            done: false,
        }
    }

    /// Reads the next message. `Ok(None)` is a clean end of input.
    pub fn next_message(&mut self) -> ProtocolResult<Option<Message>> {
        let mut chunk = [0u8; 4096];
        loop {
            if let Some(message) = self.codec.decode(&mut self.buffer)? {
                return Ok(Some(message));
            }
            match self.reader.read(&mut chunk) {
                Ok(0) => return self.codec.decode_eof(&mut self.buffer),
                Ok(n) => self.buffer.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Returns the underlying reader.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: Read> Iterator for MessageScanner<R> {
    type Item = ProtocolResult<Message>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let next = self.next_message().transpose();
        if !matches!(next, Some(Ok(_))) {
            self.done = true;
        }
        next
    }
}
