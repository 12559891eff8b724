//! Newline-delimited JSON framing for the drone wire protocol.
//!
//! All messages are framed as:
//! ```text
//! { ... JSON object ... } \n { ... JSON object ... } \n ...
//! ```
//! The framer tracks brace depth while respecting string literals and
//! escapes, so it accepts both newline-delimited and back-to-back objects
//! without intervening whitespace. Partial objects are buffered until
//! complete; an unterminated object at end-of-stream is a framing error.
//!
//! `FrameDecoder` accumulates into a `BytesMut` and is drained with
//! `extend`/`decode_next` in a loop, same shape as any incremental framer
//! over a streaming socket.

use bytes::{Buf, Bytes, BytesMut};
use thiserror::Error;

use crate::protocol::{ClientMessage, ServerMessage};

/// Frames larger than this are rejected rather than buffered indefinitely.
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("frame exceeds maximum size of {MAX_FRAME_SIZE} bytes")]
    FrameTooLarge,

    #[error("unterminated JSON object at end of stream")]
    UnterminatedFrame,

    #[error("malformed JSON in frame: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Scan `buf` for the first complete `{ ... }` object, tracking brace
/// depth while skipping over string literals (honoring `\"` escapes).
/// Returns the exclusive end offset of the object if one is complete.
///
/// A bare newline encountered while inside an opened-but-unclosed object
/// also ends the frame there: a drone that writes a truncated object and
/// then keeps writing past a line break (intentionally or after a bug)
/// should not wedge the decoder waiting for braces that will never
/// balance. The truncated bytes are handed to the caller as one frame,
/// which then fails to parse as JSON (a non-fatal `InvalidJson`, §4.4.5)
/// instead of silently absorbing every message that follows.
fn scan_frame(buf: &[u8]) -> Option<usize> {
    let mut depth: i32 = 0;
    let mut started = false;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in buf.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }

        match b {
            b'"' => in_string = true,
            b'{' => {
                depth += 1;
                started = true;
            }
            b'}' => {
                depth -= 1;
                if started && depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }

    None
}

/// Streaming decoder: accumulates bytes and yields complete frames.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: BytesMut,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
        }
    }

    /// Add freshly-read bytes to the decoder.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Try to pull the next complete raw frame out of the buffer.
    ///
    /// Call this repeatedly until it returns `Ok(None)` to drain every
    /// frame currently buffered.
    pub fn next_frame(&mut self) -> Result<Option<Bytes>, CodecError> {
        if self.buffer.len() > MAX_FRAME_SIZE && scan_frame(&self.buffer).is_none() {
            return Err(CodecError::FrameTooLarge);
        }

        match scan_frame(&self.buffer) {
            Some(end) => {
                let frame = self.buffer.split_to(end);
                // Skip a single trailing newline separator, if present.
                if self.buffer.first() == Some(&b'\n') {
                    self.buffer.advance(1);
                }
                Ok(Some(frame.freeze()))
            }
            None => Ok(None),
        }
    }

    /// Try to pull and parse the next message. A parse failure (malformed
    /// JSON or unrecognized `type`) is *not* fatal: the frame is already
    /// delimited, so the caller should count the error and keep reading.
    pub fn decode_next(&mut self) -> Result<Option<ClientMessage>, CodecError> {
        match self.next_frame()? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }

    /// Call once the underlying stream has reached EOF. Any non-whitespace
    /// bytes still buffered mean an object was left unterminated, which is
    /// a fatal framing error per §4.3.
    pub fn finish(&self) -> Result<(), CodecError> {
        if self.buffer.iter().any(|b| !b.is_ascii_whitespace()) {
            Err(CodecError::UnterminatedFrame)
        } else {
            Ok(())
        }
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }
}

/// Encode a `ServerMessage` as a single newline-terminated JSON line.
pub fn encode(msg: &ServerMessage) -> Result<Bytes, CodecError> {
    let mut buf = serde_json::to_vec(msg)?;
    buf.push(b'\n');
    Ok(Bytes::from(buf))
}
