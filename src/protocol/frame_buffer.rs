//! Decode buffer for accumulating partial reads.
//!
//! The inbound pipe delivers bytes in arbitrary chunks: a frame may be split
//! mid-header or mid-body, and several frames may arrive as one chunk. The
//! buffer implements a state machine over a single `bytes::BytesMut`:
//!
//! - `WaitingForHeader`: scan for the `\r\n\r\n` terminator
//! - `WaitingForBody`: header parsed, need `Content-Length` more bytes
//!
//! Length-prefixed parsing is load-bearing here: a JSON body may itself
//! contain the header's byte pattern as a substring, so splitting the stream
//! on the header pattern is unsafe.
//!
//! # Example
//!
//! ```
//! use copilot_rpc::protocol::FrameBuffer;
//!
//! let mut buffer = FrameBuffer::new();
//! // Header split across two chunks: nothing yields until it completes.
//! assert!(buffer.push(b"Content-Le").unwrap().is_empty());
//! let payloads = buffer.push(b"ngth: 14\r\n\r\n{\"method\":\"m\"}").unwrap();
//! assert_eq!(payloads.len(), 1);
//! ```

use bytes::BytesMut;
use serde_json::Value;

use super::frame::{CONTENT_LENGTH, HEADER_TERMINATOR};
use crate::error::{Result, RpcError};

/// Default maximum body size (16 MiB).
pub const DEFAULT_MAX_BODY_SIZE: usize = 16 * 1024 * 1024;

/// Maximum bytes a header block may occupy before the stream is considered
/// desynchronized.
pub const MAX_HEADER_SIZE: usize = 4 * 1024;

/// State machine for frame parsing.
#[derive(Debug, Clone, Copy)]
enum State {
    /// Waiting for a complete header block.
    WaitingForHeader,
    /// Header parsed, waiting for `len` body bytes.
    WaitingForBody { len: usize },
}

/// Buffer for accumulating inbound bytes and extracting complete payloads.
///
/// Grows on each chunk arrival, shrinks by exactly the bytes consumed when
/// frames are extracted, and persists for the lifetime of the connection.
pub struct FrameBuffer {
    buffer: BytesMut,
    state: State,
    max_body_size: usize,
}

impl FrameBuffer {
    /// Create a new frame buffer with the default body-size limit.
    pub fn new() -> Self {
        Self::with_max_body(DEFAULT_MAX_BODY_SIZE)
    }

    /// Create a new frame buffer with a custom body-size limit.
    pub fn with_max_body(max_body_size: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(64 * 1024),
            state: State::WaitingForHeader,
            max_body_size,
        }
    }

    /// Push a chunk into the buffer and extract all complete payloads.
    ///
    /// Returns every payload whose frame completed with this chunk, in wire
    /// order. A body that fails JSON parsing is logged and skipped; the
    /// buffer stays aligned on the next frame boundary, so independent
    /// frames after it still decode.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::Frame`] if a declared body length exceeds the
    /// configured maximum or a header block grows past [`MAX_HEADER_SIZE`].
    /// Both leave the stream unrecoverable.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<Value>> {
        self.buffer.extend_from_slice(chunk);

        let mut payloads = Vec::new();

        while let Some(body) = self.try_extract_body()? {
            match serde_json::from_slice::<Value>(&body) {
                Ok(payload) => payloads.push(payload),
                Err(err) => {
                    tracing::warn!(%err, len = body.len(), "discarding unparsable frame body");
                }
            }
        }

        Ok(payloads)
    }

    /// Try to extract a single complete body from the buffer.
    ///
    /// Returns `Ok(None)` when more data is needed.
    fn try_extract_body(&mut self) -> Result<Option<BytesMut>> {
        loop {
            match self.state {
                State::WaitingForHeader => {
                    let Some(pos) = find_terminator(&self.buffer) else {
                        if self.buffer.len() > MAX_HEADER_SIZE {
                            return Err(RpcError::Frame(format!(
                                "no header terminator within {MAX_HEADER_SIZE} bytes"
                            )));
                        }
                        return Ok(None);
                    };

                    let header = self.buffer.split_to(pos + HEADER_TERMINATOR.len());
                    let Some(len) = parse_content_length(&header[..pos]) else {
                        // Unframeable header block; drop it and realign on
                        // the next one.
                        tracing::warn!("discarding header block without a valid Content-Length");
                        continue;
                    };

                    if len > self.max_body_size {
                        return Err(RpcError::Frame(format!(
                            "declared body length {len} exceeds maximum {}",
                            self.max_body_size
                        )));
                    }

                    self.state = State::WaitingForBody { len };
                }

                State::WaitingForBody { len } => {
                    if self.buffer.len() < len {
                        return Ok(None);
                    }

                    let body = self.buffer.split_to(len);
                    self.state = State::WaitingForHeader;
                    return Ok(Some(body));
                }
            }
        }
    }

    /// Number of buffered, not-yet-consumed bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer holds no pending bytes.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Locate the `\r\n\r\n` header terminator.
fn find_terminator(buf: &[u8]) -> Option<usize> {
    buf.windows(HEADER_TERMINATOR.len())
        .position(|w| w == HEADER_TERMINATOR)
}

/// Parse `Content-Length` out of a header block.
///
/// Header names match case-insensitively and unknown headers such as
/// `Content-Type` are ignored.
fn parse_content_length(header: &[u8]) -> Option<usize> {
    let text = std::str::from_utf8(header).ok()?;

    for line in text.split("\r\n") {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        if name.trim().eq_ignore_ascii_case(CONTENT_LENGTH) {
            if let Ok(len) = value.trim().parse::<usize>() {
                return Some(len);
            }
        }
    }

    None
}
