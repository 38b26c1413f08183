//! Outbound frame encoding.
//!
//! A frame is `Content-Length: <N>\r\n\r\n` followed by exactly `N` bytes of
//! UTF-8 JSON. `N` is the byte length of the serialized body, not its
//! character count; bodies containing multi-byte characters would otherwise
//! truncate the next frame's boundary.

use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;

use crate::error::Result;

/// Header name used on both directions of the wire.
pub const CONTENT_LENGTH: &str = "Content-Length";

/// Header-block terminator.
pub const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Wrap an already-serialized JSON body into a wire frame.
pub fn encode_frame(body: &[u8]) -> Bytes {
    let header = format!("{}: {}\r\n\r\n", CONTENT_LENGTH, body.len());
    let mut buf = BytesMut::with_capacity(header.len() + body.len());
    buf.put_slice(header.as_bytes());
    buf.put_slice(body);
    buf.freeze()
}

/// Serialize a message and wrap it into a wire frame.
pub fn encode_message<T: Serialize>(message: &T) -> Result<Bytes> {
    let body = serde_json::to_vec(message)?;
    Ok(encode_frame(&body))
}
