//! Protocol module - message model, wire framing, and the decode buffer.
//!
//! The wire format is the LSP base protocol: each message is one frame of
//! ASCII headers terminated by `\r\n\r\n`, followed by exactly
//! `Content-Length` bytes of UTF-8 JSON text.

mod frame;
mod frame_buffer;
mod message;

pub use frame::{encode_frame, encode_message, CONTENT_LENGTH, HEADER_TERMINATOR};
pub use frame_buffer::{FrameBuffer, DEFAULT_MAX_BODY_SIZE, MAX_HEADER_SIZE};
pub use message::{Incoming, Notification, Request, JSONRPC_VERSION};
