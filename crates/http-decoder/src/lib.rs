//! Passive reconstruction of HTTP/1.x, HTTP/2 and WebSocket exchanges from
//! captured, per-direction-ordered TCP payload bytes.
//!
//! The decoder never writes to the wire. Callers feed each captured segment
//! into [`HttpDecoder::handle_tx`] / [`HttpDecoder::handle_rx`] for the
//! owning session; completed messages are multicast to the registered
//! [`HttpProcessor`]s. Streams that are not HTTP at all are handed to an
//! optional [`FallbackProcessor`].

mod buffer;
mod decoder;
mod error;
mod h1;
mod message;
mod session;
mod traits;
mod websocket;

pub use buffer::SessionBuffer;
pub use decoder::HttpDecoder;
pub use error::DecodeError;
pub use h1::{H1Event, ParseOutcome, RequestParser, ResponseParser, HTTP2_PREFACE};
pub use message::{
    header_str, BodyClass, ByteRangeSlice, HttpRequest, HttpResponse, MessageFlags,
};
pub use session::{HttpSession, SessionKey, SessionMode, SessionRegistry};
pub use traits::{FallbackProcessor, HttpProcessor};
pub use websocket::{encode_ws_frame, WsFrame, WsFrameDecoder, WsOpcode};

pub use h2wire::H2Limits;

/// Decode-side resource limits and corruption guards.
#[derive(Debug, Clone)]
pub struct DecoderConfig {
    pub h2_limits: H2Limits,
    /// Largest start-line token or header line accepted.
    pub max_token_len: usize,
    /// Longest chunk-size hex span before the stream is treated as corrupt.
    pub max_chunk_hex_digits: usize,
    /// Largest declared WebSocket frame payload accepted.
    pub max_ws_payload: u64,
    /// Cap on bytes held per direction while waiting for a message to
    /// complete.
    pub max_buffered_bytes: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            h2_limits: H2Limits::default(),
            max_token_len: 8192,
            max_chunk_hex_digits: 22,
            max_ws_payload: 64 * 1024 * 1024,
            max_buffered_bytes: 16 * 1024 * 1024,
        }
    }
}
