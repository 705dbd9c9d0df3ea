use h2wire::H2Error;
use std::fmt;

/// Hard decode failure for the text-protocol side. Soft "need more bytes"
/// conditions never appear here; parsers express those as a rolled-back
/// NotReady return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Binary-layer failure bubbled up from the HTTP/2 session.
    H2(H2Error),
    /// Chunk-size hex span longer than the corruption guard allows.
    ChunkSizeTooLong(usize),
    /// Chunk-size line that is not valid hex.
    InvalidChunkSize(String),
    /// Chunk payload not followed by CRLF.
    InvalidChunkTerminator,
    /// Status-code token that is not a 3-digit number.
    InvalidStatusCode(String),
    /// Content-Length header that does not parse as a size.
    InvalidContentLength(String),
    /// Start-line or header token above the configured cap.
    TokenTooLong(usize),
    /// multipart Content-Type without a boundary parameter.
    MissingMultipartBoundary,
    /// Content-Range that does not match `bytes <first>-<last>/<total>`.
    InvalidContentRange(String),
    /// WebSocket opcode outside the RFC 6455 set this decoder handles.
    UnsupportedWsOpcode(u8),
    /// WebSocket declared payload length above the configured cap.
    WsPayloadTooLarge(u64),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::H2(e) => write!(f, "http/2 decode failed: {e}"),
            DecodeError::ChunkSizeTooLong(n) => {
                write!(f, "chunk-size hex span of {n} chars exceeds guard")
            }
            DecodeError::InvalidChunkSize(line) => {
                write!(f, "invalid chunk-size line {line:?}")
            }
            DecodeError::InvalidChunkTerminator => {
                write!(f, "chunk payload not terminated by CRLF")
            }
            DecodeError::InvalidStatusCode(token) => {
                write!(f, "invalid status code {token:?}")
            }
            DecodeError::InvalidContentLength(value) => {
                write!(f, "invalid content-length {value:?}")
            }
            DecodeError::TokenTooLong(n) => write!(f, "token of {n} bytes exceeds cap"),
            DecodeError::MissingMultipartBoundary => {
                write!(f, "multipart content-type without boundary parameter")
            }
            DecodeError::InvalidContentRange(value) => {
                write!(f, "invalid content-range {value:?}")
            }
            DecodeError::UnsupportedWsOpcode(op) => {
                write!(f, "unsupported websocket opcode 0x{op:x}")
            }
            DecodeError::WsPayloadTooLarge(len) => {
                write!(f, "websocket payload of {len} bytes exceeds cap")
            }
        }
    }
}

impl std::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DecodeError::H2(e) => Some(e),
            _ => None,
        }
    }
}

impl From<H2Error> for DecodeError {
    fn from(e: H2Error) -> Self {
        DecodeError::H2(e)
    }
}
