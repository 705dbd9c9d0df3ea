use crate::frame::{ErrorCode, StreamId};
use std::fmt;

/// Hard decode failure. Soft "need more bytes" conditions are never
/// represented here — incremental entry points return `Ok(None)` for those.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct H2Error {
    pub kind: H2ErrorKind,
    pub stream_id: Option<StreamId>,
}

impl H2Error {
    pub fn new(kind: H2ErrorKind) -> Self {
        Self {
            kind,
            stream_id: None,
        }
    }

    pub fn with_stream(kind: H2ErrorKind, stream_id: StreamId) -> Self {
        Self {
            kind,
            stream_id: Some(stream_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum H2ErrorKind {
    /// Frame type this decoder refuses to parse (PUSH_PROMISE, CONTINUATION,
    /// or an unknown type byte).
    UnsupportedFrame(u8),
    /// Declared payload length exceeds 2^24 - 1.
    FrameTooLarge(u32),
    /// Frame body decode did not consume exactly the declared length.
    FrameLengthMismatch,
    /// Pad length larger than the remaining frame body.
    InvalidPadding,
    /// HEADERS frame without END_HEADERS (continuations unsupported).
    MissingEndHeaders,
    /// SETTINGS payload not a multiple of 6 bytes.
    SettingsLength(u32),
    /// RST_STREAM status this decoder does not treat as benign teardown.
    UnsupportedRstStatus(ErrorCode),
    /// Header block ended mid-representation.
    TruncatedHeaderBlock,
    /// HPACK integer exceeded the decodable range.
    IntegerOverflow,
    /// Index outside the static + dynamic table range.
    InvalidIndex(usize),
    /// Malformed Huffman bit stream (bad padding or embedded EOS).
    HuffmanDecode,
    /// Dynamic-table size update above the negotiated maximum.
    TableSizeExceeded(usize),
    /// Field demanded incremental indexing but exceeds the per-field cap.
    FieldTooLarge(usize),
    /// Cumulative decoded header size above the list limit.
    HeaderListTooLarge,
    /// Header name or value was not valid UTF-8.
    InvalidUtf8,
    ZeroLengthHeaderName,
    UppercaseHeaderName(String),
    DuplicateHeaderName(String),
    /// DEFLATE stream could not be inflated (SPDY name/value block).
    Inflate(String),
    /// Name/value block had bytes left over after the declared pair count.
    TrailingBlockBytes(usize),
}

impl fmt::Display for H2Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.stream_id {
            Some(id) => write!(f, "{} (stream {})", self.kind, id.0),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl fmt::Display for H2ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            H2ErrorKind::UnsupportedFrame(t) => {
                write!(f, "unsupported frame type 0x{t:02x}")
            }
            H2ErrorKind::FrameTooLarge(len) => {
                write!(f, "frame length {len} exceeds 24-bit maximum")
            }
            H2ErrorKind::FrameLengthMismatch => {
                write!(f, "frame body did not consume the declared length")
            }
            H2ErrorKind::InvalidPadding => write!(f, "pad length exceeds frame body"),
            H2ErrorKind::MissingEndHeaders => {
                write!(f, "HEADERS without END_HEADERS is not supported")
            }
            H2ErrorKind::SettingsLength(len) => {
                write!(f, "SETTINGS payload length {len} is not a multiple of 6")
            }
            H2ErrorKind::UnsupportedRstStatus(code) => {
                write!(f, "unsupported RST_STREAM status {code:?}")
            }
            H2ErrorKind::TruncatedHeaderBlock => write!(f, "header block truncated"),
            H2ErrorKind::IntegerOverflow => write!(f, "header block integer overflow"),
            H2ErrorKind::InvalidIndex(i) => write!(f, "header table index {i} out of range"),
            H2ErrorKind::HuffmanDecode => write!(f, "malformed Huffman string"),
            H2ErrorKind::TableSizeExceeded(size) => {
                write!(f, "dynamic table size update {size} above maximum")
            }
            H2ErrorKind::FieldTooLarge(size) => {
                write!(f, "indexed field of size {size} exceeds per-field cap")
            }
            H2ErrorKind::HeaderListTooLarge => write!(f, "decoded header list too large"),
            H2ErrorKind::InvalidUtf8 => write!(f, "header bytes are not valid UTF-8"),
            H2ErrorKind::ZeroLengthHeaderName => write!(f, "zero-length header name"),
            H2ErrorKind::UppercaseHeaderName(name) => {
                write!(f, "header name {name:?} contains uppercase")
            }
            H2ErrorKind::DuplicateHeaderName(name) => {
                write!(f, "duplicate header name {name:?}")
            }
            H2ErrorKind::Inflate(msg) => write!(f, "name/value block inflate failed: {msg}"),
            H2ErrorKind::TrailingBlockBytes(n) => {
                write!(f, "{n} trailing bytes after name/value pairs")
            }
        }
    }
}

impl std::error::Error for H2Error {}

impl From<H2ErrorKind> for H2Error {
    fn from(kind: H2ErrorKind) -> Self {
        H2Error::new(kind)
    }
}
