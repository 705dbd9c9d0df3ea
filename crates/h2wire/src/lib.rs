// Passive SPDY/HTTP-2 wire decoding: frame codec, header-block codecs,
// per-stream reassembly and per-session decode state.

mod error;
mod frame;
mod header;
mod hpack;
mod limits;
mod session;
mod spdy;
mod stream;

#[cfg(feature = "tracing")]
macro_rules! trace_warn {
    ($($arg:tt)*) => { ::tracing::warn!($($arg)*) }
}
#[cfg(not(feature = "tracing"))]
macro_rules! trace_warn {
    ($($arg:tt)*) => {};
}
#[cfg(feature = "tracing")]
macro_rules! trace_debug {
    ($($arg:tt)*) => { ::tracing::debug!($($arg)*) }
}
#[cfg(not(feature = "tracing"))]
macro_rules! trace_debug {
    ($($arg:tt)*) => {};
}
pub(crate) use trace_debug;
pub(crate) use trace_warn;

pub use error::{H2Error, H2ErrorKind};
pub use frame::{
    decode_frame, encode_frame, frame, is_http2_preface, ErrorCode, Frame, FrameBody, FrameHeader,
    Priority, Settings, StreamId, CONNECTION_PREFACE, DEFAULT_HEADER_TABLE_SIZE,
    DEFAULT_MAX_HEADER_LIST_SIZE, FLAG_END_HEADERS, FLAG_END_STREAM, FRAME_HEADER_SIZE,
    MAX_FRAME_PAYLOAD_LENGTH, SETTINGS_HEADER_TABLE_SIZE, SETTINGS_MAX_HEADER_LIST_SIZE,
};
pub use header::HeaderBlock;
pub use hpack::{DynamicTable, HpackDecoder, HpackEncoder};
pub use limits::H2Limits;
pub use session::{H2Direction, H2Event, H2SessionState};
pub use spdy::{decode_name_value_block, encode_name_value_block, SPDY_DICTIONARY};
pub use stream::{Http2Request, Http2Response, Http2Stream};
