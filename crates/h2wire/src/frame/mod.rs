use crate::error::{H2Error, H2ErrorKind};
use std::fmt;


/// HTTP/2 connection preface: "PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n"
pub const CONNECTION_PREFACE: &[u8; 24] = b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n";

/// Frame types
pub(crate) const FRAME_TYPE_DATA: u8 = 0x00;
pub(crate) const FRAME_TYPE_HEADERS: u8 = 0x01;
pub(crate) const FRAME_TYPE_PRIORITY: u8 = 0x02;
pub(crate) const FRAME_TYPE_RST_STREAM: u8 = 0x03;
pub(crate) const FRAME_TYPE_SETTINGS: u8 = 0x04;
pub(crate) const FRAME_TYPE_PING: u8 = 0x06;
pub(crate) const FRAME_TYPE_GOAWAY: u8 = 0x07;
pub(crate) const FRAME_TYPE_WINDOW_UPDATE: u8 = 0x08;

/// Frame flags
pub const FLAG_END_STREAM: u8 = 0x01;
pub const FLAG_END_HEADERS: u8 = 0x04;
pub const FLAG_PADDED: u8 = 0x08;
pub const FLAG_PRIORITY: u8 = 0x20;

/// Frame header size (9 bytes)
pub const FRAME_HEADER_SIZE: usize = 9;

/// Maximum allowed frame payload length (2^24 - 1)
pub const MAX_FRAME_PAYLOAD_LENGTH: u32 = (1 << 24) - 1;

/// Settings identifiers this decoder looks up
pub const SETTINGS_HEADER_TABLE_SIZE: u16 = 0x01;
pub const SETTINGS_MAX_HEADER_LIST_SIZE: u16 = 0x06;

pub const DEFAULT_HEADER_TABLE_SIZE: u32 = 0x10000;
pub const DEFAULT_MAX_HEADER_LIST_SIZE: u32 = 0x40000;

/// 31-bit stream identifier (reserved high bit already masked off).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(pub u32);

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Check if buffer starts with the HTTP/2 connection preface
pub fn is_http2_preface(buffer: &[u8]) -> bool {
    buffer.len() >= CONNECTION_PREFACE.len() && buffer.starts_with(CONNECTION_PREFACE)
}

/// Parsed 9-byte frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub length: u32,
    pub frame_type: u8,
    pub flags: u8,
    pub stream_id: StreamId,
}

impl FrameHeader {
    pub fn end_stream(&self) -> bool {
        self.flags & FLAG_END_STREAM != 0
    }

    pub fn end_headers(&self) -> bool {
        self.flags & FLAG_END_HEADERS != 0
    }

    fn padded(&self) -> bool {
        self.flags & FLAG_PADDED != 0
    }

    fn has_priority(&self) -> bool {
        self.flags & FLAG_PRIORITY != 0
    }
}

/// RST_STREAM / GOAWAY status codes. Closed enum: ordinals this decoder was
/// not taught map to `Unknown` and keep their wire value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    NoError,
    ProtocolError,
    InternalError,
    FlowControlError,
    SettingsTimeout,
    StreamClosed,
    FrameSizeError,
    RefusedStream,
    Cancel,
    CompressionError,
    ConnectError,
    EnhanceYourCalm,
    InadequateSecurity,
    Http11Required,
    Unknown(u32),
}

impl ErrorCode {
    pub fn from_wire(value: u32) -> Self {
        match value {
            0x0 => ErrorCode::NoError,
            0x1 => ErrorCode::ProtocolError,
            0x2 => ErrorCode::InternalError,
            0x3 => ErrorCode::FlowControlError,
            0x4 => ErrorCode::SettingsTimeout,
            0x5 => ErrorCode::StreamClosed,
            0x6 => ErrorCode::FrameSizeError,
            0x7 => ErrorCode::RefusedStream,
            0x8 => ErrorCode::Cancel,
            0x9 => ErrorCode::CompressionError,
            0xa => ErrorCode::ConnectError,
            0xb => ErrorCode::EnhanceYourCalm,
            0xc => ErrorCode::InadequateSecurity,
            0xd => ErrorCode::Http11Required,
            other => ErrorCode::Unknown(other),
        }
    }

    pub fn to_wire(self) -> u32 {
        match self {
            ErrorCode::NoError => 0x0,
            ErrorCode::ProtocolError => 0x1,
            ErrorCode::InternalError => 0x2,
            ErrorCode::FlowControlError => 0x3,
            ErrorCode::SettingsTimeout => 0x4,
            ErrorCode::StreamClosed => 0x5,
            ErrorCode::FrameSizeError => 0x6,
            ErrorCode::RefusedStream => 0x7,
            ErrorCode::Cancel => 0x8,
            ErrorCode::CompressionError => 0x9,
            ErrorCode::ConnectError => 0xa,
            ErrorCode::EnhanceYourCalm => 0xb,
            ErrorCode::InadequateSecurity => 0xc,
            ErrorCode::Http11Required => 0xd,
            ErrorCode::Unknown(v) => v,
        }
    }
}

/// SETTINGS payload: raw (id, value) entries in wire order, looked up by
/// linear scan with the documented defaults when absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    pub entries: Vec<(u16, u32)>,
}

impl Settings {
    pub fn get(&self, id: u16) -> Option<u32> {
        self.entries
            .iter()
            .find(|(entry_id, _)| *entry_id == id)
            .map(|(_, value)| *value)
    }

    pub fn header_table_size(&self) -> u32 {
        self.get(SETTINGS_HEADER_TABLE_SIZE)
            .unwrap_or(DEFAULT_HEADER_TABLE_SIZE)
    }

    pub fn max_header_list_size(&self) -> u32 {
        self.get(SETTINGS_MAX_HEADER_LIST_SIZE)
            .unwrap_or(DEFAULT_MAX_HEADER_LIST_SIZE)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Priority {
    pub stream_dependency: StreamId,
    pub exclusive: bool,
    pub weight: u8,
}

/// Type-specific frame body. One variant per supported type; dispatch is a
/// pattern match on this enum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameBody {
    Data {
        payload: Vec<u8>,
    },
    Headers {
        priority: Option<Priority>,
        block: Vec<u8>,
    },
    Priority(Priority),
    RstStream {
        code: ErrorCode,
    },
    Settings(Settings),
    Ping {
        opaque: [u8; 8],
    },
    GoAway {
        last_stream_id: StreamId,
        code: ErrorCode,
        debug_data: Vec<u8>,
    },
    WindowUpdate {
        increment: u32,
    },
}

/// One wire unit: the 9-byte header plus its decoded body. Frames are
/// ephemeral — constructed from bytes, consumed by the dispatcher, never
/// stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub header: FrameHeader,
    pub body: FrameBody,
}

impl Frame {
    pub fn stream_id(&self) -> StreamId {
        self.header.stream_id
    }

    pub fn end_stream(&self) -> bool {
        self.header.end_stream()
    }
}

fn read_u32(buf: &[u8]) -> u32 {
    u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]])
}

fn parse_frame_header(buffer: &[u8]) -> FrameHeader {
    let length = u32::from_be_bytes([0, buffer[0], buffer[1], buffer[2]]);
    let frame_type = buffer[3];
    let flags = buffer[4];
    let stream_id = StreamId(u32::from_be_bytes([
        buffer[5] & 0x7F,
        buffer[6],
        buffer[7],
        buffer[8],
    ]));
    FrameHeader {
        length,
        frame_type,
        flags,
        stream_id,
    }
}

/// Decode one frame from the front of `buffer`.
///
/// `Ok(None)` means the header or the declared body is not fully buffered
/// yet — nothing is consumed and the caller retries after appending more
/// bytes. `Ok(Some((frame, n)))` consumed exactly `n` bytes. Errors are
/// fatal for the session's HTTP/2 layer.
pub fn decode_frame(buffer: &[u8]) -> Result<Option<(Frame, usize)>, H2Error> {
    if buffer.len() < FRAME_HEADER_SIZE {
        return Ok(None);
    }
    let header = parse_frame_header(buffer);
    if header.length > MAX_FRAME_PAYLOAD_LENGTH {
        return Err(H2Error::with_stream(
            H2ErrorKind::FrameTooLarge(header.length),
            header.stream_id,
        ));
    }
    let total = FRAME_HEADER_SIZE + header.length as usize;
    if buffer.len() < total {
        return Ok(None);
    }

    let body_bytes = &buffer[FRAME_HEADER_SIZE..total];
    let body = decode_body(&header, body_bytes)
        .map_err(|kind| H2Error::with_stream(kind, header.stream_id))?;

    Ok(Some((Frame { header, body }, total)))
}

fn decode_body(header: &FrameHeader, body: &[u8]) -> Result<FrameBody, H2ErrorKind> {
    match header.frame_type {
        FRAME_TYPE_DATA => decode_data(header, body),
        FRAME_TYPE_HEADERS => decode_headers(header, body),
        FRAME_TYPE_PRIORITY => {
            if body.len() != 5 {
                return Err(H2ErrorKind::FrameLengthMismatch);
            }
            Ok(FrameBody::Priority(decode_priority(body)))
        }
        FRAME_TYPE_RST_STREAM => {
            if body.len() != 4 {
                return Err(H2ErrorKind::FrameLengthMismatch);
            }
            Ok(FrameBody::RstStream {
                code: ErrorCode::from_wire(read_u32(body)),
            })
        }
        FRAME_TYPE_SETTINGS => decode_settings(body),
        FRAME_TYPE_PING => {
            if body.len() != 8 {
                return Err(H2ErrorKind::FrameLengthMismatch);
            }
            let mut opaque = [0u8; 8];
            opaque.copy_from_slice(body);
            Ok(FrameBody::Ping { opaque })
        }
        FRAME_TYPE_GOAWAY => {
            if body.len() < 8 {
                return Err(H2ErrorKind::FrameLengthMismatch);
            }
            Ok(FrameBody::GoAway {
                last_stream_id: StreamId(read_u32(body) & 0x7FFF_FFFF),
                code: ErrorCode::from_wire(read_u32(&body[4..])),
                debug_data: body[8..].to_vec(),
            })
        }
        FRAME_TYPE_WINDOW_UPDATE => {
            if body.len() != 4 {
                return Err(H2ErrorKind::FrameLengthMismatch);
            }
            Ok(FrameBody::WindowUpdate {
                increment: read_u32(body) & 0x7FFF_FFFF,
            })
        }
        other => Err(H2ErrorKind::UnsupportedFrame(other)),
    }
}

fn decode_priority(body: &[u8]) -> Priority {
    let word = read_u32(body);
    Priority {
        stream_dependency: StreamId(word & 0x7FFF_FFFF),
        exclusive: word & 0x8000_0000 != 0,
        weight: body[4],
    }
}

/// Strip the optional 1-byte pad-length prefix and the trailing padding.
fn strip_padding<'a>(header: &FrameHeader, body: &'a [u8]) -> Result<&'a [u8], H2ErrorKind> {
    if !header.padded() {
        return Ok(body);
    }
    if body.is_empty() {
        return Err(H2ErrorKind::InvalidPadding);
    }
    let pad = body[0] as usize;
    let rest = &body[1..];
    if pad > rest.len() {
        return Err(H2ErrorKind::InvalidPadding);
    }
    Ok(&rest[..rest.len() - pad])
}

fn decode_data(header: &FrameHeader, body: &[u8]) -> Result<FrameBody, H2ErrorKind> {
    let payload = strip_padding(header, body)?;
    Ok(FrameBody::Data {
        payload: payload.to_vec(),
    })
}

fn decode_headers(header: &FrameHeader, body: &[u8]) -> Result<FrameBody, H2ErrorKind> {
    if !header.end_headers() {
        return Err(H2ErrorKind::MissingEndHeaders);
    }
    let mut rest = strip_padding(header, body)?;
    let priority = if header.has_priority() {
        if rest.len() < 5 {
            return Err(H2ErrorKind::FrameLengthMismatch);
        }
        let p = decode_priority(rest);
        rest = &rest[5..];
        Some(p)
    } else {
        None
    };
    Ok(FrameBody::Headers {
        priority,
        block: rest.to_vec(),
    })
}

fn decode_settings(body: &[u8]) -> Result<FrameBody, H2ErrorKind> {
    if body.len() % 6 != 0 {
        return Err(H2ErrorKind::SettingsLength(body.len() as u32));
    }
    let entries = body
        .chunks_exact(6)
        .map(|chunk| {
            let id = u16::from_be_bytes([chunk[0], chunk[1]]);
            let value = read_u32(&chunk[2..]);
            (id, value)
        })
        .collect();
    Ok(FrameBody::Settings(Settings { entries }))
}

/// Encode a frame back to wire bytes. Used to build test fixtures; the
/// decoder itself never writes traffic. Padding is never emitted.
pub fn encode_frame(frame: &Frame) -> Vec<u8> {
    let mut payload = Vec::new();
    let (frame_type, flags) = match &frame.body {
        FrameBody::Data { payload: data } => {
            payload.extend_from_slice(data);
            (FRAME_TYPE_DATA, frame.header.flags & FLAG_END_STREAM)
        }
        FrameBody::Headers { priority, block } => {
            let mut flags = FLAG_END_HEADERS | (frame.header.flags & FLAG_END_STREAM);
            if let Some(p) = priority {
                flags |= FLAG_PRIORITY;
                encode_priority(p, &mut payload);
            }
            payload.extend_from_slice(block);
            (FRAME_TYPE_HEADERS, flags)
        }
        FrameBody::Priority(p) => {
            encode_priority(p, &mut payload);
            (FRAME_TYPE_PRIORITY, 0)
        }
        FrameBody::RstStream { code } => {
            payload.extend_from_slice(&code.to_wire().to_be_bytes());
            (FRAME_TYPE_RST_STREAM, 0)
        }
        FrameBody::Settings(settings) => {
            for (id, value) in &settings.entries {
                payload.extend_from_slice(&id.to_be_bytes());
                payload.extend_from_slice(&value.to_be_bytes());
            }
            (FRAME_TYPE_SETTINGS, 0)
        }
        FrameBody::Ping { opaque } => {
            payload.extend_from_slice(opaque);
            (FRAME_TYPE_PING, frame.header.flags)
        }
        FrameBody::GoAway {
            last_stream_id,
            code,
            debug_data,
        } => {
            payload.extend_from_slice(&last_stream_id.0.to_be_bytes());
            payload.extend_from_slice(&code.to_wire().to_be_bytes());
            payload.extend_from_slice(debug_data);
            (FRAME_TYPE_GOAWAY, 0)
        }
        FrameBody::WindowUpdate { increment } => {
            payload.extend_from_slice(&increment.to_be_bytes());
            (FRAME_TYPE_WINDOW_UPDATE, 0)
        }
    };

    let len = payload.len() as u32;
    let mut out = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
    out.push((len >> 16) as u8);
    out.push((len >> 8) as u8);
    out.push(len as u8);
    out.push(frame_type);
    out.push(flags);
    out.extend_from_slice(&(frame.header.stream_id.0 & 0x7FFF_FFFF).to_be_bytes());
    out.extend_from_slice(&payload);
    out
}

fn encode_priority(p: &Priority, out: &mut Vec<u8>) {
    let mut word = p.stream_dependency.0 & 0x7FFF_FFFF;
    if p.exclusive {
        word |= 0x8000_0000;
    }
    out.extend_from_slice(&word.to_be_bytes());
    out.push(p.weight);
}

/// Convenience constructor for fixtures and round-trip tests.
pub fn frame(stream_id: u32, flags: u8, body: FrameBody) -> Frame {
    Frame {
        header: FrameHeader {
            length: 0, // recomputed by encode_frame
            frame_type: 0,
            flags,
            stream_id: StreamId(stream_id & 0x7FFF_FFFF),
        },
        body,
    }
}
