//! Incremental HTTP/1.x request and response state machines.
//!
//! Each parser consumes one textual token per state transition, delimited by
//! a fixed byte sequence scanned with `bytes_before`. A missing delimiter
//! rolls the buffer back to the mark and returns `NeedMore`, so arbitrarily
//! fragmented delivery re-enters the same transition on the next segment.

use crate::buffer::SessionBuffer;
use crate::error::DecodeError;
use crate::message::{
    append_header, classify, header_str, parse_content_range, parse_form_params, parse_query,
    BodyClass, ByteRangeSlice, HttpRequest, HttpResponse,
};
use crate::DecoderConfig;
use flate2::read::{DeflateDecoder, GzDecoder};
use memchr::memmem;
use std::io::Read;
use tracing::{debug, warn};

/// Client connection preface that switches a session to HTTP/2 framing.
pub const HTTP2_PREFACE: &[u8] = b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n";

/// Preface bytes remaining once the "PRI " start has been consumed.
const PREFACE_TAIL: &[u8] = b"* HTTP/2.0\r\n\r\nSM\r\n\r\n";

const KNOWN_VERBS: &[&str] = &[
    "GET", "POST", "HEAD", "PUT", "OPTIONS", "DELETE", "TRACE", "CONNECT", "MOVE", "PROXY",
];

/// Longest entry in the verb set. A start token running past this without a
/// space cannot be HTTP/1.x.
const MAX_VERB_LEN: usize = 7;

/// Result of one parser drive. `NeedMore` always leaves the buffer rolled
/// back to the last message boundary it could not cross.
#[derive(Debug)]
pub enum ParseOutcome<T> {
    NeedMore,
    Complete(T),
    /// Request side saw the full HTTP/2 connection preface.
    SwitchHttp2,
    /// Start of stream failed HTTP/1.x validation; hand the session off.
    Fallback,
}

/// Incremental body event surfaced while a message is still in flight.
#[derive(Debug)]
pub enum H1Event {
    Chunk(Vec<u8>),
    Part(ByteRangeSlice),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReqState {
    Ready,
    GotMethod,
    GotUri,
    GotHttpVer,
    GotHeader,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RespState {
    Ready,
    GotHttpVer,
    GotStatusCode,
    GotReasonPhrase,
    GotHeader,
}

/// CRLF- or space-delimited token read. `Ok(None)` means the delimiter is
/// not buffered yet; the cursor is untouched in that case.
fn read_token(
    buf: &mut SessionBuffer,
    delimiter: &[u8],
    cap: usize,
) -> Result<Option<String>, DecodeError> {
    let Some(n) = buf.bytes_before(delimiter) else {
        return Ok(None);
    };
    if n > cap {
        return Err(DecodeError::TokenTooLong(n));
    }
    let Some(bytes) = buf.get_n(n) else {
        return Ok(None);
    };
    buf.skip(delimiter.len());
    Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
}

pub struct RequestParser {
    state: ReqState,
    message: HttpRequest,
    chunks: Option<Vec<u8>>,
    max_token_len: usize,
    max_chunk_hex_digits: usize,
}

impl RequestParser {
    pub fn new(config: &DecoderConfig) -> Self {
        Self {
            state: ReqState::Ready,
            message: HttpRequest::default(),
            chunks: None,
            max_token_len: config.max_token_len,
            max_chunk_hex_digits: config.max_chunk_hex_digits,
        }
    }

    /// Headers of the request currently awaiting its body, if any. Used to
    /// attribute incremental chunk events.
    pub fn in_flight(&self) -> Option<&HttpRequest> {
        (self.state == ReqState::GotHeader).then_some(&self.message)
    }

    pub fn parse(
        &mut self,
        buf: &mut SessionBuffer,
        events: &mut Vec<H1Event>,
    ) -> Result<ParseOutcome<HttpRequest>, DecodeError> {
        loop {
            match self.state {
                ReqState::Ready => {
                    buf.mark();
                    if buf.readable_bytes() < 4 {
                        return Ok(ParseOutcome::NeedMore);
                    }
                    let Some(n) = buf.bytes_before(b" ") else {
                        if buf.readable_bytes() > MAX_VERB_LEN {
                            return Ok(ParseOutcome::Fallback);
                        }
                        return Ok(ParseOutcome::NeedMore);
                    };
                    if n > MAX_VERB_LEN {
                        return Ok(ParseOutcome::Fallback);
                    }
                    let Some(method) = read_token(buf, b" ", MAX_VERB_LEN)? else {
                        return Ok(ParseOutcome::NeedMore);
                    };
                    if method == "PRI" {
                        let Some(tail) = buf.peek(PREFACE_TAIL.len()) else {
                            buf.reset();
                            return Ok(ParseOutcome::NeedMore);
                        };
                        if tail != PREFACE_TAIL {
                            // Hand the untouched stream to the fallback
                            buf.reset();
                            return Ok(ParseOutcome::Fallback);
                        }
                        buf.skip(PREFACE_TAIL.len());
                        return Ok(ParseOutcome::SwitchHttp2);
                    }
                    if !KNOWN_VERBS.contains(&method.as_str()) {
                        buf.reset();
                        return Ok(ParseOutcome::Fallback);
                    }
                    self.message.method = method;
                    self.state = ReqState::GotMethod;
                }
                ReqState::GotMethod => {
                    buf.mark();
                    let Some(uri) = read_token(buf, b" ", self.max_token_len)? else {
                        buf.reset();
                        return Ok(ParseOutcome::NeedMore);
                    };
                    match uri.split_once('?') {
                        Some((path, query)) => {
                            self.message.path = path.to_string();
                            self.message.query_params = parse_query(query);
                        }
                        None => self.message.path = uri,
                    }
                    self.state = ReqState::GotUri;
                }
                ReqState::GotUri => {
                    buf.mark();
                    let Some(version) = read_token(buf, b"\r\n", self.max_token_len)? else {
                        buf.reset();
                        return Ok(ParseOutcome::NeedMore);
                    };
                    self.message.version = version;
                    self.state = ReqState::GotHttpVer;
                }
                ReqState::GotHttpVer => {
                    if !read_header_lines(buf, &mut self.message.headers, self.max_token_len)? {
                        return Ok(ParseOutcome::NeedMore);
                    }
                    self.message.flags = classify(&self.message.headers);
                    self.state = ReqState::GotHeader;
                }
                ReqState::GotHeader => return self.read_body(buf, events),
            }
        }
    }

    fn read_body(
        &mut self,
        buf: &mut SessionBuffer,
        events: &mut Vec<H1Event>,
    ) -> Result<ParseOutcome<HttpRequest>, DecodeError> {
        let body = match self.message.flags.class {
            BodyClass::Multipart | BodyClass::Byterange => {
                match read_range_body(&self.message.headers, buf, events, self.max_token_len)? {
                    Some(body) => body,
                    None => return Ok(ParseOutcome::NeedMore),
                }
            }
            BodyClass::Normal if self.message.flags.chunked => {
                match read_chunked_body(
                    buf,
                    events,
                    &mut self.chunks,
                    self.max_chunk_hex_digits,
                    self.max_token_len,
                )? {
                    Some(body) => body,
                    None => return Ok(ParseOutcome::NeedMore),
                }
            }
            BodyClass::Normal => match content_length(&self.message.headers)? {
                Some(len) => {
                    buf.mark();
                    match buf.get_n(len) {
                        Some(body) => body,
                        None => return Ok(ParseOutcome::NeedMore),
                    }
                }
                // A request without declared length carries no body.
                None => Vec::new(),
            },
        };
        Ok(ParseOutcome::Complete(self.finish(body)))
    }

    fn finish(&mut self, body: Vec<u8>) -> HttpRequest {
        let mut message = std::mem::take(&mut self.message);
        message.body = body;
        // Request-side Content-Encoding is informational only; form
        // parameters are parsed from the wire bytes when no encoding is
        // declared.
        let encoded = message.flags.gzip
            || message.flags.deflate
            || message.headers.contains_key("content-encoding");
        if !encoded {
            if let Some(content_type) = header_str(&message.headers, "content-type") {
                if content_type
                    .trim()
                    .to_ascii_lowercase()
                    .starts_with("application/x-www-form-urlencoded")
                {
                    message.form_params = parse_form_params(&message.body, content_type);
                }
            }
        }
        self.state = ReqState::Ready;
        self.chunks = None;
        message
    }
}

pub struct ResponseParser {
    state: RespState,
    message: HttpResponse,
    chunks: Option<Vec<u8>>,
    read_until_close: bool,
    max_token_len: usize,
    max_chunk_hex_digits: usize,
}

impl ResponseParser {
    pub fn new(config: &DecoderConfig) -> Self {
        Self {
            state: RespState::Ready,
            message: HttpResponse::default(),
            chunks: None,
            read_until_close: false,
            max_token_len: config.max_token_len,
            max_chunk_hex_digits: config.max_chunk_hex_digits,
        }
    }

    pub fn in_flight(&self) -> Option<&HttpResponse> {
        (self.state == RespState::GotHeader).then_some(&self.message)
    }

    pub fn parse(
        &mut self,
        buf: &mut SessionBuffer,
        events: &mut Vec<H1Event>,
    ) -> Result<ParseOutcome<HttpResponse>, DecodeError> {
        loop {
            match self.state {
                RespState::Ready => {
                    buf.mark();
                    let Some(version) = read_token(buf, b" ", self.max_token_len)? else {
                        return Ok(ParseOutcome::NeedMore);
                    };
                    self.message.version = version;
                    self.state = RespState::GotHttpVer;
                }
                RespState::GotHttpVer => {
                    buf.mark();
                    let Some(token) = read_token(buf, b" ", self.max_token_len)? else {
                        buf.reset();
                        return Ok(ParseOutcome::NeedMore);
                    };
                    if token.len() != 3 || !token.bytes().all(|b| b.is_ascii_digit()) {
                        return Err(DecodeError::InvalidStatusCode(token));
                    }
                    self.message.status = token
                        .parse()
                        .map_err(|_| DecodeError::InvalidStatusCode(token))?;
                    self.state = RespState::GotStatusCode;
                }
                RespState::GotStatusCode => {
                    buf.mark();
                    let Some(reason) = read_token(buf, b"\r\n", self.max_token_len)? else {
                        buf.reset();
                        return Ok(ParseOutcome::NeedMore);
                    };
                    self.message.reason = reason;
                    self.state = RespState::GotReasonPhrase;
                }
                RespState::GotReasonPhrase => {
                    if !read_header_lines(buf, &mut self.message.headers, self.max_token_len)? {
                        return Ok(ParseOutcome::NeedMore);
                    }
                    self.message.flags = classify(&self.message.headers);
                    self.state = RespState::GotHeader;
                }
                RespState::GotHeader => return self.read_body(buf, events),
            }
        }
    }

    fn read_body(
        &mut self,
        buf: &mut SessionBuffer,
        events: &mut Vec<H1Event>,
    ) -> Result<ParseOutcome<HttpResponse>, DecodeError> {
        let body = match self.message.flags.class {
            BodyClass::Multipart | BodyClass::Byterange => {
                match read_range_body(&self.message.headers, buf, events, self.max_token_len)? {
                    Some(body) => body,
                    None => return Ok(ParseOutcome::NeedMore),
                }
            }
            BodyClass::Normal if self.message.flags.chunked => {
                match read_chunked_body(
                    buf,
                    events,
                    &mut self.chunks,
                    self.max_chunk_hex_digits,
                    self.max_token_len,
                )? {
                    Some(body) => body,
                    None => return Ok(ParseOutcome::NeedMore),
                }
            }
            BodyClass::Normal => match content_length(&self.message.headers)? {
                Some(len) => {
                    buf.mark();
                    match buf.get_n(len) {
                        Some(body) => body,
                        None => return Ok(ParseOutcome::NeedMore),
                    }
                }
                None => match self.message.status {
                    100..=199 | 204 | 304 => Vec::new(),
                    // 200 without framing: the body runs to connection
                    // close, delivered by `flush` at finish/reset.
                    200 => {
                        buf.mark();
                        self.read_until_close = true;
                        return Ok(ParseOutcome::NeedMore);
                    }
                    _ => Vec::new(),
                },
            },
        };
        Ok(ParseOutcome::Complete(self.finish(body)))
    }

    /// Finalize a read-until-close response at TCP finish/reset: everything
    /// buffered is the body.
    pub fn flush(&mut self, buf: &mut SessionBuffer) -> Option<HttpResponse> {
        if self.state != RespState::GotHeader || !self.read_until_close {
            return None;
        }
        let body = buf.take_all();
        Some(self.finish(body))
    }

    fn finish(&mut self, body: Vec<u8>) -> HttpResponse {
        let mut message = std::mem::take(&mut self.message);
        message.body = decode_content(body, message.flags.gzip, message.flags.deflate);
        self.state = RespState::Ready;
        self.chunks = None;
        self.read_until_close = false;
        message
    }
}

/// Drain complete header lines into `headers`. Returns true once the empty
/// line ending the header section has been consumed; false (cursor at the
/// first unconsumed line) when more bytes are needed.
fn read_header_lines(
    buf: &mut SessionBuffer,
    headers: &mut http::HeaderMap,
    max_token_len: usize,
) -> Result<bool, DecodeError> {
    loop {
        buf.mark();
        let Some(n) = buf.bytes_before(b"\r\n") else {
            buf.reset();
            return Ok(false);
        };
        if n > max_token_len {
            return Err(DecodeError::TokenTooLong(n));
        }
        let Some(line) = buf.get_n(n) else {
            buf.reset();
            return Ok(false);
        };
        buf.skip(2);
        if line.is_empty() {
            return Ok(true);
        }
        let line = String::from_utf8_lossy(&line);
        match line.split_once(':') {
            Some((name, value)) => append_header(headers, name, value),
            None => warn!(line = %line, "header line without colon, skipped"),
        }
    }
}

fn content_length(headers: &http::HeaderMap) -> Result<Option<usize>, DecodeError> {
    let Some(value) = header_str(headers, "content-length") else {
        return Ok(None);
    };
    value
        .trim()
        .parse()
        .map(Some)
        .map_err(|_| DecodeError::InvalidContentLength(value.to_string()))
}

/// Chunked transfer decoding. The accumulator survives `None` returns so a
/// rollback mid-chunk keeps every chunk already consumed; each completed
/// chunk is also surfaced as an `H1Event::Chunk`.
fn read_chunked_body(
    buf: &mut SessionBuffer,
    events: &mut Vec<H1Event>,
    chunks: &mut Option<Vec<u8>>,
    max_chunk_hex_digits: usize,
    max_token_len: usize,
) -> Result<Option<Vec<u8>>, DecodeError> {
    let accumulator = chunks.get_or_insert_with(Vec::new);
    loop {
        buf.mark();
        let Some(n) = buf.bytes_before(b"\r\n") else {
            buf.reset();
            return Ok(None);
        };
        if n > max_chunk_hex_digits {
            return Err(DecodeError::ChunkSizeTooLong(n));
        }
        let Some(line) = buf.get_n(n) else {
            buf.reset();
            return Ok(None);
        };
        buf.skip(2);
        let line = String::from_utf8_lossy(&line).into_owned();
        // Chunk extensions after ';' are ignored
        let hex = match line.split_once(';') {
            Some((size, _)) => size,
            None => line.as_str(),
        }
        .trim();
        let size = usize::from_str_radix(hex, 16)
            .map_err(|_| DecodeError::InvalidChunkSize(line.clone()))?;

        if size == 0 {
            // Trailer section: lines until the empty line. Trailer fields
            // are not interpreted.
            loop {
                let Some(m) = buf.bytes_before(b"\r\n") else {
                    buf.reset();
                    return Ok(None);
                };
                if m > max_token_len {
                    return Err(DecodeError::TokenTooLong(m));
                }
                let Some(trailer) = buf.get_n(m) else {
                    buf.reset();
                    return Ok(None);
                };
                buf.skip(2);
                if trailer.is_empty() {
                    break;
                }
                debug!(len = trailer.len(), "skipping chunked trailer line");
            }
            return Ok(Some(std::mem::take(accumulator)));
        }

        let Some(payload) = buf.get_n(size) else {
            buf.reset();
            return Ok(None);
        };
        match buf.get_n(2) {
            None => {
                buf.reset();
                return Ok(None);
            }
            Some(terminator) if terminator != b"\r\n" => {
                return Err(DecodeError::InvalidChunkTerminator)
            }
            Some(_) => {}
        }
        accumulator.extend_from_slice(&payload);
        events.push(H1Event::Chunk(payload));
    }
}

/// Byterange and multipart bodies.
///
/// A message carrying its own Content-Range is a single range: its payload
/// is exactly `last - first` bytes. A multipart body waits until the
/// closing `--boundary--` marker is buffered, then walks the parts and
/// extracts each part whose headers carry a Content-Range.
fn read_range_body(
    headers: &http::HeaderMap,
    buf: &mut SessionBuffer,
    events: &mut Vec<H1Event>,
    max_token_len: usize,
) -> Result<Option<Vec<u8>>, DecodeError> {
    if let Some(range) = header_str(headers, "content-range") {
        let (first, last, total) = parse_content_range(range)?;
        let len = usize::try_from(last.saturating_sub(first))
            .map_err(|_| DecodeError::InvalidContentRange(range.to_string()))?;
        buf.mark();
        let Some(payload) = buf.get_n(len) else {
            return Ok(None);
        };
        events.push(H1Event::Part(ByteRangeSlice {
            first,
            last,
            total,
            url: String::new(),
            payload: payload.clone(),
        }));
        return Ok(Some(payload));
    }

    let content_type = header_str(headers, "content-type").unwrap_or_default();
    let boundary = multipart_boundary(content_type).ok_or(DecodeError::MissingMultipartBoundary)?;
    let closing = format!("--{boundary}--");

    buf.mark();
    let Some(end) = buf.bytes_before(closing.as_bytes()) else {
        return Ok(None);
    };
    if end > max_token_len.saturating_mul(1024) {
        warn!(end, "multipart body unreasonably large before close marker");
    }
    let Some(raw) = buf.get_n(end + closing.len()) else {
        return Ok(None);
    };
    if buf.peek(2) == Some(b"\r\n") {
        buf.skip(2);
    }

    walk_multipart_parts(&raw, &boundary, events);
    Ok(Some(raw))
}

fn multipart_boundary(content_type: &str) -> Option<String> {
    content_type
        .split(';')
        .skip(1)
        .filter_map(|param| param.trim().split_once('='))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("boundary"))
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
}

fn walk_multipart_parts(raw: &[u8], boundary: &str, events: &mut Vec<H1Event>) {
    let delimiter = format!("--{boundary}");
    let mut pos = 0;
    while let Some(at) = memmem::find(&raw[pos..], delimiter.as_bytes()) {
        pos += at + delimiter.len();
        // The closing marker has two extra dashes at this offset
        if raw[pos..].starts_with(b"--") {
            break;
        }
        let Some(header_end) = memmem::find(&raw[pos..], b"\r\n\r\n") else {
            break;
        };
        let part_headers = &raw[pos..pos + header_end];
        let data_start = pos + header_end + 4;
        pos = data_start;

        let Some(range) = part_content_range(part_headers) else {
            debug!("multipart part without content-range, skipped");
            continue;
        };
        let (first, last, total) = match parse_content_range(&range) {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "bad part content-range, skipped");
                continue;
            }
        };
        let len = (last.saturating_sub(first)) as usize;
        if data_start + len > raw.len() {
            warn!(first, last, "part payload runs past buffered body, skipped");
            break;
        }
        events.push(H1Event::Part(ByteRangeSlice {
            first,
            last,
            total,
            url: String::new(),
            payload: raw[data_start..data_start + len].to_vec(),
        }));
        pos = data_start + len;
    }
}

fn part_content_range(part_headers: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(part_headers);
    text.lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-range"))
        .map(|(_, value)| value.trim().to_string())
}

/// Response body content decoding. Gzip failure degrades to a diagnostic
/// placeholder string; raw-deflate failure keeps the raw bytes.
fn decode_content(body: Vec<u8>, gzip: bool, deflate: bool) -> Vec<u8> {
    if gzip {
        let mut out = Vec::new();
        return match GzDecoder::new(body.as_slice()).read_to_end(&mut out) {
            Ok(_) => out,
            Err(e) => {
                warn!(error = %e, "gzip body decode failed");
                format!("[gzip decode failed: {e}]").into_bytes()
            }
        };
    }
    if deflate {
        let mut out = Vec::new();
        return match DeflateDecoder::new(body.as_slice()).read_to_end(&mut out) {
            Ok(_) => out,
            Err(e) => {
                warn!(error = %e, "deflate body decode failed, keeping raw bytes");
                body
            }
        };
    }
    body
}
