//! Per-session HTTP/2 decode state: the frame feed loop, the two
//! direction-scoped HPACK decoders, and the stream map.

use crate::error::{H2Error, H2ErrorKind};
use crate::frame::{decode_frame, ErrorCode, Frame, FrameBody, StreamId};
use crate::hpack::HpackDecoder;
use crate::limits::H2Limits;
use crate::stream::{Http2Request, Http2Response, Http2Stream};
use crate::{trace_debug, trace_warn};
use std::collections::HashMap;

/// Which peer produced the bytes being fed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum H2Direction {
    /// Client-to-server traffic (requests).
    Request,
    /// Server-to-client traffic (responses).
    Response,
}

/// Completed message, handed back to the caller for dispatch.
#[derive(Debug)]
pub enum H2Event {
    RequestReady {
        stream_id: StreamId,
        request: Http2Request,
    },
    ResponseReady {
        stream_id: StreamId,
        request: Option<Http2Request>,
        response: Http2Response,
    },
}

/// Session-scoped decode state. No callbacks: `feed` returns owned events
/// and the caller multicasts them.
#[derive(Debug)]
pub struct H2SessionState {
    streams: HashMap<u32, Http2Stream>,
    request_decoder: HpackDecoder,
    response_decoder: HpackDecoder,
    limits: H2Limits,
}

impl Default for H2SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl H2SessionState {
    pub fn new() -> Self {
        Self::with_limits(H2Limits::default())
    }

    pub fn with_limits(limits: H2Limits) -> Self {
        let make_decoder = || {
            HpackDecoder::new(limits.max_header_list_size, limits.max_table_size)
                .with_max_field_size(limits.max_field_size)
        };
        Self {
            streams: HashMap::new(),
            request_decoder: make_decoder(),
            response_decoder: make_decoder(),
            limits,
        }
    }

    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    pub fn contains_stream(&self, stream_id: u32) -> bool {
        self.streams.contains_key(&stream_id)
    }

    pub fn stream(&self, stream_id: u32) -> Option<&Http2Stream> {
        self.streams.get(&stream_id)
    }

    /// Decode and apply every complete frame at the front of `buffer`.
    ///
    /// Returns the number of bytes consumed (a trailing partial frame is
    /// left untouched for the next call) and the messages completed by
    /// these frames. A hard error abandons the session's HTTP/2 layer.
    pub fn feed(
        &mut self,
        direction: H2Direction,
        buffer: &[u8],
    ) -> Result<(usize, Vec<H2Event>), H2Error> {
        let mut consumed = 0;
        let mut events = Vec::new();
        while let Some((frame, n)) = decode_frame(&buffer[consumed..])? {
            consumed += n;
            self.apply(direction, frame, &mut events)?;
        }
        Ok((consumed, events))
    }

    fn apply(
        &mut self,
        direction: H2Direction,
        frame: Frame,
        events: &mut Vec<H2Event>,
    ) -> Result<(), H2Error> {
        let stream_id = frame.header.stream_id;
        let end_stream = frame.header.end_stream();

        match frame.body {
            FrameBody::Headers { block, .. } => {
                let decoder = match direction {
                    H2Direction::Request => &mut self.request_decoder,
                    H2Direction::Response => &mut self.response_decoder,
                };
                let headers = decoder.decode(&block).map_err(|e| H2Error {
                    stream_id: Some(stream_id),
                    ..e
                })?;
                let stream = self
                    .streams
                    .entry(stream_id.0)
                    .or_insert_with(|| Http2Stream::new(stream_id));
                match direction {
                    H2Direction::Request => stream.handle_request_headers(headers),
                    H2Direction::Response => stream.handle_response_headers(headers),
                }
                if end_stream {
                    self.end_of_stream(direction, stream_id, events);
                }
            }
            FrameBody::Data { payload } => {
                let Some(stream) = self.streams.get_mut(&stream_id.0) else {
                    trace_warn!(stream_id = stream_id.0, "DATA for unknown stream, ignoring");
                    return Ok(());
                };
                let body_len = match direction {
                    H2Direction::Request => stream.handle_request_data(&payload),
                    H2Direction::Response => stream.handle_response_data(&payload),
                };
                if body_len > self.limits.max_body_size {
                    trace_warn!(
                        stream_id = stream_id.0,
                        body_len,
                        "body exceeds size limit, dropping stream"
                    );
                    self.streams.remove(&stream_id.0);
                    return Ok(());
                }
                if end_stream {
                    self.end_of_stream(direction, stream_id, events);
                }
            }
            FrameBody::RstStream { code } => {
                self.handle_rst_stream(direction, stream_id, code)?;
            }
            FrameBody::Settings(settings) => {
                let list = settings.max_header_list_size() as usize;
                let table = settings.header_table_size() as usize;
                // A peer's SETTINGS sizes the compression state for traffic
                // flowing toward that peer.
                match direction {
                    H2Direction::Request => self.response_decoder.resize(list, table),
                    H2Direction::Response => self.request_decoder.resize(list, table),
                }
            }
            FrameBody::Ping { .. } => {
                trace_debug!("PING observed, no reply generated");
            }
            FrameBody::GoAway {
                last_stream_id,
                code,
                ..
            } => {
                trace_debug!(
                    last_stream_id = last_stream_id.0,
                    ?code,
                    "GOAWAY observed"
                );
            }
            FrameBody::WindowUpdate { increment } => {
                trace_debug!(increment, "WINDOW_UPDATE observed, flow control not modeled");
            }
            FrameBody::Priority(_) => {
                trace_debug!(stream_id = stream_id.0, "PRIORITY observed, not modeled");
            }
        }
        Ok(())
    }

    fn end_of_stream(
        &mut self,
        direction: H2Direction,
        stream_id: StreamId,
        events: &mut Vec<H2Event>,
    ) {
        match direction {
            H2Direction::Request => {
                if let Some(stream) = self.streams.get_mut(&stream_id.0) {
                    if let Some(request) = stream.take_request_event() {
                        events.push(H2Event::RequestReady { stream_id, request });
                    }
                }
            }
            H2Direction::Response => {
                let Some(mut stream) = self.streams.remove(&stream_id.0) else {
                    return;
                };
                // A response can end before the request side saw END_STREAM;
                // the request notification still fires first, exactly once.
                if let Some(request) = stream.take_request_event() {
                    events.push(H2Event::RequestReady { stream_id, request });
                }
                let (request, response) = stream.finish();
                if let Some(response) = response {
                    events.push(H2Event::ResponseReady {
                        stream_id,
                        request,
                        response,
                    });
                }
            }
        }
    }

    /// Benign teardown statuses remove the stream; anything else on the
    /// session is a loud unsupported condition, including unknown ordinals.
    fn handle_rst_stream(
        &mut self,
        direction: H2Direction,
        stream_id: StreamId,
        code: ErrorCode,
    ) -> Result<(), H2Error> {
        let benign = match direction {
            H2Direction::Request => {
                matches!(code, ErrorCode::Cancel | ErrorCode::StreamClosed)
            }
            H2Direction::Response => matches!(
                code,
                ErrorCode::NoError
                    | ErrorCode::ProtocolError
                    | ErrorCode::Cancel
                    | ErrorCode::StreamClosed
            ),
        };
        if benign {
            self.streams.remove(&stream_id.0);
            return Ok(());
        }
        Err(H2Error::with_stream(
            H2ErrorKind::UnsupportedRstStatus(code),
            stream_id,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{encode_frame, frame, FrameBody, Settings, FLAG_END_STREAM};
    use crate::hpack::HpackEncoder;

    fn headers_frame(stream_id: u32, fields: &[(&str, &str)], end_stream: bool) -> Vec<u8> {
        let mut encoder = HpackEncoder::new(4096);
        let owned: Vec<(String, String)> = fields
            .iter()
            .map(|(n, v)| (n.to_string(), v.to_string()))
            .collect();
        let block = encoder.encode(&owned);
        let flags = if end_stream { FLAG_END_STREAM } else { 0 };
        encode_frame(&frame(
            stream_id,
            flags,
            FrameBody::Headers {
                priority: None,
                block,
            },
        ))
    }

    fn data_frame(stream_id: u32, payload: &[u8], end_stream: bool) -> Vec<u8> {
        let flags = if end_stream { FLAG_END_STREAM } else { 0 };
        encode_frame(&frame(
            stream_id,
            flags,
            FrameBody::Data {
                payload: payload.to_vec(),
            },
        ))
    }

    fn request_fields() -> Vec<(&'static str, &'static str)> {
        vec![
            (":method", "GET"),
            (":scheme", "https"),
            (":authority", "example.com"),
            (":path", "/"),
        ]
    }

    #[test]
    fn test_request_ready_on_headers_end_stream() {
        let mut session = H2SessionState::new();
        let bytes = headers_frame(1, &request_fields(), true);
        let (consumed, events) = session.feed(H2Direction::Request, &bytes).expect("feed");
        assert_eq!(consumed, bytes.len());
        assert_eq!(events.len(), 1);
        match &events[0] {
            H2Event::RequestReady { stream_id, request } => {
                assert_eq!(stream_id.0, 1);
                assert_eq!(request.method.as_deref(), Some("GET"));
            }
            other => panic!("expected RequestReady, got {other:?}"),
        }
        assert!(session.contains_stream(1), "stream stays until response ends");
    }

    #[test]
    fn test_full_exchange_removes_stream() {
        let mut session = H2SessionState::new();
        let mut tx = headers_frame(1, &request_fields(), false);
        tx.extend(data_frame(1, b"ping", true));
        let (_, events) = session.feed(H2Direction::Request, &tx).expect("request side");
        assert_eq!(events.len(), 1, "request completes on END_STREAM DATA");

        let mut rx = headers_frame(1, &[(":status", "200")], false);
        rx.extend(data_frame(1, b"pong", true));
        let (_, events) = session.feed(H2Direction::Response, &rx).expect("response side");
        assert_eq!(events.len(), 1);
        match &events[0] {
            H2Event::ResponseReady {
                stream_id,
                request,
                response,
            } => {
                assert_eq!(stream_id.0, 1);
                assert_eq!(request.as_ref().unwrap().body, b"ping");
                assert_eq!(response.status, Some(200));
                assert_eq!(response.body, b"pong");
            }
            other => panic!("expected ResponseReady, got {other:?}"),
        }
        assert!(!session.contains_stream(1), "stream removed after response");
    }

    #[test]
    fn test_response_end_notifies_unsent_request_first() {
        let mut session = H2SessionState::new();
        // Request HEADERS without END_STREAM; request side never finishes
        let tx = headers_frame(1, &request_fields(), false);
        let (_, events) = session.feed(H2Direction::Request, &tx).expect("feed");
        assert!(events.is_empty());

        let rx = headers_frame(1, &[(":status", "204")], true);
        let (_, events) = session.feed(H2Direction::Response, &rx).expect("feed");
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], H2Event::RequestReady { .. }));
        assert!(matches!(events[1], H2Event::ResponseReady { .. }));
    }

    #[test]
    fn test_partial_frame_left_unconsumed() {
        let mut session = H2SessionState::new();
        let bytes = headers_frame(1, &request_fields(), true);
        let (consumed, events) = session
            .feed(H2Direction::Request, &bytes[..bytes.len() - 3])
            .expect("partial feed");
        assert_eq!(consumed, 0, "incomplete frame must not be consumed");
        assert!(events.is_empty());

        let (consumed, events) = session.feed(H2Direction::Request, &bytes).expect("full feed");
        assert_eq!(consumed, bytes.len());
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_rst_cancel_removes_stream_benignly() {
        let mut session = H2SessionState::new();
        let tx = headers_frame(1, &request_fields(), false);
        session.feed(H2Direction::Request, &tx).expect("open stream");
        assert!(session.contains_stream(1));

        let rst = encode_frame(&frame(
            1,
            0,
            FrameBody::RstStream {
                code: ErrorCode::Cancel,
            },
        ));
        let (_, events) = session.feed(H2Direction::Request, &rst).expect("rst");
        assert!(events.is_empty());
        assert!(!session.contains_stream(1));
    }

    #[test]
    fn test_rst_unknown_status_is_fatal_on_response_side() {
        let mut session = H2SessionState::new();
        let tx = headers_frame(1, &request_fields(), false);
        session.feed(H2Direction::Request, &tx).expect("open stream");

        let rst = encode_frame(&frame(
            1,
            0,
            FrameBody::RstStream {
                code: ErrorCode::Unknown(0x77),
            },
        ));
        let err = session.feed(H2Direction::Response, &rst).unwrap_err();
        assert_eq!(
            err.kind,
            H2ErrorKind::UnsupportedRstStatus(ErrorCode::Unknown(0x77))
        );
    }

    #[test]
    fn test_rst_no_error_benign_only_server_side() {
        let mut session = H2SessionState::new();
        let tx = headers_frame(1, &request_fields(), false);
        session.feed(H2Direction::Request, &tx).expect("open stream");

        let rst = encode_frame(&frame(
            1,
            0,
            FrameBody::RstStream {
                code: ErrorCode::NoError,
            },
        ));
        // Server-to-client NO_ERROR is benign teardown
        session
            .feed(H2Direction::Response, &rst.clone())
            .expect("server-side NO_ERROR is benign");

        // Client-to-server NO_ERROR is not in the benign set
        let tx2 = headers_frame(3, &request_fields(), false);
        session.feed(H2Direction::Request, &tx2).expect("open stream 3");
        let rst3 = encode_frame(&frame(
            3,
            0,
            FrameBody::RstStream {
                code: ErrorCode::NoError,
            },
        ));
        let err = session.feed(H2Direction::Request, &rst3).unwrap_err();
        assert!(matches!(err.kind, H2ErrorKind::UnsupportedRstStatus(_)));
    }

    #[test]
    fn test_settings_resize_opposite_decoder() {
        let mut session = H2SessionState::new();
        // Client announces a 0-byte header table: server-to-client blocks
        // may no longer populate the response decoder's dynamic table.
        let settings = encode_frame(&frame(
            0,
            0,
            FrameBody::Settings(Settings {
                entries: vec![(crate::frame::SETTINGS_HEADER_TABLE_SIZE, 0)],
            }),
        ));
        session.feed(H2Direction::Request, &settings).expect("settings");

        let rx = headers_frame(1, &[(":status", "200"), ("x-a", "b")], true);
        let (_, events) = session.feed(H2Direction::Response, &rx).expect("headers");
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_body_limit_drops_stream() {
        let mut session = H2SessionState::with_limits(H2Limits {
            max_body_size: 8,
            ..H2Limits::default()
        });
        let mut tx = headers_frame(1, &request_fields(), false);
        tx.extend(data_frame(1, &[0x41; 20], true));
        let (_, events) = session.feed(H2Direction::Request, &tx).expect("feed");
        assert!(events.is_empty(), "oversized stream must not complete");
        assert!(!session.contains_stream(1));
    }

    #[test]
    fn test_data_for_unknown_stream_ignored() {
        let mut session = H2SessionState::new();
        let bytes = data_frame(9, b"orphan", true);
        let (consumed, events) = session.feed(H2Direction::Request, &bytes).expect("feed");
        assert_eq!(consumed, bytes.len());
        assert!(events.is_empty());
    }
}
