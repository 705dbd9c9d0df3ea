#![allow(dead_code)]
//! Shared helpers: a recording processor pair and HTTP/2 wire builders.

use http_decoder::{
    ByteRangeSlice, DecoderConfig, FallbackProcessor, HttpDecoder, HttpProcessor, HttpRequest,
    HttpResponse, HttpSession, SessionKey, WsFrame,
};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Mutex};

pub fn test_key() -> SessionKey {
    SessionKey::new(
        IpAddr::V4(Ipv4Addr::new(192, 168, 1, 10)),
        52000,
        IpAddr::V4(Ipv4Addr::new(93, 184, 216, 34)),
        80,
    )
}

/// Everything the recorder observed, in arrival order per category.
#[derive(Debug, Default)]
pub struct RecorderLog {
    pub requests: Vec<HttpRequest>,
    pub responses: Vec<(Option<HttpRequest>, HttpResponse)>,
    pub request_chunks: Vec<Vec<u8>>,
    pub response_chunks: Vec<Vec<u8>>,
    pub parts: Vec<ByteRangeSlice>,
    pub handshakes: Vec<(HttpRequest, HttpResponse)>,
    pub ws_requests: Vec<WsFrame>,
    pub ws_responses: Vec<WsFrame>,
}

pub struct Recorder {
    log: Arc<Mutex<RecorderLog>>,
}

impl Recorder {
    pub fn new() -> (Self, Arc<Mutex<RecorderLog>>) {
        let log = Arc::new(Mutex::new(RecorderLog::default()));
        (Self { log: log.clone() }, log)
    }

    fn log(&self) -> std::sync::MutexGuard<'_, RecorderLog> {
        self.log.lock().expect("recorder log lock")
    }
}

impl HttpProcessor for Recorder {
    fn on_request(&mut self, _session: &SessionKey, request: &HttpRequest) {
        self.log().requests.push(request.clone());
    }

    fn on_response(
        &mut self,
        _session: &SessionKey,
        request: Option<&HttpRequest>,
        response: &HttpResponse,
    ) {
        self.log()
            .responses
            .push((request.cloned(), response.clone()));
    }

    fn on_chunked_request(&mut self, _session: &SessionKey, _request: &HttpRequest, chunk: &[u8]) {
        self.log().request_chunks.push(chunk.to_vec());
    }

    fn on_chunked_response(
        &mut self,
        _session: &SessionKey,
        _request: Option<&HttpRequest>,
        _response: &HttpResponse,
        chunk: &[u8],
    ) {
        self.log().response_chunks.push(chunk.to_vec());
    }

    fn on_multipart_data(&mut self, _session: &SessionKey, slice: &ByteRangeSlice) {
        self.log().parts.push(slice.clone());
    }

    fn on_websocket_handshake(
        &mut self,
        _session: &SessionKey,
        request: &HttpRequest,
        response: &HttpResponse,
    ) {
        self.log()
            .handshakes
            .push((request.clone(), response.clone()));
    }

    fn on_websocket_request(&mut self, _session: &SessionKey, frame: &WsFrame) {
        self.log().ws_requests.push(frame.clone());
    }

    fn on_websocket_response(&mut self, _session: &SessionKey, frame: &WsFrame) {
        self.log().ws_responses.push(frame.clone());
    }
}

/// Log of a fallback hand-off: the raw bytes per direction plus whether the
/// finish notification arrived.
#[derive(Debug, Default)]
pub struct FallbackLog {
    pub tx: Vec<u8>,
    pub rx: Vec<u8>,
    pub finished: bool,
}

pub struct FallbackRecorder {
    log: Arc<Mutex<FallbackLog>>,
}

impl FallbackRecorder {
    pub fn new() -> (Self, Arc<Mutex<FallbackLog>>) {
        let log = Arc::new(Mutex::new(FallbackLog::default()));
        (Self { log: log.clone() }, log)
    }
}

impl FallbackProcessor for FallbackRecorder {
    fn handle_tx(&mut self, _session: &SessionKey, data: &[u8]) {
        self.log
            .lock()
            .expect("fallback log lock")
            .tx
            .extend_from_slice(data);
    }

    fn handle_rx(&mut self, _session: &SessionKey, data: &[u8]) {
        self.log
            .lock()
            .expect("fallback log lock")
            .rx
            .extend_from_slice(data);
    }

    fn on_finish(&mut self, _session: &SessionKey) {
        self.log.lock().expect("fallback log lock").finished = true;
    }
}

/// Decoder with one recorder and one fallback recorder attached, plus a
/// fresh session for `test_key()`.
pub fn decoder_setup() -> (
    HttpDecoder,
    HttpSession,
    Arc<Mutex<RecorderLog>>,
    Arc<Mutex<FallbackLog>>,
) {
    let mut decoder = HttpDecoder::new();
    let (recorder, log) = Recorder::new();
    decoder.register_processor(Box::new(recorder));
    let (fallback, fallback_log) = FallbackRecorder::new();
    decoder.set_fallback(Box::new(fallback));
    let session = HttpSession::new(test_key(), &DecoderConfig::default());
    (decoder, session, log, fallback_log)
}

// =============================================================================
// HTTP/2 wire builders (on top of h2wire's fixture encode path)
// =============================================================================

pub mod h2 {
    use h2wire::{encode_frame, frame, FrameBody, HpackEncoder, FLAG_END_STREAM};

    pub fn headers_frame(
        encoder: &mut HpackEncoder,
        stream_id: u32,
        fields: &[(&str, &str)],
        end_stream: bool,
    ) -> Vec<u8> {
        let fields: Vec<(String, String)> = fields
            .iter()
            .map(|(n, v)| (n.to_string(), v.to_string()))
            .collect();
        let block = encoder.encode(&fields);
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

    pub fn data_frame(stream_id: u32, payload: &[u8], end_stream: bool) -> Vec<u8> {
        let flags = if end_stream { FLAG_END_STREAM } else { 0 };
        encode_frame(&frame(
            stream_id,
            flags,
            FrameBody::Data {
                payload: payload.to_vec(),
            },
        ))
    }

    pub fn get_request_fields<'a>(path: &'a str, authority: &'a str) -> Vec<(&'a str, &'a str)> {
        vec![
            (":method", "GET"),
            (":scheme", "https"),
            (":authority", authority),
            (":path", path),
        ]
    }
}
