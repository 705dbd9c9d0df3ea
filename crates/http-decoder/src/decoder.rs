//! Top-level decode driver: dispatches each direction's bytes to the
//! machinery for the session's current mode and multicasts the results.

use crate::h1::{H1Event, ParseOutcome};
use crate::message::{wants_websocket_upgrade, HttpRequest, HttpResponse};
use crate::session::{HttpSession, SessionKey, SessionMode};
use crate::traits::{FallbackProcessor, HttpProcessor};
use h2wire::{H2Direction, H2Event};
use tracing::{debug, warn};

/// Synchronous, call-driven decoder. Owns the listener set; all session
/// state lives in the `HttpSession` passed into each call, so one decoder
/// can serve many sessions.
#[derive(Default)]
pub struct HttpDecoder {
    processors: Vec<Box<dyn HttpProcessor>>,
    fallback: Option<Box<dyn FallbackProcessor>>,
}

impl HttpDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_processor(&mut self, processor: Box<dyn HttpProcessor>) {
        self.processors.push(processor);
    }

    pub fn set_fallback(&mut self, fallback: Box<dyn FallbackProcessor>) {
        self.fallback = Some(fallback);
    }

    /// Drive one client-to-server segment through the session.
    pub fn handle_tx(&mut self, session: &mut HttpSession, data: &[u8]) {
        if session.failed {
            return;
        }
        match session.mode {
            SessionMode::Fallback => {
                if let Some(fallback) = &mut self.fallback {
                    fallback.handle_tx(&session.key, data);
                }
            }
            SessionMode::Http2 => {
                session.tx.append(data);
                self.drive_h2(session, H2Direction::Request);
            }
            SessionMode::WebSocket => {
                session.tx.append(data);
                self.drive_ws(session, true);
            }
            SessionMode::Http1 => {
                session.tx.append(data);
                self.drive_h1_tx(session);
            }
        }
        self.check_buffer_ceiling(session, true);
    }

    /// Drive one server-to-client segment through the session.
    pub fn handle_rx(&mut self, session: &mut HttpSession, data: &[u8]) {
        if session.failed {
            return;
        }
        match session.mode {
            SessionMode::Fallback => {
                if let Some(fallback) = &mut self.fallback {
                    fallback.handle_rx(&session.key, data);
                }
            }
            SessionMode::Http2 => {
                session.rx.append(data);
                self.drive_h2(session, H2Direction::Response);
            }
            SessionMode::WebSocket => {
                session.rx.append(data);
                self.drive_ws(session, false);
            }
            SessionMode::Http1 => {
                session.rx.append(data);
                self.drive_h1_rx(session);
            }
        }
        self.check_buffer_ceiling(session, false);
    }

    /// TCP finish: flush a read-until-close response, notify the fallback,
    /// release the buffers. Idempotent.
    pub fn on_finish(&mut self, session: &mut HttpSession) {
        match session.mode {
            SessionMode::Http1 => {
                if let Some(response) = session.response_parser.flush(&mut session.rx) {
                    let request = session.pending_request.take();
                    for p in &mut self.processors {
                        p.on_response(&session.key, request.as_ref(), &response);
                    }
                }
            }
            SessionMode::Fallback => {
                if let Some(fallback) = &mut self.fallback {
                    fallback.on_finish(&session.key);
                }
            }
            SessionMode::Http2 | SessionMode::WebSocket => {}
        }
        session.clear_buffers();
    }

    /// TCP reset: same flush semantics as an orderly finish.
    pub fn on_reset(&mut self, session: &mut HttpSession) {
        self.on_finish(session);
    }

    fn drive_h1_tx(&mut self, session: &mut HttpSession) {
        loop {
            let mut events = Vec::new();
            let outcome = session.request_parser.parse(&mut session.tx, &mut events);
            match outcome {
                Err(e) => {
                    warn!(session = %session.key, error = %e, "http/1.x request decode failed");
                    session.failed = true;
                    session.tx.clear();
                    return;
                }
                Ok(ParseOutcome::NeedMore) => {
                    let in_flight = session.request_parser.in_flight().cloned();
                    self.fire_request_events(&session.key, events, in_flight.as_ref());
                    session.tx.compact();
                    return;
                }
                Ok(ParseOutcome::Complete(request)) => {
                    self.fire_request_events(&session.key, events, Some(&request));
                    for p in &mut self.processors {
                        p.on_request(&session.key, &request);
                    }
                    session.pending_request = Some(request);
                    session.tx.compact();
                }
                Ok(ParseOutcome::SwitchHttp2) => {
                    debug!(session = %session.key, "http/2 preface seen, switching framing");
                    session.mode = SessionMode::Http2;
                    session.tx.compact();
                    self.drive_h2(session, H2Direction::Request);
                    return;
                }
                Ok(ParseOutcome::Fallback) => {
                    debug!(session = %session.key, "stream failed http validation, handing off");
                    session.mode = SessionMode::Fallback;
                    let tx = session.tx.take_all();
                    let rx = session.rx.take_all();
                    session.clear_buffers();
                    if let Some(fallback) = &mut self.fallback {
                        fallback.handle_tx(&session.key, &tx);
                        if !rx.is_empty() {
                            fallback.handle_rx(&session.key, &rx);
                        }
                    }
                    return;
                }
            }
        }
    }

    fn drive_h1_rx(&mut self, session: &mut HttpSession) {
        loop {
            let mut events = Vec::new();
            let outcome = session.response_parser.parse(&mut session.rx, &mut events);
            match outcome {
                Err(e) => {
                    warn!(session = %session.key, error = %e, "http/1.x response decode failed");
                    session.failed = true;
                    session.rx.clear();
                    return;
                }
                Ok(ParseOutcome::NeedMore) => {
                    let in_flight = session.response_parser.in_flight().cloned();
                    self.fire_response_events(session, events, in_flight.as_ref());
                    session.rx.compact();
                    return;
                }
                Ok(ParseOutcome::Complete(response)) => {
                    self.fire_response_events(session, events, Some(&response));
                    let upgraded = session
                        .pending_request
                        .as_ref()
                        .is_some_and(|req| {
                            wants_websocket_upgrade(&req.headers)
                                && wants_websocket_upgrade(&response.headers)
                        });
                    if upgraded {
                        let request = match session.pending_request.take() {
                            Some(request) => request,
                            None => return,
                        };
                        session.mode = SessionMode::WebSocket;
                        for p in &mut self.processors {
                            p.on_websocket_handshake(&session.key, &request, &response);
                        }
                        session.websocket_pair = Some((request, response));
                        session.rx.compact();
                        // Frames may already trail the 101 in this segment
                        self.drive_ws(session, false);
                        return;
                    }
                    let request = session.pending_request.take();
                    for p in &mut self.processors {
                        p.on_response(&session.key, request.as_ref(), &response);
                    }
                    session.rx.compact();
                }
                // The response parser never requests a mode change
                Ok(ParseOutcome::SwitchHttp2) | Ok(ParseOutcome::Fallback) => return,
            }
        }
    }

    fn drive_h2(&mut self, session: &mut HttpSession, direction: H2Direction) {
        let buffer = match direction {
            H2Direction::Request => &mut session.tx,
            H2Direction::Response => &mut session.rx,
        };
        let (consumed, events) = match session.h2.feed(direction, buffer.as_slice()) {
            Ok(result) => result,
            Err(e) => {
                warn!(session = %session.key, error = %e, "http/2 decode failed");
                session.failed = true;
                session.clear_buffers();
                return;
            }
        };
        buffer.skip(consumed);
        buffer.mark();
        buffer.compact();

        for event in events {
            match event {
                H2Event::RequestReady { stream_id, request } => {
                    debug!(session = %session.key, stream = stream_id.0, "http/2 request ready");
                    let request = HttpRequest::from(request);
                    for p in &mut self.processors {
                        p.on_request(&session.key, &request);
                    }
                }
                H2Event::ResponseReady {
                    stream_id,
                    request,
                    response,
                } => {
                    debug!(session = %session.key, stream = stream_id.0, "http/2 response ready");
                    let request = request.map(HttpRequest::from);
                    let response = HttpResponse::from(response);
                    for p in &mut self.processors {
                        p.on_response(&session.key, request.as_ref(), &response);
                    }
                }
            }
        }
    }

    fn drive_ws(&mut self, session: &mut HttpSession, is_tx: bool) {
        loop {
            let (decoder, buffer) = if is_tx {
                (&mut session.ws_tx, &mut session.tx)
            } else {
                (&mut session.ws_rx, &mut session.rx)
            };
            match decoder.decode(buffer) {
                Ok(Some(frame)) => {
                    buffer.mark();
                    buffer.compact();
                    for p in &mut self.processors {
                        if is_tx {
                            p.on_websocket_request(&session.key, &frame);
                        } else {
                            p.on_websocket_response(&session.key, &frame);
                        }
                    }
                }
                Ok(None) => {
                    buffer.compact();
                    return;
                }
                Err(e) => {
                    warn!(session = %session.key, error = %e, "websocket decode failed");
                    session.failed = true;
                    session.clear_buffers();
                    return;
                }
            }
        }
    }

    fn check_buffer_ceiling(&self, session: &mut HttpSession, is_tx: bool) {
        if session.failed {
            return;
        }
        let held = if is_tx {
            session.tx.held_bytes()
        } else {
            session.rx.held_bytes()
        };
        if held > session.max_buffered {
            warn!(
                session = %session.key,
                held,
                limit = session.max_buffered,
                "buffered bytes exceeded limit, abandoning session"
            );
            session.failed = true;
            session.clear_buffers();
        }
    }

    fn fire_request_events(
        &mut self,
        key: &SessionKey,
        events: Vec<H1Event>,
        request: Option<&HttpRequest>,
    ) {
        for event in events {
            match event {
                H1Event::Chunk(chunk) => {
                    if let Some(request) = request {
                        for p in &mut self.processors {
                            p.on_chunked_request(key, request, &chunk);
                        }
                    }
                }
                H1Event::Part(mut slice) => {
                    if slice.url.is_empty() {
                        if let Some(request) = request {
                            slice.url = request.path.clone();
                        }
                    }
                    for p in &mut self.processors {
                        p.on_multipart_data(key, &slice);
                    }
                }
            }
        }
    }

    fn fire_response_events(
        &mut self,
        session: &HttpSession,
        events: Vec<H1Event>,
        response: Option<&HttpResponse>,
    ) {
        let request = session.pending_request.as_ref();
        for event in events {
            match event {
                H1Event::Chunk(chunk) => {
                    if let Some(response) = response {
                        for p in &mut self.processors {
                            p.on_chunked_response(&session.key, request, response, &chunk);
                        }
                    }
                }
                H1Event::Part(mut slice) => {
                    // Key the slice by the URL of the request that elicited it
                    if let Some(request) = request {
                        slice.url = request.path.clone();
                    }
                    for p in &mut self.processors {
                        p.on_multipart_data(&session.key, &slice);
                    }
                }
            }
        }
    }
}
