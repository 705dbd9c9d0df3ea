//! Listener surfaces for decoded traffic.

use crate::message::{ByteRangeSlice, HttpRequest, HttpResponse};
use crate::session::SessionKey;
use crate::websocket::WsFrame;

/// Observer for decoded HTTP and WebSocket traffic. All methods default to
/// no-ops so implementors override only what they consume. Callbacks are
/// multicast to every registered processor in registration order; the order
/// carries no meaning.
pub trait HttpProcessor {
    fn on_request(&mut self, _session: &SessionKey, _request: &HttpRequest) {}

    fn on_response(
        &mut self,
        _session: &SessionKey,
        _request: Option<&HttpRequest>,
        _response: &HttpResponse,
    ) {
    }

    /// One decoded chunk of an in-flight chunked request body.
    fn on_chunked_request(
        &mut self,
        _session: &SessionKey,
        _request: &HttpRequest,
        _chunk: &[u8],
    ) {
    }

    /// One decoded chunk of an in-flight chunked response body.
    fn on_chunked_response(
        &mut self,
        _session: &SessionKey,
        _request: Option<&HttpRequest>,
        _response: &HttpResponse,
        _chunk: &[u8],
    ) {
    }

    /// One extracted byte-range part, keyed for partial-content reassembly.
    fn on_multipart_data(&mut self, _session: &SessionKey, _slice: &ByteRangeSlice) {}

    fn on_websocket_handshake(
        &mut self,
        _session: &SessionKey,
        _request: &HttpRequest,
        _response: &HttpResponse,
    ) {
    }

    fn on_websocket_request(&mut self, _session: &SessionKey, _frame: &WsFrame) {}

    fn on_websocket_response(&mut self, _session: &SessionKey, _frame: &WsFrame) {}
}

/// Sink for sessions that fail HTTP/1.x validation. Once a session is handed
/// off it never returns to the HTTP decoder.
pub trait FallbackProcessor {
    fn handle_tx(&mut self, session: &SessionKey, data: &[u8]);
    fn handle_rx(&mut self, session: &SessionKey, data: &[u8]);
    fn on_finish(&mut self, session: &SessionKey);
}
