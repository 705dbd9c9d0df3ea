//! Per-connection decode state and the concurrent session registry.

use crate::buffer::SessionBuffer;
use crate::h1::{RequestParser, ResponseParser};
use crate::message::{HttpRequest, HttpResponse};
use crate::websocket::WsFrameDecoder;
use crate::DecoderConfig;
use dashmap::DashMap;
use h2wire::H2SessionState;
use std::fmt;
use std::net::IpAddr;
use std::sync::Mutex;

/// TCP 4-tuple identifying one captured connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub client_addr: IpAddr,
    pub client_port: u16,
    pub server_addr: IpAddr,
    pub server_port: u16,
}

impl SessionKey {
    pub fn new(
        client_addr: IpAddr,
        client_port: u16,
        server_addr: IpAddr,
        server_port: u16,
    ) -> Self {
        Self {
            client_addr,
            client_port,
            server_addr,
            server_port,
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} -> {}:{}",
            self.client_addr, self.client_port, self.server_addr, self.server_port
        )
    }
}

/// Framing currently in effect for a session. Transitions are one-way:
/// every session starts in Http1 and may move to exactly one of the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    Http1,
    Http2,
    WebSocket,
    Fallback,
}

/// All decode state owned by one connection. Never shared: the registry
/// serializes access per key.
pub struct HttpSession {
    pub(crate) key: SessionKey,
    pub(crate) mode: SessionMode,
    /// Client-to-server bytes.
    pub(crate) tx: SessionBuffer,
    /// Server-to-client bytes.
    pub(crate) rx: SessionBuffer,
    pub(crate) request_parser: RequestParser,
    pub(crate) response_parser: ResponseParser,
    /// Completed request awaiting its response for pairing.
    pub(crate) pending_request: Option<HttpRequest>,
    pub(crate) h2: H2SessionState,
    pub(crate) ws_tx: WsFrameDecoder,
    pub(crate) ws_rx: WsFrameDecoder,
    /// The upgrade exchange, retained for the lifetime of a WebSocket
    /// session instead of being cleared like an ordinary pair.
    pub(crate) websocket_pair: Option<(HttpRequest, HttpResponse)>,
    /// Set on a hard protocol error; all further input is dropped.
    pub(crate) failed: bool,
    /// Per-direction ceiling on bytes buffered for an incomplete message.
    pub(crate) max_buffered: usize,
}

impl HttpSession {
    pub fn new(key: SessionKey, config: &DecoderConfig) -> Self {
        Self {
            key,
            mode: SessionMode::Http1,
            tx: SessionBuffer::new(),
            rx: SessionBuffer::new(),
            request_parser: RequestParser::new(config),
            response_parser: ResponseParser::new(config),
            pending_request: None,
            h2: H2SessionState::with_limits(config.h2_limits.clone()),
            ws_tx: WsFrameDecoder::new(config.max_ws_payload),
            ws_rx: WsFrameDecoder::new(config.max_ws_payload),
            websocket_pair: None,
            failed: false,
            max_buffered: config.max_buffered_bytes,
        }
    }

    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    pub fn websocket_pair(&self) -> Option<(&HttpRequest, &HttpResponse)> {
        self.websocket_pair.as_ref().map(|(req, resp)| (req, resp))
    }

    pub(crate) fn clear_buffers(&mut self) {
        self.tx.clear();
        self.rx.clear();
    }
}

/// Sharded map of live sessions. One session is driven by one caller at a
/// time; distinct sessions may be driven in parallel.
pub struct SessionRegistry {
    sessions: DashMap<SessionKey, Mutex<HttpSession>>,
    config: DecoderConfig,
}

impl SessionRegistry {
    pub fn new(config: DecoderConfig) -> Self {
        Self {
            sessions: DashMap::new(),
            config,
        }
    }

    /// Create the session for `key` if it does not exist yet.
    pub fn establish(&self, key: SessionKey) {
        self.sessions
            .entry(key)
            .or_insert_with(|| Mutex::new(HttpSession::new(key, &self.config)));
    }

    pub fn remove(&self, key: &SessionKey) {
        self.sessions.remove(key);
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Run `f` against the session for `key`, if established. A poisoned
    /// lock is recovered: the session carries no invariants a panicked
    /// caller could break that the failed flag does not already cover.
    pub fn with_session<R>(&self, key: &SessionKey, f: impl FnOnce(&mut HttpSession) -> R) -> Option<R> {
        let entry = self.sessions.get(key)?;
        let mut guard = match entry.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Some(f(&mut guard))
    }
}
