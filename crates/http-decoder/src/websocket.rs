//! RFC 6455 WebSocket frame decoding for upgraded sessions.
//!
//! Decode is two-phase: the variable-length header is parsed under a
//! mark/reset guard, then parked in an in-flight slot while the decoder
//! waits for the full payload. The slot means a large frame never forces a
//! re-parse of its header on every subsequent segment.

use crate::buffer::SessionBuffer;
use crate::error::DecodeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WsOpcode {
    Continuation,
    Text,
    Binary,
    Close,
    Ping,
    Pong,
}

impl WsOpcode {
    fn from_wire(op: u8) -> Result<Self, DecodeError> {
        match op {
            0x0 => Ok(WsOpcode::Continuation),
            0x1 => Ok(WsOpcode::Text),
            0x2 => Ok(WsOpcode::Binary),
            0x8 => Ok(WsOpcode::Close),
            0x9 => Ok(WsOpcode::Ping),
            0xA => Ok(WsOpcode::Pong),
            other => Err(DecodeError::UnsupportedWsOpcode(other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WsFrame {
    pub fin: bool,
    pub opcode: WsOpcode,
    pub masked: bool,
    pub payload: Vec<u8>,
}

#[derive(Debug)]
struct PendingHeader {
    fin: bool,
    opcode: WsOpcode,
    mask_key: Option<[u8; 4]>,
    payload_len: usize,
}

#[derive(Debug)]
pub struct WsFrameDecoder {
    pending: Option<PendingHeader>,
    max_payload: u64,
}

impl WsFrameDecoder {
    pub fn new(max_payload: u64) -> Self {
        Self {
            pending: None,
            max_payload,
        }
    }

    /// Decode the next frame. `Ok(None)` means more bytes are needed; a
    /// fully-parsed header is retained across such returns.
    pub fn decode(&mut self, buf: &mut SessionBuffer) -> Result<Option<WsFrame>, DecodeError> {
        if self.pending.is_none() {
            match self.read_header(buf)? {
                Some(header) => self.pending = Some(header),
                None => return Ok(None),
            }
        }
        // Payload phase: the header slot survives until enough bytes arrive
        let header = match &self.pending {
            Some(h) => h,
            None => return Ok(None),
        };
        let Some(mut payload) = buf.get_n(header.payload_len) else {
            return Ok(None);
        };
        let header = match self.pending.take() {
            Some(h) => h,
            None => return Ok(None),
        };
        if let Some(key) = header.mask_key {
            for (i, byte) in payload.iter_mut().enumerate() {
                *byte ^= key[i % 4];
            }
        }
        Ok(Some(WsFrame {
            fin: header.fin,
            opcode: header.opcode,
            masked: header.mask_key.is_some(),
            payload,
        }))
    }

    fn read_header(&self, buf: &mut SessionBuffer) -> Result<Option<PendingHeader>, DecodeError> {
        buf.mark();
        let (Some(b0), Some(b1)) = (buf.get(), buf.get()) else {
            buf.reset();
            return Ok(None);
        };
        let fin = b0 & 0x80 != 0;
        let opcode = WsOpcode::from_wire(b0 & 0x0F)?;
        let masked = b1 & 0x80 != 0;

        let payload_len: u64 = match b1 & 0x7F {
            126 => {
                let Some(ext) = buf.get_n(2) else {
                    buf.reset();
                    return Ok(None);
                };
                u64::from(u16::from_be_bytes([ext[0], ext[1]]))
            }
            127 => {
                let Some(ext) = buf.get_n(8) else {
                    buf.reset();
                    return Ok(None);
                };
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&ext);
                u64::from_be_bytes(raw)
            }
            short => u64::from(short),
        };
        if payload_len > self.max_payload {
            return Err(DecodeError::WsPayloadTooLarge(payload_len));
        }
        let payload_len = usize::try_from(payload_len)
            .map_err(|_| DecodeError::WsPayloadTooLarge(payload_len))?;

        let mask_key = if masked {
            let Some(key) = buf.get_n(4) else {
                buf.reset();
                return Ok(None);
            };
            let mut raw = [0u8; 4];
            raw.copy_from_slice(&key);
            Some(raw)
        } else {
            None
        };

        Ok(Some(PendingHeader {
            fin,
            opcode,
            mask_key,
            payload_len,
        }))
    }
}

/// Encode a frame. Decode-side tests and fixtures only; the decoder itself
/// never writes to the wire.
pub fn encode_ws_frame(
    fin: bool,
    opcode: u8,
    mask_key: Option<[u8; 4]>,
    payload: &[u8],
) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 14);
    out.push(if fin { 0x80 | opcode } else { opcode });
    let mask_bit = if mask_key.is_some() { 0x80 } else { 0x00 };
    match payload.len() {
        len if len < 126 => out.push(mask_bit | len as u8),
        len if len <= u16::MAX as usize => {
            out.push(mask_bit | 126);
            out.extend_from_slice(&(len as u16).to_be_bytes());
        }
        len => {
            out.push(mask_bit | 127);
            out.extend_from_slice(&(len as u64).to_be_bytes());
        }
    }
    match mask_key {
        Some(key) => {
            out.extend_from_slice(&key);
            out.extend(
                payload
                    .iter()
                    .enumerate()
                    .map(|(i, byte)| byte ^ key[i % 4]),
            );
        }
        None => out.extend_from_slice(payload),
    }
    out
}
