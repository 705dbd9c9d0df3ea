//! Fuzz target: structured frame generation
//!
//! Generates semi-valid HTTP/2 frames via the Arbitrary trait. More
//! effective than raw bytes at reaching the frame-handling logic, since the
//! 9-byte headers are always well-formed while field values stay random.

#![no_main]

use arbitrary::Arbitrary;
use h2wire::{H2Direction, H2SessionState};
use libfuzzer_sys::fuzz_target;

const FRAME_TYPE_DATA: u8 = 0x00;
const FRAME_TYPE_HEADERS: u8 = 0x01;
const FRAME_TYPE_SETTINGS: u8 = 0x04;

const FLAG_END_HEADERS: u8 = 0x04;
const FLAG_PADDED: u8 = 0x08;
const FLAG_PRIORITY: u8 = 0x20;

/// One structurally valid frame with random field values.
#[derive(Debug, Arbitrary)]
struct FuzzFrame {
    frame_type: u8,
    flags: u8,
    stream_id: u32,
    payload: Vec<u8>,
    add_padding: bool,
    add_priority: bool,
    padding_len: u8,
}

impl FuzzFrame {
    fn to_bytes(&self) -> Vec<u8> {
        let frame_type = self.frame_type % 10;
        let stream_id = self.stream_id & 0x7FFF_FFFF;

        let mut payload = self.payload.clone();
        let mut flags = self.flags;

        // HEADERS without END_HEADERS is fatal to the session; keep most
        // generated frames past that gate so later handling is reached too
        if frame_type == FRAME_TYPE_HEADERS {
            flags |= FLAG_END_HEADERS;
        }

        if self.add_padding && (frame_type == FRAME_TYPE_DATA || frame_type == FRAME_TYPE_HEADERS)
        {
            let pad_len = self.padding_len.min(200) as usize;
            if payload.len() + 1 + pad_len <= 16384 {
                flags |= FLAG_PADDED;
                let mut padded = vec![pad_len as u8];
                padded.extend(&payload);
                padded.extend(std::iter::repeat(0u8).take(pad_len));
                payload = padded;
            }
        }

        if self.add_priority && frame_type == FRAME_TYPE_HEADERS && payload.len() + 5 <= 16384 {
            flags |= FLAG_PRIORITY;
            let mut with_priority = Vec::new();
            if flags & FLAG_PADDED != 0 && !payload.is_empty() {
                with_priority.push(payload[0]);
                with_priority.extend(&[0, 0, 0, 0, 16]);
                with_priority.extend(&payload[1..]);
            } else {
                with_priority.extend(&[0, 0, 0, 0, 16]);
                with_priority.extend(&payload);
            }
            payload = with_priority;
        }

        payload.truncate(16384);
        let length = payload.len() as u32;

        let mut frame = Vec::with_capacity(9 + payload.len());
        frame.push((length >> 16) as u8);
        frame.push((length >> 8) as u8);
        frame.push(length as u8);
        frame.push(frame_type);
        frame.push(flags);
        frame.push((stream_id >> 24) as u8 & 0x7F);
        frame.push((stream_id >> 16) as u8);
        frame.push((stream_id >> 8) as u8);
        frame.push(stream_id as u8);
        frame.extend(&payload);
        frame
    }
}

/// A sequence of frames, optionally opened by an empty SETTINGS frame.
#[derive(Debug, Arbitrary)]
struct FuzzConnection {
    include_settings: bool,
    frames: Vec<FuzzFrame>,
}

impl FuzzConnection {
    fn to_bytes(&self) -> Vec<u8> {
        let mut data = Vec::new();
        if self.include_settings {
            data.extend(&[0, 0, 0, FRAME_TYPE_SETTINGS, 0, 0, 0, 0, 0]);
        }
        for frame in &self.frames {
            data.extend(frame.to_bytes());
        }
        data
    }
}

fuzz_target!(|conn: FuzzConnection| {
    let data = conn.to_bytes();

    let mut session = H2SessionState::new();
    let _ = session.feed(H2Direction::Request, &data);

    // Same structured input delivered in odd-sized chunks to hit the
    // partial-frame boundaries
    if data.len() > 20 {
        let mut session = H2SessionState::new();
        let mut pending = Vec::new();
        for chunk in data.chunks(33) {
            pending.extend_from_slice(chunk);
            match session.feed(H2Direction::Response, &pending) {
                Ok((consumed, _)) => {
                    pending.drain(..consumed);
                }
                Err(_) => break,
            }
        }
    }
});
