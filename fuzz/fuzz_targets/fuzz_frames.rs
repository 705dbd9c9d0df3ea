//! Fuzz target: HTTP/2 frame decoding
//!
//! Feeds random bytes to the frame decoder and the session feed loop, whole
//! and split, in both directions. Only panics count as findings.

#![no_main]

use h2wire::{decode_frame, H2Direction, H2SessionState};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = decode_frame(data);

    let mut session = H2SessionState::new();
    let _ = session.feed(H2Direction::Request, data);
    let _ = session.feed(H2Direction::Response, data);

    // Split delivery must never reach a different panic path
    if data.len() > 10 {
        let mid = data.len() / 2;
        let mut session = H2SessionState::new();
        let mut pending = Vec::new();
        pending.extend_from_slice(&data[..mid]);
        if let Ok((consumed, _)) = session.feed(H2Direction::Request, &pending) {
            pending.drain(..consumed);
            pending.extend_from_slice(&data[mid..]);
            let _ = session.feed(H2Direction::Request, &pending);
        }
    }
});
