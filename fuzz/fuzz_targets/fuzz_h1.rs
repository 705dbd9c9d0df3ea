//! Fuzz target: HTTP/1.x parsing
//!
//! Feeds random bytes to the request and response state machines, whole and
//! in halves. The goal is to ensure the parsers never panic on arbitrary
//! input and that fragmentation never changes the hard-error outcome.

#![no_main]

use http_decoder::{DecoderConfig, RequestParser, ResponseParser, SessionBuffer};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let config = DecoderConfig::default();

    let mut buf = SessionBuffer::new();
    buf.append(data);
    let mut events = Vec::new();
    let _ = RequestParser::new(&config).parse(&mut buf, &mut events);

    let mut buf = SessionBuffer::new();
    buf.append(data);
    let mut events = Vec::new();
    let _ = ResponseParser::new(&config).parse(&mut buf, &mut events);

    // Incremental delivery must behave: feed in two halves
    if data.len() > 10 {
        let mid = data.len() / 2;
        let mut parser = RequestParser::new(&config);
        let mut buf = SessionBuffer::new();
        let mut events = Vec::new();
        buf.append(&data[..mid]);
        if parser.parse(&mut buf, &mut events).is_ok() {
            buf.append(&data[mid..]);
            let _ = parser.parse(&mut buf, &mut events);
        }
    }
});
