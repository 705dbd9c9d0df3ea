//! Fuzz target: header-block decoding
//!
//! Random bytes through the HPACK decoder and the dictionary-DEFLATE
//! name/value decoder. Decode errors are expected; panics are not.

#![no_main]

use h2wire::{decode_name_value_block, HpackDecoder};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut decoder = HpackDecoder::new(0x40000, 0x10000);
    let _ = decoder.decode(data);

    // Dynamic table state from one block must not break the next
    let _ = decoder.decode(data);

    let _ = decode_name_value_block(data);
});
