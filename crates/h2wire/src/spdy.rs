//! SPDY-style name/value block: a 4-byte pair count followed by
//! length-prefixed name/value strings, DEFLATE-compressed against a fixed
//! preset dictionary.

use crate::error::{H2Error, H2ErrorKind};
use crate::header::{validate_name, HeaderBlock};
use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};

/// Protocol-specified preset dictionary. Shared by the inflate and the
/// fixture-only deflate paths; the trailing NUL is part of the dictionary.
pub const SPDY_DICTIONARY: &[u8] =
    b"optionsgetheadpostputdeletetraceacceptaccept-charsetaccept-encodingaccept-\
languageauthorizationexpectfromhostif-modified-sinceif-matchif-none-matchif-rangeif-\
unmodifiedsincemax-forwardsproxy-authorizationrangerefererteuser-agent1001012002012022032\
042052063003013023033043053063074004014024034044054064074084094104114124134144154164175005\
01502503504505accept-rangesageetaglocationproxy-authenticatepublicretry-afterservervary\
warningwww-authenticateallowcontent-basecontent-encodingcache-controlconnectiondatetrailer\
transfer-encodingupgradeviawarningcontent-languagecontent-lengthcontent-locationcontent-\
md5content-rangecontent-typeetagexpireslast-modifiedset-cookieMondayTuesdayWednesday\
ThursdayFridaySaturdaySundayJanFebMarAprMayJunJulAugSepOctNovDecchunkedtext/htmlimage/\
pngimage/jpgimage/gifapplication/xmlapplication/xhtmltext/plainpublicmax-agecharset=iso-\
8859-1utf-8gzipdeflateHTTP/1.1statusversionurl\0";

/// Inflate a zlib stream that may request the preset dictionary mid-stream.
fn inflate_with_dictionary(compressed: &[u8]) -> Result<Vec<u8>, H2Error> {
    let mut decomp = Decompress::new(true);
    let mut out = Vec::with_capacity(compressed.len().saturating_mul(10).max(256));

    loop {
        let consumed = decomp.total_in() as usize;
        let remaining = &compressed[consumed..];
        match decomp.decompress_vec(remaining, &mut out, FlushDecompress::Finish) {
            Ok(Status::StreamEnd) => return Ok(out),
            Ok(Status::Ok) | Ok(Status::BufError) => {
                if remaining.is_empty() && decomp.total_in() as usize == consumed {
                    return Err(H2ErrorKind::Inflate("truncated deflate stream".into()).into());
                }
                out.reserve(out.capacity().max(256));
            }
            Err(e) if e.needs_dictionary().is_some() => {
                decomp
                    .set_dictionary(SPDY_DICTIONARY)
                    .map_err(|e| H2ErrorKind::Inflate(e.to_string()))?;
            }
            Err(e) => return Err(H2ErrorKind::Inflate(e.to_string()).into()),
        }
    }
}

fn read_u32(data: &[u8], pos: usize) -> Result<u32, H2Error> {
    let bytes = data
        .get(pos..pos + 4)
        .ok_or(H2ErrorKind::TruncatedHeaderBlock)?;
    Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn read_string(data: &[u8], pos: usize, len: usize) -> Result<String, H2Error> {
    let bytes = data
        .get(pos..pos + len)
        .ok_or(H2ErrorKind::TruncatedHeaderBlock)?;
    String::from_utf8(bytes.to_vec()).map_err(|_| H2ErrorKind::InvalidUtf8.into())
}

/// Decode a compressed name/value block. Duplicate names, uppercase names,
/// zero-length names and trailing bytes after the declared pairs are all
/// fatal.
pub fn decode_name_value_block(compressed: &[u8]) -> Result<HeaderBlock, H2Error> {
    let data = inflate_with_dictionary(compressed)?;

    let count = read_u32(&data, 0)? as usize;
    let mut pos = 4;
    let mut block = HeaderBlock::new();
    for _ in 0..count {
        let name_len = read_u32(&data, pos)? as i64;
        pos += 4;
        if name_len <= 0 {
            return Err(H2ErrorKind::ZeroLengthHeaderName.into());
        }
        let name = read_string(&data, pos, name_len as usize)?;
        pos += name_len as usize;
        validate_name(&name)?;

        let value_len = read_u32(&data, pos)? as usize;
        pos += 4;
        let value = read_string(&data, pos, value_len)?;
        pos += value_len;

        block.insert_unique(name, value)?;
    }
    if pos != data.len() {
        return Err(H2ErrorKind::TrailingBlockBytes(data.len() - pos).into());
    }
    Ok(block)
}

/// Serialize and compress a block. Fixture path for round-trip tests; live
/// decoding never encodes.
pub fn encode_name_value_block(block: &HeaderBlock) -> Result<Vec<u8>, H2Error> {
    let mut raw = Vec::new();
    raw.extend_from_slice(&(block.len() as u32).to_be_bytes());
    for (name, value) in block.iter() {
        raw.extend_from_slice(&(name.len() as u32).to_be_bytes());
        raw.extend_from_slice(name.as_bytes());
        raw.extend_from_slice(&(value.len() as u32).to_be_bytes());
        raw.extend_from_slice(value.as_bytes());
    }

    let mut comp = Compress::new(Compression::default(), true);
    comp.set_dictionary(SPDY_DICTIONARY)
        .map_err(|e| H2ErrorKind::Inflate(e.to_string()))?;
    let mut out = Vec::with_capacity(raw.len() + 128);
    loop {
        let consumed = comp.total_in() as usize;
        match comp.compress_vec(&raw[consumed..], &mut out, FlushCompress::Finish) {
            Ok(Status::StreamEnd) => return Ok(out),
            Ok(_) => out.reserve(out.capacity().max(128)),
            Err(e) => return Err(H2ErrorKind::Inflate(e.to_string()).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_block() -> HeaderBlock {
        let mut block = HeaderBlock::new();
        block.push("method".into(), "GET".into());
        block.push("url".into(), "/index.html".into());
        block.push("version".into(), "HTTP/1.1".into());
        block.push("host".into(), "example.com".into());
        block
    }

    #[test]
    fn test_round_trip() {
        let block = sample_block();
        let compressed = encode_name_value_block(&block).expect("encode");
        let decoded = decode_name_value_block(&compressed).expect("decode");
        assert_eq!(decoded, block);
    }

    #[test]
    fn test_round_trip_empty_value() {
        let mut block = HeaderBlock::new();
        block.push("x-empty".into(), String::new());
        let compressed = encode_name_value_block(&block).expect("encode");
        let decoded = decode_name_value_block(&compressed).expect("decode");
        assert_eq!(decoded.get("x-empty"), Some(""));
    }

    #[test]
    fn test_duplicate_name_fatal() {
        // Build the raw pair sequence by hand with a duplicated name
        let mut raw = Vec::new();
        raw.extend_from_slice(&2u32.to_be_bytes());
        for value in ["a", "b"] {
            raw.extend_from_slice(&4u32.to_be_bytes());
            raw.extend_from_slice(b"host");
            raw.extend_from_slice(&1u32.to_be_bytes());
            raw.extend_from_slice(value.as_bytes());
        }
        let compressed = deflate_raw(&raw);
        let err = decode_name_value_block(&compressed).unwrap_err();
        assert!(matches!(err.kind, H2ErrorKind::DuplicateHeaderName(_)));
    }

    #[test]
    fn test_uppercase_name_fatal() {
        let mut raw = Vec::new();
        raw.extend_from_slice(&1u32.to_be_bytes());
        raw.extend_from_slice(&4u32.to_be_bytes());
        raw.extend_from_slice(b"Host");
        raw.extend_from_slice(&1u32.to_be_bytes());
        raw.extend_from_slice(b"a");
        let compressed = deflate_raw(&raw);
        let err = decode_name_value_block(&compressed).unwrap_err();
        assert!(matches!(err.kind, H2ErrorKind::UppercaseHeaderName(_)));
    }

    #[test]
    fn test_zero_length_name_fatal() {
        let mut raw = Vec::new();
        raw.extend_from_slice(&1u32.to_be_bytes());
        raw.extend_from_slice(&0u32.to_be_bytes());
        raw.extend_from_slice(&1u32.to_be_bytes());
        raw.extend_from_slice(b"a");
        let compressed = deflate_raw(&raw);
        let err = decode_name_value_block(&compressed).unwrap_err();
        assert_eq!(err.kind, H2ErrorKind::ZeroLengthHeaderName);
    }

    #[test]
    fn test_trailing_bytes_fatal() {
        let mut raw = Vec::new();
        raw.extend_from_slice(&1u32.to_be_bytes());
        raw.extend_from_slice(&4u32.to_be_bytes());
        raw.extend_from_slice(b"host");
        raw.extend_from_slice(&1u32.to_be_bytes());
        raw.extend_from_slice(b"a");
        raw.extend_from_slice(b"junk");
        let compressed = deflate_raw(&raw);
        let err = decode_name_value_block(&compressed).unwrap_err();
        assert_eq!(err.kind, H2ErrorKind::TrailingBlockBytes(4));
    }

    #[test]
    fn test_garbage_input_fatal() {
        let err = decode_name_value_block(&[0xde, 0xad, 0xbe, 0xef]).unwrap_err();
        assert!(matches!(err.kind, H2ErrorKind::Inflate(_)));
    }

    /// Compress raw pair bytes with the preset dictionary, bypassing the
    /// HeaderBlock validation that encode_name_value_block inherits.
    fn deflate_raw(raw: &[u8]) -> Vec<u8> {
        let mut comp = Compress::new(Compression::default(), true);
        comp.set_dictionary(SPDY_DICTIONARY).expect("set dictionary");
        let mut out = Vec::with_capacity(raw.len() + 128);
        loop {
            let consumed = comp.total_in() as usize;
            match comp
                .compress_vec(&raw[consumed..], &mut out, FlushCompress::Finish)
                .expect("compress")
            {
                Status::StreamEnd => return out,
                _ => out.reserve(out.capacity().max(128)),
            }
        }
    }
}
