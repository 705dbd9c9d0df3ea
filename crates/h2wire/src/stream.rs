//! Per-stream reassembly: pairs HEADERS and DATA frames into a complete
//! request/response, tracks end-of-stream, and content-decodes response
//! bodies.

use crate::frame::StreamId;
use crate::header::HeaderBlock;
use crate::trace_warn;
use std::io::Read;

/// Request reassembled from the pseudo-header set plus DATA payloads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Http2Request {
    pub method: Option<String>,
    pub scheme: Option<String>,
    pub authority: Option<String>,
    pub path: Option<String>,
    /// scheme://authority + path, when all three pseudo-headers were present.
    pub url: Option<String>,
    /// Query-string pairs from `:path`, in wire order, not percent-decoded.
    pub query_params: Vec<(String, String)>,
    /// Remaining (non-pseudo) headers.
    pub headers: HeaderBlock,
    pub body: Vec<u8>,
}

impl Http2Request {
    fn from_block(mut headers: HeaderBlock) -> Self {
        let method = headers.remove(":method");
        let scheme = headers.remove(":scheme");
        let authority = headers.remove(":authority");
        let path = headers.remove(":path");

        let url = match (&scheme, &authority, &path) {
            (Some(s), Some(a), Some(p)) => Some(format!("{s}://{a}{p}")),
            _ => None,
        };
        let query_params = path
            .as_deref()
            .and_then(|p| p.split_once('?'))
            .map(|(_, query)| parse_query(query))
            .unwrap_or_default();

        Self {
            method,
            scheme,
            authority,
            path,
            url,
            query_params,
            headers,
            body: Vec::new(),
        }
    }
}

fn parse_query(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (k.to_string(), v.to_string()),
            None => (pair.to_string(), String::new()),
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Http2Response {
    pub status: Option<u16>,
    pub headers: HeaderBlock,
    pub body: Vec<u8>,
}

impl Http2Response {
    fn from_block(mut headers: HeaderBlock) -> Self {
        let status = headers.remove(":status").and_then(|s| s.parse().ok());
        Self {
            status,
            headers,
            body: Vec::new(),
        }
    }

    /// Fold a later HEADERS block (e.g. the final headers after a 1xx) into
    /// this response instead of replacing it.
    fn merge_block(&mut self, headers: HeaderBlock) {
        for (name, value) in headers.iter() {
            if name == ":status" {
                self.status = value.parse().ok();
            } else {
                self.headers.merge(name.to_string(), value.to_string());
            }
        }
    }
}

/// One active stream id within a session. Created on the first HEADERS
/// frame, removed when the response ends or the stream is reset.
#[derive(Debug)]
pub struct Http2Stream {
    pub id: StreamId,
    request: Option<Http2Request>,
    response: Option<Http2Response>,
    request_notified: bool,
}

impl Http2Stream {
    pub fn new(id: StreamId) -> Self {
        Self {
            id,
            request: None,
            response: None,
            request_notified: false,
        }
    }

    pub fn handle_request_headers(&mut self, headers: HeaderBlock) {
        self.request = Some(Http2Request::from_block(headers));
    }

    /// Returns the accumulated request body length.
    pub fn handle_request_data(&mut self, data: &[u8]) -> usize {
        let request = self.request.get_or_insert_with(Http2Request::default);
        request.body.extend_from_slice(data);
        request.body.len()
    }

    pub fn handle_response_headers(&mut self, headers: HeaderBlock) {
        match &mut self.response {
            Some(response) => response.merge_block(headers),
            None => self.response = Some(Http2Response::from_block(headers)),
        }
    }

    pub fn handle_response_data(&mut self, data: &[u8]) -> usize {
        let response = self.response.get_or_insert_with(Http2Response::default);
        response.body.extend_from_slice(data);
        response.body.len()
    }

    pub fn request(&self) -> Option<&Http2Request> {
        self.request.as_ref()
    }

    pub fn response(&self) -> Option<&Http2Response> {
        self.response.as_ref()
    }

    /// End-of-request notification, at most once per stream regardless of
    /// whether END_STREAM arrived on HEADERS, a DATA frame, or only as the
    /// response completed.
    pub fn take_request_event(&mut self) -> Option<Http2Request> {
        if self.request_notified {
            return None;
        }
        let request = self.request.clone()?;
        self.request_notified = true;
        Some(request)
    }

    /// Tear the stream apart at response end-of-stream. The response body is
    /// content-decoded according to its Content-Encoding header.
    pub fn finish(mut self) -> (Option<Http2Request>, Option<Http2Response>) {
        let response = self.response.take().map(|mut response| {
            if !response.body.is_empty() {
                let encoding = response.headers.get("content-encoding").map(str::to_string);
                response.body = decode_content(encoding.as_deref(), response.body);
            }
            response
        });
        (self.request.take(), response)
    }
}

/// Decompress a body per its declared encoding. Unknown encodings pass
/// through; decode failures keep the raw bytes so the message still reaches
/// consumers.
pub(crate) fn decode_content(encoding: Option<&str>, data: Vec<u8>) -> Vec<u8> {
    let encoding = match encoding {
        Some(e) => e.trim().to_ascii_lowercase(),
        None => return data,
    };
    let result = match encoding.as_str() {
        "gzip" => {
            let mut out = Vec::new();
            flate2::read::GzDecoder::new(data.as_slice())
                .read_to_end(&mut out)
                .map(|_| out)
        }
        "deflate" => {
            let mut out = Vec::new();
            flate2::read::DeflateDecoder::new(data.as_slice())
                .read_to_end(&mut out)
                .map(|_| out)
        }
        "br" => {
            let mut out = Vec::new();
            brotli::Decompressor::new(data.as_slice(), 4096)
                .read_to_end(&mut out)
                .map(|_| out)
        }
        "identity" | "" => return data,
        other => {
            trace_warn!(encoding = other, "unknown content-encoding, passing body through");
            return data;
        }
    };
    match result {
        Ok(decoded) => decoded,
        Err(err) => {
            trace_warn!(%err, encoding = %encoding, "content decode failed, keeping raw body");
            data
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn request_block() -> HeaderBlock {
        let mut block = HeaderBlock::new();
        block.push(":method".into(), "POST".into());
        block.push(":scheme".into(), "https".into());
        block.push(":authority".into(), "api.example.com".into());
        block.push(":path".into(), "/v1/items?page=2&sort=asc".into());
        block.push("content-type".into(), "application/json".into());
        block
    }

    #[test]
    fn test_request_url_assembly() {
        let mut stream = Http2Stream::new(StreamId(1));
        stream.handle_request_headers(request_block());
        let request = stream.request().expect("request created");
        assert_eq!(request.method.as_deref(), Some("POST"));
        assert_eq!(
            request.url.as_deref(),
            Some("https://api.example.com/v1/items?page=2&sort=asc")
        );
        assert_eq!(
            request.query_params,
            vec![
                ("page".to_string(), "2".to_string()),
                ("sort".to_string(), "asc".to_string())
            ]
        );
        // Pseudo-headers stripped from the plain header set
        assert!(request.headers.get(":method").is_none());
        assert_eq!(request.headers.get("content-type"), Some("application/json"));
    }

    #[test]
    fn test_request_notification_latch_fires_once() {
        let mut stream = Http2Stream::new(StreamId(1));
        stream.handle_request_headers(request_block());
        assert!(stream.take_request_event().is_some());
        assert!(
            stream.take_request_event().is_none(),
            "second end-of-stream signal must not re-notify"
        );
    }

    #[test]
    fn test_request_event_without_headers_is_none() {
        let mut stream = Http2Stream::new(StreamId(1));
        assert!(stream.take_request_event().is_none());
    }

    #[test]
    fn test_response_header_merge_after_informational() {
        let mut stream = Http2Stream::new(StreamId(1));
        let mut interim = HeaderBlock::new();
        interim.push(":status".into(), "103".into());
        interim.push("link".into(), "</style.css>; rel=preload".into());
        stream.handle_response_headers(interim);
        assert_eq!(stream.response().unwrap().status, Some(103));

        let mut fin = HeaderBlock::new();
        fin.push(":status".into(), "200".into());
        fin.push("content-type".into(), "text/html".into());
        stream.handle_response_headers(fin);

        let response = stream.response().unwrap();
        assert_eq!(response.status, Some(200));
        assert_eq!(response.headers.get("content-type"), Some("text/html"));
        // Earlier headers survive the merge
        assert_eq!(
            response.headers.get("link"),
            Some("</style.css>; rel=preload")
        );
    }

    #[test]
    fn test_finish_decodes_gzip_body() {
        let mut stream = Http2Stream::new(StreamId(1));
        let mut block = HeaderBlock::new();
        block.push(":status".into(), "200".into());
        block.push("content-encoding".into(), "gzip".into());
        stream.handle_response_headers(block);

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"hello gzip world").unwrap();
        let compressed = encoder.finish().unwrap();
        stream.handle_response_data(&compressed);

        let (_, response) = stream.finish();
        assert_eq!(response.unwrap().body, b"hello gzip world");
    }

    #[test]
    fn test_finish_keeps_raw_body_on_decode_failure() {
        let mut stream = Http2Stream::new(StreamId(1));
        let mut block = HeaderBlock::new();
        block.push(":status".into(), "200".into());
        block.push("content-encoding".into(), "gzip".into());
        stream.handle_response_headers(block);
        stream.handle_response_data(b"definitely not gzip");

        let (_, response) = stream.finish();
        assert_eq!(response.unwrap().body, b"definitely not gzip");
    }

    #[test]
    fn test_unknown_encoding_passes_through() {
        assert_eq!(
            decode_content(Some("zstd"), b"opaque".to_vec()),
            b"opaque".to_vec()
        );
    }

    #[test]
    fn test_brotli_body_decoded() {
        let mut compressed = Vec::new();
        {
            let mut writer =
                brotli::CompressorWriter::new(&mut compressed, 4096, 5, 22);
            writer.write_all(b"brotli payload").unwrap();
        }
        assert_eq!(
            decode_content(Some("br"), compressed),
            b"brotli payload".to_vec()
        );
    }
}
