//! Decoded HTTP/1.x message types and the header-driven helpers shared by
//! both parser directions.

use crate::error::DecodeError;
use http::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::warn;

/// Base body-framing classification. Exactly one applies per message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyClass {
    #[default]
    Normal,
    Multipart,
    Byterange,
}

/// Classification result computed once when the header section completes.
/// `chunked`/`gzip`/`deflate` are additive on top of the base class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MessageFlags {
    pub class: BodyClass,
    pub chunked: bool,
    pub gzip: bool,
    pub deflate: bool,
}

#[derive(Debug, Clone, Default)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub version: String,
    /// Query-string pairs from the request target, in wire order.
    pub query_params: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    /// Percent-decoded form parameters, populated only for urlencoded bodies.
    pub form_params: Vec<(String, String)>,
    pub flags: MessageFlags,
}

#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub version: String,
    pub status: u16,
    pub reason: String,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    pub flags: MessageFlags,
}

/// One extracted part of a multipart/byteranges body, keyed the way the
/// downstream partial-content reassembler expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ByteRangeSlice {
    pub first: u64,
    pub last: u64,
    pub total: Option<u64>,
    pub url: String,
    pub payload: Vec<u8>,
}

/// First value of a header as a str, or None if absent/non-UTF8.
pub fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

pub(crate) fn append_header(headers: &mut HeaderMap, name: &str, value: &str) {
    let parsed = (
        HeaderName::from_bytes(name.trim().as_bytes()),
        HeaderValue::from_str(value.trim()),
    );
    match parsed {
        (Ok(name), Ok(value)) => {
            headers.append(name, value);
        }
        _ => warn!(name, "dropping unparseable header line"),
    }
}

/// Classify by the accumulated headers. Ran exactly once per message, on
/// first entry into the header-complete state.
pub(crate) fn classify(headers: &HeaderMap) -> MessageFlags {
    let mut flags = MessageFlags::default();

    if let Some(range) = header_str(headers, "content-range") {
        if range.trim_start().starts_with("bytes") {
            flags.class = BodyClass::Byterange;
            return flags;
        }
    }
    if let Some(content_type) = header_str(headers, "content-type") {
        let lower = content_type.to_ascii_lowercase();
        if lower.starts_with("multipart/byteranges") {
            flags.class = BodyClass::Byterange;
            return flags;
        }
        if lower.starts_with("multipart/") {
            flags.class = BodyClass::Multipart;
            return flags;
        }
    }

    if let Some(te) = header_str(headers, "transfer-encoding") {
        if te.to_ascii_lowercase().contains("chunked") {
            flags.chunked = true;
        }
    }
    if let Some(ce) = header_str(headers, "content-encoding") {
        match ce.trim().to_ascii_lowercase().as_str() {
            "gzip" => flags.gzip = true,
            "deflate" => flags.deflate = true,
            _ => {}
        }
    }
    flags
}

/// Split a query string into ordered pairs. Not percent-decoded; the wire
/// form is what consumers match against.
pub(crate) fn parse_query(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (k.to_string(), v.to_string()),
            None => (pair.to_string(), String::new()),
        })
        .collect()
}

/// Percent-decode an urlencoded form body into ordered parameters.
///
/// The charset parameter of the Content-Type is honored to the extent the
/// decoder supports it (utf-8 and its aliases; anything else skips parameter
/// parsing). A decode failure in any one pair silently aborts the remaining
/// pairs, keeping what was decoded so far.
pub(crate) fn parse_form_params(body: &[u8], content_type: &str) -> Vec<(String, String)> {
    let charset = content_type
        .split(';')
        .skip(1)
        .filter_map(|param| param.trim().split_once('='))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("charset"))
        .map(|(_, value)| value.trim().trim_matches('"').to_ascii_lowercase())
        .unwrap_or_else(|| "utf-8".to_string());
    if !matches!(charset.as_str(), "utf-8" | "utf8" | "us-ascii" | "ascii") {
        warn!(charset, "unsupported form charset, skipping parameter parse");
        return Vec::new();
    }

    let Ok(text) = std::str::from_utf8(body) else {
        return Vec::new();
    };

    let mut params = Vec::new();
    for pair in text.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = match pair.split_once('=') {
            Some((k, v)) => (k, v),
            None => (pair, ""),
        };
        let key_plus = key.replace('+', " ");
        let value_plus = value.replace('+', " ");
        let decoded = (
            urlencoding::decode(&key_plus),
            urlencoding::decode(&value_plus),
        );
        match decoded {
            (Ok(key), Ok(value)) => params.push((key.into_owned(), value.into_owned())),
            _ => {
                warn!(pair, "malformed form parameter, aborting remaining pairs");
                break;
            }
        }
    }
    params
}

/// Parse `bytes <first>-<last>/<total>` (total may be `*`).
pub(crate) fn parse_content_range(value: &str) -> Result<(u64, u64, Option<u64>), DecodeError> {
    let invalid = || DecodeError::InvalidContentRange(value.to_string());
    let rest = value
        .trim_start()
        .strip_prefix("bytes")
        .ok_or_else(invalid)?
        .trim_start();
    let (range, total) = rest.split_once('/').ok_or_else(invalid)?;
    let (first, last) = range.split_once('-').ok_or_else(invalid)?;
    let first = first.trim().parse().map_err(|_| invalid())?;
    let last = last.trim().parse().map_err(|_| invalid())?;
    let total = match total.trim() {
        "*" => None,
        t => Some(t.parse().map_err(|_| invalid())?),
    };
    Ok((first, last, total))
}

impl From<h2wire::Http2Request> for HttpRequest {
    fn from(req: h2wire::Http2Request) -> Self {
        let mut headers = HeaderMap::new();
        for (name, value) in req.headers.iter() {
            append_header(&mut headers, name, value);
        }
        let flags = classify(&headers);
        let mut out = HttpRequest {
            method: req.method.unwrap_or_default(),
            path: req.path.unwrap_or_default(),
            version: "HTTP/2".to_string(),
            query_params: req.query_params,
            headers,
            body: req.body,
            form_params: Vec::new(),
            flags,
        };
        if !out.headers.contains_key("content-encoding") {
            if let Some(content_type) = header_str(&out.headers, "content-type") {
                if content_type
                    .trim()
                    .to_ascii_lowercase()
                    .starts_with("application/x-www-form-urlencoded")
                {
                    out.form_params = parse_form_params(&out.body, content_type);
                }
            }
        }
        out
    }
}

impl From<h2wire::Http2Response> for HttpResponse {
    fn from(resp: h2wire::Http2Response) -> Self {
        let mut headers = HeaderMap::new();
        for (name, value) in resp.headers.iter() {
            append_header(&mut headers, name, value);
        }
        let flags = classify(&headers);
        HttpResponse {
            version: "HTTP/2".to_string(),
            status: resp.status.unwrap_or_default(),
            reason: String::new(),
            headers,
            body: resp.body,
            flags,
        }
    }
}

/// Case-insensitive WebSocket upgrade detection over one message's headers.
pub(crate) fn wants_websocket_upgrade(headers: &HeaderMap) -> bool {
    let connection_upgrade = headers
        .get_all("connection")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| {
            v.split(',')
                .any(|token| token.trim().eq_ignore_ascii_case("upgrade"))
        });
    let upgrade_websocket = headers
        .get_all("upgrade")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.trim().eq_ignore_ascii_case("websocket"));
    connection_upgrade && upgrade_websocket
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            append_header(&mut map, name, value);
        }
        map
    }

    #[test]
    fn test_classify_priority_byterange_terminal() {
        // Content-Range wins even with chunked present
        let flags = classify(&headers(&[
            ("Content-Range", "bytes 0-99/200"),
            ("Transfer-Encoding", "chunked"),
        ]));
        assert_eq!(flags.class, BodyClass::Byterange);
        assert!(!flags.chunked, "terminal classification skips additive flags");
    }

    #[test]
    fn test_classify_multipart_byteranges_is_byterange() {
        let flags = classify(&headers(&[(
            "Content-Type",
            "multipart/byteranges; boundary=SEP",
        )]));
        assert_eq!(flags.class, BodyClass::Byterange);
    }

    #[test]
    fn test_classify_multipart_form_data() {
        let flags = classify(&headers(&[(
            "Content-Type",
            "multipart/form-data; boundary=XYZ",
        )]));
        assert_eq!(flags.class, BodyClass::Multipart);
    }

    #[test]
    fn test_classify_chunked_gzip_additive() {
        let flags = classify(&headers(&[
            ("Transfer-Encoding", "chunked"),
            ("Content-Encoding", "gzip"),
        ]));
        assert_eq!(flags.class, BodyClass::Normal);
        assert!(flags.chunked);
        assert!(flags.gzip);
    }

    #[test]
    fn test_classify_default_normal() {
        let flags = classify(&headers(&[("Host", "example.com")]));
        assert_eq!(flags, MessageFlags::default());
    }

    #[test]
    fn test_form_params_decoded_in_order() {
        let params = parse_form_params(
            b"name=John+Doe&city=a%26b&empty=",
            "application/x-www-form-urlencoded",
        );
        assert_eq!(
            params,
            vec![
                ("name".to_string(), "John Doe".to_string()),
                ("city".to_string(), "a&b".to_string()),
                ("empty".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn test_form_params_bad_pair_aborts_rest() {
        let params = parse_form_params(
            b"good=1&bad=%zz&never=2",
            "application/x-www-form-urlencoded",
        );
        assert_eq!(params, vec![("good".to_string(), "1".to_string())]);
    }

    #[test]
    fn test_form_params_unknown_charset_skipped() {
        let params = parse_form_params(
            b"a=1",
            "application/x-www-form-urlencoded; charset=shift_jis",
        );
        assert!(params.is_empty());
    }

    #[test]
    fn test_content_range_parsing() {
        assert_eq!(
            parse_content_range("bytes 100-200/500").expect("valid"),
            (100, 200, Some(500))
        );
        assert_eq!(
            parse_content_range("bytes 0-99/*").expect("unknown total"),
            (0, 99, None)
        );
        assert!(parse_content_range("items 1-2/3").is_err());
        assert!(parse_content_range("bytes x-2/3").is_err());
    }

    #[test]
    fn test_websocket_upgrade_detection_case_insensitive() {
        assert!(wants_websocket_upgrade(&headers(&[
            ("Connection", "keep-alive, Upgrade"),
            ("Upgrade", "WebSocket"),
        ])));
        assert!(!wants_websocket_upgrade(&headers(&[
            ("Connection", "Upgrade"),
            ("Upgrade", "h2c"),
        ])));
        assert!(!wants_websocket_upgrade(&headers(&[(
            "Upgrade", "websocket"
        )])));
    }
}
