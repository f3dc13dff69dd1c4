//! Typed inbound request record.
//!
//! Built once per connection at the listener boundary; everything
//! downstream reads named fields instead of probing raw maps.

use std::collections::HashMap;
use std::net::SocketAddr;

/// Request method as the terminal protocol uses it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Other(String),
}

impl Method {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "GET" => Method::Get,
            "POST" => Method::Post,
            other => Method::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Other(m) => m,
        }
    }
}

/// One decoded device request.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    /// Path component of the request target, without the query string.
    pub path: String,
    /// Decoded query parameters. First non-blank value wins per key.
    pub query: HashMap<String, String>,
    /// Header map keyed by lower-cased name.
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
    pub peer: SocketAddr,
}

impl InboundRequest {
    pub fn new(
        method: Method,
        target: &str,
        headers: HashMap<String, String>,
        body: Vec<u8>,
        peer: SocketAddr,
    ) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, parse_query(query)),
            None => (target, HashMap::new()),
        };
        Self {
            method,
            path: path.to_string(),
            query,
            headers,
            body,
            peer,
        }
    }

    /// Device serial number from `SN`, trimmed; empty when absent.
    pub fn serial_number(&self) -> String {
        self.query
            .get("SN")
            .map(|sn| sn.trim().to_string())
            .unwrap_or_default()
    }

    /// Caller IP address as it appears in journal lines.
    pub fn source_ip(&self) -> String {
        self.peer.ip().to_string()
    }

    /// Body decoded as UTF-8; invalid sequences are dropped.
    pub fn body_text(&self) -> String {
        decode_lossy(&self.body)
    }
}

/// Declared body length. Absent or unparsable values count as zero.
pub fn parse_content_length(value: Option<&str>) -> usize {
    value
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0)
}

/// Parse `a=1&b=2` into a map. Blank values are skipped and the first
/// occurrence of a key is kept.
pub fn parse_query(query: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let value = percent_decode(value);
        if value.is_empty() {
            continue;
        }
        params.entry(percent_decode(key)).or_insert(value);
    }
    params
}

fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' if i + 2 < bytes.len() => {
                match (hex_val(bytes[i + 1]), hex_val(bytes[i + 2])) {
                    (Some(hi), Some(lo)) => {
                        out.push((hi << 4) | lo);
                        i += 2;
                    }
                    _ => out.push(b'%'),
                }
            }
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

fn decode_lossy(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        out.push_str(chunk.valid());
    }
    out
}
