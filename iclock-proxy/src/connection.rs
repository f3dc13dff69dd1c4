use crate::handler::IclockHandler;
use iclock_core::config::ListenerConfig;
use iclock_core::request::parse_content_length;
use iclock_core::{InboundRequest, Method, RelayError};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const MAX_HEADERS: usize = 64;

/// Per-connection read limits, copied out of [`ListenerConfig`].
#[derive(Debug, Clone, Copy)]
pub struct ConnectionLimits {
    pub read_timeout: Duration,
    pub max_header_bytes: usize,
    pub max_body_bytes: usize,
}

impl From<&ListenerConfig> for ConnectionLimits {
    fn from(cfg: &ListenerConfig) -> Self {
        Self {
            read_timeout: Duration::from_millis(cfg.read_timeout_ms),
            max_header_bytes: cfg.max_header_bytes,
            max_body_bytes: cfg.max_body_bytes,
        }
    }
}

/// Request head copied out of the read buffer.
struct Head {
    method: Method,
    target: String,
    headers: HashMap<String, String>,
    len: usize,
}

/// Serve exactly one request on `stream`, then close it.
///
/// Framing faults answer with a 4xx where the peer can still read one;
/// a timeout or a peer that hangs up mid-request gets nothing.
pub async fn handle_connection<S>(
    mut stream: S,
    peer: SocketAddr,
    handler: &IclockHandler,
    limits: ConnectionLimits,
) -> Result<(), RelayError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let read = tokio::time::timeout(limits.read_timeout, read_request(&mut stream, peer, limits))
        .await
        .unwrap_or(Err(RelayError::Timeout));

    let outcome = match read {
        Ok(req) => handler.handle_request(&req).await,
        Err(e) => Err(e),
    };

    let mut resp_buf = Vec::with_capacity(256);
    match outcome {
        Ok(reply) => {
            build_response(&mut resp_buf, reply.status, reply.body.as_bytes());
            write_and_close(&mut stream, &resp_buf).await?;
            Ok(())
        }
        Err(e) => {
            if let Some(status) = e.status_code() {
                build_response(&mut resp_buf, status, status_text(status).as_bytes());
                // Report the read error, not the write error.
                let _ = write_and_close(&mut stream, &resp_buf).await;
            }
            Err(e)
        }
    }
}

async fn write_and_close<S>(stream: &mut S, data: &[u8]) -> Result<(), RelayError>
where
    S: AsyncWrite + Unpin,
{
    stream.write_all(data).await?;
    stream.flush().await?;
    stream.shutdown().await?;
    Ok(())
}

/// Read one request head and exactly `Content-Length` body bytes.
async fn read_request<S>(
    stream: &mut S,
    peer: SocketAddr,
    limits: ConnectionLimits,
) -> Result<InboundRequest, RelayError>
where
    S: AsyncRead + Unpin,
{
    let mut buf = Vec::with_capacity(4096);
    let mut chunk = [0u8; 4096];

    let head = loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(RelayError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed before request head completed",
            )));
        }
        buf.extend_from_slice(&chunk[..n]);

        if let Some(head) = parse_head(&buf)? {
            if head.len > limits.max_header_bytes {
                return Err(RelayError::HeaderTooLarge(limits.max_header_bytes));
            }
            break head;
        }
        if buf.len() >= limits.max_header_bytes {
            return Err(RelayError::HeaderTooLarge(limits.max_header_bytes));
        }
    };

    let declared = parse_content_length(head.headers.get("content-length").map(String::as_str));
    if declared > limits.max_body_bytes {
        return Err(RelayError::BodyTooLarge {
            declared,
            limit: limits.max_body_bytes,
        });
    }

    // Bytes past the declared length are ignored, never waited for.
    let mut body = buf.split_off(head.len);
    body.truncate(declared);
    if body.len() < declared {
        let already = body.len();
        body.resize(declared, 0);
        stream.read_exact(&mut body[already..]).await?;
    }

    Ok(InboundRequest::new(head.method, &head.target, head.headers, body, peer))
}

/// `Ok(None)` while the head is still incomplete.
fn parse_head(buf: &[u8]) -> Result<Option<Head>, RelayError> {
    let mut headers_raw = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut req = httparse::Request::new(&mut headers_raw);

    match req.parse(buf) {
        Ok(httparse::Status::Complete(len)) => {
            let method = Method::parse(req.method.unwrap_or("GET"));
            let target = req.path.unwrap_or("/").to_string();
            let mut headers = HashMap::with_capacity(req.headers.len());
            for h in req.headers.iter() {
                let val = String::from_utf8_lossy(h.value).trim().to_string();
                headers
                    .entry(h.name.to_ascii_lowercase())
                    .or_insert(val);
            }
            Ok(Some(Head {
                method,
                target,
                headers,
                len,
            }))
        }
        Ok(httparse::Status::Partial) => Ok(None),
        Err(e) => Err(RelayError::MalformedRequest(e.to_string())),
    }
}

// ── Response building helpers ─────────────────────────────────

/// Build a plain-text HTTP response into a buffer.
pub fn build_response(buf: &mut Vec<u8>, status: u16, body: &[u8]) {
    buf.clear();
    buf.extend_from_slice(b"HTTP/1.1 ");
    let mut itoa_buf = itoa::Buffer::new();
    buf.extend_from_slice(itoa_buf.format(status).as_bytes());
    buf.push(b' ');
    buf.extend_from_slice(status_text(status).as_bytes());
    buf.extend_from_slice(b"\r\ncontent-type: text/plain; charset=utf-8\r\ncontent-length: ");
    buf.extend_from_slice(itoa_buf.format(body.len()).as_bytes());
    buf.extend_from_slice(b"\r\nconnection: close\r\n\r\n");
    buf.extend_from_slice(body);
}

pub fn status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        413 => "Payload Too Large",
        431 => "Request Header Fields Too Large",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}
