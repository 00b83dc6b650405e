//! Client side of the WebSocket opening handshake (RFC 6455 Section 4).
//!
//! The request is built as an [`http::Request`] and serialized by hand;
//! the response head is read line by line and parsed into an
//! [`http::Response`] so callers can inspect status and headers with the
//! usual `http` types.

use std::io::{self, BufRead, BufReader, Read, Write};

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use http::header::{
    CONNECTION, HOST, HeaderName, HeaderValue, ORIGIN, SEC_WEBSOCKET_ACCEPT, SEC_WEBSOCKET_KEY,
    SEC_WEBSOCKET_VERSION, UPGRADE,
};
use http::{Method, Request, Response, StatusCode, Version};
use sha1::{Digest, Sha1};
use tracing::debug;
use url::{Position, Url};

use crate::config::{ClientConfig, Limits};
use crate::error::{Error, Result};
use crate::pool;

/// The WebSocket GUID used in the Sec-WebSocket-Accept calculation (RFC 6455).
pub const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Number of random bytes in a handshake key before encoding.
pub const KEY_LEN: usize = 16;

/// Length of the base64-encoded handshake key.
pub const ENCODED_KEY_LEN: usize = 24;

/// Computes the Sec-WebSocket-Accept value from the client's Sec-WebSocket-Key.
///
/// The accept key is calculated as: Base64(SHA-1(key + GUID))
///
/// # Example
///
/// ```
/// use rswc::protocol::handshake::compute_accept_key;
///
/// let key = "dGhlIHNhbXBsZSBub25jZQ==";
/// let accept = compute_accept_key(key);
/// assert_eq!(accept, "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
/// ```
pub fn compute_accept_key(key: &str) -> String {
    accept_key_for(key.as_bytes())
}

fn accept_key_for(key: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key);
    hasher.update(WS_GUID.as_bytes());
    BASE64.encode(hasher.finalize())
}

/// Fill `buf` with a fresh `Sec-WebSocket-Key`.
///
/// Sixteen bytes are drawn from the OS entropy source and base64-encoded
/// (standard alphabet, padded) into `buf`, replacing its contents. The
/// returned slice borrows `buf` and is always 24 bytes long.
///
/// # Errors
///
/// Returns `Error::Entropy` if the OS cannot supply random bytes.
pub fn make_rand_key(buf: &mut Vec<u8>) -> Result<&[u8]> {
    let mut raw = [0u8; KEY_LEN];
    getrandom::getrandom(&mut raw)?;

    buf.clear();
    buf.resize(ENCODED_KEY_LEN, 0);
    let written = BASE64
        .encode_slice(raw, &mut buf[..])
        .map_err(|e| Error::Entropy(e.to_string()))?;
    buf.truncate(written);
    Ok(&buf[..])
}

/// Write the Origin header value for `url` into `buf`.
///
/// Without an override the origin is `scheme://host[:port]` of the target,
/// with the port omitted when it is the scheme default. An override is
/// parsed as a URL and reduced to the same form.
///
/// # Errors
///
/// Returns `Error::InvalidOrigin` if the override does not parse or has
/// no host, and `Error::InvalidUrl` if the target itself has no origin.
pub fn write_origin(url: &Url, custom: Option<&str>, buf: &mut Vec<u8>) -> Result<()> {
    let origin = match custom {
        Some(value) => {
            let parsed = Url::parse(value).map_err(|e| Error::InvalidOrigin(format!("{value}: {e}")))?;
            let origin = parsed.origin();
            if !origin.is_tuple() {
                return Err(Error::InvalidOrigin(value.to_string()));
            }
            origin
        }
        None => {
            let origin = url.origin();
            if !origin.is_tuple() {
                return Err(Error::InvalidUrl(format!("{url} has no origin")));
            }
            origin
        }
    };

    buf.clear();
    buf.extend_from_slice(origin.ascii_serialization().as_bytes());
    Ok(())
}

fn host_header(url: &Url) -> Result<HeaderValue> {
    let host = url
        .host_str()
        .ok_or_else(|| Error::InvalidUrl(format!("{url} has no host")))?;
    let value = match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };
    HeaderValue::from_str(&value).map_err(|e| Error::InvalidHeader(e.to_string()))
}

fn header_value(name: &HeaderName, bytes: &[u8]) -> Result<HeaderValue> {
    HeaderValue::from_bytes(bytes).map_err(|e| Error::InvalidHeader(format!("{name}: {e}")))
}

/// Build the upgrade request for `url`.
///
/// Headers of `template` are copied first. `Host` is added only when the
/// template has none; `Origin`, `Connection`, `Upgrade`,
/// `Sec-WebSocket-Version` and `Sec-WebSocket-Key` always replace any
/// template value. The method is GET and the version HTTP/1.1 whatever
/// the template says.
///
/// # Errors
///
/// Returns `Error::InvalidUrl` if the URL has no host and
/// `Error::InvalidHeader` if a value cannot be used as a header.
pub fn build_request(
    url: &Url,
    template: Option<&Request<()>>,
    origin: &[u8],
    key: &[u8],
) -> Result<Request<()>> {
    let mut request = Request::builder()
        .method(Method::GET)
        .uri(&url[Position::BeforePath..])
        .version(Version::HTTP_11)
        .body(())?;

    let headers = request.headers_mut();
    if let Some(template) = template {
        for (name, value) in template.headers() {
            headers.append(name.clone(), value.clone());
        }
    }

    if !headers.contains_key(HOST) {
        headers.insert(HOST, host_header(url)?);
    }
    headers.insert(ORIGIN, header_value(&ORIGIN, origin)?);
    headers.insert(CONNECTION, HeaderValue::from_static("Upgrade"));
    headers.insert(UPGRADE, HeaderValue::from_static("websocket"));
    headers.insert(SEC_WEBSOCKET_VERSION, HeaderValue::from_static("13"));
    headers.insert(SEC_WEBSOCKET_KEY, header_value(&SEC_WEBSOCKET_KEY, key)?);

    Ok(request)
}

/// Serialize `request` as an HTTP/1.1 request head into `buf`.
pub fn write_request(request: &Request<()>, buf: &mut Vec<u8>) {
    let target = request
        .uri()
        .path_and_query()
        .map_or("/", |pq| pq.as_str());

    buf.extend_from_slice(b"GET ");
    buf.extend_from_slice(target.as_bytes());
    buf.extend_from_slice(b" HTTP/1.1\r\n");
    for (name, value) in request.headers() {
        buf.extend_from_slice(name.as_str().as_bytes());
        buf.extend_from_slice(b": ");
        buf.extend_from_slice(value.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }
    buf.extend_from_slice(b"\r\n");
}

/// Read a response head from `reader`, up to and including the blank line.
///
/// Nothing past the blank line is consumed from `reader` itself, though a
/// buffered reader may already hold later bytes in its buffer.
///
/// # Errors
///
/// - `Error::Io` with `UnexpectedEof` if the peer closes before the blank line
/// - `Error::HandshakeTooLarge` if the head exceeds `limits.max_handshake_size`
/// - the errors of [`parse_response_head`]
pub fn read_response_head<R: BufRead>(reader: &mut R, limits: &Limits) -> Result<Response<()>> {
    let mut head = pool::scratch();

    loop {
        let start = head.len();
        let budget = limits.max_handshake_size.saturating_add(1).saturating_sub(start) as u64;
        let n = reader.by_ref().take(budget).read_until(b'\n', &mut head)?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed during handshake",
            )
            .into());
        }
        limits.check_handshake_size(head.len())?;

        let line = &head[start..];
        if line == b"\r\n" || line == b"\n" {
            break;
        }
    }

    parse_response_head(&head)
}

/// Parse a complete response head into a bodiless [`Response`].
///
/// # Errors
///
/// Returns `Error::InvalidHandshake` if the status line or a header line
/// is malformed.
pub fn parse_response_head(head: &[u8]) -> Result<Response<()>> {
    let text = std::str::from_utf8(head)
        .map_err(|_| Error::InvalidHandshake("response head is not valid UTF-8".into()))?;
    let mut lines = text.lines();

    let status_line = lines
        .next()
        .ok_or_else(|| Error::InvalidHandshake("empty response".into()))?;
    let mut parts = status_line.splitn(3, ' ');

    let version = match parts.next() {
        Some("HTTP/1.1") => Version::HTTP_11,
        Some("HTTP/1.0") => Version::HTTP_10,
        _ => {
            return Err(Error::InvalidHandshake(format!(
                "malformed status line: {status_line}"
            )));
        }
    };
    let status = parts
        .next()
        .and_then(|code| StatusCode::from_bytes(code.as_bytes()).ok())
        .ok_or_else(|| Error::InvalidHandshake(format!("malformed status line: {status_line}")))?;

    let mut response = Response::new(());
    *response.status_mut() = status;
    *response.version_mut() = version;

    let headers = response.headers_mut();
    for line in lines {
        if line.is_empty() {
            break;
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| Error::InvalidHandshake(format!("malformed header line: {line}")))?;
        let name = HeaderName::from_bytes(name.trim().as_bytes())
            .map_err(|_| Error::InvalidHandshake(format!("invalid header name: {name}")))?;
        let value = HeaderValue::from_str(value.trim())
            .map_err(|_| Error::InvalidHandshake(format!("invalid value for header {name}")))?;
        headers.append(name, value);
    }

    Ok(response)
}

/// Decide whether `response` accepts the upgrade requested with `key`.
///
/// The status must be exactly 101 and `Upgrade` must equal `websocket`
/// ignoring ASCII case. With `verify_accept`, `Sec-WebSocket-Accept` must
/// also match the value derived from `key`.
///
/// # Errors
///
/// Returns `Error::CannotUpgrade` whenever one of the checks fails.
pub fn validate_response(response: &Response<()>, key: &[u8], verify_accept: bool) -> Result<()> {
    if response.status() != StatusCode::SWITCHING_PROTOCOLS {
        debug!(status = %response.status(), "server refused websocket upgrade");
        return Err(Error::CannotUpgrade);
    }

    let upgrade = response.headers().get(UPGRADE).map(HeaderValue::as_bytes);
    if !upgrade.is_some_and(|v| v.eq_ignore_ascii_case(b"websocket")) {
        debug!(upgrade = ?upgrade.map(String::from_utf8_lossy), "unexpected Upgrade header");
        return Err(Error::CannotUpgrade);
    }

    if verify_accept {
        let expected = accept_key_for(key);
        let accept = response.headers().get(SEC_WEBSOCKET_ACCEPT);
        if accept.map(HeaderValue::as_bytes) != Some(expected.as_bytes()) {
            debug!("Sec-WebSocket-Accept does not match the sent key");
            return Err(Error::CannotUpgrade);
        }
    }

    Ok(())
}

/// Run the opening handshake over `reader`'s inner stream.
///
/// The request is written directly to the stream; the response head is
/// read through `reader`, which keeps any bytes that arrived after it.
pub(crate) fn negotiate<T: Read + Write>(
    reader: &mut BufReader<T>,
    url: &Url,
    template: Option<&Request<()>>,
    config: &ClientConfig,
) -> Result<Response<()>> {
    let mut key_buf = pool::scratch();
    let key = make_rand_key(&mut key_buf)?;

    let mut origin = pool::scratch();
    write_origin(url, config.origin.as_deref(), &mut origin)?;

    let request = build_request(url, template, &origin, key)?;
    let mut out = pool::scratch();
    write_request(&request, &mut out);

    let stream = reader.get_mut();
    stream.write_all(&out)?;
    stream.flush()?;
    debug!(url = %url, "sent websocket upgrade request");

    let response = read_response_head(reader, &config.limits)?;
    validate_response(&response, key, config.verify_accept)?;
    debug!(url = %url, "websocket upgrade accepted");

    Ok(response)
}
