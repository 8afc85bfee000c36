use thiserror::Error;

use crate::http::request::{Method, Request};

/// Why a buffer could not be turned into a `Request`.
///
/// `Incomplete` only means "read more bytes"; it never reaches a client.
/// The other kinds each map to an error status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("request head is incomplete")]
    Incomplete,
    #[error("malformed request: {0}")]
    Malformed(&'static str),
    #[error("request exceeds {limit} bytes")]
    TooLarge { limit: usize },
    #[error("unsupported request: {0}")]
    Unsupported(String),
}

/// Parses one request from the front of `buf`.
///
/// On success returns the request and the number of bytes it occupied,
/// including any `Content-Length` body, which is consumed and dropped.
/// Nothing outside `max_bytes` is ever waited for: a head (or head plus
/// body) that cannot fit is `TooLarge`.
pub fn parse_http_request(buf: &[u8], max_bytes: usize) -> Result<(Request, usize), ParseError> {
    let (head_start, head_end, body_start) = match find_head_end(buf) {
        Some(bounds) => bounds,
        None if buf.len() > max_bytes => return Err(ParseError::TooLarge { limit: max_bytes }),
        None => return Err(ParseError::Incomplete),
    };
    if body_start > max_bytes {
        return Err(ParseError::TooLarge { limit: max_bytes });
    }

    let head = std::str::from_utf8(&buf[head_start..head_end])
        .map_err(|_| ParseError::Malformed("request head is not valid UTF-8"))?;

    let mut lines = head.split('\n').map(|line| line.strip_suffix('\r').unwrap_or(line));

    let request_line = lines.next().ok_or(ParseError::Malformed("missing request line"))?;
    let (method, target, version) = parse_request_line(request_line)?;

    let mut headers = Vec::new();
    for line in lines {
        if line.is_empty() {
            continue;
        }
        headers.push(parse_header_line(line)?);
    }

    let request = Request {
        method,
        target: target.to_string(),
        version: version.to_string(),
        headers,
    };

    if !request.method.is_supported() {
        return Err(ParseError::Unsupported(format!(
            "method {}",
            request.method.as_str()
        )));
    }
    if request.header("Transfer-Encoding").is_some() {
        return Err(ParseError::Unsupported("request transfer coding".to_string()));
    }

    let body_len = content_length(&request)?;
    let total = body_start
        .checked_add(body_len)
        .ok_or(ParseError::TooLarge { limit: max_bytes })?;
    if total > max_bytes {
        return Err(ParseError::TooLarge { limit: max_bytes });
    }
    if buf.len() < total {
        return Err(ParseError::Incomplete);
    }

    Ok((request, total))
}

fn parse_request_line(line: &str) -> Result<(Method, &str, &str), ParseError> {
    let parts: Vec<&str> = line.split(' ').collect();
    let [method, target, version] = parts.as_slice() else {
        return Err(ParseError::Malformed("request line must be METHOD SP TARGET SP VERSION"));
    };

    if !is_token(method) {
        return Err(ParseError::Malformed("invalid method token"));
    }
    if !is_valid_target(target) {
        return Err(ParseError::Malformed("invalid request target"));
    }

    let (major, minor) = parse_version(version)?;
    if major != 1 || minor > 1 {
        return Err(ParseError::Unsupported(format!("protocol version {}", version)));
    }

    Ok((Method::from_token(method), *target, *version))
}

fn parse_header_line(line: &str) -> Result<(String, String), ParseError> {
    if line.starts_with(' ') || line.starts_with('\t') {
        return Err(ParseError::Malformed("folded header lines are not allowed"));
    }

    let (name, value) = line
        .split_once(':')
        .ok_or(ParseError::Malformed("header line without a colon"))?;

    if !is_token(name) {
        return Err(ParseError::Malformed("invalid header name"));
    }

    Ok((name.to_string(), value.trim().to_string()))
}

/// `HTTP/<digit>.<digit>`
fn parse_version(version: &str) -> Result<(u8, u8), ParseError> {
    let malformed = ParseError::Malformed("invalid protocol version");
    let numbers = version.strip_prefix("HTTP/").ok_or(malformed.clone())?;
    match numbers.as_bytes() {
        [major @ b'0'..=b'9', b'.', minor @ b'0'..=b'9'] => Ok((major - b'0', minor - b'0')),
        _ => Err(malformed),
    }
}

fn content_length(request: &Request) -> Result<usize, ParseError> {
    let mut length = None;
    for value in request.header_values("Content-Length") {
        let parsed = value
            .parse::<usize>()
            .map_err(|_| ParseError::Malformed("invalid Content-Length"))?;
        if length.is_some_and(|previous| previous != parsed) {
            return Err(ParseError::Malformed("conflicting Content-Length values"));
        }
        length = Some(parsed);
    }
    Ok(length.unwrap_or(0))
}

fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s.bytes().all(|b| {
            b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
        })
}

fn is_valid_target(target: &str) -> bool {
    if target.is_empty() || target.bytes().any(|b| b.is_ascii_control() || b == b' ') {
        return false;
    }
    if target.starts_with('/') {
        return true;
    }
    url::Url::parse(target)
        .map(|url| matches!(url.scheme(), "http" | "https"))
        .unwrap_or(false)
}

/// Locates the blank line ending the head.
///
/// Returns `(head_start, head_end, body_start)`: leading empty lines are
/// skipped, `head_end` is where the blank line begins and `body_start` is
/// just past it. Bare LF line endings are accepted.
fn find_head_end(buf: &[u8]) -> Option<(usize, usize, usize)> {
    let mut start = 0;
    loop {
        if buf[start..].starts_with(b"\r\n") {
            start += 2;
        } else if buf[start..].starts_with(b"\n") {
            start += 1;
        } else {
            break;
        }
    }

    let mut line_start = start;
    while let Some(offset) = buf[line_start..].iter().position(|&b| b == b'\n') {
        let newline = line_start + offset;
        let line = &buf[line_start..newline];
        if (line.is_empty() || line == b"\r") && line_start != start {
            return Some((start, line_start, newline + 1));
        }
        line_start = newline + 1;
    }
    None
}
