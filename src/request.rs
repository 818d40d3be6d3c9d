use std::future::Future;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt};
use tokio::time::timeout;

use crate::error::{ConnectionError, ProtocolError};

const BODY_CHUNK: u64 = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
}

impl Method {
    /// Case-insensitive; `None` for anything this server does not serve.
    pub fn parse(token: &[u8]) -> Option<Self> {
        match token.to_ascii_uppercase().as_slice() {
            b"GET" => Some(Method::Get),
            b"HEAD" => Some(Method::Head),
            b"POST" => Some(Method::Post),
            b"PUT" => Some(Method::Put),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
        }
    }

    pub fn carries_command(&self) -> bool {
        matches!(self, Method::Post | Method::Put)
    }
}

/// Query parameters in request order. Repeated keys are kept; a token with no
/// `=` has a `None` value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    keys: Vec<String>,
    values: Vec<Option<String>>,
}

impl QueryParams {
    pub fn parse(query: &str) -> Self {
        let mut params = Self::default();
        for token in query.split('&').filter(|token| !token.is_empty()) {
            match token.split_once('=') {
                Some((key, value)) => params.push(key, Some(value)),
                None => params.push(token, None),
            }
        }
        params
    }

    fn push(&mut self, key: &str, value: Option<&str>) {
        self.keys.push(key.to_string());
        self.values.push(value.map(str::to_string));
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn values(&self) -> &[Option<String>] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.keys
            .iter()
            .zip(&self.values)
            .map(|(key, value)| (key.as_str(), value.as_deref()))
    }

    /// Value of the first occurrence of `key`.
    pub fn get(&self, key: &str) -> Option<Option<&str>> {
        self.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }
}

/// Splits a request target into its resource name and query parameters.
///
/// `/status.json?x=1&flag` gives the name `status.json` with `x=1` and a bare
/// `flag`. Never fails.
pub fn parse_target(target: &str) -> (String, QueryParams) {
    let (path, query) = match target.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (target, None),
    };
    let name = path.strip_prefix('/').unwrap_or(path).to_string();
    let params = query.map(QueryParams::parse).unwrap_or_default();
    (name, params)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    pub method: Method,
    pub target: String,
    pub version: String,
    pub content_length: Option<u64>,
    pub keep_alive: bool,
}

// Splits `METHOD SP target SP version` without allocating.
fn split_request_line(line: &[u8]) -> Option<(&[u8], &str, &str)> {
    let mut parts = line.split(|&b| b == b' ').filter(|part| !part.is_empty());

    let method = parts.next()?;
    let target = std::str::from_utf8(parts.next()?).ok()?;
    let version = std::str::from_utf8(parts.next()?).ok()?;

    if parts.next().is_some() || !version.starts_with("HTTP/") {
        return None;
    }

    Some((method, target, version))
}

fn header_starts_with(line: &str, prefix: &str) -> bool {
    line.len() >= prefix.len()
        && line.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}

fn header_value<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    if header_starts_with(line, name) && line.as_bytes().get(name.len()) == Some(&b':') {
        Some(line[name.len() + 1..].trim())
    } else {
        None
    }
}

fn connection_has(value: &str, token: &str) -> bool {
    value.split(',').any(|t| t.trim().eq_ignore_ascii_case(token))
}

/// Applies the per-read idle timeout to one read.
pub(crate) async fn idle_read<T, F>(idle: Duration, read: F) -> Result<T, ConnectionError>
where
    F: Future<Output = std::io::Result<T>>,
{
    match timeout(idle, read).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(ConnectionError::IdleTimeout),
    }
}

/// Reads one request line plus headers.
///
/// Returns `Ok(None)` when the peer closes the connection cleanly between
/// requests. The method is validated only after the whole head is consumed.
pub async fn read_head<R>(
    reader: &mut R,
    max_head_bytes: usize,
    idle: Duration,
) -> Result<Option<RequestHead>, ConnectionError>
where
    R: AsyncBufRead + Unpin,
{
    let mut budget = max_head_bytes;
    let mut line = Vec::with_capacity(256);

    // Blank lines between keep-alive requests are tolerated.
    loop {
        line.clear();
        match read_line(reader, &mut line, &mut budget, max_head_bytes, idle).await? {
            0 => return Ok(None),
            _ if trim_eol(&line).is_empty() => continue,
            _ => break,
        }
    }

    let request_line = trim_eol(&line).to_vec();
    let (method_token, target, version) = split_request_line(&request_line).ok_or_else(|| {
        ProtocolError::MalformedRequestLine(String::from_utf8_lossy(&request_line).into_owned())
    })?;

    let mut keep_alive = version.eq_ignore_ascii_case("HTTP/1.1");
    let mut content_length = None;
    let mut transfer_encoding = None;

    loop {
        line.clear();
        if read_line(reader, &mut line, &mut budget, max_head_bytes, idle).await? == 0 {
            return Err(ProtocolError::IncompleteRequest.into());
        }
        let header = String::from_utf8_lossy(trim_eol(&line)).into_owned();
        if header.is_empty() {
            break;
        }

        if let Some(value) = header_value(&header, "content-length") {
            let length = value
                .parse::<u64>()
                .map_err(|_| ProtocolError::InvalidContentLength(value.to_string()))?;
            content_length = Some(length);
        } else if let Some(value) = header_value(&header, "transfer-encoding") {
            transfer_encoding = Some(value.to_string());
        } else if let Some(value) = header_value(&header, "connection") {
            if connection_has(value, "close") {
                keep_alive = false;
            } else if connection_has(value, "keep-alive") {
                keep_alive = true;
            }
        }
    }

    let method = Method::parse(method_token).ok_or_else(|| {
        ProtocolError::UnsupportedMethod(String::from_utf8_lossy(method_token).into_owned())
    })?;

    if let Some(encoding) = transfer_encoding {
        return Err(ProtocolError::UnsupportedTransferEncoding(encoding).into());
    }

    Ok(Some(RequestHead {
        method,
        target: target.to_string(),
        version: version.to_string(),
        content_length,
        keep_alive,
    }))
}

/// Reads exactly `content_length` bytes of body, or nothing when absent.
pub async fn read_body<R>(
    reader: &mut R,
    content_length: Option<u64>,
    max_body_bytes: usize,
    idle: Duration,
) -> Result<Option<Vec<u8>>, ConnectionError>
where
    R: AsyncRead + Unpin,
{
    let Some(length) = content_length else {
        return Ok(None);
    };
    if length > max_body_bytes as u64 {
        return Err(ProtocolError::BodyTooLarge {
            length,
            limit: max_body_bytes,
        }
        .into());
    }

    // Grows with the data actually received, not the declared length.
    let mut body = Vec::with_capacity(length.min(BODY_CHUNK) as usize);
    let mut limited = (&mut *reader).take(length);
    while (body.len() as u64) < length {
        let n = idle_read(idle, limited.read_buf(&mut body)).await?;
        if n == 0 {
            return Err(ProtocolError::IncompleteRequest.into());
        }
    }
    Ok(Some(body))
}

async fn read_line<R>(
    reader: &mut R,
    line: &mut Vec<u8>,
    budget: &mut usize,
    limit: usize,
    idle: Duration,
) -> Result<usize, ConnectionError>
where
    R: AsyncBufRead + Unpin,
{
    if *budget == 0 {
        return Err(ProtocolError::HeadTooLarge { limit }.into());
    }
    let mut limited = (&mut *reader).take(*budget as u64);
    let n = idle_read(idle, limited.read_until(b'\n', line)).await?;
    *budget -= n;

    if n > 0 && line.last() != Some(&b'\n') {
        let err = if *budget == 0 {
            ProtocolError::HeadTooLarge { limit }
        } else {
            ProtocolError::IncompleteRequest
        };
        return Err(err.into());
    }
    Ok(n)
}

fn trim_eol(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
