#![allow(dead_code)]

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use logger_httpd::{BoxError, CommandDispatch, CommandRequest, Server, ServerConfig};
use parking_lot::Mutex;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;

pub const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Records every command and serves a settable status string.
#[derive(Default)]
pub struct TestDispatch {
    calls: Mutex<Vec<CommandRequest>>,
    status: Mutex<String>,
    status_calls: AtomicUsize,
    fail: AtomicBool,
    panic: AtomicBool,
}

impl TestDispatch {
    pub fn new(status: &str) -> Arc<Self> {
        let dispatch = Self::default();
        *dispatch.status.lock() = status.to_string();
        Arc::new(dispatch)
    }

    pub fn set_status(&self, status: &str) {
        *self.status.lock() = status.to_string();
    }

    pub fn fail_requests(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn panic_on_requests(&self) {
        self.panic.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<CommandRequest> {
        self.calls.lock().clone()
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }
}

impl CommandDispatch for TestDispatch {
    fn on_request(&self, request: &CommandRequest) -> Result<bool, BoxError> {
        self.calls.lock().push(request.clone());
        if self.panic.load(Ordering::SeqCst) {
            panic!("handler exploded on {}", request.name);
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(format!("cannot handle {}", request.name).into());
        }
        Ok(true)
    }

    fn status(&self) -> String {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        self.status.lock().clone()
    }
}

pub async fn start_server(dispatch: &Arc<TestDispatch>) -> (Server, TempDir) {
    let root = TempDir::new().expect("temp dir");
    let server = Server::start(ServerConfig::local(root.path()), dispatch)
        .await
        .expect("server starts");
    (server, root)
}

pub async fn start_server_with(
    dispatch: &Arc<TestDispatch>,
    configure: impl FnOnce(ServerConfig) -> ServerConfig,
) -> (Server, TempDir) {
    let root = TempDir::new().expect("temp dir");
    let config = configure(ServerConfig::local(root.path()));
    let server = Server::start(config, dispatch).await.expect("server starts");
    (server, root)
}

#[derive(Debug)]
pub struct HttpResponse {
    pub status_line: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_length(&self) -> usize {
        self.header("Content-Length")
            .and_then(|v| v.parse().ok())
            .expect("Content-Length header")
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

pub struct Client {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Client {
    pub async fn connect(addr: SocketAddr) -> io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        let (read_half, writer) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(read_half),
            writer,
        })
    }

    pub async fn send(&mut self, raw: &[u8]) -> io::Result<()> {
        self.writer.write_all(raw).await?;
        self.writer.flush().await
    }

    pub async fn read_response(&mut self, head_only: bool) -> io::Result<HttpResponse> {
        timeout(READ_TIMEOUT, read_response(&mut self.reader, head_only))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "no response"))?
    }

    pub async fn request(&mut self, raw: &[u8]) -> io::Result<HttpResponse> {
        self.send(raw).await?;
        self.read_response(false).await
    }

    pub async fn get(&mut self, target: &str) -> io::Result<HttpResponse> {
        let raw = format!("GET {} HTTP/1.1\r\nHost: localhost\r\n\r\n", target);
        self.request(raw.as_bytes()).await
    }

    pub async fn post(&mut self, target: &str, body: &[u8]) -> io::Result<HttpResponse> {
        let mut raw = format!(
            "POST {} HTTP/1.1\r\nHost: localhost\r\nContent-Length: {}\r\n\r\n",
            target,
            body.len()
        )
        .into_bytes();
        raw.extend_from_slice(body);
        self.request(&raw).await
    }

    /// Everything the server sends until it closes the connection.
    pub async fn read_to_end(&mut self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        timeout(READ_TIMEOUT, self.reader.read_to_end(&mut buf))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "connection left open"))??;
        Ok(buf)
    }
}

/// Asserts the server closed the connection without writing anything back.
pub async fn assert_closed_silently(client: &mut Client) {
    match client.read_to_end().await {
        Ok(bytes) => assert!(
            bytes.is_empty(),
            "unexpected bytes: {:?}",
            String::from_utf8_lossy(&bytes)
        ),
        Err(e) => assert_eq!(e.kind(), io::ErrorKind::ConnectionReset, "unexpected error: {}", e),
    }
}

async fn read_response(
    reader: &mut BufReader<OwnedReadHalf>,
    head_only: bool,
) -> io::Result<HttpResponse> {
    let mut status_line = String::new();
    if reader.read_line(&mut status_line).await? == 0 {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed"));
    }

    let mut headers = Vec::new();
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).await?;
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, line.to_string()))?;
        headers.push((name.trim().to_string(), value.trim().to_string()));
    }

    let mut response = HttpResponse {
        status_line: status_line.trim_end().to_string(),
        headers,
        body: Vec::new(),
    };
    if !head_only {
        let mut body = vec![0u8; response.content_length()];
        reader.read_exact(&mut body).await?;
        response.body = body;
    }
    Ok(response)
}
