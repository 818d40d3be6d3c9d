use std::sync::Arc;
use std::time::SystemTime;

use tokio::io::{AsyncWrite, AsyncWriteExt};

pub const SERVER_NAME: &str = concat!("logger-httpd/", env!("CARGO_PKG_VERSION"));
pub const STATUS_CONTENT_TYPE: &str = "text/html";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    Empty,
    Shared(Arc<[u8]>),
    Owned(Vec<u8>),
}

impl AsRef<[u8]> for Body {
    fn as_ref(&self) -> &[u8] {
        match self {
            Body::Empty => &[],
            Body::Shared(data) => &data[..],
            Body::Owned(data) => &data[..],
        }
    }
}

/// A `200 OK` response. Every success path in this server answers 200.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub content_type: Arc<str>,
    pub body: Body,
    pub keep_alive: bool,
}

impl Response {
    pub fn ok(content_type: impl Into<Arc<str>>, body: Body) -> Self {
        Self {
            content_type: content_type.into(),
            body,
            keep_alive: true,
        }
    }

    pub fn empty() -> Self {
        Self::ok(STATUS_CONTENT_TYPE, Body::Empty)
    }

    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn head_bytes(&self) -> Vec<u8> {
        format!(
            "HTTP/1.1 200 OK\r\nContent-Type: {}\r\nContent-Length: {}\r\nDate: {}\r\nServer: {}\r\nConnection: {}\r\n\r\n",
            self.content_type,
            self.body.as_ref().len(),
            httpdate::fmt_http_date(SystemTime::now()),
            SERVER_NAME,
            if self.keep_alive { "keep-alive" } else { "close" },
        )
        .into_bytes()
    }

    /// Writes head and, unless `head_only`, the body, then flushes.
    pub async fn write_to<W>(&self, writer: &mut W, head_only: bool) -> std::io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        writer.write_all(&self.head_bytes()).await?;
        if !head_only {
            writer.write_all(self.body.as_ref()).await?;
        }
        writer.flush().await
    }
}
