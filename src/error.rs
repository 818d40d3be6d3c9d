use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Boxed error type returned by host command handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("accept loop failed: {0}")]
    Accept(#[source] io::Error),

    #[error("accept loop task aborted")]
    ListenerAborted,
}

/// Request framing that this server refuses to handle. A connection hitting one
/// of these is closed without a response.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("{0} method not supported")]
    UnsupportedMethod(String),

    #[error("malformed request line: {0:?}")]
    MalformedRequestLine(String),

    #[error("request head exceeds {limit} bytes")]
    HeadTooLarge { limit: usize },

    #[error("request body of {length} bytes exceeds {limit} bytes")]
    BodyTooLarge { length: u64, limit: usize },

    #[error("invalid Content-Length header: {0:?}")]
    InvalidContentLength(String),

    #[error("unsupported Transfer-Encoding: {0:?}")]
    UnsupportedTransferEncoding(String),

    #[error("connection closed in the middle of a request")]
    IncompleteRequest,
}

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("unrecoverable HTTP protocol violation: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("idle timeout elapsed")]
    IdleTimeout,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {var}")]
    InvalidValue { var: &'static str, value: String },
}
