//! The callback surface the host application supplies to the server.

use crate::error::BoxError;
use crate::request::QueryParams;

/// A decoded POST/PUT request handed to [`CommandDispatch::on_request`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    pub name: String,
    pub params: QueryParams,
    /// `None` when the request carried no `Content-Length`.
    pub body: Option<Vec<u8>>,
}

impl CommandRequest {
    pub fn keys(&self) -> &[String] {
        self.params.keys()
    }

    pub fn values(&self) -> &[Option<String>] {
        self.params.values()
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }
}

/// Host-side command handling and status reporting.
///
/// Both methods may be called concurrently from different connections, so
/// implementations synchronize their own state.
pub trait CommandDispatch: Send + Sync {
    /// Called once per POST/PUT. Runs on the blocking pool; the client gets a
    /// 200 whatever this returns.
    fn on_request(&self, request: &CommandRequest) -> Result<bool, BoxError>;

    /// Body served for GET/HEAD requests that match no registered resource.
    /// Runs inline on the connection task and should return quickly.
    fn status(&self) -> String;
}
