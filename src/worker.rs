use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::BufReader;
use tokio::net::TcpStream;
use tokio::task;
use tracing::{debug, error, trace, warn};

use crate::dispatch::CommandRequest;
use crate::error::ConnectionError;
use crate::request::{parse_target, read_body, read_head, Method};
use crate::response::{Body, Response, STATUS_CONTENT_TYPE};
use crate::server::Shared;
use crate::store::{Payload, Resource};

const SOCKET_BUFFER_SIZE: usize = 8 * 1024;

/// Serves one accepted connection until the peer leaves, goes idle, or breaks
/// the protocol. The socket is closed when `stream` drops at the end.
pub(crate) async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    shared: Arc<Shared>,
) {
    match serve(&mut stream, &shared).await {
        Ok(()) => debug!(%peer, "client closed connection"),
        Err(ConnectionError::IdleTimeout) => debug!(%peer, "connection idle, closing"),
        Err(ConnectionError::Protocol(e)) => warn!(%peer, error = %e, "dropping connection"),
        Err(ConnectionError::Io(e)) => warn!(%peer, error = %e, "i/o error"),
    }
}

async fn serve(stream: &mut TcpStream, shared: &Shared) -> Result<(), ConnectionError> {
    let (read_half, mut writer) = stream.split();
    let mut reader = BufReader::with_capacity(SOCKET_BUFFER_SIZE, read_half);

    loop {
        let head = read_head(&mut reader, shared.max_head_bytes, shared.idle_timeout).await?;
        let Some(head) = head else {
            return Ok(());
        };
        // Bodies on GET/HEAD are read too, so the next request starts on a boundary.
        let body = read_body(
            &mut reader,
            head.content_length,
            shared.max_body_bytes,
            shared.idle_timeout,
        )
        .await?;

        let (name, params) = parse_target(&head.target);
        trace!(method = head.method.as_str(), %name, "request");

        let response = if head.method.carries_command() {
            dispatch_command(shared, CommandRequest { name, params, body }).await;
            Response::empty()
        } else {
            resolve(shared, &name).await
        };

        response
            .keep_alive(head.keep_alive)
            .write_to(&mut writer, head.method == Method::Head)
            .await?;

        if !head.keep_alive {
            return Ok(());
        }
    }
}

async fn dispatch_command(shared: &Shared, request: CommandRequest) {
    let Some(dispatch) = shared.dispatch.upgrade() else {
        debug!(name = %request.name, "no command dispatcher attached");
        return;
    };

    let name = request.name.clone();
    match task::spawn_blocking(move || dispatch.on_request(&request)).await {
        Ok(Ok(handled)) => debug!(%name, handled, "command dispatched"),
        Ok(Err(e)) => error!(%name, error = %e, "command handler failed"),
        Err(e) => error!(%name, error = %e, "command handler panicked"),
    }
}

async fn resolve(shared: &Shared, name: &str) -> Response {
    match shared.store.lookup(name) {
        Some(Resource {
            payload: Payload::Bytes(data),
            content_type,
        }) => Response::ok(content_type, Body::Shared(data)),
        Some(Resource {
            payload: Payload::File(path),
            content_type,
        }) => {
            let path = shared.resolve_path(&path);
            match tokio::fs::read(&path).await {
                Ok(data) => Response::ok(content_type, Body::Owned(data)),
                Err(e) => {
                    warn!(
                        %name,
                        path = %path.display(),
                        error = %e,
                        "file resource unreadable, serving status"
                    );
                    Response::ok(content_type, status_body(shared))
                }
            }
        }
        None => Response::ok(STATUS_CONTENT_TYPE, status_body(shared)),
    }
}

fn status_body(shared: &Shared) -> Body {
    match shared.dispatch.upgrade() {
        Some(dispatch) => Body::Owned(dispatch.status().into_bytes()),
        None => Body::Empty,
    }
}
