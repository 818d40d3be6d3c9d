use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::dispatch::CommandDispatch;
use crate::error::ServerError;
use crate::store::ResourceStore;
use crate::worker::handle_connection;

/// Lifecycle of a [`Server`]. Moves forward only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Socket bound, accept loop spawned but not yet polled.
    New,
    /// Accept loop active.
    Running,
    /// Listening socket closed. Terminal.
    Stopped,
}

impl ServerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ServerState::New,
            1 => ServerState::Running,
            _ => ServerState::Stopped,
        }
    }
}

#[derive(Debug)]
struct Lifecycle(AtomicU8);

impl Lifecycle {
    fn get(&self) -> ServerState {
        ServerState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// New -> Running. Fails if a stop already landed.
    fn mark_running(&self) -> bool {
        self.0
            .compare_exchange(0, 1, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Returns true only for the caller that performed the transition.
    fn mark_stopped(&self) -> bool {
        self.0.swap(2, Ordering::AcqRel) != 2
    }
}

/// State shared between the server handle and every connection task.
pub(crate) struct Shared {
    pub(crate) store: ResourceStore,
    pub(crate) dispatch: Weak<dyn CommandDispatch>,
    pub(crate) root: RwLock<PathBuf>,
    pub(crate) idle_timeout: Duration,
    pub(crate) max_head_bytes: usize,
    pub(crate) max_body_bytes: usize,
}

impl Shared {
    pub(crate) fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.read().join(path)
        }
    }
}

enum ListenerExit {
    Stopped,
    Failed(io::Error),
}

/// Embedded HTTP server. Binding and the accept loop start in [`Server::start`];
/// [`Server::stop`] closes the listening socket. Connections that were already
/// accepted keep running until their peer leaves or goes idle.
pub struct Server {
    shared: Arc<Shared>,
    local_addr: SocketAddr,
    lifecycle: Arc<Lifecycle>,
    shutdown: Arc<Notify>,
    accept_task: Mutex<Option<JoinHandle<ListenerExit>>>,
}

impl Server {
    /// Binds the configured address and spawns the accept loop on the current
    /// tokio runtime. The dispatcher is held weakly; the host keeps it alive.
    pub async fn start<D>(config: ServerConfig, dispatch: &Arc<D>) -> Result<Self, ServerError>
    where
        D: CommandDispatch + 'static,
    {
        let addr = config.socket_addr();
        let listener = match TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(source) => {
                error!(%addr, error = %source, "error starting HTTP server");
                return Err(ServerError::Bind { addr, source });
            }
        };
        let local_addr = listener
            .local_addr()
            .map_err(|source| ServerError::Bind { addr, source })?;

        ensure_root(&config.root_dir);

        let dispatch: Weak<D> = Arc::downgrade(dispatch);
        let dispatch: Weak<dyn CommandDispatch> = dispatch;
        let shared = Arc::new(Shared {
            store: ResourceStore::new(),
            dispatch,
            root: RwLock::new(config.root_dir),
            idle_timeout: config.idle_timeout,
            max_head_bytes: config.max_head_bytes,
            max_body_bytes: config.max_body_bytes,
        });

        let lifecycle = Arc::new(Lifecycle(AtomicU8::new(0)));
        let shutdown = Arc::new(Notify::new());
        let accept_task = tokio::spawn(accept_loop(
            listener,
            Arc::clone(&shared),
            Arc::clone(&lifecycle),
            Arc::clone(&shutdown),
        ));

        Ok(Self {
            shared,
            local_addr,
            lifecycle,
            shutdown,
            accept_task: Mutex::new(Some(accept_task)),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn state(&self) -> ServerState {
        self.lifecycle.get()
    }

    pub fn store(&self) -> &ResourceStore {
        &self.shared.store
    }

    pub fn add_byte_resource(
        &self,
        name: impl Into<String>,
        data: impl Into<Arc<[u8]>>,
        content_type: &str,
    ) {
        self.shared.store.add_byte_resource(name, data, content_type);
    }

    /// Relative `path`s are resolved against the root directory when served.
    pub fn add_file_resource(
        &self,
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        content_type: &str,
    ) {
        self.shared.store.add_file_resource(name, path, content_type);
    }

    pub fn byte_resource(&self, name: &str) -> Option<Arc<[u8]>> {
        self.shared.store.byte_resource(name)
    }

    pub fn root(&self) -> PathBuf {
        self.shared.root.read().clone()
    }

    pub fn set_root(&self, root: impl Into<PathBuf>) {
        let root = root.into();
        ensure_root(&root);
        *self.shared.root.write() = root;
    }

    /// Stops accepting and waits for the accept loop to release the socket.
    /// Idempotent; a stopped server cannot be restarted.
    pub async fn stop(&self) -> Result<(), ServerError> {
        if self.lifecycle.mark_stopped() {
            self.shutdown.notify_one();
        }

        let task = self.accept_task.lock().take();
        let Some(task) = task else {
            return Ok(());
        };

        match task.await {
            Ok(ListenerExit::Stopped) => {
                info!(addr = %self.local_addr, "HTTP server stopped");
                Ok(())
            }
            Ok(ListenerExit::Failed(e)) => Err(ServerError::Accept(e)),
            Err(_) => Err(ServerError::ListenerAborted),
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        if self.lifecycle.mark_stopped() {
            self.shutdown.notify_one();
        }
    }
}

fn ensure_root(root: &Path) {
    if let Err(e) = std::fs::create_dir_all(root) {
        warn!(root = %root.display(), error = %e, "could not create root directory");
    }
}

// Errors that leave the listening socket usable.
fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
    )
}

async fn accept_loop(
    listener: TcpListener,
    shared: Arc<Shared>,
    lifecycle: Arc<Lifecycle>,
    shutdown: Arc<Notify>,
) -> ListenerExit {
    if !lifecycle.mark_running() {
        return ListenerExit::Stopped;
    }
    info!(addr = ?listener.local_addr().ok(), "listening");

    let exit = loop {
        tokio::select! {
            biased;
            _ = shutdown.notified() => break ListenerExit::Stopped,
            result = listener.accept() => match result {
                Ok((stream, peer)) => {
                    let _ = stream.set_nodelay(true);
                    debug!(%peer, "accepted connection");
                    tokio::spawn(handle_connection(stream, peer, Arc::clone(&shared)));
                }
                Err(e) if is_transient(&e) => {
                    debug!(error = %e, "transient accept error");
                }
                Err(e) => {
                    error!(error = %e, "i/o error initialising connection");
                    break ListenerExit::Failed(e);
                }
            },
        }

        if lifecycle.get() == ServerState::Stopped {
            break ListenerExit::Stopped;
        }
    };

    lifecycle.mark_stopped();
    exit
}
