//! Embedded HTTP server for a data-logging host: serves registered resources,
//! reports status text for everything else, and forwards POST/PUT commands to
//! a host-supplied [`CommandDispatch`].

pub mod config;
pub mod dispatch;
pub mod error;
pub mod mime;
pub mod recorder;
pub mod request;
pub mod response;
pub mod server;
pub mod store;
mod worker;

pub use config::ServerConfig;
pub use dispatch::{CommandDispatch, CommandRequest};
pub use error::{BoxError, ConfigError, ConnectionError, ProtocolError, ServerError};
pub use recorder::Recorder;
pub use request::{parse_target, Method, QueryParams};
pub use server::{Server, ServerState};
pub use store::{Payload, Resource, ResourceStore};
