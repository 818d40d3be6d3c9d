use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_ROOT_DIR: &str = "logger-data";
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_millis(5000);
pub const MAX_HEAD_BYTES: usize = 8 * 1024;
pub const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

pub const ENV_BIND: &str = "LOGGER_HTTPD_BIND";
pub const ENV_PORT: &str = "LOGGER_HTTPD_PORT";
pub const ENV_ROOT: &str = "LOGGER_HTTPD_ROOT";
pub const ENV_IDLE_TIMEOUT_MS: &str = "LOGGER_HTTPD_IDLE_TIMEOUT_MS";
pub const ENV_MAX_BODY_BYTES: &str = "LOGGER_HTTPD_MAX_BODY_BYTES";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_addr: IpAddr,
    pub port: u16,
    pub root_dir: PathBuf,
    /// Upper bound on any single read from an idle keep-alive peer.
    pub idle_timeout: Duration,
    pub max_head_bytes: usize,
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            root_dir: PathBuf::from(DEFAULT_ROOT_DIR),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            max_head_bytes: MAX_HEAD_BYTES,
            max_body_bytes: MAX_BODY_BYTES,
        }
    }
}

impl ServerConfig {
    /// Loopback config on an ephemeral port.
    pub fn local(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
            root_dir: root_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Builds a config from defaults overridden by whatever `lookup` returns
    /// for the `LOGGER_HTTPD_*` variables.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup(ENV_BIND) {
            config.bind_addr = parse_var(ENV_BIND, &value)?;
        }
        if let Some(value) = lookup(ENV_PORT) {
            config.port = parse_var(ENV_PORT, &value)?;
        }
        if let Some(value) = lookup(ENV_ROOT) {
            if value.trim().is_empty() {
                return Err(ConfigError::InvalidValue { var: ENV_ROOT, value });
            }
            config.root_dir = PathBuf::from(value);
        }
        if let Some(value) = lookup(ENV_IDLE_TIMEOUT_MS) {
            let millis: u64 = parse_var(ENV_IDLE_TIMEOUT_MS, &value)?;
            if millis == 0 {
                return Err(ConfigError::InvalidValue { var: ENV_IDLE_TIMEOUT_MS, value });
            }
            config.idle_timeout = Duration::from_millis(millis);
        }
        if let Some(value) = lookup(ENV_MAX_BODY_BYTES) {
            config.max_body_bytes = parse_var(ENV_MAX_BODY_BYTES, &value)?;
        }

        Ok(config)
    }
}

fn parse_var<T: FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        var,
        value: value.to_string(),
    })
}
