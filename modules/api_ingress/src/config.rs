use std::net::SocketAddr;

use runtime::AppConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Name of the `modules.<name>` section read by the host.
pub const MODULE_NAME: &str = "api_ingress";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid bind address '{addr}': {source}")]
    BindAddr {
        addr: String,
        #[source]
        source: std::net::AddrParseError,
    },
    #[error("request_timeout_secs must be greater than zero")]
    ZeroTimeout,
    #[error("body_limit_bytes must be greater than zero")]
    ZeroBodyLimit,
}

/// HTTP host configuration.
///
/// An empty `bind_addr` falls back to `server.host:server.port`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiIngressConfig {
    pub bind_addr: String,
    pub enable_docs: bool,
    pub cors_enabled: bool,
    /// Scheme and authority prepended to generated links, e.g. `http://localhost:8087`.
    pub url_prefix: String,
    pub request_timeout_secs: u64,
    pub body_limit_bytes: usize,
}

impl Default for ApiIngressConfig {
    fn default() -> Self {
        Self {
            bind_addr: String::new(),
            enable_docs: true,
            cors_enabled: false,
            url_prefix: String::new(),
            request_timeout_secs: 30,
            body_limit_bytes: 16 * 1024 * 1024,
        }
    }
}

impl ApiIngressConfig {
    /// Reads `modules.api_ingress` and fills the bind address from the server section.
    pub fn from_app_config(app: &AppConfig) -> anyhow::Result<Self> {
        let mut cfg: Self = app.module_config(MODULE_NAME)?;
        if cfg.bind_addr.trim().is_empty() {
            cfg.bind_addr = format!("{}:{}", app.server.host, app.server.port);
        }
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind_addr
            .parse()
            .map_err(|source| ConfigError::BindAddr {
                addr: self.bind_addr.clone(),
                source,
            })
    }

    /// Same host, different port.
    pub fn with_port(mut self, port: u16) -> Result<Self, ConfigError> {
        let mut addr = self.socket_addr()?;
        addr.set_port(port);
        self.bind_addr = addr.to_string();
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.socket_addr()?;
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.body_limit_bytes == 0 {
            return Err(ConfigError::ZeroBodyLimit);
        }
        Ok(())
    }
}
