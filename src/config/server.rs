//! Listener, CORS, static assets and log output

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use super::error::ValidationError;

/// HTTP/WebSocket listener settings
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind, as an IP literal
    #[serde(default = "default_host")]
    pub host: String,

    /// Listening port. A plain `PORT` variable overrides this.
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub environment: Environment,

    /// Fallback `EnvFilter` directive when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Comma-separated browser origins; unset or empty allows any origin
    pub cors_origins: Option<String>,

    /// Browser UI directory served for unmatched paths
    pub static_dir: Option<PathBuf>,
}

/// Deployment environment
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

/// Which origins the relay answers cross-origin requests for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsPolicy {
    AnyOrigin,
    Origins(Vec<String>),
}

impl ServerConfig {
    /// Address the listener binds to
    pub fn bind_address(&self) -> Result<SocketAddr, ValidationError> {
        let ip = self
            .host
            .parse()
            .map_err(|_| ValidationError::InvalidHost(self.host.clone()))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// Production emits JSON log lines
    pub fn json_logs(&self) -> bool {
        self.environment == Environment::Production
    }

    pub fn cors_policy(&self) -> CorsPolicy {
        let origins: Vec<String> = self
            .cors_origins
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect();

        if origins.is_empty() {
            CorsPolicy::AnyOrigin
        } else {
            CorsPolicy::Origins(origins)
        }
    }

    pub fn static_root(&self) -> Option<&Path> {
        self.static_dir.as_deref()
    }

    /// Validate listener settings
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        self.bind_address()?;
        if let Some(dir) = self.static_root() {
            if !dir.is_dir() {
                return Err(ValidationError::MissingStaticDir(dir.to_path_buf()));
            }
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            environment: Environment::default(),
            log_level: default_log_level(),
            cors_origins: None,
            static_dir: None,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info,ai_relay=debug,tower_http=info".to_string()
}
