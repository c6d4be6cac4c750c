//! Upstream backend configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::domain::relay::Mode;

/// Upstream backend configuration
///
/// Endpoints and headers are fixed per deployment; they live here so they can
/// be pointed at a staging backend or a local fake without a rebuild.
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL of the conversation API
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// URL of the streaming WebSocket endpoint
    #[serde(default = "default_stream_url")]
    pub stream_url: String,

    /// User-Agent sent on every upstream request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Model label reported in response metadata
    #[serde(default = "default_model_label")]
    pub model_label: String,

    /// Bound on conversation creation and stream opening, in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Overall watchdog per session, in seconds
    #[serde(default = "default_watchdog")]
    pub watchdog_secs: u64,

    /// Mode used when a query names none
    #[serde(default)]
    pub default_mode: Mode,
}

impl UpstreamConfig {
    /// Get connect timeout as Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Get watchdog as Duration
    pub fn watchdog(&self) -> Duration {
        Duration::from_secs(self.watchdog_secs)
    }

    /// URL used to create conversations
    pub fn conversations_url(&self) -> String {
        format!("{}/conversations", self.api_base_url.trim_end_matches('/'))
    }

    /// Validate upstream configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(self.api_base_url.starts_with("http://") || self.api_base_url.starts_with("https://"))
        {
            return Err(ValidationError::InvalidApiUrl);
        }
        if !(self.stream_url.starts_with("ws://") || self.stream_url.starts_with("wss://")) {
            return Err(ValidationError::InvalidStreamUrl);
        }
        if self.connect_timeout_secs == 0 {
            return Err(ValidationError::InvalidConnectTimeout);
        }
        if self.watchdog_secs == 0 {
            return Err(ValidationError::InvalidWatchdog);
        }
        Ok(())
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            stream_url: default_stream_url(),
            user_agent: default_user_agent(),
            model_label: default_model_label(),
            connect_timeout_secs: default_connect_timeout(),
            watchdog_secs: default_watchdog(),
            default_mode: Mode::default(),
        }
    }
}

fn default_api_base_url() -> String {
    "https://chat.example-ai.com/api".to_string()
}

fn default_stream_url() -> String {
    "wss://chat.example-ai.com/socket".to_string()
}

fn default_user_agent() -> String {
    concat!("ai-relay/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_model_label() -> String {
    "Upstream AI (free)".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_watchdog() -> u64 {
    45
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_config_defaults() {
        let config = UpstreamConfig::default();
        assert_eq!(config.connect_timeout_secs, 10);
        assert_eq!(config.watchdog_secs, 45);
        assert_eq!(config.default_mode, Mode::Auto);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_durations() {
        let config = UpstreamConfig {
            connect_timeout_secs: 3,
            watchdog_secs: 40,
            ..Default::default()
        };
        assert_eq!(config.connect_timeout(), Duration::from_secs(3));
        assert_eq!(config.watchdog(), Duration::from_secs(40));
    }

    #[test]
    fn test_conversations_url_trims_trailing_slash() {
        let config = UpstreamConfig {
            api_base_url: "http://localhost:9000/api/".to_string(),
            ..Default::default()
        };
        assert_eq!(config.conversations_url(), "http://localhost:9000/api/conversations");
    }

    #[test]
    fn test_validation_rejects_bad_urls() {
        let config = UpstreamConfig {
            api_base_url: "ftp://example.com".to_string(),
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidApiUrl));

        let config = UpstreamConfig {
            stream_url: "https://example.com/socket".to_string(),
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidStreamUrl));
    }

    #[test]
    fn test_validation_rejects_zero_timeouts() {
        let config = UpstreamConfig {
            connect_timeout_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidConnectTimeout));

        let config = UpstreamConfig {
            watchdog_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidWatchdog));
    }
}
