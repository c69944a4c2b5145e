//! Configuration management for the inbox client.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// Default REST API base URL (can be overridden at compile time via INBOX_API_URL env var).
pub const DEFAULT_API_URL: &str = match option_env!("INBOX_API_URL") {
    Some(url) => url,
    None => "http://localhost:3001/api",
};

/// Default realtime WebSocket URL (can be overridden at compile time via INBOX_REALTIME_URL env var).
pub const DEFAULT_REALTIME_URL: &str = match option_env!("INBOX_REALTIME_URL") {
    Some(url) => url,
    None => "ws://localhost:3001/ws",
};

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default interval between realtime keepalive pings.
pub const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 25;

/// Default timeout for a single HTTP request.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Main client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// REST API base URL; the unread-count endpoint is resolved against it.
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Realtime WebSocket URL.
    #[serde(default = "default_realtime_url")]
    pub realtime_url: String,
    /// Keepalive ping interval for the realtime connection.
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,
    /// Per-request HTTP timeout.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_realtime_url() -> String {
    DEFAULT_REALTIME_URL.to_string()
}

fn default_heartbeat_interval_secs() -> u64 {
    DEFAULT_HEARTBEAT_INTERVAL_SECS
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            api_url: default_api_url(),
            realtime_url: default_realtime_url(),
            heartbeat_interval_secs: DEFAULT_HEARTBEAT_INTERVAL_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// Create a new Config with default values, then override from environment.
    pub fn new() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config
    }

    /// Load configuration from the config file, falling back to defaults,
    /// then apply environment overrides.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    fn load_from_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply overrides from a variable lookup (environment in production).
    ///
    /// Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(log_level) = get("INBOX_LOG_LEVEL") {
            self.log_level = log_level;
        }
        if let Some(api_url) = get("INBOX_API_URL") {
            self.api_url = api_url;
        }
        if let Some(realtime_url) = get("INBOX_REALTIME_URL") {
            self.realtime_url = realtime_url;
        }
    }

    /// Check that both URLs parse and the realtime URL uses a WebSocket scheme.
    pub fn validate(&self) -> CoreResult<()> {
        let api = self.api_url()?;
        if !matches!(api.scheme(), "http" | "https") {
            return Err(CoreError::Config(format!(
                "api_url must be http(s), got {}",
                api.scheme()
            )));
        }

        let realtime = self.realtime_url()?;
        if !matches!(realtime.scheme(), "ws" | "wss") {
            return Err(CoreError::Config(format!(
                "realtime_url must be ws(s), got {}",
                realtime.scheme()
            )));
        }

        if self.heartbeat_interval_secs == 0 {
            return Err(CoreError::Config(
                "heartbeat_interval_secs must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Get the API base URL as a parsed URL.
    pub fn api_url(&self) -> CoreResult<Url> {
        Url::parse(&self.api_url).map_err(CoreError::from)
    }

    /// Get the realtime URL as a parsed URL.
    pub fn realtime_url(&self) -> CoreResult<Url> {
        Url::parse(&self.realtime_url).map_err(CoreError::from)
    }
}
