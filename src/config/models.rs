//! Configuration data structures for the route server.
//!
//! These types map directly to TOML (also JSON / YAML) configuration files and
//! carry serde defaults so that an empty file is a valid configuration.
use serde::{Deserialize, Serialize};

use crate::core::report::UrlMode;

fn default_listen_addr() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_strict_slash() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Logging configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info` or `routedef=debug,tower_http=info`
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of the pretty console format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Serve `/a/` with the endpoint registered for `/a`
    #[serde(default = "default_strict_slash")]
    pub strict_slash: bool,
    /// Error reporting of the reverse URL function
    #[serde(default)]
    pub url_mode: UrlMode,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ServerConfig {
    /// Create a new server configuration builder
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            strict_slash: default_strict_slash(),
            url_mode: UrlMode::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Builder for ServerConfig to allow for cleaner configuration creation
#[derive(Default)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    /// Set the listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    pub fn strict_slash(mut self, strict_slash: bool) -> Self {
        self.config.strict_slash = strict_slash;
        self
    }

    pub fn url_mode(mut self, mode: UrlMode) -> Self {
        self.config.url_mode = mode;
        self
    }

    /// Set the log filter directive
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn json_logs(mut self, json: bool) -> Self {
        self.config.logging.json = json;
        self
    }

    /// Build the final ServerConfig
    pub fn build(self) -> ServerConfig {
        self.config
    }
}
