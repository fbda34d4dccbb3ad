//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::query::parse_window;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub scroll: ScrollConfig,

    #[serde(default)]
    pub backends: BackendsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Static table routes. In larger deployments this table comes from
    /// service discovery; single-node deployments declare it here.
    #[serde(default)]
    pub tables: Vec<TableRouteConfig>,
}

/// API server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    10205
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_body_size() -> usize {
    10 * 1024 * 1024 // 10 MB
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            max_body_size: default_max_body_size(),
        }
    }
}

/// Scroll engine configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ScrollConfig {
    /// Default number of parallel slices per scroll
    #[serde(default = "default_slice_max")]
    pub slice_max: usize,

    /// Default page size per slice per round
    #[serde(default = "default_limit")]
    pub limit: usize,

    /// Failed attempts before a slice is abandoned
    #[serde(default = "default_failure_ceiling")]
    pub failure_ceiling: u32,

    /// Default scroll window, Go-style duration string (e.g. "5m")
    #[serde(default = "default_window")]
    pub default_window: String,

    /// Maximum concurrent backend sub-queries per round
    #[serde(default = "default_fanout")]
    pub fanout_concurrency: usize,

    /// Per-session single-flight lock TTL, duration string
    #[serde(default = "default_lock_ttl")]
    pub lock_ttl: String,
}

fn default_slice_max() -> usize {
    3
}

fn default_limit() -> usize {
    100
}

fn default_failure_ceiling() -> u32 {
    crate::scroll::DEFAULT_FAILURE_CEILING
}

fn default_window() -> String {
    "5m".to_string()
}

fn default_fanout() -> usize {
    8
}

fn default_lock_ttl() -> String {
    "1m".to_string()
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            slice_max: default_slice_max(),
            limit: default_limit(),
            failure_ceiling: default_failure_ceiling(),
            default_window: default_window(),
            fanout_concurrency: default_fanout(),
            lock_ttl: default_lock_ttl(),
        }
    }
}

impl ScrollConfig {
    /// Convert to the scroll engine's runtime tunables
    pub fn to_engine_config(&self) -> crate::scroll::ScrollConfig {
        crate::scroll::ScrollConfig {
            slice_max: self.slice_max,
            limit: self.limit,
            failure_ceiling: self.failure_ceiling,
            default_window: parse_duration_or(&self.default_window, Duration::from_secs(300)),
            fanout_concurrency: self.fanout_concurrency,
            lock_ttl: parse_duration_or(&self.lock_ttl, Duration::from_secs(60)),
        }
    }
}

fn parse_duration_or(s: &str, fallback: Duration) -> Duration {
    parse_window(s).unwrap_or_else(|e| {
        tracing::warn!("Invalid duration {:?} in config ({}), using fallback", s, e);
        fallback
    })
}

/// Backend driver configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BackendsConfig {
    /// Per-request timeout against backend stores, seconds
    #[serde(default = "default_backend_timeout")]
    pub request_timeout_secs: u64,

    /// Document/row time field used in range filters
    #[serde(default = "default_time_field")]
    pub time_field: String,
}

fn default_backend_timeout() -> u64 {
    30
}

fn default_time_field() -> String {
    "timestamp".to_string()
}

impl Default for BackendsConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_backend_timeout(),
            time_field: default_time_field(),
        }
    }
}

/// One static table route
#[derive(Debug, Clone, Deserialize)]
pub struct TableRouteConfig {
    /// Result table id, e.g. "result_table.es"
    pub table_id: String,
    /// Storage type: "elasticsearch" or "doris"
    pub storage_type: String,
    /// Backend base URL
    pub connect: String,
    /// Physical database/index name
    pub db: String,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,

    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("tidegate").join("config.toml")),
            Some(PathBuf::from("/etc/tidegate/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        // API overrides
        if let Ok(host) = std::env::var("TIDEGATE_API_HOST") {
            self.api.host = host;
        }
        if let Ok(port) = std::env::var("TIDEGATE_API_PORT") {
            if let Ok(p) = port.parse() {
                self.api.port = p;
            }
        }

        // Scroll overrides
        if let Ok(slice_max) = std::env::var("TIDEGATE_SLICE_MAX") {
            if let Ok(n) = slice_max.parse() {
                self.scroll.slice_max = n;
            }
        }
        if let Ok(ceiling) = std::env::var("TIDEGATE_FAILURE_CEILING") {
            if let Ok(n) = ceiling.parse() {
                self.scroll.failure_ceiling = n;
            }
        }

        // Logging overrides
        if let Ok(level) = std::env::var("TIDEGATE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("TIDEGATE_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            scroll: ScrollConfig::default(),
            backends: BackendsConfig::default(),
            logging: LoggingConfig::default(),
            tables: Vec::new(),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Tidegate Configuration
#
# Environment variables override these settings:
# - TIDEGATE_API_HOST
# - TIDEGATE_API_PORT
# - TIDEGATE_SLICE_MAX
# - TIDEGATE_FAILURE_CEILING
# - TIDEGATE_LOG_LEVEL
# - TIDEGATE_LOG_FORMAT

[api]
# API server host
host = "0.0.0.0"

# API server port
port = 10205

# Request timeout in seconds
request_timeout_secs = 30

# Maximum request body size in bytes
max_body_size = 10485760

[scroll]
# Default number of parallel slices per scroll
slice_max = 3

# Default page size per slice per round
limit = 100

# Failed attempts before a slice is abandoned
failure_ceiling = 3

# Default scroll window
default_window = "5m"

# Maximum concurrent backend sub-queries per round
fanout_concurrency = 8

# Per-session single-flight lock TTL
lock_ttl = "1m"

[backends]
# Per-request timeout against backend stores (seconds)
request_timeout_secs = 30

# Document/row time field used in range filters
time_field = "timestamp"

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"

# Optional log file path
# file = "/var/log/tidegate/tidegate.log"

# Static table routes
# [[tables]]
# table_id = "result_table.es"
# storage_type = "elasticsearch"
# connect = "http://127.0.0.1:9200"
# db = "es_index"
"#
    .to_string()
}
