//! Configuration system for the pipe relay
//!
//! Supports multiple configuration sources with the following precedence (highest to lowest):
//! 1. CLI arguments
//! 2. Environment variables (PIPE_RELAY_* prefix)
//! 3. Configuration file (TOML)
//! 4. Default values

use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::pipe::DEFAULT_PIPE_CAPACITY;
use crate::transport::DEFAULT_RESPONSE_BUFFER;

/// Main relay node configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Node identity and listener
    pub node: NodeSettings,

    /// Peer forwarding settings
    pub forwarding: ForwardingSettings,

    /// Streaming buffers
    pub relay: RelaySettings,

    /// Bearer token grants
    pub auth: AuthSettings,

    /// In-memory team directory
    pub directory: DirectorySettings,

    /// Logging configuration
    pub logging: LoggingSettings,
}

/// Node identity and listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSettings {
    /// URL other nodes and pipe records use to reach this node
    pub external_url: String,

    /// Socket address the HTTP server binds to
    pub bind_address: String,

    /// Runtime worker threads (0 = one per CPU)
    pub worker_threads: usize,
}

/// Peer forwarding settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForwardingSettings {
    /// Timeout for connecting to the owning node in milliseconds
    pub connect_timeout_ms: u64,

    /// How long idle peer connections stay pooled in milliseconds
    pub pool_idle_timeout_ms: u64,
}

/// Streaming buffer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelaySettings {
    /// Chunks buffered between a relay task and the client connection
    pub response_buffer_chunks: usize,

    /// Buffer size in bytes for pipes created on this node
    pub pipe_buffer_bytes: usize,
}

/// Authorization settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// Bearer tokens and what they may read
    pub tokens: Vec<TokenGrant>,
}

/// One bearer token and its grants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenGrant {
    pub token: String,

    /// Teams this token may read
    #[serde(default)]
    pub teams: Vec<String>,

    /// Allow every team
    #[serde(default)]
    pub admin: bool,
}

/// In-memory directory settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectorySettings {
    /// Teams known at startup
    pub teams: Vec<String>,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level: trace, debug, info, warn, error
    pub level: String,

    /// Log file path (empty = no file logging)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// Maximum log file size in MB before rotation
    pub max_file_size_mb: u64,

    /// Number of rotated log files to keep
    pub max_files: u32,

    /// Enable JSON formatted logging
    pub json_format: bool,
}

// Default implementations

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            external_url: "http://127.0.0.1:8080".to_string(),
            bind_address: "0.0.0.0:8080".to_string(),
            worker_threads: 0, // One per CPU
        }
    }
}

impl Default for ForwardingSettings {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 5000,
            pool_idle_timeout_ms: 90000,
        }
    }
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            response_buffer_chunks: DEFAULT_RESPONSE_BUFFER,
            pipe_buffer_bytes: DEFAULT_PIPE_CAPACITY,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            max_file_size_mb: 100,
            max_files: 5,
            json_format: false,
        }
    }
}

impl RelayConfig {
    /// Load configuration from file with environment variable overrides
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut config = Self::default();

        // 1. Load from config file if it exists
        let config_file = Self::find_config_file(config_path)?;
        if let Some(path) = config_file {
            debug!(path = %path.display(), "Loading configuration file");
            config = Self::from_file(&path)?;
            info!(path = %path.display(), "Configuration loaded from file");
        }

        // 2. Apply environment variable overrides
        config.apply_env_overrides();

        // 3. Expand paths
        config.expand_paths();

        // 4. Validate
        config.validate()?;

        Ok(config)
    }

    /// Parse a configuration file without overrides or validation
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| Error::IoRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| Error::ConfigParse {
            message: format!("{}: {}", path.display(), e.message()),
            source: Some(e),
        })
    }

    /// Find the configuration file to use
    fn find_config_file(explicit_path: Option<&str>) -> Result<Option<PathBuf>> {
        // If explicit path provided, use it (error if not found)
        if let Some(path) = explicit_path {
            let path = PathBuf::from(expand_path(path));
            if path.exists() {
                return Ok(Some(path));
            }
            return Err(Error::config_not_found(path));
        }

        // Search in standard locations
        let search_paths = [
            // Current directory
            PathBuf::from("pipe-relay.toml"),
            PathBuf::from("config.toml"),
            // User config directory
            dirs::config_dir()
                .map(|p| p.join("pipe-relay").join("relay.toml"))
                .unwrap_or_default(),
            // Home directory
            dirs::home_dir()
                .map(|p| p.join(".pipe-relay").join("relay.toml"))
                .unwrap_or_default(),
            // System config (Linux)
            PathBuf::from("/etc/pipe-relay/relay.toml"),
        ];

        for path in &search_paths {
            if !path.as_os_str().is_empty() && path.exists() {
                debug!(path = %path.display(), "Found configuration file");
                return Ok(Some(path.clone()));
            }
        }

        debug!("No configuration file found, using defaults");
        Ok(None)
    }

    /// Apply environment variable overrides
    pub(crate) fn apply_env_overrides(&mut self) {
        // Node settings
        if let Ok(val) = std::env::var("PIPE_RELAY_EXTERNAL_URL") {
            self.node.external_url = val;
        }
        if let Ok(val) = std::env::var("PIPE_RELAY_BIND_ADDRESS") {
            self.node.bind_address = val;
        }
        if let Ok(val) = std::env::var("PIPE_RELAY_WORKER_THREADS") {
            if let Ok(n) = val.parse() {
                self.node.worker_threads = n;
            }
        }

        // Forwarding settings
        if let Ok(val) = std::env::var("PIPE_RELAY_CONNECT_TIMEOUT_MS") {
            if let Ok(n) = val.parse() {
                self.forwarding.connect_timeout_ms = n;
            }
        }
        if let Ok(val) = std::env::var("PIPE_RELAY_POOL_IDLE_TIMEOUT_MS") {
            if let Ok(n) = val.parse() {
                self.forwarding.pool_idle_timeout_ms = n;
            }
        }

        // Relay settings
        if let Ok(val) = std::env::var("PIPE_RELAY_RESPONSE_BUFFER_CHUNKS") {
            if let Ok(n) = val.parse() {
                self.relay.response_buffer_chunks = n;
            }
        }
        if let Ok(val) = std::env::var("PIPE_RELAY_PIPE_BUFFER_BYTES") {
            if let Ok(n) = val.parse() {
                self.relay.pipe_buffer_bytes = n;
            }
        }

        // Directory and auth
        if let Ok(val) = std::env::var("PIPE_RELAY_TEAMS") {
            for team in val.split(',').map(str::trim).filter(|t| !t.is_empty()) {
                if !self.directory.teams.iter().any(|t| t == team) {
                    self.directory.teams.push(team.to_string());
                }
            }
        }
        if let Ok(val) = std::env::var("PIPE_RELAY_ADMIN_TOKEN") {
            if !val.is_empty() {
                self.auth.tokens.push(TokenGrant {
                    token: val,
                    teams: vec![],
                    admin: true,
                });
            }
        }

        // Logging settings
        if let Ok(val) = std::env::var("PIPE_RELAY_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = std::env::var("PIPE_RELAY_LOG_FILE") {
            self.logging.file = Some(val);
        }
        if let Ok(val) = std::env::var("PIPE_RELAY_LOG_JSON") {
            self.logging.json_format = val.to_lowercase() == "true" || val == "1";
        }
    }

    /// Expand ~ and other path variables
    fn expand_paths(&mut self) {
        if let Some(ref file) = self.logging.file {
            self.logging.file = Some(expand_path(file));
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        // Validate external URL
        let url = Url::parse(&self.node.external_url).map_err(|e| {
            Error::config_field_invalid(
                "node.external_url",
                format!("'{}' is not a valid URL: {}", self.node.external_url, e),
            )
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(Error::config_field_invalid(
                "node.external_url",
                "External URL must start with http:// or https://",
            ));
        }
        if url.host_str().is_none() {
            return Err(Error::config_field_invalid(
                "node.external_url",
                "External URL must include a host",
            ));
        }

        // Validate bind address
        self.bind_addr()?;

        // Validate buffers
        if self.relay.response_buffer_chunks == 0 {
            return Err(Error::config_field_invalid(
                "relay.response_buffer_chunks",
                "response_buffer_chunks must be greater than 0",
            ));
        }
        if self.relay.pipe_buffer_bytes == 0 {
            return Err(Error::config_field_invalid(
                "relay.pipe_buffer_bytes",
                "pipe_buffer_bytes must be greater than 0",
            ));
        }

        // Validate tokens
        if self.auth.tokens.iter().any(|grant| grant.token.trim().is_empty()) {
            return Err(Error::config_field_invalid(
                "auth.tokens",
                "Token grants must have a non-empty token",
            ));
        }
        if self.auth.tokens.is_empty() {
            warn!("No auth tokens configured, every read will be refused");
        }

        // Validate log level
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(Error::config_field_invalid(
                "logging.level",
                format!(
                    "Invalid log level '{}'. Must be one of: {}",
                    self.logging.level,
                    valid_levels.join(", ")
                ),
            ));
        }

        Ok(())
    }

    /// Parsed bind address
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.node.bind_address.parse().map_err(|e| {
            Error::config_field_invalid(
                "node.bind_address",
                format!("'{}' is not a socket address: {}", self.node.bind_address, e),
            )
        })
    }

    /// Runtime worker threads to start
    pub fn worker_threads(&self) -> usize {
        if self.node.worker_threads == 0 {
            num_cpus::get()
        } else {
            self.node.worker_threads
        }
    }
}

/// Expand ~ and environment variables in paths
fn expand_path(path: &str) -> String {
    shellexpand::full(path)
        .unwrap_or_else(|_| std::borrow::Cow::Borrowed(path))
        .into_owned()
}

/// Initialize a new configuration file
pub fn init_config(path: Option<&str>, force: bool) -> Result<PathBuf> {
    let config_path = path
        .map(|p| PathBuf::from(expand_path(p)))
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".pipe-relay")
                .join("relay.toml")
        });

    // Check if file exists
    if config_path.exists() && !force {
        return Err(Error::Config(format!(
            "Configuration file already exists: {}. Use --force to overwrite.",
            config_path.display()
        )));
    }

    // Create parent directories
    if let Some(parent) = config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| Error::IoWrite {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    fs::write(&config_path, generate_default_config()).map_err(|e| Error::IoWrite {
        path: config_path.clone(),
        source: e,
    })?;

    Ok(config_path)
}

/// Generate default configuration content with comments
pub fn generate_default_config() -> String {
    r#"# Pipe Relay Configuration

[node]
# URL other nodes use to reach this one. Pipe records created on this
# node carry this URL; reads for them arriving elsewhere are forwarded here.
external_url = "http://127.0.0.1:8080"

# Address the HTTP server binds to
bind_address = "0.0.0.0:8080"

# Runtime worker threads (0 = one per CPU)
worker_threads = 0

[forwarding]
# Timeout for connecting to the owning node in milliseconds.
# Streams themselves have no timeout.
connect_timeout_ms = 5000

# How long idle peer connections stay pooled in milliseconds
pool_idle_timeout_ms = 90000

[relay]
# Chunks buffered between a relay task and the client connection
response_buffer_chunks = 16

# Buffer size in bytes for pipes created on this node
pipe_buffer_bytes = 65536

[directory]
# Teams known at startup
teams = []

# Bearer tokens allowed to read pipes
# [[auth.tokens]]
# token = "change-me"
# teams = ["main"]
# admin = false

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log file path (comment out to disable file logging)
# file = "~/.pipe-relay/logs/relay.log"

# Maximum log file size in MB before rotation
max_file_size_mb = 100

# Number of rotated log files to keep
max_files = 5

# Enable JSON formatted logging
json_format = false
"#
    .to_string()
}
