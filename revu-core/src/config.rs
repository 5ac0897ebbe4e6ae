//! Configuration management for revu
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (PORT, REVU_*)
//! 3. Config file (~/.config/revu/config.toml)
//! 4. Default values
//!
//! Credentials never live here; see [`crate::secrets`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::{Error, Result};

/// Port used when neither the config file nor `PORT` set one
pub const DEFAULT_PORT: u16 = 3000;

/// Path the webhook route is mounted on by default
pub const DEFAULT_WEBHOOK_PATH: &str = "/api/review";

/// HTTP ingress configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Path of the single webhook route
    pub webhook_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            webhook_path: DEFAULT_WEBHOOK_PATH.to_string(),
        }
    }
}

/// Review generation configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReviewConfig {
    /// Whether generated reviews may carry per-line comments
    pub inline_suggestions: bool,

    /// Path to the claude executable
    pub claude_path: String,

    /// Model to use for Claude
    pub model: Option<String>,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            inline_suggestions: true,
            claude_path: "claude".to_string(),
            model: None, // Let claude use its default
        }
    }
}

/// Logging sink configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// File receiving every error-level record
    pub error_log: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            error_log: PathBuf::from("logs").join("error.log"),
        }
    }
}

/// GitHub API configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// API root for GitHub Enterprise Server installs
    pub api_base_url: Option<String>,
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// HTTP ingress configuration
    pub server: ServerConfig,

    /// Review generation configuration
    pub review: ReviewConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// GitHub API configuration
    pub github: GitHubConfig,
}

impl Config {
    /// Load configuration from the default config file location
    ///
    /// Returns default config if file doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();

        if let Some(path) = config_path {
            if path.exists() {
                return Self::load_from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(Error::Io)?;
        toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Get the default config file path
    ///
    /// Returns `~/.config/revu/config.toml` on Unix
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("revu").join("config.toml"))
    }

    /// Apply environment variable overrides
    ///
    /// Supported variables:
    /// - PORT: Port to listen on
    /// - REVU_WEBHOOK_PATH: Path of the webhook route
    /// - REVU_INLINE_SUGGESTIONS: `true`/`false`
    /// - REVU_CLAUDE_PATH: Path to claude executable
    /// - REVU_MODEL: Model to use
    /// - REVU_ERROR_LOG: Error log file
    /// - REVU_GITHUB_API_URL: GitHub API root
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    fn with_overrides_from(mut self, var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(port) = var("PORT") {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("PORT is not a valid port: {}", port)))?;
        }

        if let Some(path) = var("REVU_WEBHOOK_PATH") {
            self.server.webhook_path = path;
        }

        if let Some(flag) = var("REVU_INLINE_SUGGESTIONS") {
            self.review.inline_suggestions = parse_flag(&flag).ok_or_else(|| {
                Error::Config(format!("REVU_INLINE_SUGGESTIONS is not a boolean: {}", flag))
            })?;
        }

        if let Some(claude_path) = var("REVU_CLAUDE_PATH") {
            self.review.claude_path = claude_path;
        }

        if let Some(model) = var("REVU_MODEL") {
            self.review.model = Some(model);
        }

        if let Some(error_log) = var("REVU_ERROR_LOG") {
            self.logging.error_log = PathBuf::from(error_log);
        }

        if let Some(api) = var("REVU_GITHUB_API_URL") {
            self.github.api_base_url = Some(api);
        }

        Ok(self)
    }

    /// Apply CLI flag overrides
    pub fn with_cli_overrides(mut self, port: Option<u16>, webhook_path: Option<String>) -> Self {
        if let Some(port) = port {
            self.server.port = port;
        }

        if let Some(path) = webhook_path {
            self.server.webhook_path = path;
        }

        self
    }

    /// Load configuration with all overrides applied
    ///
    /// Priority: CLI > env > config file > defaults
    pub fn load_with_overrides(
        config_file: Option<&Path>,
        port: Option<u16>,
        webhook_path: Option<String>,
    ) -> Result<Self> {
        let base = match config_file {
            Some(path) => Self::load_from_file(path)?,
            None => Self::load()?,
        };

        let config = base
            .with_env_overrides()?
            .with_cli_overrides(port, webhook_path);
        config.validate()?;
        Ok(config)
    }

    /// Reject values the server cannot start with
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(Error::Config("server.port must be non-zero".to_string()));
        }

        if !self.server.webhook_path.starts_with('/') {
            return Err(Error::Config(format!(
                "server.webhook_path must start with '/': {}",
                self.server.webhook_path
            )));
        }

        self.api_base_url()?;
        Ok(())
    }

    /// Parsed GitHub API root, if one is configured
    pub fn api_base_url(&self) -> Result<Option<Url>> {
        self.github
            .api_base_url
            .as_deref()
            .map(|raw| {
                Url::parse(raw)
                    .map_err(|e| Error::Config(format!("Invalid github.api_base_url {}: {}", raw, e)))
            })
            .transpose()
    }

    /// Socket address string to bind
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
