//! Configuration
//!
//! Configuration is assembled from several sources, highest priority first:
//! 1. CLI arguments (via [`ConfigOverrides`])
//! 2. Environment variables
//! 3. TOML configuration file (`$XDG_CONFIG_HOME/thoughtchain/config.toml`)
//! 4. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! [server]
//! base_url = "https://api.example.com/"
//! chat_path = "chat-test"
//! connect_timeout_ms = 10000
//! request_timeout_secs = 1000
//!
//! [stream]
//! channel_capacity = 100
//! final_output_key = "__final_output__"
//! max_segment_id = 65536
//! ```

use std::path::PathBuf;
use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::streaming::{DEFAULT_MAX_SEGMENT_ID, MAX_SEGMENT_ID_LIMIT};

/// Default chat server
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

/// Default streaming endpoint, relative to the base URL
pub const DEFAULT_CHAT_PATH: &str = "chat-test";

/// Default reserved key for the primary answer stream
pub const DEFAULT_FINAL_OUTPUT_KEY: &str = "__final_output__";

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Tracks where the configuration's highest-priority value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// `[server]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerToml {
    /// Chat server base URL
    pub base_url: Option<String>,
    /// Streaming endpoint path relative to the base URL
    pub chat_path: Option<String>,
    /// Connection timeout in milliseconds
    pub connect_timeout_ms: Option<u64>,
    /// Whole-request timeout in seconds
    pub request_timeout_secs: Option<u64>,
}

/// `[stream]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamToml {
    /// Transport channel capacity
    pub channel_capacity: Option<usize>,
    /// Reserved source key for the primary answer
    pub final_output_key: Option<String>,
    /// Largest segment id accepted per source
    pub max_segment_id: Option<u32>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatToml {
    /// Server section
    pub server: ServerToml,
    /// Stream section
    pub stream: StreamToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Resolved chat client configuration
#[derive(Clone, Debug)]
pub struct ChatConfig {
    /// Chat server base URL, without trailing slash
    pub base_url: String,
    /// Streaming endpoint path relative to `base_url`
    pub chat_path: String,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Whole-request timeout (covers the entire stream)
    pub request_timeout: Duration,
    /// Capacity of the channel between transport task and controller
    pub channel_capacity: usize,
    /// Reserved source key for the primary answer stream
    pub final_output_key: String,
    /// Largest segment id accepted per source
    pub max_segment_id: u32,
    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,
    /// Source of configuration values
    source: ConfigSource,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            chat_path: DEFAULT_CHAT_PATH.to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(1000),
            channel_capacity: 100,
            final_output_key: DEFAULT_FINAL_OUTPUT_KEY.to_string(),
            max_segment_id: DEFAULT_MAX_SEGMENT_ID,
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl ChatConfig {
    /// Defaults with environment overrides applied
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        apply_env_config(&mut config, |name| std::env::var(name).ok());
        config
    }

    /// Set the base URL, dropping any trailing slashes
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = normalize_base_url(&base_url.into());
        self
    }

    /// Get the primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Full URL of the streaming endpoint
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if the base URL does not parse.
    pub fn chat_url(&self) -> Result<Url, ConfigError> {
        let url = format!(
            "{}/{}",
            normalize_base_url(&self.base_url),
            self.chat_path.trim_start_matches('/')
        );
        Url::parse(&url)
            .map_err(|e| ConfigError::ValidationError(format!("invalid chat URL {url:?}: {e}")))
    }

    /// Check that values are usable
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] naming the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.chat_url()?;
        if self.channel_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "channel_capacity must be at least 1".to_string(),
            ));
        }
        if self.final_output_key.is_empty() {
            return Err(ConfigError::ValidationError(
                "final_output_key must not be empty".to_string(),
            ));
        }
        if !(1..=MAX_SEGMENT_ID_LIMIT).contains(&self.max_segment_id) {
            return Err(ConfigError::ValidationError(format!(
                "max_segment_id must be between 1 and {MAX_SEGMENT_ID_LIMIT}, got {}",
                self.max_segment_id
            )));
        }
        Ok(())
    }
}

fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/thoughtchain/config.toml` or
/// `~/.config/thoughtchain/config.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("thoughtchain").join("config.toml"))
}

/// Load configuration from the default path, environment and defaults
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed, or if the
/// resulting values fail validation. A missing config file is not an error.
pub fn load_config() -> Result<ChatConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed, or
/// if the resulting values fail validation.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<ChatConfig, ConfigError> {
    let mut config = ChatConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: ChatToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_config(&mut config, |name| std::env::var(name).ok());
    config.validate()?;

    Ok(config)
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut ChatConfig, toml: &ChatToml) {
    if let Some(ref url) = toml.server.base_url {
        config.base_url = normalize_base_url(url);
    }
    if let Some(ref path) = toml.server.chat_path {
        config.chat_path.clone_from(path);
    }
    if let Some(ms) = toml.server.connect_timeout_ms {
        config.connect_timeout = Duration::from_millis(ms);
    }
    if let Some(secs) = toml.server.request_timeout_secs {
        config.request_timeout = Duration::from_secs(secs);
    }

    if let Some(capacity) = toml.stream.channel_capacity {
        config.channel_capacity = capacity;
    }
    if let Some(ref key) = toml.stream.final_output_key {
        config.final_output_key.clone_from(key);
    }
    if let Some(max) = toml.stream.max_segment_id {
        config.max_segment_id = max;
    }
}

/// Apply environment variable overrides, reading variables through `lookup`
fn apply_env_config(config: &mut ChatConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(url) = lookup("THOUGHTCHAIN_API_URL").or_else(|| lookup("NEXT_PUBLIC_API_URL")) {
        config.base_url = normalize_base_url(&url);
        config.source = ConfigSource::Env;
    }
    if let Some(path) = lookup("THOUGHTCHAIN_CHAT_PATH") {
        config.chat_path = path;
        config.source = ConfigSource::Env;
    }
    if let Some(ms) = lookup("THOUGHTCHAIN_CONNECT_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
        config.connect_timeout = Duration::from_millis(ms);
        config.source = ConfigSource::Env;
    }
    if let Some(secs) = lookup("THOUGHTCHAIN_REQUEST_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
        config.request_timeout = Duration::from_secs(secs);
        config.source = ConfigSource::Env;
    }
    if let Some(capacity) = lookup("THOUGHTCHAIN_CHANNEL_CAPACITY").and_then(|v| v.parse().ok()) {
        config.channel_capacity = capacity;
        config.source = ConfigSource::Env;
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to configuration
///
/// Use this after [`load_config`] to apply command-line argument overrides.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Base URL override
    pub base_url: Option<String>,
    /// Chat path override
    pub chat_path: Option<String>,
    /// Connect timeout override (milliseconds)
    pub connect_timeout_ms: Option<u64>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set base URL override
    #[must_use]
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = Some(url);
        self
    }

    /// Set chat path override
    #[must_use]
    pub fn with_chat_path(mut self, path: String) -> Self {
        self.chat_path = Some(path);
        self
    }

    /// Set connect timeout override
    #[must_use]
    pub fn with_connect_timeout_ms(mut self, ms: u64) -> Self {
        self.connect_timeout_ms = Some(ms);
        self
    }

    /// Apply overrides to a configuration
    pub fn apply(&self, config: &mut ChatConfig) {
        if self.base_url.is_some() || self.chat_path.is_some() || self.connect_timeout_ms.is_some()
        {
            config.source = ConfigSource::Cli;
        }

        if let Some(ref url) = self.base_url {
            config.base_url = normalize_base_url(url);
        }
        if let Some(ref path) = self.chat_path {
            config.chat_path.clone_from(path);
        }
        if let Some(ms) = self.connect_timeout_ms {
            config.connect_timeout = Duration::from_millis(ms);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ChatConfig::default();
        assert_eq!(config.base_url, "http://127.0.0.1:8000");
        assert_eq!(config.chat_path, "chat-test");
        assert_eq!(config.channel_capacity, 100);
        assert_eq!(config.final_output_key, "__final_output__");
        assert_eq!(config.source(), ConfigSource::Default);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_chat_url_joins_without_double_slash() {
        let config = ChatConfig::default().with_base_url("https://api.example.com///");
        assert_eq!(
            config.chat_url().unwrap().as_str(),
            "https://api.example.com/chat-test"
        );

        let mut config = ChatConfig::default();
        config.chat_path = "/v1/chat".to_string();
        assert_eq!(
            config.chat_url().unwrap().as_str(),
            "http://127.0.0.1:8000/v1/chat"
        );
    }

    #[test]
    fn test_invalid_base_url_fails_validation() {
        let config = ChatConfig::default().with_base_url("not a url");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_zero_channel_capacity_fails_validation() {
        let mut config = ChatConfig::default();
        config.channel_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_segment_limit_range() {
        let mut config = ChatConfig::default();
        config.max_segment_id = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));

        config.max_segment_id = u32::MAX;
        assert!(config.validate().is_err());

        config.max_segment_id = MAX_SEGMENT_ID_LIMIT;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[server]
base_url = "https://chat.example.com/"
chat_path = "stream"
connect_timeout_ms = 2500

[stream]
channel_capacity = 8
final_output_key = "answer"
"#
        )
        .unwrap();

        let mut config = ChatConfig::default();
        let toml_config: ChatToml =
            toml::from_str(&std::fs::read_to_string(file.path()).unwrap()).unwrap();
        apply_toml_config(&mut config, &toml_config);

        assert_eq!(config.base_url, "https://chat.example.com");
        assert_eq!(config.chat_path, "stream");
        assert_eq!(config.connect_timeout, Duration::from_millis(2500));
        assert_eq!(config.request_timeout, Duration::from_secs(1000));
        assert_eq!(config.channel_capacity, 8);
        assert_eq!(config.final_output_key, "answer");
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[server\nbase_url = ").unwrap();

        let result = load_config_from_path(Some(file.path().to_path_buf()));
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");

        let config = load_config_from_path(Some(path)).unwrap();
        assert!(config.config_file_path.is_none());
        assert_ne!(config.source(), ConfigSource::File);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = ChatConfig::default();
        apply_env_config(
            &mut config,
            env_from(&[
                ("THOUGHTCHAIN_API_URL", "http://10.0.0.5:9000/"),
                ("THOUGHTCHAIN_CONNECT_TIMEOUT_MS", "750"),
                ("THOUGHTCHAIN_CHANNEL_CAPACITY", "not-a-number"),
            ]),
        );

        assert_eq!(config.base_url, "http://10.0.0.5:9000");
        assert_eq!(config.connect_timeout, Duration::from_millis(750));
        assert_eq!(config.channel_capacity, 100);
        assert_eq!(config.source(), ConfigSource::Env);
    }

    #[test]
    fn test_env_falls_back_to_public_api_url() {
        let mut config = ChatConfig::default();
        apply_env_config(
            &mut config,
            env_from(&[("NEXT_PUBLIC_API_URL", "https://prod.example.com")]),
        );
        assert_eq!(config.base_url, "https://prod.example.com");

        let mut config = ChatConfig::default();
        apply_env_config(
            &mut config,
            env_from(&[
                ("NEXT_PUBLIC_API_URL", "https://prod.example.com"),
                ("THOUGHTCHAIN_API_URL", "https://dev.example.com"),
            ]),
        );
        assert_eq!(config.base_url, "https://dev.example.com");
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = ChatConfig::default();
        ConfigOverrides::new()
            .with_base_url("http://localhost:1234/".to_string())
            .with_connect_timeout_ms(50)
            .apply(&mut config);

        assert_eq!(config.base_url, "http://localhost:1234");
        assert_eq!(config.connect_timeout, Duration::from_millis(50));
        assert_eq!(config.source(), ConfigSource::Cli);
    }

    #[test]
    fn test_chat_path_override() {
        let mut config = ChatConfig::default();
        ConfigOverrides::new()
            .with_chat_path("/v2/stream".to_string())
            .apply(&mut config);

        assert_eq!(config.source(), ConfigSource::Cli);
        assert_eq!(
            config.chat_url().unwrap().as_str(),
            "http://127.0.0.1:8000/v2/stream"
        );
    }

    #[test]
    fn test_empty_overrides_keep_source() {
        let mut config = ChatConfig::default();
        ConfigOverrides::new().apply(&mut config);
        assert_eq!(config.source(), ConfigSource::Default);
    }
}
