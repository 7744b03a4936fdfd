//! Client Configuration
//!
//! Where the event source lives and how hard to try to stay connected to it.
//!
//! # Configuration Priority
//!
//! Highest first:
//! 1. CLI arguments ([`ConfigOverrides`])
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! The file lives at `$XDG_CONFIG_HOME/agent-timeline/client.toml`
//! (typically `~/.config/agent-timeline/client.toml`).
//!
//! # Example Configuration
//!
//! ```toml
//! endpoint = "ws://localhost:8003/ws/chat"
//!
//! [reconnect]
//! max_attempts = 5
//! base_delay_ms = 1000
//! backoff = "linear"      # linear | exponential | fixed
//! max_delay_ms = 30000
//! ```
//!
//! # Environment Variables
//!
//! | variable                      | field                       |
//! |-------------------------------|-----------------------------|
//! | `TIMELINE_ENDPOINT`           | `endpoint`                  |
//! | `TIMELINE_RECONNECT_ATTEMPTS` | `reconnect.max_attempts`    |
//! | `TIMELINE_RECONNECT_DELAY_MS` | `reconnect.base_delay_ms`   |
//! | `TIMELINE_BACKOFF`            | `reconnect.backoff`         |

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::transport::config::{BackoffPolicy, ReconnectConfig};

/// Endpoint used when nothing else is configured
pub const DEFAULT_ENDPOINT: &str = "ws://localhost:8003/ws/chat";

/// Environment variable names
pub mod env {
    /// Event source URL
    pub const ENDPOINT: &str = "TIMELINE_ENDPOINT";
    /// Reconnect attempt limit
    pub const RECONNECT_ATTEMPTS: &str = "TIMELINE_RECONNECT_ATTEMPTS";
    /// Base reconnect delay in milliseconds
    pub const RECONNECT_DELAY_MS: &str = "TIMELINE_RECONNECT_DELAY_MS";
    /// Backoff policy name
    pub const BACKOFF: &str = "TIMELINE_BACKOFF";
}

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

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
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

/// Reconnect section of the TOML configuration
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectToml {
    /// Reconnect attempts after an unexpected close
    pub max_attempts: Option<u32>,
    /// Base delay between attempts in milliseconds
    pub base_delay_ms: Option<u64>,
    /// Delay growth policy
    pub backoff: Option<BackoffPolicy>,
    /// Upper bound for exponential delays in milliseconds
    pub max_delay_ms: Option<u64>,
}

/// Root of the TOML configuration file
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientToml {
    /// Event source URL
    pub endpoint: Option<String>,
    /// Reconnect policy
    pub reconnect: ReconnectToml,
}

// =============================================================================
// Resolved Configuration
// =============================================================================

/// Fully resolved client configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    /// Event source URL (`ws://` or `wss://`)
    pub endpoint: String,
    /// Reconnect policy
    pub reconnect: ReconnectConfig,
    /// File the configuration was read from, if any
    pub config_file_path: Option<PathBuf>,
    source: ConfigSource,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            reconnect: ReconnectConfig::default(),
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl ClientConfig {
    /// Highest-priority layer that set any value
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Record the layer a value came from
    pub fn set_source(&mut self, source: ConfigSource) {
        self.source = source;
    }

    /// Check the resolved values
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] when the endpoint is not a
    /// WebSocket URL or the reconnect policy is unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let endpoint = self.endpoint.trim();
        if endpoint.is_empty() {
            return Err(ConfigError::ValidationError(
                "endpoint must not be empty".to_string(),
            ));
        }
        let Some((scheme, rest)) = endpoint.split_once("://") else {
            return Err(ConfigError::ValidationError(format!(
                "endpoint '{endpoint}' is not a URL"
            )));
        };
        if !matches!(scheme.to_ascii_lowercase().as_str(), "ws" | "wss") {
            return Err(ConfigError::ValidationError(format!(
                "endpoint scheme must be ws or wss, got '{scheme}'"
            )));
        }
        if rest.is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "endpoint '{endpoint}' has no host"
            )));
        }
        self.reconnect
            .validate()
            .map_err(ConfigError::ValidationError)
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Default configuration file path
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("agent-timeline").join("client.toml"))
}

/// Load configuration from the default file location plus the environment
///
/// A missing file is not an error; defaults apply.
///
/// # Errors
///
/// Returns [`ConfigError`] if the file exists but cannot be read or parsed.
pub fn load_config() -> Result<ClientConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from an optional file path plus the environment
///
/// A missing file is logged and skipped.
///
/// # Errors
///
/// Returns [`ConfigError`] if the file exists but cannot be read or parsed.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<ClientConfig, ConfigError> {
    load_with(path.as_deref(), false, process_env)
}

/// Load configuration from a file the user named explicitly
///
/// Unlike [`load_config_from_path`], the file must exist.
///
/// # Errors
///
/// Returns [`ConfigError::ReadError`] if the file is missing or unreadable,
/// [`ConfigError::ParseError`] if it is not valid TOML.
pub fn load_config_file(path: &Path) -> Result<ClientConfig, ConfigError> {
    load_with(Some(path), true, process_env)
}

fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Layer file and environment values over the defaults, reading the
/// environment through `lookup`
fn load_with(
    path: Option<&Path>,
    required: bool,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<ClientConfig, ConfigError> {
    let mut config = ClientConfig::default();

    if let Some(config_path) = path {
        if required || config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.to_path_buf(),
                    source: e,
                })?;

            let toml_config: ClientToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.to_path_buf());

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

    apply_env_config(&mut config, lookup);

    Ok(config)
}

fn apply_toml_config(config: &mut ClientConfig, toml: &ClientToml) {
    if *toml == ClientToml::default() {
        return;
    }
    config.source = ConfigSource::File;

    if let Some(ref endpoint) = toml.endpoint {
        config.endpoint = endpoint.clone();
    }

    let reconnect = &toml.reconnect;
    if let Some(n) = reconnect.max_attempts {
        config.reconnect.max_attempts = n;
    }
    if let Some(ms) = reconnect.base_delay_ms {
        config.reconnect.base_delay_ms = ms;
    }
    if let Some(backoff) = reconnect.backoff {
        config.reconnect.backoff = backoff;
    }
    if let Some(ms) = reconnect.max_delay_ms {
        config.reconnect.max_delay_ms = ms;
    }
}

fn apply_env_config(config: &mut ClientConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(endpoint) = lookup(env::ENDPOINT).filter(|v| !v.trim().is_empty()) {
        config.endpoint = endpoint.trim().to_string();
        config.source = ConfigSource::Env;
    }
    if let Some(attempts) = lookup(env::RECONNECT_ATTEMPTS) {
        match attempts.trim().parse::<u32>() {
            Ok(n) => {
                config.reconnect.max_attempts = n;
                config.source = ConfigSource::Env;
            }
            Err(_) => {
                tracing::warn!(var = env::RECONNECT_ATTEMPTS, value = %attempts, "Ignoring unparseable value");
            }
        }
    }
    if let Some(delay) = lookup(env::RECONNECT_DELAY_MS) {
        match delay.trim().parse::<u64>() {
            Ok(ms) => {
                config.reconnect.base_delay_ms = ms;
                config.source = ConfigSource::Env;
            }
            Err(_) => {
                tracing::warn!(var = env::RECONNECT_DELAY_MS, value = %delay, "Ignoring unparseable value");
            }
        }
    }
    if let Some(backoff) = lookup(env::BACKOFF) {
        match backoff.parse::<BackoffPolicy>() {
            Ok(policy) => {
                config.reconnect.backoff = policy;
                config.source = ConfigSource::Env;
            }
            Err(e) => {
                tracing::warn!(var = env::BACKOFF, value = %backoff, error = %e, "Ignoring unparseable value");
            }
        }
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to configuration
///
/// Use this after [`load_config`] to apply command-line argument overrides.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    /// Endpoint override
    pub endpoint: Option<String>,
    /// Attempt limit override
    pub max_attempts: Option<u32>,
    /// Base delay override (milliseconds)
    pub base_delay_ms: Option<u64>,
    /// Backoff policy override
    pub backoff: Option<BackoffPolicy>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set endpoint override
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set attempt limit override
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Set base delay override
    #[must_use]
    pub fn with_base_delay_ms(mut self, ms: u64) -> Self {
        self.base_delay_ms = Some(ms);
        self
    }

    /// Set backoff policy override
    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = Some(backoff);
        self
    }

    /// Apply overrides to a configuration
    pub fn apply(&self, config: &mut ClientConfig) {
        if *self != Self::default() {
            config.source = ConfigSource::Cli;
        }

        if let Some(ref endpoint) = self.endpoint {
            config.endpoint = endpoint.clone();
        }
        if let Some(n) = self.max_attempts {
            config.reconnect.max_attempts = n;
        }
        if let Some(ms) = self.base_delay_ms {
            config.reconnect.base_delay_ms = ms;
        }
        if let Some(backoff) = self.backoff {
            config.reconnect.backoff = backoff;
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use pretty_assertions::assert_eq;
    use tempfile::NamedTempFile;

    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    fn toml_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.endpoint, "ws://localhost:8003/ws/chat");
        assert_eq!(config.reconnect.max_attempts, 5);
        assert_eq!(config.reconnect.base_delay_ms, 1000);
        assert_eq!(config.reconnect.backoff, BackoffPolicy::Linear);
        assert_eq!(config.source(), ConfigSource::Default);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_config_path() {
        if let Some(path) = default_config_path() {
            assert!(path.ends_with("agent-timeline/client.toml"));
        }
    }

    #[test]
    fn test_parse_valid_toml() {
        let file = toml_file(
            r#"
endpoint = "wss://agents.example.com/ws/chat"

[reconnect]
max_attempts = 3
base_delay_ms = 250
backoff = "exponential"
max_delay_ms = 4000
"#,
        );

        let config = load_with(Some(file.path()), true, no_env).unwrap();
        assert_eq!(config.endpoint, "wss://agents.example.com/ws/chat");
        assert_eq!(
            config.reconnect,
            ReconnectConfig {
                max_attempts: 3,
                base_delay_ms: 250,
                backoff: BackoffPolicy::Exponential,
                max_delay_ms: 4000,
            }
        );
        assert_eq!(config.source(), ConfigSource::File);
        assert_eq!(config.config_file_path.as_deref(), Some(file.path()));
    }

    #[test]
    fn test_parse_partial_toml() {
        let file = toml_file("[reconnect]\nmax_attempts = 9\n");
        let config = load_with(Some(file.path()), true, no_env).unwrap();
        assert_eq!(config.reconnect.max_attempts, 9);
        assert_eq!(config.reconnect.base_delay_ms, 1000);
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
    }

    #[test]
    fn test_parse_empty_toml() {
        let file = toml_file("");
        let config = load_with(Some(file.path()), true, no_env).unwrap();
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.source(), ConfigSource::Default);
    }

    #[test]
    fn test_missing_default_file_is_graceful() {
        let config =
            load_with(Some(Path::new("/nonexistent/agent-timeline/client.toml")), false, no_env)
                .unwrap();
        assert_eq!(config.source(), ConfigSource::Default);
        assert_eq!(config.config_file_path, None);
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let result = load_config_file(Path::new("/nonexistent/agent-timeline/client.toml"));
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }

    #[test]
    fn test_malformed_toml_error() {
        let file = toml_file("endpoint = [unclosed");
        let result = load_with(Some(file.path()), true, no_env);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_unknown_backoff_in_file_is_parse_error() {
        let file = toml_file("[reconnect]\nbackoff = \"random\"\n");
        let result = load_with(Some(file.path()), true, no_env);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_env_overrides_file() {
        let file = toml_file("endpoint = \"ws://file-host/ws\"\n[reconnect]\nmax_attempts = 2\n");
        let env = env_from(&[
            (env::ENDPOINT, "ws://env-host/ws"),
            (env::RECONNECT_DELAY_MS, "500"),
            (env::BACKOFF, "fixed"),
        ]);

        let config = load_with(Some(file.path()), true, env).unwrap();
        assert_eq!(config.endpoint, "ws://env-host/ws");
        assert_eq!(config.reconnect.max_attempts, 2);
        assert_eq!(config.reconnect.base_delay_ms, 500);
        assert_eq!(config.reconnect.backoff, BackoffPolicy::Fixed);
        assert_eq!(config.source(), ConfigSource::Env);
    }

    #[test]
    fn test_unparseable_env_values_are_ignored() {
        let env = env_from(&[
            (env::RECONNECT_ATTEMPTS, "many"),
            (env::BACKOFF, "sideways"),
        ]);
        let config = load_with(None, false, env).unwrap();
        assert_eq!(config.reconnect.max_attempts, 5);
        assert_eq!(config.reconnect.backoff, BackoffPolicy::Linear);
        assert_eq!(config.source(), ConfigSource::Default);
    }

    #[test]
    fn test_cli_overrides_env() {
        let env = env_from(&[(env::RECONNECT_ATTEMPTS, "7")]);
        let mut config = load_with(None, false, env).unwrap();
        assert_eq!(config.source(), ConfigSource::Env);

        ConfigOverrides::new()
            .with_max_attempts(3)
            .with_endpoint("ws://cli-host/ws")
            .apply(&mut config);

        assert_eq!(config.reconnect.max_attempts, 3);
        assert_eq!(config.endpoint, "ws://cli-host/ws");
        assert_eq!(config.source(), ConfigSource::Cli);
    }

    #[test]
    fn test_config_overrides_empty_no_change() {
        let mut config = ClientConfig::default();
        ConfigOverrides::new().apply(&mut config);
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn test_validation_rejects_bad_endpoints() {
        for endpoint in ["", "localhost:8003", "http://localhost:8003/ws", "ws://"] {
            let config = ClientConfig {
                endpoint: endpoint.to_string(),
                ..Default::default()
            };
            assert!(
                matches!(config.validate(), Err(ConfigError::ValidationError(_))),
                "{endpoint:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_validation_rejects_zero_delay() {
        let mut config = ClientConfig::default();
        ConfigOverrides::new().with_base_delay_ms(0).apply(&mut config);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_config_source_display() {
        assert_eq!(ConfigSource::Cli.to_string(), "CLI");
        assert_eq!(ConfigSource::Env.to_string(), "environment");
        assert_eq!(ConfigSource::File.to_string(), "config file");
        assert_eq!(ConfigSource::Default.to_string(), "default");
    }
}
