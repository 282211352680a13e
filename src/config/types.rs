//! Core configuration types.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use super::defaults::*;
use super::validation;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Bot configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Account and server endpoint.
    pub twitch: TwitchConfig,
    /// Engine tuning.
    #[serde(default)]
    pub client: ClientConfig,
    /// Moderator list storage.
    #[serde(default)]
    pub moderators: ModeratorsConfig,
}

impl Config {
    /// Build a configuration with default settings for the given account.
    pub fn new(username: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            twitch: TwitchConfig {
                username: username.into(),
                token: token.into(),
                host: default_host(),
                port: default_port(),
            },
            client: ClientConfig::default(),
            moderators: ModeratorsConfig::default(),
        }
    }

    /// Load configuration from a TOML file and validate it.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        content.parse()
    }

    /// Check the configuration, joining every problem found into one error.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validation::validate(self).map_err(|errors| {
            let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
            ConfigError::Invalid(messages.join("; "))
        })
    }
}

impl std::str::FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }
}

/// Account and server endpoint (`[twitch]`).
#[derive(Clone, Deserialize)]
pub struct TwitchConfig {
    /// Login name. The bot joins the channel of the same name.
    pub username: String,
    /// OAuth token, sent verbatim in `PASS` (usually `oauth:...`).
    pub token: String,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl TwitchConfig {
    /// Lower-cased login name used for `NICK` and self-command checks.
    pub fn identity(&self) -> String {
        self.username.trim().to_ascii_lowercase()
    }

    /// `host:port` for connecting and logging.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Debug for TwitchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TwitchConfig")
            .field("username", &self.username)
            .field("token", &"<redacted>")
            .field("host", &self.host)
            .field("port", &self.port)
            .finish()
    }
}

/// Engine tuning (`[client]`).
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Prefix that marks a chat line as a command (default `!`).
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,
    /// Outbound queue capacity in lines (default 50).
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Line announced in the channel after joining.
    #[serde(default = "default_announce")]
    pub announce: String,
    /// Reply `Usage: <usage>` when an executor reports a malformed call.
    #[serde(default = "default_true")]
    pub reply_usage_on_failure: bool,
    /// Register the built-in `help` command at construction.
    #[serde(default = "default_true")]
    pub help_command: bool,
    /// Start a new session when the server closes the stream without
    /// having sent `RECONNECT` first.
    #[serde(default)]
    pub reconnect_on_close: bool,
    /// Time allowed for the farewell line to flush (milliseconds).
    #[serde(default = "default_drain_grace_ms")]
    pub drain_grace_ms: u64,
    /// Pause before a reconnect attempt (milliseconds).
    #[serde(default)]
    pub reconnect_delay_ms: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_handshake_timeout_secs")]
    pub handshake_timeout_secs: u64,
}

impl ClientConfig {
    pub fn drain_grace(&self) -> Duration {
        Duration::from_millis(self.drain_grace_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            command_prefix: default_command_prefix(),
            queue_capacity: default_queue_capacity(),
            announce: default_announce(),
            reply_usage_on_failure: true,
            help_command: true,
            reconnect_on_close: false,
            drain_grace_ms: default_drain_grace_ms(),
            reconnect_delay_ms: 0,
            connect_timeout_secs: default_connect_timeout_secs(),
            handshake_timeout_secs: default_handshake_timeout_secs(),
        }
    }
}

/// Moderator list storage (`[moderators]`).
#[derive(Debug, Clone, Deserialize)]
pub struct ModeratorsConfig {
    /// JSON file holding the moderator names.
    #[serde(default = "default_moderators_path")]
    pub path: String,
}

impl Default for ModeratorsConfig {
    fn default() -> Self {
        Self {
            path: default_moderators_path(),
        }
    }
}
