//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::Config;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("twitch.username is required")]
    MissingUsername,
    #[error("twitch.username must not contain whitespace, got '{0}'")]
    InvalidUsername(String),
    #[error("twitch.token is required")]
    MissingToken,
    #[error("twitch.host is required")]
    MissingHost,
    #[error("client.command_prefix is required")]
    MissingCommandPrefix,
    #[error("client.queue_capacity must be at least 1")]
    ZeroQueueCapacity,
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let username = config.twitch.username.trim();
    if username.is_empty() {
        errors.push(ValidationError::MissingUsername);
    } else if username.chars().any(char::is_whitespace) {
        errors.push(ValidationError::InvalidUsername(username.to_string()));
    }
    if config.twitch.token.trim().is_empty() {
        errors.push(ValidationError::MissingToken);
    }
    if config.twitch.host.trim().is_empty() {
        errors.push(ValidationError::MissingHost);
    }

    if config.client.command_prefix.is_empty() {
        errors.push(ValidationError::MissingCommandPrefix);
    }
    if config.client.queue_capacity == 0 {
        errors.push(ValidationError::ZeroQueueCapacity);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
