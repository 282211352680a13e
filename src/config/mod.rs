//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Config struct definitions (Config, TwitchConfig, ClientConfig, ModeratorsConfig)
//! - [`defaults`]: serde default functions
//! - [`validation`]: startup checks

mod defaults;
mod types;
mod validation;

pub use types::{ClientConfig, Config, ConfigError, ModeratorsConfig, TwitchConfig};
pub use validation::{ValidationError, validate};
