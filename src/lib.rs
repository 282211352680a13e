//! nuclearbot - Twitch chat bot engine
//!
//! A persistent client for Twitch chat: connects, logs in, joins the bot's
//! own channel, answers keep-alives, dispatches `!commands` and messages to
//! listeners, and reconnects when the server asks it to.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use nuclearbot::{ChatClient, ClientListener, Config, executor_fn};
//!
//! struct Plugin;
//!
//! #[async_trait]
//! impl ClientListener for Plugin {}
//!
//! # async fn run() -> anyhow::Result<()> {
//! let client = ChatClient::new(Config::load("nuclearbot.toml")?, Arc::new(Plugin));
//! client.register_command("greet", "!greet <name>", executor_fn(|ctx, args| {
//!     let Some(name) = args.get(1) else {
//!         return Ok(false);
//!     };
//!     ctx.reply(&format!("Hello, {name}!"))?;
//!     Ok(true)
//! }))?;
//! client.connect().await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod moderators;

pub use client::builtin::{ModCommand, ModeratorGate, RestartCommand, StopCommand};
pub use client::listener::{ClientListener, StateListener};
pub use client::queue::{OutboundQueue, OutboundSender};
pub use client::registry::{Command, CommandContext, CommandExecutor, FnExecutor, executor_fn};
pub use client::{ChatClient, SessionState};
pub use config::{Config, ConfigError};
pub use error::{ClientError, HandshakeError, HubError, QueueError, RegistryError};
pub use moderators::{ModeratorError, ModeratorList};
