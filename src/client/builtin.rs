//! Commands shipped with the client.
//!
//! - `help`: lists commands, or shows one command's usage
//! - [`ModeratorGate`]: wraps an executor and refuses non-moderators
//! - [`ModCommand`]: `mod add|remove|list` over a [`ModeratorList`]
//! - [`RestartCommand`], [`StopCommand`]: session control from chat, meant to
//!   sit behind a [`ModeratorGate`]

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use super::ChatClient;
use super::registry::{Command, CommandContext, CommandExecutor, CommandRegistry};
use crate::error::RegistryError;
use crate::moderators::ModeratorList;

pub const HELP_LABEL: &str = "help";
const HELP_DESCRIPTION: &str = "Lists all commands or detailed information.";

/// Register the `help` command.
pub(crate) fn register_help(registry: &CommandRegistry, prefix: &str) -> Result<(), RegistryError> {
    let usage = format!("{prefix}{HELP_LABEL} [command]");
    let command = registry.register(HELP_LABEL, &usage, HelpCommand)?;
    command.set_description(HELP_DESCRIPTION);
    Ok(())
}

/// `!help` lists every label; `!help <label>` shows usage and description.
pub struct HelpCommand;

#[async_trait]
impl CommandExecutor for HelpCommand {
    async fn execute(
        &self,
        ctx: &CommandContext,
        _command: &Command,
        args: &[String],
    ) -> anyhow::Result<bool> {
        ctx.reply(&help_reply(ctx.client(), args))?;
        Ok(true)
    }
}

fn help_reply(client: &ChatClient, args: &[String]) -> String {
    match args.get(1) {
        None => {
            let labels = client.commands();
            if labels.is_empty() {
                "Commands: (empty)".to_string()
            } else {
                format!("Commands: {}", labels.join(", "))
            }
        }
        Some(label) => match client.get_command(label) {
            Some(command) => format!("Usage: {} - {}", command.usage(), command.description()),
            None => "Command does not exist.".to_string(),
        },
    }
}

/// Runs the wrapped executor only for moderators and the channel owner.
///
/// Anyone else gets a logged warning and no reply; the call still counts
/// as well-formed so no usage line is sent.
pub struct ModeratorGate<E> {
    moderators: Arc<ModeratorList>,
    inner: E,
}

impl<E> ModeratorGate<E> {
    pub fn new(moderators: Arc<ModeratorList>, inner: E) -> Self {
        Self { moderators, inner }
    }

    fn allows(&self, ctx: &CommandContext) -> bool {
        ctx.sender().eq_ignore_ascii_case(ctx.client().username())
            || self.moderators.is_moderator(ctx.sender())
    }
}

#[async_trait]
impl<E> CommandExecutor for ModeratorGate<E>
where
    E: CommandExecutor,
{
    async fn execute(
        &self,
        ctx: &CommandContext,
        command: &Command,
        args: &[String],
    ) -> anyhow::Result<bool> {
        if !self.allows(ctx) {
            warn!(sender = ctx.sender(), label = command.label(), "Unauthorized command");
            return Ok(true);
        }
        self.inner.execute(ctx, command, args).await
    }
}

/// Ends the session and reconnects.
pub struct RestartCommand;

impl RestartCommand {
    pub const LABEL: &'static str = "restart";
    pub const DESCRIPTION: &'static str = "Soft-restarts the bot.";

    pub fn usage(prefix: &str) -> String {
        format!("{prefix}{}", Self::LABEL)
    }
}

#[async_trait]
impl CommandExecutor for RestartCommand {
    async fn execute(
        &self,
        ctx: &CommandContext,
        _command: &Command,
        _args: &[String],
    ) -> anyhow::Result<bool> {
        info!(sender = ctx.sender(), "Restart command issued");
        ctx.client().restart();
        Ok(true)
    }
}

/// Ends the session for good.
pub struct StopCommand;

impl StopCommand {
    pub const LABEL: &'static str = "stop";
    pub const DESCRIPTION: &'static str = "Stops the bot.";

    pub fn usage(prefix: &str) -> String {
        format!("{prefix}{}", Self::LABEL)
    }
}

#[async_trait]
impl CommandExecutor for StopCommand {
    async fn execute(
        &self,
        ctx: &CommandContext,
        _command: &Command,
        _args: &[String],
    ) -> anyhow::Result<bool> {
        info!(sender = ctx.sender(), "Stop command issued");
        ctx.client().stop();
        Ok(true)
    }
}

/// `!mod add <name>`, `!mod remove <name>`, `!mod list`.
pub struct ModCommand {
    moderators: Arc<ModeratorList>,
}

impl ModCommand {
    pub const LABEL: &'static str = "mod";
    pub const DESCRIPTION: &'static str = "Manages the moderator list.";

    pub fn new(moderators: Arc<ModeratorList>) -> Self {
        Self { moderators }
    }

    pub fn usage(prefix: &str) -> String {
        format!("{prefix}{} <add|remove|list> [name]", Self::LABEL)
    }

    /// Apply one invocation. `None` when the arguments are malformed.
    fn apply(&self, args: &[String]) -> Option<String> {
        let action = args.get(1)?.to_ascii_lowercase();
        match (action.as_str(), args.get(2)) {
            ("list", None) => {
                let names = self.moderators.list();
                Some(if names.is_empty() {
                    "Moderators: (none)".to_string()
                } else {
                    format!("Moderators: {}", names.join(", "))
                })
            }
            ("add", Some(name)) => {
                let name = name.to_lowercase();
                Some(if self.moderators.add(&name) {
                    info!(name = %name, "Added moderator");
                    format!("{name} is now a moderator.")
                } else {
                    format!("{name} is already a moderator.")
                })
            }
            ("remove", Some(name)) => {
                let name = name.to_lowercase();
                Some(if self.moderators.remove(&name) {
                    info!(name = %name, "Removed moderator");
                    format!("{name} is no longer a moderator.")
                } else {
                    format!("{name} is not a moderator.")
                })
            }
            _ => None,
        }
    }
}

#[async_trait]
impl CommandExecutor for ModCommand {
    async fn execute(
        &self,
        ctx: &CommandContext,
        _command: &Command,
        args: &[String],
    ) -> anyhow::Result<bool> {
        match self.apply(args) {
            Some(reply) => {
                ctx.reply(&reply)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
