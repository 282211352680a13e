//! Command registry.
//!
//! Maps case-folded labels to [`Command`]s. Lookups clone an `Arc` out
//! under a read lock, so the read loop always dispatches against a
//! consistent snapshot while registrations happen from other tasks.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, info};

use super::ChatClient;
use super::listener::ListenerHub;
use crate::error::{QueueError, RegistryError};

/// Invocation context handed to an executor.
pub struct CommandContext {
    client: ChatClient,
    sender: String,
}

impl CommandContext {
    pub fn new(client: ChatClient, sender: impl Into<String>) -> Self {
        Self {
            client,
            sender: sender.into(),
        }
    }

    /// The client the command arrived on.
    pub fn client(&self) -> &ChatClient {
        &self.client
    }

    /// Nickname of the user who issued the command.
    pub fn sender(&self) -> &str {
        &self.sender
    }

    /// Send a chat message to the channel.
    pub fn reply(&self, text: &str) -> Result<(), QueueError> {
        self.client.send_message(text)
    }
}

/// Executes a registered command.
///
/// `args[0]` is the label as typed, without the command prefix. Returns
/// `Ok(false)` when the invocation was malformed; the client then replies
/// with the command's usage if configured to.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(
        &self,
        ctx: &CommandContext,
        command: &Command,
        args: &[String],
    ) -> anyhow::Result<bool>;
}

/// Executor backed by a plain closure. Built with [`executor_fn`].
pub struct FnExecutor<F>(F);

/// Wrap a synchronous closure as a [`CommandExecutor`].
pub fn executor_fn<F>(f: F) -> FnExecutor<F>
where
    F: Fn(&CommandContext, &[String]) -> anyhow::Result<bool> + Send + Sync,
{
    FnExecutor(f)
}

#[async_trait]
impl<F> CommandExecutor for FnExecutor<F>
where
    F: Fn(&CommandContext, &[String]) -> anyhow::Result<bool> + Send + Sync,
{
    async fn execute(
        &self,
        ctx: &CommandContext,
        _command: &Command,
        args: &[String],
    ) -> anyhow::Result<bool> {
        (self.0)(ctx, args)
    }
}

/// A registered chat command.
pub struct Command {
    label: String,
    usage: String,
    description: RwLock<String>,
    executor: Arc<dyn CommandExecutor>,
}

impl Command {
    fn new(label: &str, usage: &str, executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            label: label.to_string(),
            usage: usage.to_string(),
            description: RwLock::new(String::new()),
            executor,
        }
    }

    /// Label as originally registered (casing preserved).
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn usage(&self) -> &str {
        &self.usage
    }

    pub fn description(&self) -> String {
        self.description.read().clone()
    }

    pub fn set_description(&self, description: impl Into<String>) {
        *self.description.write() = description.into();
    }

    pub fn executor(&self) -> &Arc<dyn CommandExecutor> {
        &self.executor
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("label", &self.label)
            .field("usage", &self.usage)
            .field("description", &*self.description.read())
            .finish_non_exhaustive()
    }
}

/// Case-insensitive label → command map.
pub struct CommandRegistry {
    commands: RwLock<HashMap<String, Arc<Command>>>,
    hub: Arc<ListenerHub>,
}

impl CommandRegistry {
    pub fn new(hub: Arc<ListenerHub>) -> Self {
        Self {
            commands: RwLock::new(HashMap::new()),
            hub,
        }
    }

    /// Register a command. Fails if the label (in any casing) is taken.
    pub fn register<E>(
        &self,
        label: &str,
        usage: &str,
        executor: E,
    ) -> Result<Arc<Command>, RegistryError>
    where
        E: CommandExecutor + 'static,
    {
        let key = normalize(label)?;
        let command = Arc::new(Command::new(label, usage, Arc::new(executor)));

        {
            let mut commands = self.commands.write();
            if commands.contains_key(&key) {
                return Err(RegistryError::DuplicateCommand(label.to_string()));
            }
            commands.insert(key, Arc::clone(&command));
        }

        info!(label, "Registered command");
        self.hub.command_registered(command.label(), &command);
        Ok(command)
    }

    /// Remove a command. Fails if no such label is registered.
    pub fn unregister(&self, label: &str) -> Result<(), RegistryError> {
        let removed = self.commands.write().remove(&label.to_lowercase());
        let Some(command) = removed else {
            return Err(RegistryError::UnknownCommand(label.to_string()));
        };

        info!(label = command.label(), "Unregistered command");
        self.hub.command_unregistered(command.label());
        Ok(())
    }

    /// Remove every command, notifying once per label.
    pub fn unregister_all(&self) {
        let removed: Vec<Arc<Command>> = self.commands.write().drain().map(|(_, c)| c).collect();

        debug!(count = removed.len(), "Unregistered all commands");
        for command in &removed {
            self.hub.command_unregistered(command.label());
        }
    }

    pub fn is_registered(&self, label: &str) -> bool {
        self.commands.read().contains_key(&label.to_lowercase())
    }

    pub fn get(&self, label: &str) -> Option<Arc<Command>> {
        self.commands.read().get(&label.to_lowercase()).cloned()
    }

    /// Registered labels, sorted case-insensitively.
    pub fn labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self
            .commands
            .read()
            .values()
            .map(|c| c.label().to_string())
            .collect();
        labels.sort_by_key(|l| l.to_lowercase());
        labels
    }

    pub fn len(&self) -> usize {
        self.commands.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.read().is_empty()
    }
}

/// Case-fold a label, rejecting empty or whitespace-containing ones.
fn normalize(label: &str) -> Result<String, RegistryError> {
    if label.is_empty() || label.chars().any(char::is_whitespace) {
        return Err(RegistryError::InvalidLabel(label.to_string()));
    }
    Ok(label.to_lowercase())
}
