//! nuclearbot - Twitch chat bot
//!
//! Runs the chat client with a built-in listener that logs chat traffic.
//! Usage: `nuclearbot [config.toml]`

use std::sync::Arc;

use async_trait::async_trait;
use nuclearbot::{
    ChatClient, ClientListener, Config, ModCommand, ModeratorGate, ModeratorList, RestartCommand,
    StateListener, StopCommand,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Logs chat traffic; leaves unknown commands unhandled.
struct EchoListener;

#[async_trait]
impl ClientListener for EchoListener {
    async fn on_start(&self, client: &ChatClient) -> anyhow::Result<()> {
        info!(channel = %client.channel(), commands = ?client.commands(), "Bot started");
        Ok(())
    }

    async fn on_stop(&self, client: &ChatClient) -> anyhow::Result<()> {
        info!(channel = %client.channel(), "Bot stopping");
        Ok(())
    }

    async fn on_message(&self, _client: &ChatClient, sender: &str, text: &str) -> anyhow::Result<()> {
        info!(target: "chat", "<{sender}> {text}");
        Ok(())
    }
}

/// Logs connection state changes.
struct StateLog;

impl StateListener for StateLog {
    fn on_connected(&self) -> anyhow::Result<()> {
        info!("Connected to chat");
        Ok(())
    }

    fn on_disconnected(&self) -> anyhow::Result<()> {
        info!("Disconnected from chat");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "nuclearbot.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    info!(
        username = %config.twitch.username,
        server = %config.twitch.address(),
        "Starting nuclearbot"
    );

    let moderators = Arc::new(ModeratorList::open(&config.moderators.path)?);
    info!(count = moderators.len(), "Loaded moderators");

    let prefix = config.client.command_prefix.clone();
    let client = ChatClient::new(config, Arc::new(EchoListener));
    client.add_observer(Arc::new(StateLog))?;

    // Moderator-only commands
    client
        .register_command(
            RestartCommand::LABEL,
            &RestartCommand::usage(&prefix),
            ModeratorGate::new(Arc::clone(&moderators), RestartCommand),
        )?
        .set_description(RestartCommand::DESCRIPTION);
    client
        .register_command(
            StopCommand::LABEL,
            &StopCommand::usage(&prefix),
            ModeratorGate::new(Arc::clone(&moderators), StopCommand),
        )?
        .set_description(StopCommand::DESCRIPTION);
    client
        .register_command(
            ModCommand::LABEL,
            &ModCommand::usage(&prefix),
            ModeratorGate::new(Arc::clone(&moderators), ModCommand::new(moderators)),
        )?
        .set_description(ModCommand::DESCRIPTION);

    // Stop cleanly on Ctrl-C
    let stopper = client.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, stopping");
            stopper.stop();
        }
    });

    if let Err(e) = client.connect().await {
        error!(error = %e, code = e.error_code(), "Client exited with an error");
        return Err(e.into());
    }

    info!("Shutdown complete");
    Ok(())
}
