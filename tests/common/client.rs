//! Client-side helpers: a listener that records every callback, and a
//! config pointed at the fake server.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use nuclearbot::{ChatClient, ClientError, ClientListener, Command, Config, StateListener};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use super::server::STEP;

/// Login name used by every test client.
pub const NICK: &str = "nuclearbot";

/// Callbacks seen by a [`Recorder`], in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Load,
    Start,
    Stop,
    /// Primary listener: chat line that is not a command.
    Message { sender: String, text: String },
    /// Primary listener: fallback for an unregistered command.
    Command { sender: String, args: Vec<String> },
    Connected,
    Disconnected,
    /// Observer: chat echo.
    Echo { sender: String, text: String },
    Registered(String),
    Unregistered(String),
}

impl Event {
    #[allow(dead_code)]
    pub fn message(sender: &str, text: &str) -> Self {
        Event::Message {
            sender: sender.to_string(),
            text: text.to_string(),
        }
    }

    #[allow(dead_code)]
    pub fn echo(sender: &str, text: &str) -> Self {
        Event::Echo {
            sender: sender.to_string(),
            text: text.to_string(),
        }
    }

    fn is_echo(&self) -> bool {
        matches!(self, Event::Echo { .. })
    }
}

/// How the recorder's `on_message` misbehaves, if at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fault {
    #[default]
    None,
    Error,
    Panic,
}

/// Primary listener and observer in one; forwards every callback as an
/// [`Event`].
pub struct Recorder {
    tx: mpsc::UnboundedSender<Event>,
    handles_commands: bool,
    fault: Fault,
}

impl Recorder {
    pub fn new() -> (Arc<Self>, Events) {
        Self::with(false, Fault::None)
    }

    /// A recorder whose fallback `on_command` reports every command handled.
    #[allow(dead_code)]
    pub fn handling_commands() -> (Arc<Self>, Events) {
        Self::with(true, Fault::None)
    }

    /// A recorder whose `on_message` records, then fails with `fault`.
    #[allow(dead_code)]
    pub fn faulty(fault: Fault) -> (Arc<Self>, Events) {
        Self::with(false, fault)
    }

    fn with(handles_commands: bool, fault: Fault) -> (Arc<Self>, Events) {
        let (tx, rx) = mpsc::unbounded_channel();
        let recorder = Arc::new(Self {
            tx,
            handles_commands,
            fault,
        });
        (recorder, Events { rx })
    }

    fn record(&self, event: Event) {
        let _ = self.tx.send(event);
    }
}

#[async_trait]
impl ClientListener for Recorder {
    async fn on_load(&self, _client: &ChatClient) -> anyhow::Result<()> {
        self.record(Event::Load);
        Ok(())
    }

    async fn on_start(&self, _client: &ChatClient) -> anyhow::Result<()> {
        self.record(Event::Start);
        Ok(())
    }

    async fn on_stop(&self, _client: &ChatClient) -> anyhow::Result<()> {
        self.record(Event::Stop);
        Ok(())
    }

    async fn on_message(&self, _client: &ChatClient, sender: &str, text: &str) -> anyhow::Result<()> {
        self.record(Event::message(sender, text));
        match self.fault {
            Fault::None => Ok(()),
            Fault::Error => anyhow::bail!("listener failed on {text:?}"),
            Fault::Panic => panic!("listener panicked on {text:?}"),
        }
    }

    async fn on_command(
        &self,
        _client: &ChatClient,
        sender: &str,
        _label: &str,
        args: &[String],
    ) -> anyhow::Result<bool> {
        self.record(Event::Command {
            sender: sender.to_string(),
            args: args.to_vec(),
        });
        Ok(self.handles_commands)
    }
}

impl StateListener for Recorder {
    fn on_connected(&self) -> anyhow::Result<()> {
        self.record(Event::Connected);
        Ok(())
    }

    fn on_disconnected(&self) -> anyhow::Result<()> {
        self.record(Event::Disconnected);
        Ok(())
    }

    fn on_message(&self, sender: &str, text: &str) -> anyhow::Result<()> {
        self.record(Event::echo(sender, text));
        Ok(())
    }

    fn on_command_registered(&self, label: &str, _command: &Command) -> anyhow::Result<()> {
        self.record(Event::Registered(label.to_string()));
        Ok(())
    }

    fn on_command_unregistered(&self, label: &str) -> anyhow::Result<()> {
        self.record(Event::Unregistered(label.to_string()));
        Ok(())
    }
}

/// Receiving end of a [`Recorder`].
pub struct Events {
    rx: mpsc::UnboundedReceiver<Event>,
}

impl Events {
    pub async fn next(&mut self) -> Event {
        timeout(STEP, self.rx.recv())
            .await
            .expect("timed out waiting for a listener event")
            .expect("recorder dropped")
    }

    /// Next event that is not an observer echo.
    #[allow(dead_code)]
    pub async fn next_callback(&mut self) -> Event {
        loop {
            let event = self.next().await;
            if !event.is_echo() {
                return event;
            }
        }
    }

    /// Skip events until one equals `expected`.
    #[allow(dead_code)]
    pub async fn wait_for(&mut self, expected: &Event) {
        loop {
            if &self.next().await == expected {
                return;
            }
        }
    }

    /// Everything recorded so far, without waiting.
    #[allow(dead_code)]
    pub fn drain(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }
}

/// Config for [`NICK`] against the fake server on `port`.
pub fn test_config(port: u16) -> Config {
    let mut config = Config::new(NICK, "oauth:test");
    config.twitch.host = "127.0.0.1".to_string();
    config.twitch.port = port;
    config.client.handshake_timeout_secs = 5;
    config.client.connect_timeout_secs = 5;
    config.client.drain_grace_ms = 500;
    config
}

/// Build a client with `recorder` as both primary listener and observer.
pub fn build_client(config: Config, recorder: &Arc<Recorder>) -> ChatClient {
    let client = ChatClient::new(config, Arc::clone(recorder) as Arc<dyn ClientListener>);
    client
        .add_observer(Arc::clone(recorder) as Arc<dyn StateListener>)
        .expect("fresh client has no observers");
    client
}

/// Run [`ChatClient::connect`] in the background.
pub fn spawn_client(client: &ChatClient) -> JoinHandle<Result<(), ClientError>> {
    let client = client.clone();
    tokio::spawn(async move { client.connect().await })
}

/// Await a spawned client's result.
#[allow(dead_code)]
pub async fn join_client(handle: JoinHandle<Result<(), ClientError>>) -> Result<(), ClientError> {
    timeout(Duration::from_secs(10), handle)
        .await
        .expect("client did not exit")
        .expect("client task panicked")
}
