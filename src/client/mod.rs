//! The chat client engine.
//!
//! - [`queue`]: bounded outbound line queue and its writer task
//! - [`registry`]: command registry and executor contract
//! - [`listener`]: listener contracts and fault-contained fan-out
//! - [`session`]: one connection attempt (handshake, read loop, drain)
//! - [`builtin`]: commands shipped with the client

pub mod builtin;
pub mod listener;
pub mod queue;
pub mod registry;
mod session;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use tmi_proto::outbound;
use tracing::{Instrument, info, info_span, warn};

use crate::config::Config;
use crate::error::{ClientError, HubError, QueueError, RegistryError};
use listener::{ClientListener, ListenerHub, StateListener};
use queue::OutboundSender;
use registry::{Command, CommandExecutor, CommandRegistry};
use session::SessionControl;

pub use session::SessionState;

struct Inner {
    config: Config,
    /// Lower-cased login name; also the channel name.
    identity: String,
    hub: Arc<ListenerHub>,
    registry: CommandRegistry,
    control: SessionControl,
    state: RwLock<SessionState>,
    /// Producer handle of the active session's queue.
    outbound: RwLock<Option<OutboundSender>>,
    running: AtomicBool,
}

/// Persistent chat client.
///
/// Cheap to clone; clones share the same engine. The primary listener is
/// bound here for the life of the client.
#[derive(Clone)]
pub struct ChatClient {
    inner: Arc<Inner>,
}

impl ChatClient {
    /// Build a client. Registers the built-in `help` command unless
    /// `client.help_command` is off.
    pub fn new(config: Config, listener: Arc<dyn ClientListener>) -> Self {
        let identity = config.twitch.identity();
        let hub = Arc::new(ListenerHub::new(listener));
        let registry = CommandRegistry::new(Arc::clone(&hub));

        if config.client.help_command
            && let Err(e) = builtin::register_help(&registry, &config.client.command_prefix)
        {
            warn!(error = %e, "Failed to register help command");
        }

        Self {
            inner: Arc::new(Inner {
                config,
                identity,
                hub,
                registry,
                control: SessionControl::default(),
                state: RwLock::new(SessionState::Idle),
                outbound: RwLock::new(None),
                running: AtomicBool::new(false),
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Login name, lower-cased.
    pub fn username(&self) -> &str {
        &self.inner.identity
    }

    /// Joined channel, without the `#`.
    pub fn channel(&self) -> &str {
        &self.inner.identity
    }

    pub fn state(&self) -> SessionState {
        *self.inner.state.read()
    }

    /// True while [`connect`](Self::connect) is running.
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    fn set_state(&self, state: SessionState) {
        *self.inner.state.write() = state;
        tracing::debug!(%state, "Session state");
    }

    // ========================================================================
    // Commands
    // ========================================================================

    pub fn register_command<E>(
        &self,
        label: &str,
        usage: &str,
        executor: E,
    ) -> Result<Arc<Command>, RegistryError>
    where
        E: CommandExecutor + 'static,
    {
        self.inner.registry.register(label, usage, executor)
    }

    pub fn unregister_command(&self, label: &str) -> Result<(), RegistryError> {
        self.inner.registry.unregister(label)
    }

    /// Remove every command, built-ins included.
    pub fn unregister_all_commands(&self) {
        self.inner.registry.unregister_all();
    }

    pub fn is_command_registered(&self, label: &str) -> bool {
        self.inner.registry.is_registered(label)
    }

    pub fn get_command(&self, label: &str) -> Option<Arc<Command>> {
        self.inner.registry.get(label)
    }

    /// Registered command labels, sorted.
    pub fn commands(&self) -> Vec<String> {
        self.inner.registry.labels()
    }

    // ========================================================================
    // Observers
    // ========================================================================

    pub fn add_observer(&self, observer: Arc<dyn StateListener>) -> Result<(), HubError> {
        self.inner.hub.add_observer(observer)
    }

    pub fn remove_observer(&self, observer: &Arc<dyn StateListener>) -> Result<(), HubError> {
        self.inner.hub.remove_observer(observer)
    }

    pub fn clear_observers(&self) {
        self.inner.hub.clear_observers();
        info!("Cleared all observers");
    }

    // ========================================================================
    // Output
    // ========================================================================

    /// Send a chat message to the channel.
    ///
    /// Observers see the message through
    /// [`StateListener::on_message`] once it is queued.
    pub fn send_message(&self, text: &str) -> Result<(), QueueError> {
        self.send_raw(outbound::privmsg(self.channel(), text))?;
        self.inner.hub.message(self.username(), text);
        Ok(())
    }

    /// Queue a raw protocol line (no terminator).
    ///
    /// Fails with [`QueueError::Closed`] outside an active session.
    pub fn send_raw(&self, line: impl Into<String>) -> Result<(), QueueError> {
        let sender = self.inner.outbound.read().clone();
        match sender {
            Some(sender) => sender.enqueue(line),
            None => Err(QueueError::Closed),
        }
    }

    // ========================================================================
    // Life cycle
    // ========================================================================

    /// Connect and run sessions until one ends without a reconnect request.
    ///
    /// Returns `Ok` after a clean stop. Connect and handshake failures end
    /// the loop with an error and are not retried.
    pub async fn connect(&self) -> Result<(), ClientError> {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            return Err(ClientError::AlreadyRunning);
        }
        let _running = RunningGuard(&self.inner.running);

        self.inner.control.reset();
        self.inner.hub.on_load(self).await;

        let mut attempt: u64 = 0;
        loop {
            attempt += 1;
            let span = info_span!("session", attempt, channel = %self.channel());
            let reconnect = session::run(self).instrument(span).await?;
            if !reconnect {
                break;
            }

            // The read loop consumed the stop that ended the session. A
            // restart pending since is this reconnect; a stop cancels it.
            let control = &self.inner.control;
            if control.reconnect_requested() {
                control.take_stop();
            }
            control.clear_reconnect();
            let delay = self.inner.config.client.reconnect_delay();
            info!(attempt, delay_ms = delay.as_millis() as u64, "Reconnecting");
            if !control.sleep_unless_stopped(delay).await {
                info!("Stop requested while waiting to reconnect");
                break;
            }
        }

        info!("Exiting client loop");
        Ok(())
    }

    /// Leave the channel for good once the current callback returns.
    pub fn stop(&self) {
        info!("Stop requested");
        self.inner.control.request_stop(false);
    }

    /// End the current session and start a new one.
    pub fn restart(&self) {
        info!("Restart requested");
        self.inner.control.request_stop(true);
    }
}

/// Clears the running flag when `connect` returns.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use registry::executor_fn;

    struct Quiet;

    #[async_trait]
    impl ClientListener for Quiet {}

    #[derive(Default)]
    struct Echo(Mutex<Vec<(String, String)>>);

    impl StateListener for Echo {
        fn on_message(&self, sender: &str, text: &str) -> anyhow::Result<()> {
            self.0.lock().push((sender.to_string(), text.to_string()));
            Ok(())
        }
    }

    fn client() -> ChatClient {
        ChatClient::new(Config::new("NuclearBot", "oauth:x"), Arc::new(Quiet))
    }

    #[test]
    fn identity_is_lowercased() {
        let client = client();
        assert_eq!(client.username(), "nuclearbot");
        assert_eq!(client.channel(), "nuclearbot");
        assert_eq!(client.state(), SessionState::Idle);
        assert!(!client.is_running());
    }

    #[test]
    fn help_is_registered_by_default() {
        assert!(client().is_command_registered("help"));

        let mut config = Config::new("bot", "oauth:x");
        config.client.help_command = false;
        let client = ChatClient::new(config, Arc::new(Quiet));
        assert!(!client.is_command_registered("help"));
    }

    #[test]
    fn register_through_client() {
        let client = client();
        client
            .register_command("Foo", "!foo", executor_fn(|_, _| Ok(true)))
            .unwrap();

        assert!(client.is_command_registered("foo"));
        assert_eq!(client.commands(), vec!["Foo", "help"]);

        client.unregister_all_commands();
        assert!(client.commands().is_empty());
    }

    #[test]
    fn send_without_session_is_closed_and_not_echoed() {
        let client = client();
        let echo = Arc::new(Echo::default());
        client.add_observer(echo.clone()).unwrap();

        assert_eq!(client.send_message("hi"), Err(QueueError::Closed));
        assert_eq!(client.send_raw("PING :x"), Err(QueueError::Closed));
        assert!(echo.0.lock().is_empty());
    }

    #[test]
    fn observer_registration_round_trip() {
        let client = client();
        let echo: Arc<dyn StateListener> = Arc::new(Echo::default());

        client.add_observer(Arc::clone(&echo)).unwrap();
        assert_eq!(
            client.add_observer(Arc::clone(&echo)),
            Err(HubError::AlreadyRegistered)
        );
        client.remove_observer(&echo).unwrap();
        assert_eq!(client.remove_observer(&echo), Err(HubError::NotRegistered));
    }

    #[tokio::test]
    async fn connect_failure_is_reported() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut config = Config::new("bot", "oauth:x");
        config.twitch.host = "127.0.0.1".to_string();
        config.twitch.port = port;
        let client = ChatClient::new(config, Arc::new(Quiet));

        let err = client.connect().await.unwrap_err();
        assert!(matches!(err, ClientError::Connect { .. }));
        assert_eq!(client.state(), SessionState::Closed);
        assert!(!client.is_running());
    }
}
