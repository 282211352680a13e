//! One connection attempt, from TCP connect to teardown.
//!
//! ```text
//! Idle ─► Connecting ─► Authenticating ─► Joining ─► Active ─► Draining ─► Closed
//!              │               │
//!              └── error ──────┴──────────────────────────────────────────► Closed
//! ```
//!
//! Phase 1 (handshake) writes directly to the socket. Phase 2 hands the
//! write half to the [`OutboundQueue`] and runs the read loop until a stop
//! is requested or the server closes the stream. Every exit from phase 2
//! goes through the same drain path.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::{SinkExt, StreamExt};
use tmi_proto::{Inbound, LineCodec, Message, outbound};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Notify;
use tokio::time::{Duration, Instant, sleep_until, timeout};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, info, warn};

use super::ChatClient;
use super::listener::contain_async;
use super::queue::{OutboundQueue, OutboundSender};
use super::registry::CommandContext;
use crate::error::{ClientError, HandshakeError};

/// Farewell sent when the session ends in a reconnect.
const FAREWELL_RESTART: &str = "Restarting bot...";
/// Farewell sent when the session ends for good.
const FAREWELL_STOP: &str = "Stopping bot...";

/// Life-cycle state of the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No session has started yet.
    Idle,
    /// TCP connect in progress.
    Connecting,
    /// `PASS`/`NICK` sent, waiting for the end of the greeting.
    Authenticating,
    /// Greeting complete, joining the channel.
    Joining,
    /// Read loop running.
    Active,
    /// Farewell sent, waiting for the queue to flush.
    Draining,
    /// Socket released.
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Connecting => "connecting",
            SessionState::Authenticating => "authenticating",
            SessionState::Joining => "joining",
            SessionState::Active => "active",
            SessionState::Draining => "draining",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Stop and reconnect flags shared between the read loop and callers.
#[derive(Debug, Default)]
pub(crate) struct SessionControl {
    stop: AtomicBool,
    reconnect: AtomicBool,
    wake: Notify,
}

impl SessionControl {
    pub(crate) fn reset(&self) {
        self.stop.store(false, Ordering::SeqCst);
        self.reconnect.store(false, Ordering::SeqCst);
    }

    /// Ask the read loop to exit, optionally reconnecting afterwards.
    pub(crate) fn request_stop(&self, reconnect: bool) {
        self.reconnect.store(reconnect, Ordering::SeqCst);
        self.stop.store(true, Ordering::SeqCst);
        self.wake.notify_one();
    }

    /// Reconnect once the current session ends, without ending it.
    pub(crate) fn request_reconnect(&self) {
        self.reconnect.store(true, Ordering::SeqCst);
    }

    pub(crate) fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Consume a pending stop request. A stop issued after this call stays
    /// pending for the caller that checks next.
    pub(crate) fn take_stop(&self) -> bool {
        self.stop.swap(false, Ordering::SeqCst)
    }

    pub(crate) fn clear_reconnect(&self) {
        self.reconnect.store(false, Ordering::SeqCst);
    }

    /// Sleep for `delay` unless a stop is requested first.
    ///
    /// Returns false if the sleep was cut short by a stop.
    pub(crate) async fn sleep_unless_stopped(&self, delay: Duration) -> bool {
        let deadline = Instant::now() + delay;
        loop {
            if self.stop_requested() {
                return false;
            }
            tokio::select! {
                _ = sleep_until(deadline) => return !self.stop_requested(),
                // May be a permit left over from the last session; re-check
                _ = self.wake.notified() => {}
            }
        }
    }

    pub(crate) fn reconnect_requested(&self) -> bool {
        self.reconnect.load(Ordering::SeqCst)
    }
}

type LineReader = FramedRead<OwnedReadHalf, LineCodec>;
type LineWriter = FramedWrite<OwnedWriteHalf, LineCodec>;

/// Run one session. Returns whether a new session should follow.
pub(crate) async fn run(client: &ChatClient) -> Result<bool, ClientError> {
    let inner = &client.inner;
    let addr = inner.config.twitch.address();

    client.set_state(SessionState::Connecting);
    info!(addr = %addr, "Connecting");

    let stream = match timeout(
        inner.config.client.connect_timeout(),
        TcpStream::connect(&addr),
    )
    .await
    {
        Ok(Ok(stream)) => stream,
        Ok(Err(source)) => {
            client.set_state(SessionState::Closed);
            return Err(ClientError::Connect { addr, source });
        }
        Err(_) => {
            client.set_state(SessionState::Closed);
            return Err(ClientError::ConnectTimeout { addr });
        }
    };
    if let Err(e) = stream.set_nodelay(true) {
        debug!(error = %e, "Failed to set TCP_NODELAY");
    }

    let (read_half, write_half) = stream.into_split();
    let mut reader = FramedRead::new(read_half, LineCodec::new());
    let mut writer = FramedWrite::new(write_half, LineCodec::new());

    // Phase 1: handshake, written directly
    client.set_state(SessionState::Authenticating);
    if let Err(e) = handshake(client, &mut reader, &mut writer).await {
        warn!(error = %e, code = e.error_code(), "Handshake failed");
        client.set_state(SessionState::Closed);
        return Err(e);
    }
    info!("Connected");

    // Phase 2: queue-backed session
    client.set_state(SessionState::Joining);
    let mut queue = OutboundQueue::new(writer.into_inner(), inner.config.client.queue_capacity);
    let out = queue.sender();
    *inner.outbound.write() = Some(out.clone());

    info!("Requesting commands capability");
    enqueue_logged(&out, outbound::cap_req(&[outbound::COMMANDS_CAPABILITY]));
    info!(channel = %client.channel(), "Joining channel");
    enqueue_logged(&out, outbound::join(client.channel()));
    if let Err(e) = client.send_message(&inner.config.client.announce) {
        warn!(error = %e, "Failed to queue announcement");
    }

    inner.hub.on_start(client).await;
    queue.start(client.channel());
    client.set_state(SessionState::Active);
    inner.hub.connected();

    read_loop(client, &mut reader, &out).await;

    // Drain
    client.set_state(SessionState::Draining);
    let reconnect = inner.control.reconnect_requested();
    let farewell = if reconnect {
        FAREWELL_RESTART
    } else {
        FAREWELL_STOP
    };
    if let Err(e) = client.send_message(farewell) {
        warn!(error = %e, "Failed to queue farewell");
    }
    inner.hub.on_stop(client).await;

    if !queue.wait_idle(inner.config.client.drain_grace()).await {
        debug!(pending = out.pending(), "Drain grace period elapsed");
    }

    info!("Releasing resources");
    inner.outbound.write().take();
    queue.stop().await;
    drop(reader);

    client.set_state(SessionState::Closed);
    inner.hub.disconnected();
    info!(reconnect, "Disconnected");

    Ok(reconnect)
}

/// Send `PASS`/`NICK` and wait for the end of the greeting.
async fn handshake(
    client: &ChatClient,
    reader: &mut LineReader,
    writer: &mut LineWriter,
) -> Result<(), ClientError> {
    let config = &client.inner.config;

    writer.send(outbound::pass(&config.twitch.token)).await?;
    writer.send(outbound::nick(client.username())).await?;

    match timeout(config.client.handshake_timeout(), await_greeting(reader, writer)).await {
        Ok(result) => result,
        Err(_) => Err(HandshakeError::Timeout.into()),
    }
}

async fn await_greeting(reader: &mut LineReader, writer: &mut LineWriter) -> Result<(), ClientError> {
    while let Some(line) = reader.next().await {
        let line = line?;
        let message = match Message::parse(&line) {
            Ok(message) => message,
            Err(e) => {
                debug!(error = %e, "Skipping malformed line during handshake");
                continue;
            }
        };

        match Inbound::classify(&message) {
            Inbound::EndOfMotd => return Ok(()),
            Inbound::NicknameInUse(nick) => {
                return Err(HandshakeError::NicknameInUse(nick).into());
            }
            Inbound::LoginFailure(reason) => {
                info!(reason = %reason, "Couldn't connect");
                return Err(HandshakeError::LoginRejected(reason).into());
            }
            Inbound::Ping(token) => writer.send(outbound::pong(&token)).await?,
            _ => debug!(line = %line, "Handshake line"),
        }
    }

    Err(HandshakeError::ConnectionClosed.into())
}

/// Read until a stop is requested or the stream ends.
async fn read_loop(client: &ChatClient, reader: &mut LineReader, out: &OutboundSender) {
    let control = &client.inner.control;

    loop {
        if control.take_stop() {
            debug!("Stop requested");
            break;
        }

        // Callbacks run outside the select so a stop never interrupts one.
        let next = tokio::select! {
            _ = control.wake.notified() => continue,
            next = reader.next() => next,
        };

        match next {
            Some(Ok(line)) => handle_line(client, out, &line).await,
            Some(Err(e)) => {
                warn!(error = %e, "Read error");
                break;
            }
            None => {
                info!("Server closed the connection");
                if client.inner.config.client.reconnect_on_close {
                    control.request_reconnect();
                }
                break;
            }
        }
    }
}

async fn handle_line(client: &ChatClient, out: &OutboundSender, line: &str) {
    let message = match Message::parse(line) {
        Ok(message) => message,
        Err(e) => {
            debug!(error = %e, line = %line, "Skipping malformed line");
            return;
        }
    };

    match Inbound::classify(&message) {
        Inbound::Ping(token) => enqueue_logged(out, outbound::pong(&token)),
        Inbound::Reconnect => {
            info!("Received a reconnect notice");
            client.inner.control.request_reconnect();
        }
        Inbound::CapAck(caps) => info!(caps = %caps, "Capability request acknowledged"),
        Inbound::Ignored | Inbound::EndOfMotd => {}
        Inbound::Privmsg {
            sender,
            channel,
            text,
        } if channel.eq_ignore_ascii_case(client.channel()) => {
            handle_chat(client, &sender, &text).await
        }
        Inbound::Privmsg { .. }
        | Inbound::NicknameInUse(_)
        | Inbound::LoginFailure(_)
        | Inbound::Other => {
            debug!(line = %line, "Unclassified line");
        }
    }
}

/// Dispatch a chat line: self control commands, registered commands, the
/// listener's fallback, or a plain message.
async fn handle_chat(client: &ChatClient, sender: &str, text: &str) {
    let inner = &client.inner;

    let Some(args) = split_command(text, &inner.config.client.command_prefix) else {
        info!(sender, text, "Message");
        inner.hub.on_message(client, sender, text).await;
        inner.hub.message(sender, text);
        return;
    };
    let label = args[0].as_str();
    info!(sender, ?args, "Command");

    if sender.eq_ignore_ascii_case(client.username()) {
        match label {
            "restart" => {
                info!("Restart command issued");
                inner.control.request_stop(true);
                return;
            }
            "stop" => {
                info!("Stop command issued");
                inner.control.request_stop(false);
                return;
            }
            _ => {}
        }
    }

    match inner.registry.get(label) {
        Some(command) => {
            let ctx = CommandContext::new(client.clone(), sender);
            let executed = command.executor().execute(&ctx, &command, &args);
            let well_formed = contain_async("execute", executed).await.unwrap_or(true);

            if !well_formed
                && inner.config.client.reply_usage_on_failure
                && let Err(e) = client.send_message(&format!("Usage: {}", command.usage()))
            {
                warn!(error = %e, "Failed to queue usage reply");
            }
        }
        None => {
            if !inner.hub.on_command(client, sender, label, &args).await {
                info!(label, "Unknown command");
            }
        }
    }
}

/// Split a command line into `[label, args...]`, the prefix stripped from
/// the label. `None` for anything that is not a command.
fn split_command(text: &str, prefix: &str) -> Option<Vec<String>> {
    let mut tokens = text.split_whitespace();
    let label = tokens.next()?.strip_prefix(prefix)?;
    if label.is_empty() {
        return None;
    }

    let mut args = vec![label.to_string()];
    args.extend(tokens.map(str::to_string));
    Some(args)
}

fn enqueue_logged(out: &OutboundSender, line: String) {
    if let Err(e) = out.enqueue(line) {
        warn!(error = %e, code = e.error_code(), "Failed to queue line");
    }
}
