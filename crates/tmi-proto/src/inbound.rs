//! Classification of inbound lines.
//!
//! The bot only reacts to a small part of the protocol. [`Inbound::classify`]
//! maps a parsed [`Message`] onto that part; everything else is
//! [`Inbound::Other`].

use crate::message::Message;

/// End of the MOTD; the last line of the server greeting.
pub const RPL_ENDOFMOTD: u16 = 376;
/// Nickname already in use.
pub const ERR_NICKNAMEINUSE: u16 = 433;

/// Commands and numerics that carry nothing the bot acts on.
const IGNORED: &[&str] = &[
    "001",
    "002",
    "003",
    "004",
    "353",
    "366",
    "372",
    "375",
    "JOIN",
    "PART",
    "ROOMSTATE",
    "USERSTATE",
    "GLOBALUSERSTATE",
];

/// What an inbound line means to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Keep-alive request carrying the token to echo back.
    Ping(String),
    /// The server asks the client to reconnect.
    Reconnect,
    /// Capability request acknowledged; carries the capability list.
    CapAck(String),
    /// Last line of the greeting; registration succeeded.
    EndOfMotd,
    /// Registration refused because the nickname is taken.
    NicknameInUse(String),
    /// Server notice addressed to `*`, sent when login fails.
    LoginFailure(String),
    /// Status line with nothing to act on.
    Ignored,
    /// Channel chat line.
    Privmsg {
        /// Nickname of the sender.
        sender: String,
        /// Channel name without the leading `#`.
        channel: String,
        /// Message text.
        text: String,
    },
    /// Anything else.
    Other,
}

impl Inbound {
    /// Classify a parsed line.
    pub fn classify(msg: &Message) -> Self {
        if msg.is_numeric(RPL_ENDOFMOTD) {
            return Inbound::EndOfMotd;
        }
        if msg.is_numeric(ERR_NICKNAMEINUSE) {
            let nick = msg.param(1).or(msg.param(0)).unwrap_or_default();
            return Inbound::NicknameInUse(nick.to_string());
        }

        match msg.command.to_ascii_uppercase().as_str() {
            "PING" => Inbound::Ping(msg.trailing().unwrap_or_default().to_string()),
            "RECONNECT" => Inbound::Reconnect,
            "CAP" if msg.param(1).is_some_and(|sub| sub.eq_ignore_ascii_case("ACK")) => {
                Inbound::CapAck(msg.param(2).unwrap_or_default().to_string())
            }
            "NOTICE" if msg.param(0) == Some("*") => {
                Inbound::LoginFailure(msg.param(1).unwrap_or_default().to_string())
            }
            "PRIVMSG" => Self::classify_privmsg(msg),
            cmd if IGNORED.contains(&cmd) => Inbound::Ignored,
            _ => Inbound::Other,
        }
    }

    fn classify_privmsg(msg: &Message) -> Self {
        let (Some(sender), Some(target), Some(text)) =
            (msg.source_nick(), msg.param(0), msg.param(1))
        else {
            return Inbound::Other;
        };

        match target.strip_prefix('#') {
            Some(channel) if !channel.is_empty() && !text.is_empty() => Inbound::Privmsg {
                sender: sender.to_string(),
                channel: channel.to_string(),
                text: text.to_string(),
            },
            _ => Inbound::Other,
        }
    }
}
