//! Constructors for the lines the client sends.
//!
//! Lines are returned without terminator; [`LineCodec`](crate::LineCodec)
//! appends CR-LF when writing.

/// Capability that enables `RECONNECT` notices and room state lines.
pub const COMMANDS_CAPABILITY: &str = "twitch.tv/commands";

/// `PASS <token>`
pub fn pass(token: &str) -> String {
    format!("PASS {token}")
}

/// `NICK <nick>`
pub fn nick(nick: &str) -> String {
    format!("NICK {nick}")
}

/// `JOIN #<channel>`
pub fn join(channel: &str) -> String {
    format!("JOIN #{}", channel.trim_start_matches('#'))
}

/// `PONG :<token>`
pub fn pong(token: &str) -> String {
    format!("PONG :{token}")
}

/// `PRIVMSG #<channel> :<text>`
pub fn privmsg(channel: &str, text: &str) -> String {
    format!("PRIVMSG #{} :{text}", channel.trim_start_matches('#'))
}

/// `CAP REQ :<caps...>`
pub fn cap_req<S: AsRef<str>>(caps: &[S]) -> String {
    let list: Vec<&str> = caps.iter().map(AsRef::as_ref).collect();
    format!("CAP REQ :{}", list.join(" "))
}
