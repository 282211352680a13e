//! # tmi-proto
//!
//! Protocol support for the Twitch flavour of IRC chat ("TMI").
//!
//! ## Features
//!
//! - CR-LF line framing for tokio ([`LineCodec`])
//! - IRC line parsing with tags, prefixes, commands, and parameters ([`Message`])
//! - Classification of inbound lines into the handful of events a chat bot
//!   cares about ([`Inbound`])
//! - Constructors for the outbound lines a chat bot sends ([`outbound`])
//!
//! ## Quick Start
//!
//! ```rust
//! use tmi_proto::{Inbound, Message};
//!
//! let raw = ":alice!alice@alice.tmi.twitch.tv PRIVMSG #bob :!greet world";
//! let message: Message = raw.parse().expect("valid line");
//!
//! match Inbound::classify(&message) {
//!     Inbound::Privmsg { sender, channel, text } => {
//!         assert_eq!(sender, "alice");
//!         assert_eq!(channel, "bob");
//!         assert_eq!(text, "!greet world");
//!     }
//!     other => panic!("unexpected {other:?}"),
//! }
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod error;
pub mod inbound;
pub mod line;
pub mod message;
pub mod outbound;

pub use self::error::{ProtocolError, Result};
pub use self::inbound::Inbound;
pub use self::line::LineCodec;
pub use self::message::{Message, Prefix};

/// Line terminator used on the wire.
pub const CRLF: &str = "\r\n";

/// Default maximum length of an inbound line, terminator included.
///
/// Twitch lines carry IRCv3 tags when the tags capability is negotiated,
/// which pushes them well past the 512 bytes of RFC 1459.
pub const DEFAULT_MAX_LINE_LEN: usize = 8191;
