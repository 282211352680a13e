//! IRC message parsing.
//!
//! Lines follow the usual IRC shape:
//!
//! ```text
//! [@tags] [:prefix] <command> [params...] [:trailing]
//! ```
//!
//! Tags are kept as the raw tag string; the bot never negotiates the tags
//! capability, but Twitch sends them anyway on some lines.

use std::fmt;
use std::str::FromStr;

use nom::{
    bytes::complete::{take_till1, take_while1},
    character::complete::{char, space0, space1},
    combinator::opt,
    error::ErrorKind,
    sequence::{preceded, terminated},
    IResult,
};
use smallvec::SmallVec;

use crate::error::ProtocolError;

/// Message source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prefix {
    /// A bare server name, e.g. `tmi.twitch.tv`.
    ServerName(String),
    /// A user prefix `nick!user@host`.
    Nickname(String, String, String),
}

impl Prefix {
    /// Split a raw prefix string into its parts.
    pub fn new_from_str(s: &str) -> Self {
        match (s.find('!'), s.find('@')) {
            (Some(bang), Some(at)) if bang < at => Prefix::Nickname(
                s[..bang].to_string(),
                s[bang + 1..at].to_string(),
                s[at + 1..].to_string(),
            ),
            (None, Some(at)) => {
                Prefix::Nickname(s[..at].to_string(), String::new(), s[at + 1..].to_string())
            }
            (Some(bang), None) => {
                Prefix::Nickname(s[..bang].to_string(), s[bang + 1..].to_string(), String::new())
            }
            _ => Prefix::ServerName(s.to_string()),
        }
    }

    /// Get the nickname if this is a user prefix.
    pub fn nick(&self) -> Option<&str> {
        match self {
            Prefix::Nickname(nick, _, _) if !nick.is_empty() => Some(nick),
            _ => None,
        }
    }

    /// Get the hostname.
    pub fn host(&self) -> Option<&str> {
        match self {
            Prefix::ServerName(name) => Some(name),
            Prefix::Nickname(_, _, host) if !host.is_empty() => Some(host),
            _ => None,
        }
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Prefix::ServerName(name) => f.write_str(name),
            Prefix::Nickname(nick, user, host) => {
                f.write_str(nick)?;
                if !user.is_empty() {
                    write!(f, "!{user}")?;
                }
                if !host.is_empty() {
                    write!(f, "@{host}")?;
                }
                Ok(())
            }
        }
    }
}

/// A parsed IRC line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Raw tag string without the leading `@`.
    pub tags: Option<String>,
    /// Message source.
    pub prefix: Option<Prefix>,
    /// Command name or three-digit numeric, as received.
    pub command: String,
    /// Parameters, trailing parameter last.
    pub params: Vec<String>,
}

impl Message {
    /// Parse a single line (terminator already stripped or not).
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.trim().is_empty() {
            return Err(ProtocolError::EmptyLine);
        }

        match parse_message(trimmed) {
            Ok((_rest, parsed)) => Ok(Self {
                tags: parsed.tags.map(str::to_string),
                prefix: parsed.prefix.map(Prefix::new_from_str),
                command: parsed.command.to_string(),
                params: parsed.params.iter().map(|p| p.to_string()).collect(),
            }),
            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(ProtocolError::Malformed {
                line: trimmed.to_string(),
                position: trimmed.len() - e.input.len(),
            }),
            Err(nom::Err::Incomplete(_)) => Err(ProtocolError::Malformed {
                line: trimmed.to_string(),
                position: trimmed.len(),
            }),
        }
    }

    /// Nickname of the sender, if the prefix is a user prefix.
    pub fn source_nick(&self) -> Option<&str> {
        self.prefix.as_ref().and_then(Prefix::nick)
    }

    /// Parameter at `index`.
    pub fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }

    /// Last parameter.
    pub fn trailing(&self) -> Option<&str> {
        self.params.last().map(String::as_str)
    }

    /// True if the command is the given three-digit numeric.
    pub fn is_numeric(&self, code: u16) -> bool {
        self.command.len() == 3 && self.command.parse::<u16>().ok() == Some(code)
    }
}

impl FromStr for Message {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Message::parse(s)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(tags) = &self.tags {
            write!(f, "@{tags} ")?;
        }
        if let Some(prefix) = &self.prefix {
            write!(f, ":{prefix} ")?;
        }
        f.write_str(&self.command)?;

        let count = self.params.len();
        for (i, param) in self.params.iter().enumerate() {
            let needs_colon =
                i + 1 == count && (param.is_empty() || param.contains(' ') || param.starts_with(':'));
            if needs_colon {
                write!(f, " :{param}")?;
            } else {
                write!(f, " {param}")?;
            }
        }
        Ok(())
    }
}

// ============================================================================
// nom parser
// ============================================================================

/// Borrowed parse result, converted to [`Message`] by the caller.
struct ParsedMessage<'a> {
    tags: Option<&'a str>,
    prefix: Option<&'a str>,
    command: &'a str,
    params: SmallVec<[&'a str; 15]>,
}

fn parse_tags(input: &str) -> IResult<&str, &str> {
    preceded(char('@'), take_till1(|c: char| c == ' '))(input)
}

fn parse_prefix(input: &str) -> IResult<&str, &str> {
    preceded(char(':'), take_till1(|c: char| c == ' '))(input)
}

/// Command name: letters, or exactly three digits.
fn parse_command(input: &str) -> IResult<&str, &str> {
    let (rest, cmd) = take_while1(|c: char| c.is_ascii_alphanumeric())(input)?;

    let is_all_letters = cmd.chars().all(|c| c.is_ascii_alphabetic());
    let is_three_digits = cmd.len() == 3 && cmd.chars().all(|c| c.is_ascii_digit());

    if is_all_letters || is_three_digits {
        Ok((rest, cmd))
    } else {
        Err(nom::Err::Error(nom::error::Error::new(
            input,
            ErrorKind::AlphaNumeric,
        )))
    }
}

/// Space-separated parameters, the trailing one introduced by `:`.
fn parse_params(input: &str) -> (&str, SmallVec<[&str; 15]>) {
    let mut params: SmallVec<[&str; 15]> = SmallVec::new();
    let mut rest = input;

    while rest.starts_with(' ') {
        rest = rest.trim_start_matches(' ');
        if rest.is_empty() {
            break;
        }

        if let Some(trailing) = rest.strip_prefix(':') {
            params.push(trailing);
            rest = "";
            break;
        }

        let end = rest.find(' ').unwrap_or(rest.len());
        params.push(&rest[..end]);
        rest = &rest[end..];
    }

    (rest, params)
}

fn parse_message(input: &str) -> IResult<&str, ParsedMessage<'_>> {
    let (input, _) = space0(input)?;
    let (input, tags) = opt(terminated(parse_tags, space1))(input)?;
    let (input, prefix) = opt(terminated(parse_prefix, space1))(input)?;
    let (input, command) = parse_command(input)?;
    let (rest, params) = parse_params(input);

    Ok((
        rest,
        ParsedMessage {
            tags,
            prefix,
            command,
            params,
        },
    ))
}
