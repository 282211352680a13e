//! Property-based tests for line parsing.
//!
//! The read loop feeds every inbound line through the parser and the
//! classifier, so neither may panic on arbitrary input.

use proptest::prelude::*;
use tmi_proto::{Inbound, Message};

fn nickname_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z0-9_]{1,25}").expect("valid regex")
}

fn chat_text_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[^\r\n\0]{1,400}").expect("valid regex")
}

proptest! {
    #[test]
    fn parse_never_panics(line in "\\PC{0,600}") {
        if let Ok(msg) = line.parse::<Message>() {
            let _ = Inbound::classify(&msg);
        }
    }

    #[test]
    fn chat_lines_keep_sender_and_text(
        nick in nickname_strategy(),
        channel in nickname_strategy(),
        text in chat_text_strategy(),
    ) {
        prop_assume!(!text.starts_with(' ') && !text.trim().is_empty());

        let line = format!(":{nick}!{nick}@{nick}.tmi.twitch.tv PRIVMSG #{channel} :{text}");
        let msg: Message = line.parse().unwrap();

        match Inbound::classify(&msg) {
            Inbound::Privmsg { sender, channel: chan, text: body } => {
                prop_assert_eq!(sender, nick);
                prop_assert_eq!(chan, channel);
                prop_assert_eq!(body, text);
            }
            other => prop_assert!(false, "unexpected classification {:?}", other),
        }
    }
}
