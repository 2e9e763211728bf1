//! Slack chat transport
//!
//! RTM session bootstrap, the websocket frame loop, and the Web API calls the
//! bot needs for requester lookups.

pub mod rtm;
pub mod web;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use rtm::RtmSession;
pub use web::{SlackProfile, SlackWebClient};

/// Frame type the bot reacts to
pub const MESSAGE_TYPE: &str = "message";

/// A frame read from or written to the RTM websocket
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub id: u64,
    #[serde(rename = "type", default)]
    pub message_type: String,
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user: String,
}

impl Message {
    /// Outbound message to a channel; the id is assigned when sent
    pub fn reply_to(channel: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: 0,
            message_type: MESSAGE_TYPE.to_string(),
            channel: channel.into(),
            text: text.into(),
            user: String::new(),
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[ID={}, Type={}, Text={}, Channel={}, User={}]",
            self.id, self.message_type, self.text, self.channel, self.user
        )
    }
}

/// `<@BOTID>`, the prefix of messages addressed to the bot
pub fn mention_prefix(bot_user_id: &str) -> String {
    format!("<@{}>", bot_user_id)
}

/// Should the bot handle this frame?
///
/// Only `message` frames that start with the bot's mention and were not
/// written by the bot itself.
pub fn is_addressed_to(msg: &Message, bot_user_id: &str) -> bool {
    msg.message_type == MESSAGE_TYPE
        && msg.user != bot_user_id
        && msg.text.starts_with(&mention_prefix(bot_user_id))
}
