//! Chat Message Model
//!
//! The normalized event every platform adapter produces.

use std::fmt;
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

/// Source platform of a chat message.
///
/// Declaration order is the order in which the engine drains adapters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Platform {
    /// Polling-based video platform.
    Youtube,
    /// IRC-based chat platform.
    Twitch,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Youtube => f.write_str("Youtube"),
            Platform::Twitch => f.write_str("Twitch"),
        }
    }
}

/// A viewer message, common to all supported platforms.
///
/// Field names are camelCase on the wire because the chat overlay
/// reads `chatHistory` straight out of the snapshot file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Platform dependent author identity. Not unique across platforms.
    pub uid: String,
    /// Display name of the author, as provided by the platform.
    pub author: String,
    /// Display text of the message.
    pub text: String,
    /// When the message was published (or received, if unknown).
    pub timestamp: DateTime<Utc>,
    /// Source platform.
    pub platform: Platform,
}

impl Message {
    /// Create a message stamped with the current time.
    pub fn new(
        platform: Platform,
        uid: impl Into<String>,
        author: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            uid: uid.into(),
            author: author.into(),
            text: text.into(),
            timestamp: Utc::now(),
            platform,
        }
    }
}
