//! Platform Adapters
//!
//! Every adapter owns a background ingestion task that pushes into a
//! [`MessageBuffer`]; the engine drains that buffer once per tick.
//! The buffer lock is the single point of contention between the two.

use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

use crate::chat::credentials::CredentialError;
use crate::chat::message::{Message, Platform};
use crate::chat::twitch::TwitchClient;
use crate::chat::youtube::YoutubeClient;

/// Adapter errors.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Socket level failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP transport failure.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Platform answered with a non-success status.
    #[error("api error: {status}: {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },

    /// Response body could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Credential provider failed.
    #[error("credentials: {0}")]
    Credentials(#[from] CredentialError),

    /// Missing or invalid construction parameter.
    #[error("misconfigured: {0}")]
    Config(String),

    /// Network operation exceeded its timeout.
    #[error("timed out")]
    Timeout,

    /// Connection closed by the remote end.
    #[error("connection closed")]
    Closed,
}

/// Thread-safe buffer of messages awaiting the next drain.
///
/// Cloning yields another handle to the same buffer.
#[derive(Clone, Debug, Default)]
pub struct MessageBuffer {
    inner: Arc<Mutex<Vec<Message>>>,
}

impl MessageBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Message>> {
        // A panicking writer cannot leave a Vec half-pushed; keep going.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append one message.
    pub fn push(&self, message: Message) {
        self.lock().push(message);
    }

    /// Take every buffered message, in arrival order.
    pub fn drain(&self) -> Vec<Message> {
        std::mem::take(&mut *self.lock())
    }

    /// Number of buffered messages.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// The ingestion capability every platform adapter provides.
pub trait ChatSource {
    /// Platform this source reads from.
    fn platform(&self) -> Platform;

    /// Drain all messages received since the last call. Never blocks
    /// on the network.
    fn fetch_messages(&self) -> Vec<Message>;

    /// Post a message to the channel. Fire-and-forget: failures are
    /// logged by the adapter.
    fn send_message(&self, text: &str);

    /// Resumable paging position, for sources that have one.
    fn page_token(&self) -> Option<String> {
        None
    }
}

/// Closed set of supported platform adapters.
pub enum PlatformAdapter {
    /// YouTube live chat poller.
    Youtube(YoutubeClient),
    /// Twitch IRC client.
    Twitch(TwitchClient),
}

impl ChatSource for PlatformAdapter {
    fn platform(&self) -> Platform {
        match self {
            PlatformAdapter::Youtube(yt) => yt.platform(),
            PlatformAdapter::Twitch(tw) => tw.platform(),
        }
    }

    fn fetch_messages(&self) -> Vec<Message> {
        match self {
            PlatformAdapter::Youtube(yt) => yt.fetch_messages(),
            PlatformAdapter::Twitch(tw) => tw.fetch_messages(),
        }
    }

    fn send_message(&self, text: &str) {
        match self {
            PlatformAdapter::Youtube(yt) => yt.send_message(text),
            PlatformAdapter::Twitch(tw) => tw.send_message(text),
        }
    }

    fn page_token(&self) -> Option<String> {
        match self {
            PlatformAdapter::Youtube(yt) => yt.page_token(),
            PlatformAdapter::Twitch(tw) => tw.page_token(),
        }
    }
}
