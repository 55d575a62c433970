//! Chat Ingestion
//!
//! Platform adapters that turn Twitch IRC lines and YouTube API pages
//! into one normalized [`Message`] stream.

pub mod message;
pub mod credentials;
pub mod adapter;
pub mod twitch;
pub mod youtube;

pub use message::{Message, Platform};
pub use credentials::{CredentialError, StaticToken, TokenSource};
pub use adapter::{ChatError, ChatSource, MessageBuffer, PlatformAdapter};
pub use twitch::{TwitchClient, TwitchConfig};
pub use youtube::{YoutubeAuth, YoutubeClient, YoutubeConfig};
