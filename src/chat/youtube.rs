//! YouTube Live Chat Adapter
//!
//! Polls the YouTube Data API for live chat messages. Paging resumes from
//! an opaque continuation token which is handed in at construction and
//! read back by the autosave, so a restart picks up where it left off.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::chat::adapter::{ChatError, ChatSource, MessageBuffer};
use crate::chat::credentials::TokenSource;
use crate::chat::message::{Message, Platform};

/// YouTube Data API v3 base URL.
pub const YOUTUBE_API_BASE: &str = "https://www.googleapis.com/youtube/v3";

/// YouTube adapter configuration.
#[derive(Debug, Clone)]
pub struct YoutubeConfig {
    /// API base URL.
    pub api_base: String,
    /// Video id of the live stream.
    pub live_id: String,
    /// Minimum time between polls, whatever the server asks for.
    pub poll_floor: Duration,
    /// Wait after a failed poll.
    pub error_interval: Duration,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// Message posted once the chat is resolved.
    pub welcome: Option<String>,
}

impl Default for YoutubeConfig {
    fn default() -> Self {
        Self {
            api_base: YOUTUBE_API_BASE.to_string(),
            live_id: String::new(),
            poll_floor: Duration::from_secs(3),
            error_interval: Duration::from_secs(10),
            request_timeout: Duration::from_secs(15),
            welcome: Some("LiveQuest on!".to_string()),
        }
    }
}

/// How requests are authorized.
#[derive(Clone)]
pub enum YoutubeAuth {
    /// Read-only access with an API key. Sending messages will fail.
    ApiKey(String),
    /// OAuth bearer token from an external provider.
    Token(Arc<dyn TokenSource>),
}

// =============================================================================
// API TYPES
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    #[serde(default)]
    live_streaming_details: Option<LiveStreamingDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LiveStreamingDetails {
    #[serde(default)]
    active_live_chat_id: Option<String>,
}

/// One page of live chat messages.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveChatMessageList {
    /// Token for the next page.
    #[serde(default)]
    pub next_page_token: String,
    /// Server requested polling interval.
    #[serde(default)]
    pub polling_interval_millis: u64,
    /// Messages on this page, decoded one by one so a bad item only
    /// costs itself.
    #[serde(default)]
    pub items: Vec<serde_json::Value>,
}

/// A live chat message resource.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveChatMessage {
    /// Message content.
    pub snippet: LiveChatSnippet,
    /// Message author.
    pub author_details: AuthorDetails,
}

/// Snippet part of a live chat message.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveChatSnippet {
    /// RFC 3339 publish time.
    #[serde(default)]
    pub published_at: String,
    /// Rendered message text.
    #[serde(default)]
    pub display_message: String,
}

/// Author part of a live chat message.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorDetails {
    /// Author channel id, stable per viewer.
    pub channel_id: String,
    /// Author display name.
    #[serde(default)]
    pub display_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InsertMessage<'a> {
    snippet: InsertSnippet<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InsertSnippet<'a> {
    live_chat_id: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
    text_message_details: TextMessageDetails<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TextMessageDetails<'a> {
    message_text: &'a str,
}

/// Convert one page into normalized messages, preserving order.
/// Items that do not decode are logged and skipped.
pub fn page_to_messages(page: &LiveChatMessageList) -> Vec<Message> {
    page.items
        .iter()
        .filter_map(|raw| match LiveChatMessage::deserialize(raw) {
            Ok(item) => Some(item_to_message(item)),
            Err(e) => {
                warn!(err = %e, "youtube: skipping malformed chat item");
                None
            }
        })
        .collect()
}

fn item_to_message(item: LiveChatMessage) -> Message {
    let timestamp = match DateTime::parse_from_rfc3339(&item.snippet.published_at) {
        Ok(ts) => ts.with_timezone(&Utc),
        Err(e) => {
            warn!(published_at = %item.snippet.published_at, err = %e, "youtube: unable to parse timestamp");
            Utc::now()
        }
    };
    Message {
        uid: item.author_details.channel_id,
        author: item.author_details.display_name,
        text: item.snippet.display_message,
        timestamp,
        platform: Platform::Youtube,
    }
}

/// Time to wait before the next poll.
pub fn next_poll_delay(polling_interval_millis: u64, floor: Duration) -> Duration {
    Duration::from_millis(polling_interval_millis).max(floor)
}

// =============================================================================
// HTTP CLIENT
// =============================================================================

struct YoutubeApi {
    http: reqwest::Client,
    base: String,
    auth: YoutubeAuth,
}

impl YoutubeApi {
    fn authorize(&self, req: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder, ChatError> {
        Ok(match &self.auth {
            YoutubeAuth::ApiKey(key) => req.query(&[("key", key.as_str())]),
            YoutubeAuth::Token(tokens) => req.bearer_auth(tokens.token()?),
        })
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<reqwest::Response, ChatError> {
        let resp = self.authorize(req)?.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ChatError::Api { status: status.as_u16(), body });
        }
        Ok(resp)
    }

    async fn live_chat_id(&self, live_id: &str) -> Result<Option<String>, ChatError> {
        let req = self.http
            .get(format!("{}/videos", self.base))
            .query(&[("part", "liveStreamingDetails"), ("id", live_id)]);
        let body = self.send(req).await?.text().await?;
        let videos: VideoListResponse = serde_json::from_str(&body)?;

        Ok(videos.items
            .into_iter()
            .filter_map(|v| v.live_streaming_details)
            .find_map(|d| d.active_live_chat_id))
    }

    async fn list_messages(&self, chat_id: &str, page_token: &str) -> Result<LiveChatMessageList, ChatError> {
        let mut req = self.http
            .get(format!("{}/liveChat/messages", self.base))
            .query(&[("liveChatId", chat_id), ("part", "snippet,authorDetails")]);
        if !page_token.is_empty() {
            req = req.query(&[("pageToken", page_token)]);
        }
        let body = self.send(req).await?.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn insert_message(&self, chat_id: &str, text: &str) -> Result<(), ChatError> {
        let payload = InsertMessage {
            snippet: InsertSnippet {
                live_chat_id: chat_id,
                kind: "textMessageEvent",
                text_message_details: TextMessageDetails { message_text: text },
            },
        };
        let req = self.http
            .post(format!("{}/liveChat/messages", self.base))
            .query(&[("part", "snippet")])
            .json(&payload);
        self.send(req).await?;
        Ok(())
    }
}

// =============================================================================
// CLIENT
// =============================================================================

/// YouTube live chat client.
///
/// Dropping the client stops its polling task.
pub struct YoutubeClient {
    buffer: MessageBuffer,
    page_token: Arc<Mutex<String>>,
    outbox: mpsc::UnboundedSender<String>,
    task: JoinHandle<()>,
}

impl YoutubeClient {
    /// Start the polling task, resuming from `page_token`. Must be called
    /// from within a tokio runtime.
    pub fn spawn(config: YoutubeConfig, auth: YoutubeAuth, page_token: String) -> Result<Self, ChatError> {
        if config.live_id.trim().is_empty() {
            return Err(ChatError::Config("youtube: missing live stream id".to_string()));
        }
        if let YoutubeAuth::Token(tokens) = &auth {
            tokens.token()?;
        }

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("live-quest/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let api = YoutubeApi { http, base: config.api_base.clone(), auth };

        info!(live_id = %config.live_id, page_token = %page_token, "youtube: starting poller");

        let buffer = MessageBuffer::new();
        let page_token = Arc::new(Mutex::new(page_token));
        let (outbox, outbox_rx) = mpsc::unbounded_channel();
        if let Some(welcome) = &config.welcome {
            let _ = outbox.send(welcome.clone());
        }

        let task = tokio::spawn(run_poller(
            api,
            config,
            buffer.clone(),
            page_token.clone(),
            outbox_rx,
        ));

        Ok(Self { buffer, page_token, outbox, task })
    }

    /// Continuation token for the next page.
    pub fn next_page_token(&self) -> String {
        self.page_token
            .lock()
            .map(|t| t.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

impl ChatSource for YoutubeClient {
    fn platform(&self) -> Platform {
        Platform::Youtube
    }

    fn fetch_messages(&self) -> Vec<Message> {
        self.buffer.drain()
    }

    fn send_message(&self, text: &str) {
        if self.outbox.send(text.to_string()).is_err() {
            warn!("youtube: polling task gone, message dropped");
        }
    }

    fn page_token(&self) -> Option<String> {
        Some(self.next_page_token())
    }
}

impl Drop for YoutubeClient {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Poll, then wait out the interval while delivering outgoing messages.
async fn run_poller(
    api: YoutubeApi,
    config: YoutubeConfig,
    buffer: MessageBuffer,
    page_token: Arc<Mutex<String>>,
    mut outbox_rx: mpsc::UnboundedReceiver<String>,
) {
    let mut chat_id: Option<String> = None;

    loop {
        let wait = match poll_once(&api, &config.live_id, &mut chat_id, &buffer, &page_token).await {
            Ok(interval_ms) => next_poll_delay(interval_ms, config.poll_floor),
            Err(e) => {
                warn!(err = %e, "youtube: error loading messages");
                config.error_interval
            }
        };

        let deadline = tokio::time::sleep(wait);
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                _ = &mut deadline => break,
                Some(text) = outbox_rx.recv() => {
                    match &chat_id {
                        Some(id) => {
                            if let Err(e) = api.insert_message(id, &text).await {
                                warn!(err = %e, "youtube: error sending message");
                            }
                        }
                        None => warn!("youtube: chat not resolved yet, message dropped"),
                    }
                }
            }
        }
        debug!("youtube: waiting for messages");
    }
}

/// One poll. Returns the server requested interval in milliseconds.
async fn poll_once(
    api: &YoutubeApi,
    live_id: &str,
    chat_id: &mut Option<String>,
    buffer: &MessageBuffer,
    page_token: &Mutex<String>,
) -> Result<u64, ChatError> {
    let id = match chat_id {
        Some(id) => id.clone(),
        None => {
            info!(live_id = %live_id, "youtube: loading chat id");
            let id = api.live_chat_id(live_id).await?
                .ok_or_else(|| ChatError::Config(format!("youtube: no active chat for {}", live_id)))?;
            info!(chat_id = %id, "youtube: chat resolved");
            *chat_id = Some(id.clone());
            id
        }
    };

    let token = page_token.lock().map(|t| t.clone()).unwrap_or_default();
    let page = api.list_messages(&id, &token).await?;

    let messages = page_to_messages(&page);
    debug!(count = messages.len(), "youtube: new messages");
    for message in messages {
        buffer.push(message);
    }

    if let Ok(mut t) = page_token.lock() {
        *t = page.next_page_token.clone();
    }
    Ok(page.polling_interval_millis)
}
