//! Twitch IRC Adapter
//!
//! Keeps one IRC connection open, answers keep-alive pings and turns
//! `PRIVMSG` lines into [`Message`]s. The connection is re-established
//! after EOF, read errors or a stalled read.

use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::chat::adapter::{ChatError, ChatSource, MessageBuffer};
use crate::chat::credentials::TokenSource;
use crate::chat::message::{Message, Platform};

/// Public Twitch chat endpoint (plain text IRC).
pub const TWITCH_IRC_ADDR: &str = "irc.chat.twitch.tv:6667";

/// Twitch adapter configuration.
#[derive(Debug, Clone)]
pub struct TwitchConfig {
    /// IRC server address.
    pub addr: String,
    /// Channel to join (without `#`).
    pub channel: String,
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// A read stalled for this long forces a reconnect.
    pub read_timeout: Duration,
    /// Delay before reconnecting.
    pub reconnect_delay: Duration,
    /// Message posted after joining.
    pub welcome: Option<String>,
}

impl Default for TwitchConfig {
    fn default() -> Self {
        Self {
            addr: TWITCH_IRC_ADDR.to_string(),
            channel: String::new(),
            connect_timeout: Duration::from_secs(10),
            // Twitch pings roughly every 5 minutes
            read_timeout: Duration::from_secs(600),
            reconnect_delay: Duration::from_secs(5),
            welcome: Some("LiveQuest on!".to_string()),
        }
    }
}

/// One parsed IRC line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IrcLine {
    /// Keep-alive; the payload must be echoed in the `PONG`.
    Ping(String),
    /// Channel chat message.
    PrivMsg {
        /// Full prefix, used as the platform uid.
        uid: String,
        /// Nick of the sender.
        author: String,
        /// Target channel.
        channel: String,
        /// Message text without the leading colon.
        text: String,
    },
    /// Well-formed line we have no use for.
    Ignored,
    /// Too few fields to be a command line.
    Malformed,
}

/// Split off the next whitespace separated token.
fn next_token(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    if s.is_empty() {
        return None;
    }
    match s.find(char::is_whitespace) {
        Some(i) => Some((&s[..i], &s[i..])),
        None => Some((s, "")),
    }
}

/// Extract the nick from a `:nick!user@host` prefix.
fn parse_author(prefix: &str) -> String {
    let nick = prefix.split('!').next().unwrap_or(prefix);
    nick.replace(':', "")
}

/// Parse one raw IRC line.
///
/// ```
/// use live_quest::chat::twitch::{parse_line, IrcLine};
///
/// let line = ":foo!foo@foo.tmi.twitch.tv PRIVMSG #bar :bleedPurple";
/// match parse_line(line) {
///     IrcLine::PrivMsg { author, text, .. } => {
///         assert_eq!(author, "foo");
///         assert_eq!(text, "bleedPurple");
///     }
///     other => panic!("unexpected {:?}", other),
/// }
/// ```
pub fn parse_line(line: &str) -> IrcLine {
    let line = line.trim_end_matches(['\r', '\n']);

    let Some((first, rest)) = next_token(line) else {
        return IrcLine::Malformed;
    };
    if first == "PING" {
        return IrcLine::Ping(rest.trim().to_string());
    }

    let Some((command, rest)) = next_token(rest) else {
        return IrcLine::Malformed;
    };
    let Some((channel, rest)) = next_token(rest) else {
        return IrcLine::Malformed;
    };
    let rest = rest.trim_start();
    if rest.is_empty() {
        return IrcLine::Malformed;
    }

    match command {
        "PRIVMSG" => IrcLine::PrivMsg {
            uid: first.to_string(),
            author: parse_author(first),
            channel: channel.to_string(),
            text: rest.strip_prefix(':').unwrap_or(rest).to_string(),
        },
        _ => IrcLine::Ignored,
    }
}

/// Format the reply to a `PING`.
fn pong(payload: &str) -> String {
    if payload.is_empty() {
        "PONG".to_string()
    } else {
        format!("PONG {}", payload)
    }
}

/// Twitch chat client.
///
/// Dropping the client stops its connection task.
pub struct TwitchClient {
    channel: String,
    buffer: MessageBuffer,
    outbox: mpsc::UnboundedSender<String>,
    task: JoinHandle<()>,
}

impl TwitchClient {
    /// Start the connection task. Must be called from within a tokio runtime.
    ///
    /// Fails fast when the channel is missing or no token can be
    /// obtained, so a misconfigured adapter is never constructed.
    pub fn spawn(config: TwitchConfig, tokens: Arc<dyn TokenSource>) -> Result<Self, ChatError> {
        if config.channel.trim().is_empty() {
            return Err(ChatError::Config("twitch: no channel informed".to_string()));
        }
        tokens.token()?;

        let buffer = MessageBuffer::new();
        let (outbox, outbox_rx) = mpsc::unbounded_channel();
        let channel = config.channel.clone();

        info!(addr = %config.addr, channel = %config.channel, "twitch: starting IRC client");
        let task = tokio::spawn(run_connection(
            config,
            tokens,
            buffer.clone(),
            outbox.clone(),
            outbox_rx,
        ));

        Ok(Self { channel, buffer, outbox, task })
    }

    /// Joined channel.
    pub fn channel(&self) -> &str {
        &self.channel
    }
}

impl ChatSource for TwitchClient {
    fn platform(&self) -> Platform {
        Platform::Twitch
    }

    fn fetch_messages(&self) -> Vec<Message> {
        self.buffer.drain()
    }

    fn send_message(&self, text: &str) {
        let line = format!("PRIVMSG #{} :{}", self.channel, text);
        if self.outbox.send(line).is_err() {
            warn!("twitch: connection task gone, message dropped");
        }
    }
}

impl Drop for TwitchClient {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Reconnect loop.
async fn run_connection(
    config: TwitchConfig,
    tokens: Arc<dyn TokenSource>,
    buffer: MessageBuffer,
    outbox: mpsc::UnboundedSender<String>,
    mut outbox_rx: mpsc::UnboundedReceiver<String>,
) {
    loop {
        match run_session(&config, tokens.as_ref(), &buffer, &outbox, &mut outbox_rx).await {
            Ok(()) => info!("twitch: session ended"),
            Err(e) => warn!(err = %e, "twitch: connection lost"),
        }
        tokio::time::sleep(config.reconnect_delay).await;
        info!(addr = %config.addr, "twitch: reconnecting");
    }
}

/// One connected session: handshake, then read and write until either side fails.
async fn run_session(
    config: &TwitchConfig,
    tokens: &dyn TokenSource,
    buffer: &MessageBuffer,
    outbox: &mpsc::UnboundedSender<String>,
    outbox_rx: &mut mpsc::UnboundedReceiver<String>,
) -> Result<(), ChatError> {
    let stream = timeout(config.connect_timeout, TcpStream::connect(&config.addr))
        .await
        .map_err(|_| ChatError::Timeout)??;
    debug!("twitch: tcp connection established");

    let (rd, mut wr) = stream.into_split();

    let token = tokens.token()?;
    debug!(len = token.len(), "twitch: authenticating");
    write_line(&mut wr, &format!("PASS oauth:{}", token)).await?;
    write_line(&mut wr, &format!("NICK {}", config.channel.to_lowercase())).await?;
    write_line(&mut wr, &format!("JOIN #{}", config.channel)).await?;
    if let Some(welcome) = &config.welcome {
        write_line(&mut wr, &format!("PRIVMSG #{} :{}", config.channel, welcome)).await?;
    }

    let reader = read_loop(rd, config.read_timeout, buffer, outbox);
    let writer = async {
        while let Some(line) = outbox_rx.recv().await {
            write_line(&mut wr, &line).await?;
        }
        Ok::<(), ChatError>(())
    };

    tokio::select! {
        res = reader => res,
        res = writer => res,
    }
}

/// Longest line kept; longer lines are dropped whole.
const MAX_LINE_LEN: usize = 8 * 1024;

/// One line off the wire.
#[derive(Debug, PartialEq, Eq)]
enum RawLine {
    /// A complete line, invalid UTF-8 replaced.
    Line(String),
    /// A line over [`MAX_LINE_LEN`], already skipped.
    TooLong,
    /// Peer closed the connection.
    Eof,
}

/// Read up to the next `\n` without failing on bad bytes.
async fn next_line<R: AsyncBufRead + Unpin>(rd: &mut R, line: &mut Vec<u8>) -> std::io::Result<RawLine> {
    line.clear();
    let mut overflow = false;
    loop {
        let available = rd.fill_buf().await?;
        if available.is_empty() {
            return Ok(RawLine::Eof);
        }
        let (used, done) = match available.iter().position(|&b| b == b'\n') {
            Some(i) => (i + 1, true),
            None => (available.len(), false),
        };
        if !overflow {
            if line.len() + used > MAX_LINE_LEN {
                overflow = true;
                line.clear();
            } else {
                line.extend_from_slice(&available[..used]);
            }
        }
        rd.consume(used);

        if done {
            if overflow {
                return Ok(RawLine::TooLong);
            }
            return Ok(RawLine::Line(String::from_utf8_lossy(line).into_owned()));
        }
    }
}

async fn read_loop(
    rd: tokio::net::tcp::OwnedReadHalf,
    read_timeout: Duration,
    buffer: &MessageBuffer,
    outbox: &mpsc::UnboundedSender<String>,
) -> Result<(), ChatError> {
    let mut rd = BufReader::new(rd);
    let mut raw = Vec::new();

    loop {
        let next = timeout(read_timeout, next_line(&mut rd, &mut raw))
            .await
            .map_err(|_| ChatError::Timeout)??;
        let line = match next {
            RawLine::Line(line) => line,
            RawLine::TooLong => {
                debug!(max = MAX_LINE_LEN, "twitch: oversized line discarded");
                continue;
            }
            RawLine::Eof => return Err(ChatError::Closed),
        };

        match parse_line(&line) {
            IrcLine::Ping(payload) => {
                debug!("twitch: sending PONG");
                // Writer half lives in the other branch; route through the outbox.
                if outbox.send(pong(&payload)).is_err() {
                    return Err(ChatError::Closed);
                }
            }
            IrcLine::PrivMsg { uid, author, channel, text } => {
                debug!(author = %author, channel = %channel, text = %text, "twitch: new message");
                buffer.push(Message::new(Platform::Twitch, uid, author, text));
            }
            IrcLine::Ignored => debug!(line = %line.trim_end(), "twitch: ignoring"),
            IrcLine::Malformed => debug!(line = %line.trim_end(), "twitch: malformed line discarded"),
        }
    }
}

async fn write_line(wr: &mut OwnedWriteHalf, line: &str) -> Result<(), ChatError> {
    wr.write_all(line.as_bytes()).await?;
    wr.write_all(b"\r\n").await?;
    Ok(())
}
