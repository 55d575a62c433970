//! Runtime Configuration
//!
//! Everything the binary needs, read from environment variables.
//! Simulation constants live in [`EngineConfig`](crate::game::tick::EngineConfig).

use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A variable is set but cannot be parsed.
    #[error("invalid value for {var}: {value:?}")]
    Invalid {
        /// Variable name.
        var: &'static str,
        /// Offending value.
        value: String,
    },
}

/// Whether rejected `!check` commands get a chat reply.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FeedbackPolicy {
    /// Only log.
    #[default]
    Silent,
    /// Answer the viewer on their platform.
    Reply,
}

impl FromStr for FeedbackPolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "silent" | "" => Ok(FeedbackPolicy::Silent),
            "reply" => Ok(FeedbackPolicy::Reply),
            _ => Err(()),
        }
    }
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Twitch channel to join.
    pub twitch_channel: String,
    /// Twitch OAuth token. Twitch stays off without it.
    pub twitch_token: Option<String>,
    /// YouTube video id of the live stream. YouTube stays off without it.
    pub youtube_stream: Option<String>,
    /// YouTube API key (read only).
    pub youtube_api_key: Option<String>,
    /// YouTube OAuth access token; preferred over the API key.
    pub youtube_access_token: Option<String>,
    /// Snapshot file.
    pub snapshot_path: PathBuf,
    /// Challenge list.
    pub challenges_path: PathBuf,
    /// RNG seed; random when unset.
    pub seed: Option<u64>,
    /// Reply policy for rejected checks.
    pub feedback: FeedbackPolicy,
    /// Ticks per second.
    pub tick_rate: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            twitch_channel: "codigolandia".to_string(),
            twitch_token: None,
            youtube_stream: None,
            youtube_api_key: None,
            youtube_access_token: None,
            snapshot_path: std::env::temp_dir().join("live-quest.json"),
            challenges_path: PathBuf::from("challenges.json"),
            seed: None,
            feedback: FeedbackPolicy::Silent,
            tick_rate: crate::TICK_RATE,
        }
    }
}

impl AppConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Create config from any variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        Ok(Self {
            twitch_channel: get("TWITCH_CHANNEL").unwrap_or(defaults.twitch_channel),
            twitch_token: get("TWITCH_OAUTH_TOKEN"),
            youtube_stream: get("YOUTUBE_STREAM"),
            youtube_api_key: get("YOUTUBE_API_KEY"),
            youtube_access_token: get("YOUTUBE_ACCESS_TOKEN"),
            snapshot_path: get("LIVE_QUEST_SNAPSHOT").map(PathBuf::from).unwrap_or(defaults.snapshot_path),
            challenges_path: get("LIVE_QUEST_CHALLENGES").map(PathBuf::from).unwrap_or(defaults.challenges_path),
            seed: parse_var("LIVE_QUEST_SEED", get("LIVE_QUEST_SEED"))?,
            feedback: match get("LIVE_QUEST_FEEDBACK") {
                None => defaults.feedback,
                Some(v) => v.parse().map_err(|_| ConfigError::Invalid { var: "LIVE_QUEST_FEEDBACK", value: v })?,
            },
            tick_rate: match parse_var::<u32>("LIVE_QUEST_TICK_RATE", get("LIVE_QUEST_TICK_RATE"))? {
                Some(0) => return Err(ConfigError::Invalid { var: "LIVE_QUEST_TICK_RATE", value: "0".to_string() }),
                Some(rate) => rate,
                None => defaults.tick_rate,
            },
        })
    }
}

fn parse_var<T: FromStr>(var: &'static str, value: Option<String>) -> Result<Option<T>, ConfigError> {
    value
        .map(|v| v.trim().parse().map_err(|_| ConfigError::Invalid { var, value: v }))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn test_defaults() {
        let c = config(&[]).unwrap();
        assert_eq!(c.twitch_channel, "codigolandia");
        assert!(c.twitch_token.is_none());
        assert!(c.snapshot_path.ends_with("live-quest.json"));
        assert_eq!(c.challenges_path, PathBuf::from("challenges.json"));
        assert_eq!(c.feedback, FeedbackPolicy::Silent);
        assert_eq!(c.tick_rate, 60);
    }

    #[test]
    fn test_overrides() {
        let c = config(&[
            ("TWITCH_CHANNEL", "gophers"),
            ("YOUTUBE_STREAM", "abc123"),
            ("LIVE_QUEST_SEED", "42"),
            ("LIVE_QUEST_FEEDBACK", "Reply"),
            ("LIVE_QUEST_TICK_RATE", "30"),
        ]).unwrap();
        assert_eq!(c.twitch_channel, "gophers");
        assert_eq!(c.youtube_stream.as_deref(), Some("abc123"));
        assert_eq!(c.seed, Some(42));
        assert_eq!(c.feedback, FeedbackPolicy::Reply);
        assert_eq!(c.tick_rate, 30);
    }

    #[test]
    fn test_blank_is_unset() {
        let c = config(&[("TWITCH_OAUTH_TOKEN", "  "), ("TWITCH_CHANNEL", "")]).unwrap();
        assert!(c.twitch_token.is_none());
        assert_eq!(c.twitch_channel, "codigolandia");
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(config(&[("LIVE_QUEST_SEED", "x")]), Err(ConfigError::Invalid { var: "LIVE_QUEST_SEED", .. })));
        assert!(config(&[("LIVE_QUEST_FEEDBACK", "loud")]).is_err());
        assert!(config(&[("LIVE_QUEST_TICK_RATE", "0")]).is_err());
    }
}
