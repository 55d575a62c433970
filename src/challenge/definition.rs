//! Challenge Definitions
//!
//! Challenges are loaded once at startup from a JSON list. Keys are
//! accepted in camelCase or PascalCase.

use std::path::Path;
use serde::{Serialize, Deserialize};
use thiserror::Error;
use tracing::info;

/// Challenge loading errors.
#[derive(Debug, Error)]
pub enum ChallengeLoadError {
    /// File could not be read.
    #[error("error loading {path}: {source}")]
    Io {
        /// File that was read.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },
    /// File is not a valid challenge list.
    #[error("error deserializing challenges: {0}")]
    Decode(#[from] serde_json::Error),
}

/// How a challenge is judged.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeKind {
    /// Fixed expected output.
    Static,
    /// Anything this build does not know about.
    #[serde(other)]
    Unknown,
}

/// Where submissions are executed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Backend {
    /// The Go Playground at go.dev.
    #[serde(rename = "goplayground", alias = "playgodev")]
    GoPlayground,
    /// Declared but not supported; validation refuses it.
    #[serde(other)]
    Unsupported,
}

/// A single code challenge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Challenge {
    /// Code viewers type after `!check`.
    #[serde(alias = "Code")]
    pub code: String,
    /// Judging mode.
    #[serde(rename = "type", alias = "Type")]
    pub kind: ChallengeKind,
    /// Execution backend.
    #[serde(alias = "Backend")]
    pub backend: Backend,
    /// Regex the submitted source must match, if any.
    #[serde(default, alias = "CodeContains", skip_serializing_if = "Option::is_none")]
    pub code_contains: Option<String>,
    /// Regex the program output must match.
    #[serde(default, alias = "Output")]
    pub output: String,
    /// XP granted on first completion.
    #[serde(default, alias = "Reward")]
    pub reward: u32,
}

/// The loaded challenge list.
#[derive(Clone, Debug, Default)]
pub struct ChallengeSet {
    challenges: Vec<Challenge>,
}

impl ChallengeSet {
    /// Wrap an already built list.
    pub fn new(challenges: Vec<Challenge>) -> Self {
        Self { challenges }
    }

    /// Parse a JSON challenge list.
    pub fn from_json(json: &str) -> Result<Self, ChallengeLoadError> {
        Ok(Self::new(serde_json::from_str(json)?))
    }

    /// Load a JSON challenge list from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ChallengeLoadError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ChallengeLoadError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let set = Self::from_json(&json)?;
        info!(count = set.len(), path = %path.display(), "challenges loaded");
        Ok(set)
    }

    /// Look up a challenge by code. First match wins.
    pub fn get(&self, code: &str) -> Option<&Challenge> {
        self.challenges.iter().find(|c| c.code == code)
    }

    /// Number of challenges.
    pub fn len(&self) -> usize {
        self.challenges.len()
    }

    /// Whether no challenges are loaded.
    pub fn is_empty(&self) -> bool {
        self.challenges.is_empty()
    }
}
