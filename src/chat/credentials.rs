//! Credential Providers
//!
//! Adapters never run an OAuth flow themselves; they ask a [`TokenSource`]
//! for an access token whenever they (re)authenticate.

use std::fmt;
use thiserror::Error;

/// Credential errors.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// No token available from this source.
    #[error("no credentials available: {0}")]
    Missing(String),
    /// The provider returned an unusable token.
    #[error("invalid token: {0}")]
    Invalid(String),
}

/// Opaque provider of access tokens.
pub trait TokenSource: Send + Sync {
    /// Return a currently valid access token.
    fn token(&self) -> Result<String, CredentialError>;
}

/// A fixed token, e.g. handed over by an external OAuth helper.
#[derive(Clone)]
pub struct StaticToken(String);

impl StaticToken {
    /// Wrap a token. Empty tokens are rejected at use time.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StaticToken(***)")
    }
}

impl TokenSource for StaticToken {
    fn token(&self) -> Result<String, CredentialError> {
        let token = self.0.trim();
        if token.is_empty() {
            return Err(CredentialError::Missing("empty token".to_string()));
        }
        // Twitch tokens are sometimes pasted with their IRC prefix.
        let token = token.strip_prefix("oauth:").unwrap_or(token);
        if token.is_empty() {
            return Err(CredentialError::Invalid("bare oauth: prefix".to_string()));
        }
        Ok(token.to_string())
    }
}
