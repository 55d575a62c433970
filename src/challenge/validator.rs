//! Submission Validator
//!
//! Judges one submission against one challenge:
//! fetch source, optional source pattern, format, run, match output.
//! Wrong answers are ordinary results; only infrastructure problems and
//! broken challenge definitions are errors.

use regex::Regex;
use thiserror::Error;
use tracing::{debug, warn};

use crate::challenge::definition::{Backend, Challenge};
use crate::challenge::playground::Playground;

/// Detail reported when the source pattern does not match.
pub const WRONG_ANSWER: &str = "Wrong answer";

/// Detail reported on success.
pub const OK_DETAIL: &str = "OK";

/// Validation errors.
#[derive(Debug, Error)]
pub enum CheckError {
    /// Challenge targets a backend we cannot run.
    #[error("check: invalid backend: {0:?}")]
    UnsupportedBackend(Backend),

    /// Submission reference has no snippet id.
    #[error("check: invalid submission reference: {0:?}")]
    InvalidRef(String),

    /// Transport failure.
    #[error("check: http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend answered with something other than 200.
    #[error("check: error fetching {url}: status {status}")]
    Status {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// Backend reply was not the expected JSON.
    #[error("check: decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Formatter rejected the source.
    #[error("check: format error: {0}")]
    Format(String),

    /// Build failed.
    #[error("check: compile error: {0}")]
    Compile(String),

    /// `go vet` reported problems.
    #[error("check: vet error: {0}")]
    Vet(String),

    /// Challenge carries an invalid regular expression.
    #[error("check: invalid regular expression: {0}")]
    InvalidPattern(#[from] regex::Error),
}

/// Verdict for a submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckResult {
    /// Whether the submission solves the challenge.
    pub ok: bool,
    /// `OK`, `Wrong answer` or the unexpected output.
    pub detail: String,
}

impl CheckResult {
    fn pass() -> Self {
        Self { ok: true, detail: OK_DETAIL.to_string() }
    }

    fn fail(detail: impl Into<String>) -> Self {
        Self { ok: false, detail: detail.into() }
    }
}

/// Snippet id of a share link: its last path segment.
pub fn snippet_id(reference: &str) -> Option<&str> {
    let path = reference.trim().split(['?', '#']).next().unwrap_or_default();
    path.rsplit('/').next().filter(|id| !id.is_empty())
}

/// Validate `reference` against `challenge` on `playground`.
pub async fn validate<P: Playground>(
    playground: &P,
    reference: &str,
    challenge: &Challenge,
) -> Result<CheckResult, CheckError> {
    if challenge.backend != Backend::GoPlayground {
        return Err(CheckError::UnsupportedBackend(challenge.backend));
    }
    let id = snippet_id(reference).ok_or_else(|| CheckError::InvalidRef(reference.to_string()))?;

    let source = playground.fetch_source(id).await?;

    if let Some(pattern) = challenge.code_contains.as_deref() {
        if !Regex::new(pattern)?.is_match(&source) {
            debug!(code = %challenge.code, "check: source pattern not found");
            return Ok(CheckResult::fail(WRONG_ANSWER));
        }
    }

    let formatted = playground.format(&source).await?;
    if !formatted.error.is_empty() {
        return Err(CheckError::Format(formatted.error));
    }

    let run = playground.compile(&formatted.body).await?;
    if !run.errors.is_empty() {
        return Err(CheckError::Compile(run.errors));
    }
    if !run.vet_errors.is_empty() {
        return Err(CheckError::Vet(run.vet_errors));
    }

    let mut output = String::new();
    for ev in run.events.iter().flatten() {
        match ev.kind.as_str() {
            "stdout" | "stderr" => output.push_str(&ev.message),
            other => warn!(kind = %other, "check: unexpected event kind"),
        }
    }
    debug!(output = %output, "check: program output");

    if !Regex::new(&challenge.output)?.is_match(&output) {
        return Ok(CheckResult::fail(format!("Unexpected output: {}", output)));
    }
    Ok(CheckResult::pass())
}
