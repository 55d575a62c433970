//! Code Challenges
//!
//! Viewers submit Go Playground links with `!check <code> <link>`; a
//! background worker runs them and reports rewards to the engine.

pub mod definition;
pub mod playground;
pub mod validator;
pub mod queue;

pub use definition::{Backend, Challenge, ChallengeKind, ChallengeLoadError, ChallengeSet};
pub use playground::{HttpPlayground, Playground};
pub use validator::{validate, CheckError, CheckResult};
pub use queue::{ChallengeQueue, ChallengeQueueHandle, CheckRequest, QueueOutcome, RejectReason};
