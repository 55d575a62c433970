//! Challenge Queue
//!
//! A single worker validates `!check` submissions one at a time, in
//! arrival order. It owns the set of used submission references, so
//! replay protection needs no locking. Rewards are never applied here:
//! every decision goes back to the engine as a [`QueueOutcome`].

use std::collections::BTreeSet;
use std::fmt;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

use crate::challenge::definition::ChallengeSet;
use crate::challenge::playground::Playground;
use crate::challenge::validator::{snippet_id, validate};
use crate::chat::message::Platform;

/// Maximum pending submissions.
pub const QUEUE_CAPACITY: usize = 100;

/// A `!check` command, as captured by the engine.
#[derive(Clone, Debug)]
pub struct CheckRequest {
    /// Sender uid.
    pub uid: String,
    /// Sender display name.
    pub author: String,
    /// Platform the command came from.
    pub platform: Platform,
    /// Full command text: `!check <code> <ref>`.
    pub text: String,
    /// Challenges the sender had completed when the command arrived.
    pub completed: BTreeSet<String>,
}

/// Why a submission earned nothing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RejectReason {
    /// Not exactly `!check <code> <ref>`.
    BadArguments(usize),
    /// No challenge with this code.
    UnknownChallenge(String),
    /// Reference names no playground snippet.
    InvalidRef(String),
    /// Reference was already submitted.
    RefAlreadyUsed(String),
    /// Viewer already holds this reward.
    AlreadyCompleted(String),
    /// Validation could not be carried out.
    CheckFailed(String),
    /// Submission does not solve the challenge.
    WrongAnswer(String),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::BadArguments(_) => f.write_str("usage: !check <code> <link>"),
            RejectReason::UnknownChallenge(code) => write!(f, "unknown challenge {}", code),
            RejectReason::InvalidRef(_) => f.write_str("that is not a playground link"),
            RejectReason::RefAlreadyUsed(_) => f.write_str("that link was already used"),
            RejectReason::AlreadyCompleted(code) => write!(f, "challenge {} already completed", code),
            RejectReason::CheckFailed(_) => f.write_str("could not check your answer, try again later"),
            RejectReason::WrongAnswer(detail) => f.write_str(detail),
        }
    }
}

/// Decisions reported back to the engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueueOutcome {
    /// A snippet id was consumed and must be persisted.
    RefConsumed(String),
    /// Viewer solved a challenge.
    Completed {
        /// Viewer uid.
        uid: String,
        /// Challenge code.
        code: String,
        /// XP to grant.
        reward: u32,
    },
    /// Submission dropped.
    Rejected {
        /// Viewer uid.
        uid: String,
        /// Where to send feedback.
        platform: Platform,
        /// Why.
        reason: RejectReason,
    },
}

/// Submission side of the queue, held by the engine.
#[derive(Clone, Debug)]
pub struct ChallengeQueueHandle {
    tx: mpsc::Sender<CheckRequest>,
}

impl ChallengeQueueHandle {
    /// Enqueue without waiting. Returns false if the request was dropped.
    pub fn submit(&self, request: CheckRequest) -> bool {
        match self.tx.try_send(request) {
            Ok(()) => true,
            Err(TrySendError::Full(req)) => {
                warn!(author = %req.author, "challenge queue full, dropping !check");
                false
            }
            Err(TrySendError::Closed(req)) => {
                warn!(author = %req.author, "challenge queue closed, dropping !check");
                false
            }
        }
    }
}

/// The validation worker.
pub struct ChallengeQueue<P> {
    playground: P,
    challenges: ChallengeSet,
    used_refs: BTreeSet<String>,
    rx: mpsc::Receiver<CheckRequest>,
    outcomes: mpsc::UnboundedSender<QueueOutcome>,
}

impl<P: Playground> ChallengeQueue<P> {
    /// Build a worker, its submission handle and the outcome stream.
    ///
    /// `used_refs` seeds replay protection, normally from the snapshot.
    pub fn new(
        playground: P,
        challenges: ChallengeSet,
        used_refs: BTreeSet<String>,
    ) -> (Self, ChallengeQueueHandle, mpsc::UnboundedReceiver<QueueOutcome>) {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let (outcomes, outcome_rx) = mpsc::unbounded_channel();
        // Older snapshots stored full links
        let used_refs: BTreeSet<String> = used_refs
            .into_iter()
            .map(|r| snippet_id(&r).map(str::to_string).unwrap_or(r))
            .collect();
        let queue = Self { playground, challenges, used_refs, rx, outcomes };
        (queue, ChallengeQueueHandle { tx }, outcome_rx)
    }

    /// Process submissions until every handle is dropped.
    pub async fn run(mut self) {
        info!(challenges = self.challenges.len(), used_refs = self.used_refs.len(), "challenge queue started");
        while let Some(request) = self.rx.recv().await {
            self.process(request).await;
        }
        info!("challenge queue closed");
    }

    /// Judge one submission.
    pub async fn process(&mut self, request: CheckRequest) {
        debug!(author = %request.author, "validating a challenge");

        let args: Vec<&str> = request.text.split_whitespace().collect();
        if args.len() != 3 {
            warn!(args = args.len(), "game: wrong number of args for !check");
            self.reject(&request, RejectReason::BadArguments(args.len()));
            return;
        }
        let (code, reference) = (args[1], args[2]);

        let Some(challenge) = self.challenges.get(code) else {
            warn!(code = %code, "game: invalid challenge code");
            self.reject(&request, RejectReason::UnknownChallenge(code.to_string()));
            return;
        };

        // Replay protection is keyed on the snippet, not on how the link is spelled
        let Some(id) = snippet_id(reference) else {
            warn!(reference = %reference, "game: not a playground link");
            self.reject(&request, RejectReason::InvalidRef(reference.to_string()));
            return;
        };
        if !self.used_refs.insert(id.to_string()) {
            warn!(reference = %reference, snippet = %id, "game: submission already used");
            self.reject(&request, RejectReason::RefAlreadyUsed(id.to_string()));
            return;
        }
        self.emit(QueueOutcome::RefConsumed(id.to_string()));

        if request.completed.contains(code) {
            info!(viewer = %request.author, code = %code, "game: challenge already solved");
            self.reject(&request, RejectReason::AlreadyCompleted(code.to_string()));
            return;
        }

        match validate(&self.playground, reference, challenge).await {
            Err(e) => {
                warn!(err = %e, "game: error while checking");
                let reason = RejectReason::CheckFailed(e.to_string());
                self.reject(&request, reason);
            }
            Ok(result) if result.ok => {
                info!(viewer = %request.author, code = %code, "game: challenge completed");
                let outcome = QueueOutcome::Completed {
                    uid: request.uid.clone(),
                    code: code.to_string(),
                    reward: challenge.reward,
                };
                self.emit(outcome);
            }
            Ok(result) => {
                warn!(viewer = %request.author, detail = %result.detail, "game: wrong answer");
                self.reject(&request, RejectReason::WrongAnswer(result.detail));
            }
        }
    }

    fn reject(&self, request: &CheckRequest, reason: RejectReason) {
        self.emit(QueueOutcome::Rejected {
            uid: request.uid.clone(),
            platform: request.platform,
            reason,
        });
    }

    fn emit(&self, outcome: QueueOutcome) {
        if self.outcomes.send(outcome).is_err() {
            debug!("challenge queue: engine gone, outcome dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::challenge::playground::testing::FakePlayground;

    const CHALLENGES: &str = r#"[
        {"code": "hello", "type": "static", "backend": "goplayground", "output": "^Olá Mundo\n$", "reward": 100}
    ]"#;

    fn queue(stdout: &str) -> (ChallengeQueue<FakePlayground>, ChallengeQueueHandle, mpsc::UnboundedReceiver<QueueOutcome>) {
        let mut pg = FakePlayground::with_snippet("abc", "package main", stdout);
        pg.snippets.insert("def".to_string(), "package main".to_string());
        ChallengeQueue::new(pg, ChallengeSet::from_json(CHALLENGES).unwrap(), BTreeSet::new())
    }

    fn request(text: &str) -> CheckRequest {
        CheckRequest {
            uid: "u1".to_string(),
            author: "gopher".to_string(),
            platform: Platform::Twitch,
            text: text.to_string(),
            completed: BTreeSet::new(),
        }
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<QueueOutcome>) -> Vec<QueueOutcome> {
        let mut out = Vec::new();
        while let Ok(o) = rx.try_recv() {
            out.push(o);
        }
        out
    }

    fn rejected(reason: RejectReason) -> QueueOutcome {
        QueueOutcome::Rejected { uid: "u1".to_string(), platform: Platform::Twitch, reason }
    }

    #[tokio::test]
    async fn test_successful_check() {
        let (mut q, _handle, mut rx) = queue("Olá Mundo\n");
        q.process(request("!check hello https://go.dev/play/p/abc")).await;

        assert_eq!(drain(&mut rx), vec![
            QueueOutcome::RefConsumed("abc".to_string()),
            QueueOutcome::Completed { uid: "u1".to_string(), code: "hello".to_string(), reward: 100 },
        ]);
    }

    #[tokio::test]
    async fn test_replay_rejected() {
        let (mut q, _handle, mut rx) = queue("Olá Mundo\n");
        q.process(request("!check hello https://go.dev/play/p/abc")).await;
        drain(&mut rx);

        let mut other = request("!check hello https://go.dev/play/p/abc");
        other.uid = "u2".to_string();
        q.process(other).await;

        let outcomes = drain(&mut rx);
        assert_eq!(outcomes.len(), 1);
        assert!(matches!(
            &outcomes[0],
            QueueOutcome::Rejected { uid, reason: RejectReason::RefAlreadyUsed(_), .. } if uid == "u2"
        ));
        assert_eq!(q.playground.compile_count(), 1);
    }

    #[tokio::test]
    async fn test_link_spellings_share_one_reward() {
        let (mut q, _handle, mut rx) = queue("Olá Mundo\n");
        let spellings = ["https://go.dev/play/p/abc", "go.dev/play/p/abc", "abc", "https://go.dev/play/p/abc?v=goprev"];
        for (i, link) in spellings.iter().enumerate() {
            let mut req = request(&format!("!check hello {}", link));
            req.uid = format!("u{}", i);
            q.process(req).await;
        }

        let outcomes = drain(&mut rx);
        let rewarded: Vec<&str> = outcomes.iter().filter_map(|o| match o {
            QueueOutcome::Completed { uid, .. } => Some(uid.as_str()),
            _ => None,
        }).collect();
        assert_eq!(rewarded, vec!["u0"]);
        let replays = outcomes.iter()
            .filter(|o| matches!(o, QueueOutcome::Rejected { reason: RejectReason::RefAlreadyUsed(id), .. } if id == "abc"))
            .count();
        assert_eq!(replays, 3);
        assert_eq!(q.playground.compile_count(), 1);
    }

    #[tokio::test]
    async fn test_link_without_snippet_rejected() {
        let (mut q, _handle, mut rx) = queue("Olá Mundo\n");
        q.process(request("!check hello https://go.dev/play/p/")).await;
        assert_eq!(drain(&mut rx), vec![
            rejected(RejectReason::InvalidRef("https://go.dev/play/p/".to_string())),
        ]);
    }

    #[tokio::test]
    async fn test_seeded_full_links_normalized() {
        let pg = FakePlayground::with_snippet("abc", "package main", "Olá Mundo\n");
        let used = BTreeSet::from(["https://go.dev/play/p/abc".to_string()]);
        let (mut q, _handle, mut rx) = ChallengeQueue::new(pg, ChallengeSet::from_json(CHALLENGES).unwrap(), used);

        q.process(request("!check hello abc")).await;
        assert_eq!(drain(&mut rx), vec![rejected(RejectReason::RefAlreadyUsed("abc".to_string()))]);
    }

    #[tokio::test]
    async fn test_seeded_refs_rejected() {
        let pg = FakePlayground::with_snippet("abc", "package main", "Olá Mundo\n");
        let used = BTreeSet::from(["abc".to_string()]);
        let (mut q, _handle, mut rx) = ChallengeQueue::new(pg, ChallengeSet::from_json(CHALLENGES).unwrap(), used);

        q.process(request("!check hello abc")).await;
        assert_eq!(drain(&mut rx), vec![rejected(RejectReason::RefAlreadyUsed("abc".to_string()))]);
    }

    #[tokio::test]
    async fn test_wrong_answer_consumes_ref() {
        let (mut q, _handle, mut rx) = queue("Hello\n");
        q.process(request("!check hello abc")).await;

        assert_eq!(drain(&mut rx), vec![
            QueueOutcome::RefConsumed("abc".to_string()),
            rejected(RejectReason::WrongAnswer("Unexpected output: Hello\n".to_string())),
        ]);

        q.process(request("!check hello abc")).await;
        assert_eq!(drain(&mut rx), vec![rejected(RejectReason::RefAlreadyUsed("abc".to_string()))]);
    }

    #[tokio::test]
    async fn test_already_completed_skips_validation() {
        let (mut q, _handle, mut rx) = queue("Olá Mundo\n");
        let mut req = request("!check hello def");
        req.completed.insert("hello".to_string());
        q.process(req).await;

        assert_eq!(drain(&mut rx), vec![
            QueueOutcome::RefConsumed("def".to_string()),
            rejected(RejectReason::AlreadyCompleted("hello".to_string())),
        ]);
        assert_eq!(q.playground.compile_count(), 0);
    }

    #[tokio::test]
    async fn test_malformed_and_unknown() {
        let (mut q, _handle, mut rx) = queue("Olá Mundo\n");
        q.process(request("!check hello")).await;
        q.process(request("!check nope abc")).await;

        assert_eq!(drain(&mut rx), vec![
            rejected(RejectReason::BadArguments(2)),
            rejected(RejectReason::UnknownChallenge("nope".to_string())),
        ]);
        // Neither consumed the reference
        q.process(request("!check hello abc")).await;
        assert!(matches!(drain(&mut rx)[0], QueueOutcome::RefConsumed(_)));
    }

    #[tokio::test]
    async fn test_check_error_reported() {
        let (mut q, _handle, mut rx) = queue("Olá Mundo\n");
        q.process(request("!check hello missing")).await;

        let outcomes = drain(&mut rx);
        assert_eq!(outcomes[0], QueueOutcome::RefConsumed("missing".to_string()));
        assert!(matches!(&outcomes[1], QueueOutcome::Rejected { reason: RejectReason::CheckFailed(_), .. }));
    }

    #[tokio::test]
    async fn test_worker_runs_in_order() {
        let (q, handle, mut rx) = queue("Olá Mundo\n");
        let worker = tokio::spawn(q.run());

        assert!(handle.submit(request("!check hello abc")));
        assert!(handle.submit(request("!check hello abc")));
        drop(handle);
        worker.await.unwrap();

        let outcomes = drain(&mut rx);
        assert_eq!(outcomes.len(), 3);
        assert!(matches!(outcomes[1], QueueOutcome::Completed { .. }));
        assert!(matches!(&outcomes[2], QueueOutcome::Rejected { reason: RejectReason::RefAlreadyUsed(_), .. }));
    }

    #[tokio::test]
    async fn test_full_queue_drops() {
        let (_q, handle, _rx) = queue("");
        for _ in 0..QUEUE_CAPACITY {
            assert!(handle.submit(request("!check hello abc")));
        }
        assert!(!handle.submit(request("!check hello abc")));
    }
}
