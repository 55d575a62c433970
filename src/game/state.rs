//! Game State Definitions
//!
//! Everything the engine owns between ticks.
//! Uses BTreeMap/BTreeSet for deterministic iteration order.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::{debug, info};

use crate::challenge::queue::QueueOutcome;
use crate::chat::message::Message;
use crate::core::rng::DeterministicRng;
use crate::core::vec2::Vec2;
use crate::game::events::{GameEvent, GameEventData};
use crate::game::fight::FightState;
use crate::game::viewer::{by_xp, Viewer};

/// Default number of chat messages kept.
pub const CHAT_HISTORY_CAP: usize = 1000;

// =============================================================================
// GAME STATE
// =============================================================================

/// Complete simulation state.
#[derive(Clone, Debug)]
pub struct GameState {
    /// Viewers by uid
    pub viewers: BTreeMap<String, Viewer>,

    /// Recent chat, oldest first
    pub chat_history: VecDeque<Message>,

    /// Uids waiting for a fight
    pub fighting_queue: BTreeSet<String>,

    /// Current fight
    pub fight: FightState,

    /// Submission references already judged
    pub used_refs: BTreeSet<String>,

    /// YouTube continuation token loaded from the snapshot
    pub youtube_page_token: String,

    /// Ticks since start. Not persisted.
    pub tick: u64,

    /// Simulation randomness
    pub rng: DeterministicRng,

    /// Events of the current tick
    events: Vec<GameEvent>,
}

impl GameState {
    /// Empty state with a seeded RNG.
    pub fn new(seed: u64) -> Self {
        Self {
            viewers: BTreeMap::new(),
            chat_history: VecDeque::new(),
            fighting_queue: BTreeSet::new(),
            fight: FightState::Idle,
            used_refs: BTreeSet::new(),
            youtube_page_token: String::new(),
            tick: 0,
            rng: DeterministicRng::new(seed),
            events: Vec::new(),
        }
    }

    // =========================================================================
    // VIEWERS
    // =========================================================================

    /// Look up a viewer.
    pub fn viewer(&self, uid: &str) -> Option<&Viewer> {
        self.viewers.get(uid)
    }

    /// Viewer who sent `message`, created at `spawn_y` and a random x
    /// below `max_x` if this is their first message.
    pub fn viewer_for(&mut self, message: &Message, max_x: f64, spawn_y: f64) -> &mut Viewer {
        if !self.viewers.contains_key(&message.uid) {
            info!(uid = %message.uid, name = %message.author, platform = %message.platform, "new viewer");
            let event = GameEvent::new(self.tick, &message.uid, GameEventData::ViewerJoined {
                name: message.author.clone(),
                platform: message.platform,
            });
            self.push_event(event);
        }

        let rng = &mut self.rng;
        self.viewers.entry(message.uid.clone()).or_insert_with(|| {
            let mut v = Viewer::new(&message.uid, &message.author, message.platform);
            v.pos = Vec2::new(rng.next_f64(max_x), spawn_y);
            v
        })
    }

    /// Top `n` viewers by XP.
    pub fn leaderboard(&self, n: usize) -> Vec<&Viewer> {
        let mut ranked: Vec<&Viewer> = self.viewers.values().collect();
        ranked.sort_by(|a, b| by_xp(a, b));
        ranked.truncate(n);
        ranked
    }

    /// Queued fighters that are known viewers, best ranked first.
    pub fn sorted_fighters(&self) -> Vec<&Viewer> {
        let mut fighters: Vec<&Viewer> = self.fighting_queue
            .iter()
            .filter_map(|uid| self.viewers.get(uid))
            .collect();
        fighters.sort_by(|a, b| by_xp(a, b));
        fighters
    }

    // =========================================================================
    // CHAT
    // =========================================================================

    /// Record a message, dropping the oldest beyond `cap`.
    pub fn push_chat(&mut self, message: Message, cap: usize) {
        self.chat_history.push_back(message);
        while self.chat_history.len() > cap {
            self.chat_history.pop_front();
        }
    }

    // =========================================================================
    // CHALLENGES
    // =========================================================================

    /// Apply a challenge queue decision.
    pub fn apply_outcome(&mut self, outcome: QueueOutcome, reward_jump: f64) {
        match outcome {
            QueueOutcome::RefConsumed(reference) => {
                self.used_refs.insert(reference);
            }
            QueueOutcome::Completed { uid, code, reward } => {
                let Some(viewer) = self.viewers.get_mut(&uid) else {
                    debug!(uid = %uid, "challenge completed by unknown viewer");
                    return;
                };
                if viewer.complete_challenge(&code, reward, reward_jump) {
                    info!(viewer = %viewer.name, code = %code, reward, "challenge reward granted");
                    let event = GameEvent::new(self.tick, uid, GameEventData::ChallengeCompleted { code, reward });
                    self.push_event(event);
                } else {
                    debug!(viewer = %viewer.name, code = %code, "challenge already rewarded");
                }
            }
            QueueOutcome::Rejected { uid, platform, reason } => {
                let event = GameEvent::new(self.tick, uid, GameEventData::CheckRejected {
                    platform,
                    reason: reason.to_string(),
                });
                self.push_event(event);
            }
        }
    }

    // =========================================================================
    // EVENTS
    // =========================================================================

    /// Record an event.
    pub fn push_event(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    /// Take all recorded events.
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::challenge::queue::RejectReason;
    use crate::chat::message::Platform;

    fn msg(uid: &str, text: &str) -> Message {
        Message::new(Platform::Twitch, uid, format!("name-{}", uid), text)
    }

    #[test]
    fn test_viewer_created_once() {
        let mut state = GameState::new(1);
        let v = state.viewer_for(&msg("u1", "hi"), 1392.0, 540.0);
        assert_eq!(v.name, "name-u1");
        assert_eq!(v.pos.y, 540.0);
        assert!((0.0..1392.0).contains(&v.pos.x));
        v.xp = 30;

        let v = state.viewer_for(&msg("u1", "again"), 1392.0, 540.0);
        assert_eq!(v.xp, 30);
        assert_eq!(state.viewers.len(), 1);
        assert_eq!(state.take_events().len(), 1);
    }

    #[test]
    fn test_chat_history_cap() {
        let mut state = GameState::new(1);
        for i in 0..5 {
            state.push_chat(msg(&format!("u{}", i), "x"), 3);
        }
        let uids: Vec<&str> = state.chat_history.iter().map(|m| m.uid.as_str()).collect();
        assert_eq!(uids, vec!["u2", "u3", "u4"]);
    }

    #[test]
    fn test_leaderboard_top_n() {
        let mut state = GameState::new(1);
        for (i, xp) in [10, 70, 30, 90, 50, 20].into_iter().enumerate() {
            let uid = format!("u{}", i);
            let mut v = Viewer::new(&uid, &uid, Platform::Youtube);
            v.xp = xp;
            state.viewers.insert(uid, v);
        }
        let top: Vec<u32> = state.leaderboard(5).iter().map(|v| v.xp).collect();
        assert_eq!(top, vec![90, 70, 50, 30, 20]);
    }

    #[test]
    fn test_sorted_fighters_skips_unknown() {
        let mut state = GameState::new(1);
        state.viewers.insert("a".to_string(), Viewer::new("a", "a", Platform::Twitch));
        state.fighting_queue.insert("a".to_string());
        state.fighting_queue.insert("ghost".to_string());
        assert_eq!(state.sorted_fighters().len(), 1);
    }

    #[test]
    fn test_outcomes() {
        let mut state = GameState::new(1);
        state.viewers.insert("u1".to_string(), Viewer::new("u1", "gopher", Platform::Twitch));

        state.apply_outcome(QueueOutcome::RefConsumed("abc".to_string()), -150.0);
        assert!(state.used_refs.contains("abc"));

        let completed = QueueOutcome::Completed { uid: "u1".to_string(), code: "hello".to_string(), reward: 100 };
        state.apply_outcome(completed.clone(), -150.0);
        state.apply_outcome(completed, -150.0);
        assert_eq!(state.viewers["u1"].xp, 100);
        assert_eq!(state.viewers["u1"].vel.y, -150.0);

        state.apply_outcome(QueueOutcome::Rejected {
            uid: "u1".to_string(),
            platform: Platform::Twitch,
            reason: RejectReason::UnknownChallenge("x".to_string()),
        }, -150.0);

        let events = state.take_events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0].data, GameEventData::ChallengeCompleted { reward: 100, .. }));
        assert!(matches!(events[1].data, GameEventData::CheckRejected { .. }));
    }
}
