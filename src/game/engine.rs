//! Simulation Engine
//!
//! Owns the game state and everything the tick loop talks to: chat
//! sources, the challenge queue and the snapshot store. [`Engine::update`]
//! is called once per tick and never waits on the network.

use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::challenge::queue::{ChallengeQueueHandle, QueueOutcome};
use crate::chat::adapter::{ChatSource, PlatformAdapter};
use crate::chat::message::{Message, Platform};
use crate::config::FeedbackPolicy;
use crate::game::fight::FightState;
use crate::game::state::GameState;
use crate::game::tick::{tick, EngineConfig, TickResult};
use crate::game::viewer::Viewer;
use crate::persistence::snapshot::{Snapshot, SnapshotError, SnapshotStore};

/// The authoritative simulation and its collaborators.
pub struct Engine<A = PlatformAdapter> {
    state: GameState,
    config: EngineConfig,
    adapters: Vec<A>,
    queue: Option<ChallengeQueueHandle>,
    outcomes: Option<mpsc::UnboundedReceiver<QueueOutcome>>,
    store: Option<SnapshotStore>,
    feedback: FeedbackPolicy,
}

impl<A: ChatSource> Engine<A> {
    /// Engine over an existing state, with no collaborators yet.
    pub fn new(state: GameState, config: EngineConfig) -> Self {
        Self {
            state,
            config,
            adapters: Vec::new(),
            queue: None,
            outcomes: None,
            store: None,
            feedback: FeedbackPolicy::Silent,
        }
    }

    /// Add a chat source. Sources are drained in platform order.
    pub fn with_adapter(mut self, adapter: A) -> Self {
        self.adapters.push(adapter);
        self.adapters.sort_by_key(|a| a.platform());
        self
    }

    /// Connect the challenge queue.
    pub fn with_challenge_queue(
        mut self,
        queue: ChallengeQueueHandle,
        outcomes: mpsc::UnboundedReceiver<QueueOutcome>,
    ) -> Self {
        self.queue = Some(queue);
        self.outcomes = Some(outcomes);
        self
    }

    /// Enable autosave.
    pub fn with_store(mut self, store: SnapshotStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the reply policy for rejected checks.
    pub fn with_feedback(mut self, feedback: FeedbackPolicy) -> Self {
        self.feedback = feedback;
        self
    }

    /// Run one tick.
    pub fn update(&mut self) -> TickResult {
        // 0. Autosave
        if self.state.tick % self.config.autosave_interval == 0 {
            if let Err(e) = self.save() {
                error!(err = %e, "error saving game");
            }
        }

        // 1. Challenge outcomes
        self.apply_outcomes();

        // 2. Chat
        let messages: Vec<Message> = self.adapters
            .iter()
            .flat_map(|a| a.fetch_messages())
            .collect();

        let mut result = tick(&mut self.state, messages, &self.config);

        for request in std::mem::take(&mut result.checks) {
            match &self.queue {
                Some(queue) => {
                    queue.submit(request);
                }
                None => warn!(author = %request.author, "no challenge queue, dropping !check"),
            }
        }
        result
    }

    /// Apply every decision the challenge worker has reported so far.
    pub fn apply_outcomes(&mut self) {
        let Some(outcomes) = self.outcomes.as_mut() else {
            return;
        };
        let mut received = Vec::new();
        while let Ok(outcome) = outcomes.try_recv() {
            received.push(outcome);
        }

        for outcome in received {
            if let QueueOutcome::Rejected { uid, platform, reason } = &outcome {
                if self.feedback == FeedbackPolicy::Reply {
                    let name = self.state.viewer(uid).map_or(uid.as_str(), |v| v.name.as_str());
                    let reply = format!("@{} {}", name, reason);
                    self.reply(*platform, &reply);
                }
            }
            self.state.apply_outcome(outcome, self.config.reward_jump);
        }
    }

    /// Stop submitting checks. The worker finishes what is already queued
    /// and exits; its outcomes still arrive through [`Engine::apply_outcomes`].
    pub fn close_queue(&mut self) {
        self.queue = None;
    }

    fn reply(&self, platform: Platform, text: &str) {
        match self.adapters.iter().find(|a| a.platform() == platform) {
            Some(adapter) => adapter.send_message(text),
            None => debug!(platform = %platform, "no adapter to reply on"),
        }
    }

    /// Write a snapshot now, if a store is configured.
    pub fn save(&self) -> Result<(), SnapshotError> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let page_token = self.adapters.iter().find_map(|a| a.page_token());
        store.save(&Snapshot::capture(&self.state, page_token))
    }

    // =========================================================================
    // READ-ONLY VIEWS
    // =========================================================================

    /// Full state.
    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// All viewers, in uid order.
    pub fn viewers(&self) -> impl Iterator<Item = &Viewer> {
        self.state.viewers.values()
    }

    /// Best viewers by XP.
    pub fn leaderboard(&self) -> Vec<&Viewer> {
        self.state.leaderboard(self.config.leaderboard_size)
    }

    /// Queued fighters in pairing order.
    pub fn fighting_queue(&self) -> Vec<&Viewer> {
        self.state.sorted_fighters()
    }

    /// Current fight.
    pub fn fight(&self) -> &FightState {
        &self.state.fight
    }

    /// Recent chat, oldest first.
    pub fn chat_history(&self) -> impl Iterator<Item = &Message> {
        self.state.chat_history.iter()
    }

    /// Ticks run so far.
    pub fn tick_count(&self) -> u64 {
        self.state.tick
    }
}
