//! Game Events
//!
//! Things that happened during a tick, for logging and for the
//! presentation layer. Events never feed back into the simulation.

use serde::{Serialize, Deserialize};

use crate::chat::message::Platform;

/// Game event data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameEventData {
    /// First message from an unseen uid
    ViewerJoined {
        name: String,
        platform: Platform,
    },

    /// `!jump`
    Jumped,

    /// `!color`
    ColorChanged,

    /// `!fight`; the uid is now queued
    FightQueued,

    /// Two queued viewers started fighting
    FightStarted {
        player1: String,
        player2: String,
    },

    /// One round of a fight
    Attacked {
        defender: String,
        damage: i32,
        defender_hp: i32,
    },

    /// Fight decided
    FightEnded {
        winner: String,
        loser: String,
    },

    /// Fight dropped because a combatant is unknown
    FightAbandoned {
        player1: String,
        player2: String,
    },

    /// Challenge reward granted
    ChallengeCompleted {
        code: String,
        reward: u32,
    },

    /// `!check` produced nothing
    CheckRejected {
        platform: Platform,
        reason: String,
    },
}

/// A game event with timing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameEvent {
    /// Tick when event occurred
    pub tick: u64,

    /// Viewer the event is about (attacker, winner, sender...)
    pub uid: Option<String>,

    /// Event data
    pub data: GameEventData,
}

impl GameEvent {
    /// Create a new event about a viewer.
    pub fn new(tick: u64, uid: impl Into<String>, data: GameEventData) -> Self {
        Self { tick, uid: Some(uid.into()), data }
    }

    /// Create an event that concerns no single viewer.
    pub fn global(tick: u64, data: GameEventData) -> Self {
        Self { tick, uid: None, data }
    }

    /// Create fight started event.
    pub fn fight_started(tick: u64, player1: &str, player2: &str) -> Self {
        Self::global(tick, GameEventData::FightStarted {
            player1: player1.to_string(),
            player2: player2.to_string(),
        })
    }

    /// Create attack event.
    pub fn attacked(tick: u64, attacker: &str, defender: &str, damage: i32, defender_hp: i32) -> Self {
        Self::new(tick, attacker, GameEventData::Attacked {
            defender: defender.to_string(),
            damage,
            defender_hp,
        })
    }

    /// Create fight ended event.
    pub fn fight_ended(tick: u64, winner: &str, loser: &str) -> Self {
        Self::new(tick, winner, GameEventData::FightEnded {
            winner: winner.to_string(),
            loser: loser.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_subject() {
        let ev = GameEvent::attacked(60, "a", "b", 12, 88);
        assert_eq!(ev.uid.as_deref(), Some("a"));
        assert!(matches!(ev.data, GameEventData::Attacked { damage: 12, .. }));

        let ev = GameEvent::fight_started(60, "a", "b");
        assert_eq!(ev.uid, None);
    }
}
