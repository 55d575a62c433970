//! Fight State Machine
//!
//! Viewers who typed `!fight` are paired by ranking and trade blows on a
//! fixed cadence until one of them drops to zero HP.
//!
//! ```text
//!   Idle ──(cadence tick, ≥2 queued)──► InProgress ──(defender HP ≤ 0)──► Idle
//!                                          │   ▲
//!                                          └───┘ one attack per cadence tick
//! ```

use serde::{Serialize, Deserialize};
use tracing::{debug, info, warn};

use crate::core::rng::DeterministicRng;
use crate::game::events::{GameEvent, GameEventData};
use crate::game::state::GameState;
use crate::game::viewer::by_xp;

/// Fight tuning.
#[derive(Clone, Debug)]
pub struct FightConfig {
    /// Ticks between rounds.
    pub round_interval: u64,
    /// Damage unit.
    pub base_damage: i32,
    /// Cap for a stronger attacker.
    pub max_damage: i32,
    /// Spread subtracted from a stronger attacker's hit.
    pub strong_spread: u32,
    /// Spread added to a weaker attacker's hit.
    pub weak_spread: u32,
    /// XP for the winner.
    pub winner_xp: u32,
    /// XP for the loser.
    pub loser_xp: u32,
    /// Winner's vertical impulse.
    pub victory_jump: f64,
    /// Where player 1 stands.
    pub player1_x: f64,
    /// Where player 2 stands.
    pub player2_x: f64,
    /// First crowd slot.
    pub crowd_start_x: f64,
    /// Width the crowd is spread over.
    pub crowd_width: i64,
}

impl Default for FightConfig {
    fn default() -> Self {
        Self {
            round_interval: 60, // One round per second
            base_damage: 10,
            max_damage: 25,
            strong_spread: 6,
            weak_spread: 16,
            winner_xp: 50,
            loser_xp: 20,
            victory_jump: -150.0,
            player1_x: 1000.0,
            player2_x: 1200.0,
            crowd_start_x: 64.0,
            crowd_width: 800,
        }
    }
}

/// Current fight, if any.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "FightRecord", into = "FightRecord")]
pub enum FightState {
    /// No fight.
    #[default]
    Idle,
    /// Two viewers are fighting.
    InProgress {
        /// Higher ranked combatant.
        player1: String,
        /// Lower ranked combatant, who strikes first.
        player2: String,
        /// Whose turn it is to attack.
        current_turn: String,
    },
}

impl FightState {
    /// Whether a fight is running.
    #[inline]
    pub fn is_active(&self) -> bool {
        matches!(self, FightState::InProgress { .. })
    }
}

/// On-disk shape: empty strings stand for "nobody".
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct FightRecord {
    player1: String,
    player2: String,
    current_turn: String,
}

impl From<FightRecord> for FightState {
    fn from(r: FightRecord) -> Self {
        if r.current_turn.is_empty() {
            FightState::Idle
        } else {
            FightState::InProgress {
                player1: r.player1,
                player2: r.player2,
                current_turn: r.current_turn,
            }
        }
    }
}

impl From<FightState> for FightRecord {
    fn from(s: FightState) -> Self {
        match s {
            FightState::Idle => FightRecord::default(),
            FightState::InProgress { player1, player2, current_turn } => {
                FightRecord { player1, player2, current_turn }
            }
        }
    }
}

/// Roll the damage of one attack.
///
/// A stronger attacker hits proportionally to the XP ratio, capped, minus
/// a small spread; otherwise damage is the base plus a wider spread.
pub fn roll_damage(
    attacker_xp: u32,
    defender_xp: u32,
    config: &FightConfig,
    rng: &mut DeterministicRng,
) -> i32 {
    if attacker_xp > defender_xp {
        let scaled = if defender_xp == 0 {
            config.max_damage
        } else {
            let ratio = attacker_xp as f64 / defender_xp as f64;
            (config.base_damage as f64 * ratio).min(config.max_damage as f64) as i32
        };
        scaled - rng.next_int(config.strong_spread) as i32
    } else {
        config.base_damage + rng.next_int(config.weak_spread) as i32
    }
}

/// Run the fight state machine for the current tick.
pub fn fight_round(state: &mut GameState, config: &FightConfig) {
    if !state.fight.is_active() && state.fighting_queue.len() < 2 {
        return;
    }
    if state.tick % config.round_interval != 0 {
        return;
    }

    if !state.fight.is_active() && !start_fight(state, config) {
        return;
    }

    let FightState::InProgress { player1, player2, current_turn } = state.fight.clone() else {
        return;
    };
    let defender_uid = if current_turn == player1 { player2.clone() } else { player1.clone() };

    let (attacker_xp, attacker_name) = match state.viewers.get(&current_turn) {
        Some(v) => (v.xp, v.name.clone()),
        None => return abandon(state, player1, player2),
    };
    let Some(defender) = state.viewers.get_mut(&defender_uid) else {
        return abandon(state, player1, player2);
    };

    let damage = roll_damage(attacker_xp, defender.xp, config, &mut state.rng);
    defender.damage(damage);
    let defender_hp = defender.hp;
    let knocked_out = defender.is_knocked_out();
    debug!(attacker = %attacker_name, defender = %defender.name, damage, hp = defender_hp, "fight: attack");

    let tick = state.tick;
    state.push_event(GameEvent::attacked(tick, &current_turn, &defender_uid, damage, defender_hp));

    if !knocked_out {
        state.fight = FightState::InProgress {
            player1,
            player2,
            current_turn: defender_uid,
        };
        return;
    }

    info!(winner = %attacker_name, "fight: fight is over");
    state.fight = FightState::Idle;
    if let Some(loser) = state.viewers.get_mut(&defender_uid) {
        loser.heal();
        loser.add_xp(config.loser_xp);
    }
    if let Some(winner) = state.viewers.get_mut(&current_turn) {
        winner.heal();
        winner.add_xp(config.winner_xp);
        winner.jump(config.victory_jump);
    }
    state.push_event(GameEvent::fight_ended(tick, &current_turn, &defender_uid));
}

/// Pair the two best ranked queued viewers. Returns false if fewer than
/// two queued uids are known viewers.
fn start_fight(state: &mut GameState, config: &FightConfig) -> bool {
    let unknown: Vec<String> = state.fighting_queue
        .iter()
        .filter(|uid| !state.viewers.contains_key(*uid))
        .cloned()
        .collect();
    for uid in unknown {
        warn!(uid = %uid, "fight: dropping unknown viewer from queue");
        state.fighting_queue.remove(&uid);
    }

    let fighters = state.sorted_fighters();
    if fighters.len() < 2 {
        return false;
    }
    let player1 = fighters[0].uid.clone();
    let player2 = fighters[1].uid.clone();

    info!(player1 = %fighters[0].name, player2 = %fighters[1].name, "fight: initializing fight");
    state.fighting_queue.remove(&player1);
    state.fighting_queue.remove(&player2);
    state.fight = FightState::InProgress {
        player1: player1.clone(),
        player2: player2.clone(),
        current_turn: player2.clone(),
    };
    arrange_arena(state, &player1, &player2, config);

    let tick = state.tick;
    state.push_event(GameEvent::fight_started(tick, &player1, &player2));
    true
}

/// Put the combatants face to face and line everyone else up as the crowd.
fn arrange_arena(state: &mut GameState, player1: &str, player2: &str, config: &FightConfig) {
    let rng = &mut state.rng;

    if let Some(p1) = state.viewers.get_mut(player1) {
        p1.walk_right(rng);
        p1.vel.x = 0.0;
        p1.pos.x = config.player1_x;
    }
    if let Some(p2) = state.viewers.get_mut(player2) {
        p2.walk_left(rng);
        p2.vel.x = 0.0;
        p2.pos.x = config.player2_x;
    }

    let step = config.crowd_width / state.viewers.len() as i64 + 1;
    let mut crowd: Vec<_> = state.viewers
        .values_mut()
        .filter(|v| v.uid != player1 && v.uid != player2)
        .collect();
    crowd.sort_by(|a, b| by_xp(a, b));

    let mut x = config.crowd_start_x;
    for v in crowd {
        v.pos.x = x;
        v.walk_right(rng);
        v.vel.x = 0.0;
        x += step as f64;
    }
}

fn abandon(state: &mut GameState, player1: String, player2: String) {
    warn!(player1 = %player1, player2 = %player2, "fight: unknown combatant, abandoning fight");
    state.fight = FightState::Idle;
    let tick = state.tick;
    state.push_event(GameEvent::global(tick, GameEventData::FightAbandoned { player1, player2 }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::message::Platform;
    use crate::game::viewer::Viewer;

    fn add(state: &mut GameState, uid: &str, xp: u32) {
        let mut v = Viewer::new(uid, uid, Platform::Twitch);
        v.xp = xp;
        state.viewers.insert(uid.to_string(), v);
    }

    #[test]
    fn test_record_roundtrip() {
        let idle = serde_json::to_value(FightState::Idle).unwrap();
        assert_eq!(idle, serde_json::json!({"player1": "", "player2": "", "currentTurn": ""}));

        let fight: FightState = serde_json::from_str(
            r#"{"player1": "a", "player2": "b", "currentTurn": "b"}"#
        ).unwrap();
        assert_eq!(fight, FightState::InProgress {
            player1: "a".to_string(),
            player2: "b".to_string(),
            current_turn: "b".to_string(),
        });

        let partial: FightState = serde_json::from_str(r#"{"player1": "a"}"#).unwrap();
        assert_eq!(partial, FightState::Idle);
    }

    #[test]
    fn test_damage_bounds() {
        let config = FightConfig::default();
        let mut rng = DeterministicRng::new(1);
        for _ in 0..500 {
            let strong = roll_damage(1000, 0, &config, &mut rng);
            assert!((20..=25).contains(&strong));

            let ratio = roll_damage(150, 100, &config, &mut rng);
            assert!((10..=15).contains(&ratio));

            let weak = roll_damage(0, 1000, &config, &mut rng);
            assert!((10..26).contains(&weak));

            let even = roll_damage(50, 50, &config, &mut rng);
            assert!((10..26).contains(&even));
        }
    }

    #[test]
    fn test_needs_two_and_cadence() {
        let config = FightConfig::default();
        let mut state = GameState::new(1);
        add(&mut state, "a", 0);
        add(&mut state, "b", 0);
        state.fighting_queue.insert("a".to_string());

        state.tick = 60;
        fight_round(&mut state, &config);
        assert_eq!(state.fight, FightState::Idle);

        state.fighting_queue.insert("b".to_string());
        state.tick = 61;
        fight_round(&mut state, &config);
        assert_eq!(state.fight, FightState::Idle);
    }

    #[test]
    fn test_start_pairs_by_rank() {
        let config = FightConfig::default();
        let mut state = GameState::new(1);
        add(&mut state, "low", 10);
        add(&mut state, "high", 500);
        add(&mut state, "mid", 100);
        add(&mut state, "watcher", 0);
        for uid in ["low", "high", "mid"] {
            state.fighting_queue.insert(uid.to_string());
        }

        state.tick = 120;
        fight_round(&mut state, &config);

        // mid (player2) opens, so high takes the first hit and strikes next
        assert_eq!(state.fight, FightState::InProgress {
            player1: "high".to_string(),
            player2: "mid".to_string(),
            current_turn: "high".to_string(),
        });
        assert!(state.viewers["high"].hp < 100);
        assert_eq!(state.viewers["mid"].hp, 100);
        assert_eq!(state.fighting_queue.len(), 1);
        assert!(state.fighting_queue.contains("low"));

        assert_eq!(state.viewers["high"].pos.x, 1000.0);
        assert_eq!(state.viewers["mid"].pos.x, 1200.0);
        // crowd: low (10 XP) then watcher (0 XP), step = 800 / 4 + 1
        assert_eq!(state.viewers["low"].pos.x, 64.0);
        assert_eq!(state.viewers["watcher"].pos.x, 64.0 + 201.0);
    }

    /// Run one fight to the end, returning the winner and rounds taken.
    fn run_fight(seed: u64) -> (String, u32) {
        let config = FightConfig::default();
        let mut state = GameState::new(seed);
        add(&mut state, "weak", 0);
        add(&mut state, "strong", 1000);
        state.fighting_queue.insert("weak".to_string());
        state.fighting_queue.insert("strong".to_string());

        let mut rounds = 0;
        loop {
            fight_round(&mut state, &config);
            rounds += 1;
            for v in state.viewers.values() {
                assert!(v.hp >= 0 && v.hp <= 100);
            }
            if !state.fight.is_active() {
                break;
            }
            assert!(rounds < 20, "fight did not resolve");
            state.tick += config.round_interval;
        }

        let Some(GameEventData::FightEnded { winner, loser }) = state.take_events().pop().map(|e| e.data) else {
            panic!("no fight end event");
        };
        assert_eq!(state.viewers[&winner].hp, 100);
        assert_eq!(state.viewers[&loser].hp, 100);
        assert_eq!(state.viewers[&winner].vel.y, -150.0);
        let base = |uid: &str| if uid == "strong" { 1000 } else { 0 };
        assert_eq!(state.viewers[&winner].xp, base(&winner) + 50);
        assert_eq!(state.viewers[&loser].xp, base(&loser) + 20);
        (winner, rounds)
    }

    #[test]
    fn test_seeded_fight_is_reproducible() {
        assert_eq!(run_fight(2024), run_fight(2024));
    }

    #[test]
    fn test_stronger_viewer_usually_wins() {
        let wins = (0..50u64)
            .map(run_fight)
            .filter(|(winner, _)| winner == "strong")
            .count();
        assert!(wins > 30, "strong won only {} of 50", wins);
    }

    #[test]
    fn test_unknown_combatant_abandons() {
        let config = FightConfig::default();
        let mut state = GameState::new(1);
        add(&mut state, "a", 0);
        state.fight = FightState::InProgress {
            player1: "a".to_string(),
            player2: "ghost".to_string(),
            current_turn: "ghost".to_string(),
        };

        fight_round(&mut state, &config);
        assert_eq!(state.fight, FightState::Idle);
        assert!(matches!(
            state.take_events()[0].data,
            GameEventData::FightAbandoned { .. }
        ));
    }
}
