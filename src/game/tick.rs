//! Simulation Tick
//!
//! One discrete update of the world. The tick is pure with respect to
//! I/O: messages come in as an argument and `!check` submissions leave
//! through [`TickResult`], so the same inputs and seed always produce the
//! same state.

use tracing::debug;

use crate::challenge::queue::CheckRequest;
use crate::chat::message::Message;
use crate::core::rng::DeterministicRng;
use crate::game::commands::{self, Command};
use crate::game::events::{GameEvent, GameEventData};
use crate::game::fight::{fight_round, FightConfig};
use crate::game::state::{GameState, CHAT_HISTORY_CAP};
use crate::game::viewer::{Rgba, Viewer};

/// Result of a tick.
#[derive(Debug, Default)]
pub struct TickResult {
    /// Events generated this tick
    pub events: Vec<GameEvent>,
    /// `!check` commands to hand to the challenge queue
    pub checks: Vec<CheckRequest>,
}

/// Configuration for the simulation.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Screen width in pixels
    pub width: f64,
    /// Screen height in pixels
    pub height: f64,
    /// Gopher sprite size
    pub sprite_size: f64,
    /// Strip on the right kept free for the leaderboard
    pub right_margin: f64,
    /// Added to vertical velocity every tick
    pub gravity: f64,
    /// `!jump` impulse
    pub jump_impulse: f64,
    /// Impulse on a solved challenge
    pub reward_jump: f64,
    /// XP per chat message
    pub xp_per_message: u32,
    /// Ticks per animation frame
    pub animation_interval: u64,
    /// Ticks between idle decisions
    pub idle_interval: u64,
    /// Idle walking speed
    pub walk_speed: f64,
    /// Horizontal speed after hitting a side
    pub bounce_speed: f64,
    /// Downward speed after hitting the top
    pub ceiling_bounce: f64,
    /// Ticks between snapshots
    pub autosave_interval: u64,
    /// Chat messages kept
    pub chat_history_cap: usize,
    /// Leaderboard length
    pub leaderboard_size: usize,
    /// Fight tuning
    pub fight: FightConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            width: 1920.0,
            height: 1080.0,
            sprite_size: 128.0,
            right_margin: 400.0,
            gravity: 0.1,
            jump_impulse: -100.0,
            reward_jump: -150.0,
            xp_per_message: 10,
            animation_interval: 6,
            idle_interval: 200,
            walk_speed: 0.7,
            bounce_speed: 2.0,
            ceiling_bounce: 50.0,
            autosave_interval: 600, // Every 10 seconds
            chat_history_cap: CHAT_HISTORY_CAP,
            leaderboard_size: 5,
            fight: FightConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Rightmost x a viewer may stand at.
    #[inline]
    pub fn right_edge(&self) -> f64 {
        self.width - self.sprite_size - self.right_margin
    }

    /// Ground level.
    #[inline]
    pub fn floor(&self) -> f64 {
        self.height - self.sprite_size
    }
}

/// Run one simulation tick.
///
/// # Arguments
///
/// * `state` - The game state (will be mutated)
/// * `messages` - New chat messages, already in platform order
/// * `config` - Engine configuration
///
/// Autosave and challenge outcomes are the caller's business and happen
/// before this is called.
pub fn tick(state: &mut GameState, messages: Vec<Message>, config: &EngineConfig) -> TickResult {
    let mut result = TickResult::default();

    // 1. Chat
    for message in messages {
        handle_message(state, message, config, &mut result);
    }

    // 2. Movement
    update_viewers(state, config);

    // 3. Fights
    fight_round(state, &config.fight);

    // 4. Advance tick counter
    state.tick += 1;

    result.events = state.take_events();
    result
}

/// Record a message and apply its command to the sender.
fn handle_message(state: &mut GameState, message: Message, config: &EngineConfig, result: &mut TickResult) {
    debug!(uid = %message.uid, author = %message.author, text = %message.text, "new message");

    let tick = state.tick;
    let command = commands::parse(&message.text);
    let tint = match command {
        Some(Command::Color(tint)) => Some(tint.unwrap_or_else(|| Rgba::random(&mut state.rng))),
        _ => None,
    };

    let viewer = state.viewer_for(&message, config.right_edge(), config.height / 2.0);
    let mut wants_fight = false;

    let event = match command {
        Some(Command::Check) => {
            result.checks.push(CheckRequest {
                uid: message.uid.clone(),
                author: message.author.clone(),
                platform: message.platform,
                text: message.text.clone(),
                completed: viewer.completed_challenges.clone(),
            });
            None
        }
        Some(Command::Jump) => {
            debug!(name = %viewer.name, "jumping");
            viewer.jump(config.jump_impulse);
            Some(GameEventData::Jumped)
        }
        Some(Command::Color(_)) => {
            debug!(name = %viewer.name, "changing color");
            viewer.sprite_color = tint.unwrap_or(viewer.sprite_color);
            Some(GameEventData::ColorChanged)
        }
        Some(Command::Fight) => {
            debug!(name = %viewer.name, "looking for a fight");
            wants_fight = true;
            Some(GameEventData::FightQueued)
        }
        None => None,
    };
    viewer.add_xp(config.xp_per_message);

    if wants_fight {
        state.fighting_queue.insert(message.uid.clone());
    }
    if let Some(data) = event {
        state.push_event(GameEvent::new(tick, &message.uid, data));
    }
    state.push_chat(message, config.chat_history_cap);
}

/// Animate every viewer; move them unless a fight holds the stage.
fn update_viewers(state: &mut GameState, config: &EngineConfig) {
    let tick = state.tick;
    let fighting = state.fight.is_active();
    let rng = &mut state.rng;

    // BTreeMap values_mut iterates in uid order - DETERMINISTIC
    for viewer in state.viewers.values_mut() {
        if tick % config.animation_interval == 0 {
            viewer.advance_frame();
        }
        if fighting {
            continue;
        }

        if tick % config.idle_interval == 0 {
            match rng.next_int(3) {
                0 => {
                    viewer.vel.x = 0.0;
                    viewer.stop(rng);
                }
                1 => {
                    viewer.vel.x = config.walk_speed;
                    viewer.walk_right(rng);
                }
                _ => {
                    viewer.vel.x = -config.walk_speed;
                    viewer.walk_left(rng);
                }
            }
        }

        step_physics(viewer, config, rng);
    }
}

/// Integrate position, apply gravity and keep the viewer on screen.
fn step_physics(viewer: &mut Viewer, config: &EngineConfig, rng: &mut DeterministicRng) {
    viewer.pos += viewer.vel;
    viewer.vel.y = (viewer.vel.y + config.gravity).max(0.0);

    let right = config.right_edge();
    if viewer.pos.x > right {
        viewer.pos.x = right;
        viewer.vel.x = -config.bounce_speed;
        viewer.walk_left(rng);
    }
    if viewer.pos.x < 0.0 {
        viewer.pos.x = 0.0;
        viewer.vel.x = config.bounce_speed;
        viewer.walk_right(rng);
    }
    if viewer.pos.y < 0.0 {
        viewer.pos.y = 0.0;
        viewer.vel.y = config.ceiling_bounce;
    }
    let floor = config.floor();
    if viewer.pos.y > floor {
        viewer.pos.y = floor;
        viewer.vel.y = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::message::Platform;
    use crate::core::vec2::Vec2;
    use crate::game::fight::FightState;
    use crate::game::viewer::Animation;

    fn msg(uid: &str, text: &str) -> Message {
        Message::new(Platform::Twitch, uid, uid.to_uppercase(), text)
    }

    #[test]
    fn test_jump_from_new_viewer() {
        let config = EngineConfig::default();
        let mut state = GameState::new(7);
        state.tick = 1; // off the idle cadence

        let result = tick(&mut state, vec![msg("u1", "!jump")], &config);

        let v = state.viewer("u1").unwrap();
        assert_eq!(v.xp, 10);
        assert_eq!(v.hp, 100);
        // Impulse applied, then one tick of integration clamps vy at zero
        assert_eq!(v.pos.y, 540.0 - 100.0);
        assert_eq!(v.vel.y, 0.0);
        assert_eq!(state.chat_history.len(), 1);
        assert!(result.events.iter().any(|e| e.data == GameEventData::Jumped));
        assert!(matches!(result.events[0].data, GameEventData::ViewerJoined { .. }));
    }

    #[test]
    fn test_xp_per_message() {
        let config = EngineConfig::default();
        let mut state = GameState::new(7);
        tick(&mut state, vec![msg("u1", "hi"), msg("u1", "hello"), msg("u2", "hey")], &config);
        assert_eq!(state.viewer("u1").unwrap().xp, 20);
        assert_eq!(state.viewer("u2").unwrap().xp, 10);
    }

    #[test]
    fn test_check_forwarded() {
        let config = EngineConfig::default();
        let mut state = GameState::new(7);
        tick(&mut state, vec![msg("u1", "hi")], &config);
        state.viewers.get_mut("u1").unwrap().completed_challenges.insert("old".to_string());

        let result = tick(&mut state, vec![msg("u1", "!check hello https://go.dev/play/p/abc")], &config);
        assert_eq!(result.checks.len(), 1);
        let req = &result.checks[0];
        assert_eq!(req.uid, "u1");
        assert_eq!(req.author, "U1");
        assert_eq!(req.text, "!check hello https://go.dev/play/p/abc");
        assert!(req.completed.contains("old"));
        assert_eq!(state.viewer("u1").unwrap().xp, 20);
    }

    #[test]
    fn test_color_command() {
        let config = EngineConfig::default();
        let mut state = GameState::new(7);
        tick(&mut state, vec![msg("u1", "!color #abc")], &config);
        assert_eq!(state.viewer("u1").unwrap().sprite_color, Rgba::rgb(0xaa, 0xbb, 0xcc));
    }

    #[test]
    fn test_two_fighters_start_on_cadence() {
        let config = EngineConfig::default();
        let mut state = GameState::new(7);
        state.tick = 58;

        tick(&mut state, vec![msg("a", "!fight"), msg("b", "!fight")], &config);
        assert_eq!(state.fighting_queue.len(), 2);
        assert_eq!(state.fight, FightState::Idle);

        // tick 59: still off cadence
        tick(&mut state, vec![], &config);
        assert_eq!(state.fight, FightState::Idle);

        // tick 60: pairing and first attack
        let result = tick(&mut state, vec![], &config);
        assert!(state.fight.is_active());
        assert!(state.fighting_queue.is_empty());
        assert!(result.events.iter().any(|e| matches!(e.data, GameEventData::FightStarted { .. })));
        assert!(result.events.iter().any(|e| matches!(e.data, GameEventData::Attacked { .. })));
        assert_eq!(state.tick, 61);
    }

    #[test]
    fn test_bounds() {
        let config = EngineConfig::default();
        let mut rng = DeterministicRng::new(1);

        let mut v = Viewer::new("a", "a", Platform::Twitch);
        v.pos.x = 5000.0;
        step_physics(&mut v, &config, &mut rng);
        assert_eq!(v.pos.x, 1392.0);
        assert_eq!(v.vel.x, -2.0);
        assert_eq!(v.animation, Animation::WalkingLeft);

        v.pos.x = -10.0;
        step_physics(&mut v, &config, &mut rng);
        assert_eq!(v.pos.x, 0.0);
        assert_eq!(v.vel.x, 2.0);
        assert_eq!(v.animation, Animation::WalkingRight);

        v.pos.y = 2000.0;
        v.vel = Vec2::ZERO;
        step_physics(&mut v, &config, &mut rng);
        assert_eq!(v.pos.y, 952.0);
        assert_eq!(v.vel.y, 0.0);
    }

    #[test]
    fn test_fight_freezes_movement() {
        let config = EngineConfig::default();
        let mut state = GameState::new(7);
        tick(&mut state, vec![msg("a", "hi")], &config);
        state.fight = FightState::InProgress {
            player1: "x".to_string(),
            player2: "y".to_string(),
            current_turn: "y".to_string(),
        };
        state.viewers.get_mut("a").unwrap().vel.x = 0.7;
        let before = state.viewer("a").unwrap().pos;

        state.tick = 7;
        tick(&mut state, vec![], &config);
        assert_eq!(state.viewer("a").unwrap().pos, before);
    }

    #[test]
    fn test_same_seed_same_world() {
        let config = EngineConfig::default();
        let run = || {
            let mut state = GameState::new(99);
            for t in 0..1200u64 {
                let msgs = match t {
                    0 => vec![msg("a", "hi"), msg("b", "!color")],
                    5 => vec![msg("a", "!fight"), msg("b", "!fight"), msg("c", "!jump")],
                    _ => vec![],
                };
                tick(&mut state, msgs, &config);
            }
            state.viewers
        };
        assert_eq!(run(), run());
    }
}
