//! Viewer Entity
//!
//! One gopher per chat identity. Viewers are created on their first
//! message and live for the rest of the run.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use serde::{Serialize, Deserialize};

use crate::chat::message::Platform;
use crate::core::rng::DeterministicRng;
use crate::core::vec2::Vec2;

/// XP needed per level.
pub const XP_PER_LEVEL: u32 = 100;

/// Hit points of a rested viewer.
pub const MAX_HP: i32 = 100;

/// Frames per animation cycle.
pub const FRAME_COUNT: u32 = 5;

/// Animation the overlay plays for a viewer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Animation {
    /// Idle.
    #[default]
    Standing,
    /// Moving towards x = 0.
    WalkingLeft,
    /// Moving towards the right edge.
    WalkingRight,
}

/// Sprite tint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgba {
    /// Red
    #[serde(rename = "R")]
    pub r: u8,
    /// Green
    #[serde(rename = "G")]
    pub g: u8,
    /// Blue
    #[serde(rename = "B")]
    pub b: u8,
    /// Alpha
    #[serde(rename = "A")]
    pub a: u8,
}

impl Rgba {
    /// Opaque color.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 0xff }
    }

    /// Random opaque tint. Green is kept low so gophers stand out on
    /// the green screen.
    pub fn random(rng: &mut DeterministicRng) -> Self {
        Self::rgb(rng.next_byte(255), rng.next_byte(126), rng.next_byte(255))
    }
}

/// Default gopher blue.
pub const GOPHER_BLUE: Rgba = Rgba::rgb(0x9c, 0xed, 0xff);

impl Default for Rgba {
    fn default() -> Self {
        GOPHER_BLUE
    }
}

/// A chat participant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewer {
    /// Platform identity; also the key in the viewer map.
    #[serde(default)]
    pub uid: String,
    /// Display name.
    pub name: String,
    /// Platform of origin.
    pub platform: Platform,
    /// Hit points, 0..=100.
    pub hp: i32,
    /// Experience. Never decreases.
    pub xp: u32,
    /// Top-left corner, in pixels.
    pub pos: Vec2,
    /// Pixels per tick.
    pub vel: Vec2,
    /// Current animation.
    #[serde(default)]
    pub animation: Animation,
    /// Frame within the animation.
    #[serde(default)]
    pub animation_frame: u32,
    /// Tint.
    #[serde(default)]
    pub sprite_color: Rgba,
    /// Codes of solved challenges.
    #[serde(default)]
    pub completed_challenges: BTreeSet<String>,
}

impl Viewer {
    /// Fresh viewer at the origin.
    pub fn new(uid: impl Into<String>, name: impl Into<String>, platform: Platform) -> Self {
        Self {
            uid: uid.into(),
            name: name.into(),
            platform,
            hp: MAX_HP,
            xp: 0,
            pos: Vec2::ZERO,
            vel: Vec2::ZERO,
            animation: Animation::Standing,
            animation_frame: 0,
            sprite_color: GOPHER_BLUE,
            completed_challenges: BTreeSet::new(),
        }
    }

    /// Level derived from XP.
    #[inline]
    pub fn level(&self) -> u32 {
        self.xp / XP_PER_LEVEL
    }

    /// Add experience.
    #[inline]
    pub fn add_xp(&mut self, amount: u32) {
        self.xp = self.xp.saturating_add(amount);
    }

    /// Set vertical velocity. Negative is up.
    #[inline]
    pub fn jump(&mut self, impulse: f64) {
        self.vel.y = impulse;
    }

    /// Lose HP, never going below zero.
    pub fn damage(&mut self, amount: i32) {
        self.hp = (self.hp - amount).max(0);
    }

    /// Whether the viewer is down.
    #[inline]
    pub fn is_knocked_out(&self) -> bool {
        self.hp <= 0
    }

    /// Back to full HP.
    #[inline]
    pub fn heal(&mut self) {
        self.hp = MAX_HP;
    }

    /// Stand still on a random frame.
    pub fn stop(&mut self, rng: &mut DeterministicRng) {
        self.animation = Animation::Standing;
        self.animation_frame = rng.next_int(FRAME_COUNT);
    }

    /// Face left.
    pub fn walk_left(&mut self, rng: &mut DeterministicRng) {
        self.animation = Animation::WalkingLeft;
        self.desync_frame(rng);
    }

    /// Face right.
    pub fn walk_right(&mut self, rng: &mut DeterministicRng) {
        self.animation = Animation::WalkingRight;
        self.desync_frame(rng);
    }

    // Keeps a crowd from walking in lockstep.
    fn desync_frame(&mut self, rng: &mut DeterministicRng) {
        if self.animation_frame == 0 {
            self.animation_frame = rng.next_int(FRAME_COUNT);
        }
    }

    /// Step to the next animation frame, wrapping around.
    pub fn advance_frame(&mut self) {
        self.animation_frame += 1;
        if self.animation_frame >= FRAME_COUNT {
            self.animation_frame = 0;
        }
    }

    /// Grant a challenge reward unless already granted.
    ///
    /// Returns whether anything changed.
    pub fn complete_challenge(&mut self, code: &str, reward: u32, jump_impulse: f64) -> bool {
        if !self.completed_challenges.insert(code.to_string()) {
            return false;
        }
        self.add_xp(reward);
        self.jump(jump_impulse);
        true
    }

    /// Whether the challenge was already solved.
    pub fn has_completed(&self, code: &str) -> bool {
        self.completed_challenges.contains(code)
    }
}

/// Ranking order: XP descending, then name descending.
pub fn by_xp(a: &Viewer, b: &Viewer) -> Ordering {
    b.xp.cmp(&a.xp).then_with(|| b.name.cmp(&a.name))
}
