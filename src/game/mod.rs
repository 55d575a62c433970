//! Game Logic Module
//!
//! The gopher world. Everything here runs on the tick thread and is
//! deterministic for a given seed and message stream.
//!
//! ## Module Structure
//!
//! - `viewer`: Viewer entity, XP, HP and animation
//! - `commands`: Chat command parsing
//! - `state`: World state and its seeded RNG
//! - `tick`: Per-tick message handling and physics
//! - `fight`: Fight pairing and rounds
//! - `events`: Events emitted by a tick
//! - `engine`: State plus adapters, challenge queue and autosave

pub mod viewer;
pub mod commands;
pub mod state;
pub mod tick;
pub mod fight;
pub mod events;
pub mod engine;

// Re-export key types
pub use viewer::{Animation, Rgba, Viewer};
pub use commands::Command;
pub use state::GameState;
pub use tick::{tick, EngineConfig, TickResult};
pub use fight::{FightConfig, FightState};
pub use events::{GameEvent, GameEventData};
pub use engine::Engine;
