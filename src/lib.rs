//! # LiveQuest
//!
//! Chat-driven stream game: every Twitch or YouTube viewer who talks in
//! chat becomes a gopher on the overlay. Gophers jump, change color,
//! fight each other and earn XP by solving Go code challenges.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       LIVEQUEST ENGINE                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  chat/           - Platform adapters (async tasks)           │
//! │  ├── twitch.rs   - IRC client with reconnect                 │
//! │  ├── youtube.rs  - Live chat API poller                      │
//! │  └── adapter.rs  - MessageBuffer + ChatSource                │
//! │                                                              │
//! │  challenge/      - !check submissions (worker task)          │
//! │  ├── validator.rs- Playground fetch, format, run, match      │
//! │  └── queue.rs    - Serial worker, replay protection          │
//! │                                                              │
//! │  game/           - Simulation (tick thread)                  │
//! │  ├── tick.rs     - Commands and physics                      │
//! │  ├── fight.rs    - Fight pairing and rounds                  │
//! │  └── engine.rs   - Drains adapters, applies outcomes         │
//! │                                                              │
//! │  persistence/    - Atomic JSON snapshots                     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Threading
//!
//! Only the tick loop mutates viewers. Adapters push into a shared
//! buffer; the challenge worker reports outcomes over a channel that the
//! engine drains at the start of each tick. With a fixed seed and the
//! same message stream, the simulation replays identically.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod chat;
pub mod challenge;
pub mod game;
pub mod persistence;
pub mod config;

// Re-export commonly used types
pub use core::rng::DeterministicRng;
pub use core::vec2::Vec2;
pub use chat::{ChatSource, Message, Platform, PlatformAdapter};
pub use config::{AppConfig, FeedbackPolicy};
pub use game::{Engine, EngineConfig, GameState, Viewer};
pub use persistence::{Snapshot, SnapshotStore};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Simulation tick rate (Hz)
pub const TICK_RATE: u32 = 60;
