//! Persistence
//!
//! Periodic JSON snapshots of the world.

pub mod snapshot;

pub use snapshot::{Snapshot, SnapshotError, SnapshotStore};
