//! Snapshot Persistence
//!
//! The world is saved as one pretty-printed JSON file. Writes go to a
//! sibling temp file and are renamed into place, so a reader never sees
//! a half-written snapshot. The chat overlay reads the same file through
//! [`SnapshotStore::read_raw`], under the same lock.

use std::collections::{BTreeMap, BTreeSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use serde::{Serialize, Deserialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::chat::message::Message;
use crate::game::fight::FightState;
use crate::game::state::GameState;
use crate::game::viewer::Viewer;

/// Persistence errors.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// File system failure.
    #[error("snapshot io error: {0}")]
    Io(#[from] std::io::Error),
    /// File content is not a snapshot.
    #[error("snapshot format error: {0}")]
    Format(#[from] serde_json::Error),
}

/// Persisted part of the game state.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Snapshot {
    /// Viewers by uid
    pub viewers: BTreeMap<String, Viewer>,
    /// Recent chat, oldest first
    pub chat_history: Vec<Message>,
    /// YouTube continuation token
    pub youtube_page_token: String,
    /// Uids waiting for a fight
    pub fighting_queue: BTreeSet<String>,
    /// Current fight
    pub fight_state: FightState,
    /// Judged submission references
    pub used_submission_refs: BTreeSet<String>,
}

impl Snapshot {
    /// Capture `state`. `page_token` overrides the token loaded at startup
    /// when a live adapter knows a newer one.
    pub fn capture(state: &GameState, page_token: Option<String>) -> Self {
        Self {
            viewers: state.viewers.clone(),
            chat_history: state.chat_history.iter().cloned().collect(),
            youtube_page_token: page_token.unwrap_or_else(|| state.youtube_page_token.clone()),
            fighting_queue: state.fighting_queue.clone(),
            fight_state: state.fight.clone(),
            used_submission_refs: state.used_refs.clone(),
        }
    }

    /// Rebuild a game state. Viewer uids come from the map keys and
    /// everyone starts rested.
    pub fn restore(self, seed: u64) -> GameState {
        let mut state = GameState::new(seed);
        state.viewers = self.viewers
            .into_iter()
            .map(|(uid, mut v)| {
                v.uid = uid.clone();
                v.heal();
                (uid, v)
            })
            .collect();
        state.chat_history = self.chat_history.into();
        state.youtube_page_token = self.youtube_page_token;
        state.fighting_queue = self.fighting_queue;
        state.fight = self.fight_state;
        state.used_refs = self.used_submission_refs;
        state
    }
}

/// Snapshot file handle. Clones share the lock.
#[derive(Clone, Debug)]
pub struct SnapshotStore {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl SnapshotStore {
    /// Store backed by `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), lock: Arc::new(Mutex::new(())) }
    }

    /// Snapshot file location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Write a snapshot atomically.
    pub fn save(&self, snapshot: &Snapshot) -> Result<(), SnapshotError> {
        let _guard = self.guard();

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(snapshot)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;

        debug!(path = %self.path.display(), viewers = snapshot.viewers.len(), "game saved");
        Ok(())
    }

    /// Read the snapshot, or `None` if there is none yet.
    pub fn load(&self) -> Result<Option<Snapshot>, SnapshotError> {
        let Some(raw) = self.read_raw()? else {
            return Ok(None);
        };
        let snapshot: Snapshot = serde_json::from_slice(&raw)?;
        info!(path = %self.path.display(), viewers = snapshot.viewers.len(), "game loaded");
        Ok(Some(snapshot))
    }

    /// Raw snapshot bytes, for readers that only forward them.
    pub fn read_raw(&self) -> Result<Option<Vec<u8>>, SnapshotError> {
        let _guard = self.guard();
        match std::fs::read(&self.path) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
