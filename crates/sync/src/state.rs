//! Persisted record of which games this daemon has put into Sunshine.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

pub const STATE_VERSION: &str = "1.0";

/// A game present in `apps.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnownGame {
    pub name: String,
    pub added_at: DateTime<Utc>,
    #[serde(default = "in_sunshine_default")]
    pub in_sunshine: bool,
}

fn in_sunshine_default() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncState {
    #[serde(default = "version_default")]
    pub version: String,
    #[serde(default)]
    pub last_scan: Option<DateTime<Utc>>,
    #[serde(default)]
    pub known_games: BTreeMap<u32, KnownGame>,
}

fn version_default() -> String {
    STATE_VERSION.to_string()
}

impl Default for SyncState {
    fn default() -> Self {
        Self {
            version: version_default(),
            last_scan: None,
            known_games: BTreeMap::new(),
        }
    }
}

impl SyncState {
    /// Records a game as present in Sunshine. An existing record keeps its
    /// original `added_at`.
    pub fn record(&mut self, app_id: u32, name: &str) {
        self.known_games
            .entry(app_id)
            .and_modify(|g| {
                g.name = name.to_string();
                g.in_sunshine = true;
            })
            .or_insert_with(|| KnownGame {
                name: name.to_string(),
                added_at: Utc::now().trunc_subsecs(0),
                in_sunshine: true,
            });
    }

    /// Drops a game. Returns the removed record, if any.
    pub fn forget(&mut self, app_id: u32) -> Option<KnownGame> {
        self.known_games.remove(&app_id)
    }

    pub fn is_known(&self, app_id: u32) -> bool {
        self.known_games.contains_key(&app_id)
    }

    /// Known app IDs in ascending order.
    pub fn known_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.known_games.keys().copied()
    }
}

/// JSON file holding a [`SyncState`].
///
/// Neither direction fails: an unreadable file starts a fresh state and a
/// failed write is logged. The next successful save repairs the file.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> SyncState {
        let data = match std::fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "no state file, starting fresh");
                return SyncState::default();
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to read state file");
                return SyncState::default();
            }
        };

        match serde_json::from_slice::<SyncState>(&data) {
            Ok(state) => {
                tracing::debug!(
                    path = %self.path.display(),
                    known = state.known_games.len(),
                    "loaded state"
                );
                state
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to parse state file");
                SyncState::default()
            }
        }
    }

    /// Stamps `last_scan` and writes the state.
    pub fn save(&self, state: &mut SyncState) {
        state.last_scan = Some(Utc::now().trunc_subsecs(0));
        if let Err(e) = self.write(state) {
            tracing::error!(path = %self.path.display(), error = %e, "failed to save state");
        }
    }

    fn write(&self, state: &SyncState) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(state)?;
        std::fs::write(&self.path, json)
    }
}
