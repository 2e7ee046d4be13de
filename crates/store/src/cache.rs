//! On-disk cache of downloaded cover art.
//!
//! Covers are stored as `<dir>/<appid>.jpg`; the path is what ends up in the
//! Sunshine `image-path` field, so it must stay stable across runs.

use std::io;
use std::path::{Path, PathBuf};

/// Directory holding one portrait cover per app.
#[derive(Debug, Clone)]
pub struct CoverCache {
    dir: PathBuf,
}

impl CoverCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns where the cover for an app lives (whether or not it exists).
    pub fn cover_path(&self, app_id: u32) -> PathBuf {
        self.dir.join(format!("{app_id}.jpg"))
    }

    /// Returns the cover path if it has already been downloaded.
    pub fn cached(&self, app_id: u32) -> Option<PathBuf> {
        let path = self.cover_path(app_id);
        path.is_file().then_some(path)
    }

    /// Creates the cache directory if it doesn't exist.
    pub fn ensure_dir(&self) -> io::Result<()> {
        std::fs::create_dir_all(&self.dir)
    }

    /// Deletes the cover for an app. Returns `false` if there was none.
    pub fn remove(&self, app_id: u32) -> io::Result<bool> {
        match std::fs::remove_file(self.cover_path(app_id)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// In-progress download target, renamed over the cover when complete.
    pub(crate) fn partial_path(&self, app_id: u32) -> PathBuf {
        self.dir.join(format!("{app_id}.jpg.part"))
    }
}
