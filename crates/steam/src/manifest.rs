//! Installed-game catalog built from `appmanifest_<id>.acf` files.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::SteamError;
use crate::keyvalues::{self, KeyValues};
use crate::paths::app_id_from_path;

/// One installed game as described by its app manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub app_id: u32,
    pub name: String,
    /// Directory under `steamapps/common`.
    pub install_dir: String,
    pub size_bytes: u64,
    pub manifest_path: PathBuf,
}

/// A manifest that could not be read during a scan.
#[derive(Debug, Clone)]
pub struct SkippedManifest {
    pub path: PathBuf,
    pub reason: String,
}

/// Result of scanning a library directory.
///
/// Games are keyed by app ID, so iteration order is deterministic.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub games: BTreeMap<u32, CatalogEntry>,
    pub skipped: Vec<SkippedManifest>,
    /// True if the library directory is missing or could not be listed.
    /// The catalog is then empty but says nothing about what is installed.
    pub root_unavailable: bool,
}

impl Catalog {
    pub fn get(&self, app_id: u32) -> Option<&CatalogEntry> {
        self.games.get(&app_id)
    }

    pub fn contains(&self, app_id: u32) -> bool {
        self.games.contains_key(&app_id)
    }

    /// Returns all app IDs in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.games.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.games.len()
    }

    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }
}

/// Scans a `steamapps` directory for installed games.
///
/// A malformed manifest is logged and recorded in [`Catalog::skipped`];
/// it never aborts the scan. A missing directory yields an empty catalog
/// with `root_unavailable` set, as does a directory that cannot be read.
pub fn scan_manifests(root: &Path) -> Catalog {
    let mut catalog = Catalog::default();

    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::error!(path = %root.display(), "steam library path does not exist");
            catalog.root_unavailable = true;
            return catalog;
        }
        Err(e) => {
            tracing::error!(path = %root.display(), error = %e, "failed to read steam library");
            catalog.root_unavailable = true;
            catalog.skipped.push(SkippedManifest {
                path: root.to_path_buf(),
                reason: e.to_string(),
            });
            return catalog;
        }
    };

    for entry in entries {
        let path = match entry {
            Ok(entry) => entry.path(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to read library entry");
                continue;
            }
        };

        if app_id_from_path(&path).is_none() {
            continue;
        }

        match scan_manifest(&path) {
            Ok(game) => {
                catalog.games.insert(game.app_id, game);
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to parse manifest");
                catalog.skipped.push(SkippedManifest {
                    path,
                    reason: e.to_string(),
                });
            }
        }
    }

    tracing::debug!(
        games = catalog.len(),
        skipped = catalog.skipped.len(),
        "library scan complete"
    );
    catalog
}

/// Reads a single app manifest.
///
/// The app ID comes from the file name. Missing fields fall back to
/// `Game <id>`, an empty install dir and a size of zero.
pub fn scan_manifest(path: &Path) -> Result<CatalogEntry, SteamError> {
    let app_id = app_id_from_path(path)
        .ok_or_else(|| SteamError::InvalidManifestName(path.display().to_string()))?;

    let data = fs::read(path).map_err(|e| SteamError::Io(e.to_string()))?;
    let text = String::from_utf8_lossy(&data);
    let kv = keyvalues::parse(&text)?;

    entry_from_keyvalues(app_id, &kv, path)
}

fn entry_from_keyvalues(
    app_id: u32,
    kv: &KeyValues,
    path: &Path,
) -> Result<CatalogEntry, SteamError> {
    let app = kv.get_block("AppState").ok_or(SteamError::MissingAppState)?;

    let name = match app.get_str("name") {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => format!("Game {app_id}"),
    };

    let size_bytes = app
        .get_str("SizeOnDisk")
        .and_then(|s| s.trim().parse::<u64>().ok())
        .unwrap_or(0);

    Ok(CatalogEntry {
        app_id,
        name,
        install_dir: app.get_str("installdir").unwrap_or_default().to_string(),
        size_bytes,
        manifest_path: path.to_path_buf(),
    })
}
