use std::path::{Path, PathBuf};

/// File name prefix of Steam app manifests.
pub const MANIFEST_PREFIX: &str = "appmanifest_";

/// File name extension of Steam app manifests.
pub const MANIFEST_EXT: &str = ".acf";

/// Provides access to paths inside a Steam library (`steamapps`) directory.
#[derive(Debug, Clone)]
pub struct LibraryPaths {
    root: PathBuf,
}

impl LibraryPaths {
    /// Creates a new `LibraryPaths` with a custom `steamapps` directory.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the `steamapps` directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the manifest path for an app.
    pub fn manifest_path(&self, app_id: u32) -> PathBuf {
        self.root.join(manifest_file_name(app_id))
    }
}

/// Returns the manifest file name for an app (`appmanifest_<id>.acf`).
pub fn manifest_file_name(app_id: u32) -> String {
    format!("{MANIFEST_PREFIX}{app_id}{MANIFEST_EXT}")
}

/// Extracts the app ID from a manifest file name.
///
/// Only exact `appmanifest_<digits>.acf` names match; Steam's transient
/// siblings such as `appmanifest_620.acf.tmp` do not.
pub fn parse_manifest_file_name(name: &str) -> Option<u32> {
    let digits = name
        .strip_prefix(MANIFEST_PREFIX)?
        .strip_suffix(MANIFEST_EXT)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Extracts the app ID from a manifest path.
pub fn app_id_from_path(path: &Path) -> Option<u32> {
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(parse_manifest_file_name)
}

/// Returns the default Steam library directory.
///
/// Picks the first existing of `~/.local/share/Steam/steamapps`,
/// `~/.steam/steam/steamapps` and the Flatpak location, falling back to the
/// first one when none exist yet.
pub fn default_library_dir() -> Option<PathBuf> {
    let home = std::env::var_os("HOME").map(PathBuf::from)?;
    Some(library_dir_in(&home))
}

fn library_dir_in(home: &Path) -> PathBuf {
    let fallback = home
        .join(".local")
        .join("share")
        .join("Steam")
        .join("steamapps");

    let candidates = [
        fallback.clone(),
        home.join(".steam").join("steam").join("steamapps"),
        home.join(".var")
            .join("app")
            .join("com.valvesoftware.Steam")
            .join(".steam")
            .join("steam")
            .join("steamapps"),
    ];

    candidates
        .into_iter()
        .find(|dir| dir.is_dir())
        .unwrap_or(fallback)
}
