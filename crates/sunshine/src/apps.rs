//! Sunshine `apps.json` model and store.
//!
//! Layout written by Sunshine:
//!
//! ```json
//! {
//!   "env": { "PATH": "$(PATH):$(HOME)/.local/bin" },
//!   "apps": [
//!     { "name": "Portal 2", "cmd": "steam steam://rungameid/620", "image-path": "..." }
//!   ]
//! }
//! ```

use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, error};

use crate::error::SunshineError;

/// Default `PATH` entry for a freshly created `apps.json`.
pub const DEFAULT_PATH_ENV: &str = "$(PATH):$(HOME)/.local/bin";

/// Launch flags written on every entry this crate creates.
const LAUNCH_FLAGS: &[&str] = &["exclude-global-prep-cmd", "elevated", "auto-detach"];

/// Returns the Steam launch URI for an app.
pub fn launch_uri(app_id: u32) -> String {
    format!("steam://rungameid/{app_id}")
}

/// Returns true if `cmd` launches exactly `app_id`.
///
/// The URI must not be followed by another digit, so `rungameid/12` does
/// not claim the entry of app 123.
fn cmd_launches(cmd: &str, app_id: u32) -> bool {
    let uri = launch_uri(app_id);
    cmd.match_indices(&uri)
        .any(|(i, m)| !cmd[i + m.len()..].starts_with(|c: char| c.is_ascii_digit()))
}

/// Contents of `apps.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppsFile {
    #[serde(default = "default_env")]
    pub env: Map<String, Value>,

    #[serde(default)]
    pub apps: Vec<AppEntry>,

    /// Top-level keys not modelled here.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_env() -> Map<String, Value> {
    let mut env = Map::new();
    env.insert("PATH".into(), Value::String(DEFAULT_PATH_ENV.into()));
    env
}

impl Default for AppsFile {
    fn default() -> Self {
        Self {
            env: default_env(),
            apps: Vec::new(),
            extra: Map::new(),
        }
    }
}

impl AppsFile {
    /// Returns true if any entry launches this app.
    pub fn contains_app(&self, app_id: u32) -> bool {
        self.apps.iter().any(|app| app.launches(app_id))
    }

    /// Removes every entry launching this app. Returns how many were removed.
    pub fn remove_app(&mut self, app_id: u32) -> usize {
        let before = self.apps.len();
        self.apps.retain(|app| !app.launches(app_id));
        before - self.apps.len()
    }
}

/// One application entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppEntry {
    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cmd: Option<String>,

    #[serde(rename = "image-path", default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,

    /// Per-entry keys not modelled here (prep commands, flags...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AppEntry {
    /// Builds the entry for a Steam game.
    pub fn for_game(app_id: u32, name: &str, image_path: Option<&Path>) -> Self {
        let mut extra = Map::new();
        for flag in LAUNCH_FLAGS {
            extra.insert((*flag).into(), Value::String("false".into()));
        }

        Self {
            name: name.to_string(),
            output: Some(String::new()),
            cmd: Some(format!("steam {}", launch_uri(app_id))),
            image_path: Some(
                image_path
                    .map(|p| p.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            ),
            extra,
        }
    }

    /// Returns true if this entry launches the given app.
    pub fn launches(&self, app_id: u32) -> bool {
        self.cmd
            .as_deref()
            .is_some_and(|cmd| cmd_launches(cmd, app_id))
    }
}

/// Reads and writes `apps.json`.
#[derive(Debug, Clone)]
pub struct AppsStore {
    path: PathBuf,
}

impl AppsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the `<file>.backup` sibling holding the previous contents.
    pub fn backup_path(&self) -> PathBuf {
        sibling(&self.path, ".backup")
    }

    /// Returns the `<file>.tmp` sibling used while writing.
    pub fn temp_path(&self) -> PathBuf {
        sibling(&self.path, ".tmp")
    }

    /// Loads `apps.json`.
    ///
    /// A missing or unreadable file yields the default layout; this never
    /// fails.
    pub fn load(&self) -> AppsFile {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return AppsFile::default(),
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "failed to read apps file");
                return AppsFile::default();
            }
        };

        match serde_json::from_slice(&data) {
            Ok(apps) => apps,
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "failed to parse apps file");
                AppsFile::default()
            }
        }
    }

    /// Saves `apps.json`.
    ///
    /// The current file is copied to [`backup_path`](Self::backup_path)
    /// first, then the new content is written to
    /// [`temp_path`](Self::temp_path) and renamed over the destination. A
    /// failed write removes the temp file and returns the error.
    pub fn save(&self, apps: &AppsFile) -> Result<(), SunshineError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        if self.path.exists() {
            fs::copy(&self.path, self.backup_path())?;
        }

        let tmp = self.temp_path();
        if let Err(e) = write_temp(&tmp, apps) {
            error!(path = %self.path.display(), error = %e, "failed to write apps file");
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }

        if let Err(e) = fs::rename(&tmp, &self.path) {
            error!(path = %self.path.display(), error = %e, "failed to replace apps file");
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }

        debug!(path = %self.path.display(), apps = apps.apps.len(), "saved apps file");
        Ok(())
    }
}

/// Writes the serialized file to `tmp` and flushes it to disk.
fn write_temp(tmp: &Path, apps: &AppsFile) -> Result<(), SunshineError> {
    let json = serde_json::to_vec_pretty(apps)?;
    let mut file = fs::File::create(tmp)?;
    file.write_all(&json)?;
    file.sync_all()?;
    Ok(())
}

/// Appends `suffix` to the full file name (`apps.json` -> `apps.json.tmp`).
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, AppsStore) {
        let tmp = tempfile::tempdir().unwrap();
        let store = AppsStore::new(tmp.path().join("sunshine").join("apps.json"));
        (tmp, store)
    }

    const EXISTING: &str = r#"{
  "env": { "PATH": "/custom/bin" },
  "apps": [
    { "name": "Desktop", "image-path": "desktop.png" },
    {
      "name": "Portal 2",
      "cmd": "steam steam://rungameid/620",
      "prep-cmd": [{ "do": "xrandr", "undo": "" }],
      "elevated": false
    },
    { "name": "Steam Big Picture", "detached": ["steam steam://open/bigpicture"] }
  ],
  "version": 2
}"#;

    #[test]
    fn launch_uri_format() {
        assert_eq!(launch_uri(620), "steam://rungameid/620");
    }

    #[test]
    fn cmd_match_requires_exact_id() {
        assert!(cmd_launches("steam steam://rungameid/12", 12));
        assert!(cmd_launches("steam steam://rungameid/12 -fullscreen", 12));
        assert!(!cmd_launches("steam steam://rungameid/123", 12));
        assert!(!cmd_launches("steam steam://rungameid/12", 123));
        assert!(cmd_launches("a steam://rungameid/123 b steam://rungameid/12", 12));
    }

    #[test]
    fn for_game_entry_shape() {
        let entry = AppEntry::for_game(620, "Portal 2", Some(Path::new("/covers/620.jpg")));
        let json = serde_json::to_value(&entry).unwrap();

        assert_eq!(json["name"], "Portal 2");
        assert_eq!(json["output"], "");
        assert_eq!(json["cmd"], "steam steam://rungameid/620");
        assert_eq!(json["image-path"], "/covers/620.jpg");
        assert_eq!(json["exclude-global-prep-cmd"], "false");
        assert_eq!(json["elevated"], "false");
        assert_eq!(json["auto-detach"], "false");
    }

    #[test]
    fn for_game_without_cover_has_empty_image_path() {
        let entry = AppEntry::for_game(1, "X", None);
        assert_eq!(entry.image_path.as_deref(), Some(""));
    }

    #[test]
    fn load_missing_file_gives_default() {
        let (_tmp, store) = store();
        let apps = store.load();
        assert!(apps.apps.is_empty());
        assert_eq!(apps.env["PATH"], DEFAULT_PATH_ENV);
    }

    #[test]
    fn load_corrupt_file_gives_default() {
        let (_tmp, store) = store();
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "{ not json").unwrap();

        let apps = store.load();
        assert_eq!(apps, AppsFile::default());
    }

    #[test]
    fn load_preserves_unknown_fields() {
        let (_tmp, store) = store();
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), EXISTING).unwrap();

        let apps = store.load();
        assert_eq!(apps.apps.len(), 3);
        assert_eq!(apps.env["PATH"], "/custom/bin");
        assert_eq!(apps.extra["version"], 2);
        assert!(apps.apps[0].cmd.is_none());
        assert_eq!(apps.apps[1].extra["elevated"], false);
        assert!(apps.apps[1].extra.contains_key("prep-cmd"));
    }

    #[test]
    fn roundtrip_preserves_order_and_content() {
        let (_tmp, store) = store();
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), EXISTING).unwrap();

        let mut apps = store.load();
        let before = apps.clone();
        apps.apps.push(AppEntry::for_game(440, "Team Fortress 2", None));
        store.save(&apps).unwrap();

        let reloaded = store.load();
        assert_eq!(reloaded.apps.len(), 4);
        assert_eq!(&reloaded.apps[..3], &before.apps[..]);
        assert_eq!(reloaded.apps[3].name, "Team Fortress 2");
        assert_eq!(reloaded.env, before.env);
        assert_eq!(reloaded.extra, before.extra);

        // Entries without a cmd are not given one.
        let raw: Value = serde_json::from_slice(&fs::read(store.path()).unwrap()).unwrap();
        assert!(raw["apps"][0].get("cmd").is_none());
    }

    #[test]
    fn contains_and_remove_app() {
        let mut apps = AppsFile::default();
        apps.apps.push(AppEntry::for_game(12, "A", None));
        apps.apps.push(AppEntry::for_game(123, "B", None));
        apps.apps.push(AppEntry::for_game(12, "A again", None));

        assert!(apps.contains_app(12));
        assert!(!apps.contains_app(1));

        assert_eq!(apps.remove_app(12), 2);
        assert_eq!(apps.apps.len(), 1);
        assert_eq!(apps.apps[0].name, "B");
        assert_eq!(apps.remove_app(12), 0);
    }

    #[test]
    fn save_new_file_creates_dirs_without_backup() {
        let (_tmp, store) = store();
        store.save(&AppsFile::default()).unwrap();

        assert!(store.path().exists());
        assert!(!store.backup_path().exists());
        assert!(!store.temp_path().exists());
    }

    #[test]
    fn save_backs_up_previous_content() {
        let (_tmp, store) = store();
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), EXISTING).unwrap();

        store.save(&AppsFile::default()).unwrap();
        assert_eq!(fs::read_to_string(store.backup_path()).unwrap(), EXISTING);

        // A second save overwrites the backup with the previous write.
        let first = fs::read_to_string(store.path()).unwrap();
        let mut apps = AppsFile::default();
        apps.apps.push(AppEntry::for_game(1, "One", None));
        store.save(&apps).unwrap();
        assert_eq!(fs::read_to_string(store.backup_path()).unwrap(), first);
    }

    #[test]
    fn sibling_paths() {
        let store = AppsStore::new("/cfg/apps.json");
        assert_eq!(store.backup_path(), PathBuf::from("/cfg/apps.json.backup"));
        assert_eq!(store.temp_path(), PathBuf::from("/cfg/apps.json.tmp"));
    }

    #[test]
    fn destination_untouched_until_rename() {
        let (_tmp, store) = store();
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), EXISTING).unwrap();

        // Crash point: temp written, rename not yet performed.
        let mut apps = AppsFile::default();
        apps.apps.push(AppEntry::for_game(9, "Nine", None));
        write_temp(&store.temp_path(), &apps).unwrap();

        assert_eq!(fs::read_to_string(store.path()).unwrap(), EXISTING);
        let pending: AppsFile =
            serde_json::from_slice(&fs::read(store.temp_path()).unwrap()).unwrap();
        assert_eq!(pending, apps);
    }

    #[test]
    fn failed_temp_write_propagates_and_keeps_destination() {
        let (_tmp, store) = store();
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), EXISTING).unwrap();

        // A directory in the temp file's place makes the write fail.
        fs::create_dir(store.temp_path()).unwrap();

        let err = store.save(&AppsFile::default());
        assert!(matches!(err, Err(SunshineError::Io(_))));
        assert_eq!(fs::read_to_string(store.path()).unwrap(), EXISTING);
    }
}
