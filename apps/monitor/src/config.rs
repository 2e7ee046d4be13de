//! Daemon configuration.
//!
//! Read from an optional TOML file (`$STEAMSHINE_CONFIG`, else
//! `~/.config/steamshine/monitor.toml`), then overridden field by field from
//! environment variables. A leading `~` in any path is expanded to `$HOME`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use steamshine_store::RetryPolicy;
use steamshine_sync::{DEFAULT_EXCLUDED_PATTERNS, EngineOptions, FilterPolicy, ProcessorOptions};

const CONFIG_ENV: &str = "STEAMSHINE_CONFIG";

/// Daemon configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Steam `steamapps` directory. Detected when unset.
    #[serde(default)]
    pub library_path: Option<PathBuf>,

    /// Sunshine application list.
    #[serde(default = "default_apps_file")]
    pub apps_file: PathBuf,

    #[serde(default = "default_covers_dir")]
    pub covers_dir: PathBuf,

    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,

    /// Steam Store request timeout in seconds.
    #[serde(default = "default_api_timeout")]
    pub api_timeout_secs: u64,

    /// Delay before every Steam Store request, in milliseconds.
    #[serde(default = "default_rate_limit")]
    pub rate_limit_ms: u64,

    /// Installs smaller than this are ignored.
    #[serde(default = "default_min_size")]
    pub min_size_mb: u64,

    #[serde(default = "default_true")]
    pub exclude_tools: bool,

    #[serde(default = "default_true")]
    pub exclude_dlc: bool,

    /// Name patterns excluded when `exclude_tools` is set.
    #[serde(default = "default_exclude_patterns")]
    pub exclude_patterns: Vec<String>,

    #[serde(default = "default_true")]
    pub remove_uninstalled: bool,

    /// Seconds between full passes (0 = only at startup).
    #[serde(default = "default_full_scan_interval")]
    pub full_scan_interval_secs: u64,

    /// Reload Sunshine after changing its app list.
    #[serde(default = "default_true")]
    pub reload_sunshine: bool,

    /// systemd user unit reloaded when `reload_sunshine` is set.
    #[serde(default = "default_sunshine_unit")]
    pub sunshine_unit: String,
}

fn default_apps_file() -> PathBuf {
    PathBuf::from("~/.config/sunshine/apps.json")
}

fn default_covers_dir() -> PathBuf {
    PathBuf::from("~/.local/share/sunshine/covers")
}

fn default_state_file() -> PathBuf {
    PathBuf::from("~/.local/state/steam_monitor_state.json")
}

fn default_api_timeout() -> u64 {
    10
}

fn default_rate_limit() -> u64 {
    200
}

fn default_min_size() -> u64 {
    50
}

fn default_true() -> bool {
    true
}

fn default_exclude_patterns() -> Vec<String> {
    DEFAULT_EXCLUDED_PATTERNS
        .iter()
        .map(|p| p.to_string())
        .collect()
}

fn default_full_scan_interval() -> u64 {
    3600
}

fn default_sunshine_unit() -> String {
    "sunshine.service".into()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            library_path: None,
            apps_file: default_apps_file(),
            covers_dir: default_covers_dir(),
            state_file: default_state_file(),
            api_timeout_secs: default_api_timeout(),
            rate_limit_ms: default_rate_limit(),
            min_size_mb: default_min_size(),
            exclude_tools: true,
            exclude_dlc: true,
            exclude_patterns: default_exclude_patterns(),
            remove_uninstalled: true,
            full_scan_interval_secs: default_full_scan_interval(),
            reload_sunshine: true,
            sunshine_unit: default_sunshine_unit(),
        }
    }
}

impl Config {
    /// Loads configuration from the config file and the process environment.
    pub fn load() -> anyhow::Result<Self> {
        let home = std::env::var_os("HOME").map(PathBuf::from);
        Self::load_with(|key| std::env::var(key).ok(), home.as_deref())
    }

    fn load_with(
        lookup: impl Fn(&str) -> Option<String>,
        home: Option<&Path>,
    ) -> anyhow::Result<Self> {
        let mut config = match lookup(CONFIG_ENV) {
            Some(path) => {
                let path = expand_home(Path::new(&path), home);
                Self::read_file(&path)?
            }
            None => match home.map(config_path) {
                Some(path) if path.exists() => Self::read_file(&path)?,
                _ => Config::default(),
            },
        };

        config.apply_env(&lookup)?;
        config.expand_paths(home);

        if config.library_path.is_none() {
            config.library_path = steamshine_steam::default_library_dir();
        }

        Ok(config)
    }

    fn read_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        tracing::debug!(path = %path.display(), "configuration file loaded");
        Ok(config)
    }

    fn apply_env(&mut self, lookup: &impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        let path = |key: &str| lookup(key).map(PathBuf::from);
        let flag = |key: &str| lookup(key).map(|v| v.to_lowercase() == "true");
        let int = |key: &str| -> anyhow::Result<Option<u64>> {
            match lookup(key) {
                Some(v) => match v.trim().parse() {
                    Ok(n) => Ok(Some(n)),
                    Err(_) => bail!("{key} must be a non-negative integer, got '{v}'"),
                },
                None => Ok(None),
            }
        };

        if let Some(v) = path("STEAM_LIBRARY_PATH") {
            self.library_path = Some(v);
        }
        if let Some(v) = path("SUNSHINE_APPS_FILE") {
            self.apps_file = v;
        }
        if let Some(v) = path("COVERS_DIR") {
            self.covers_dir = v;
        }
        if let Some(v) = path("STATE_FILE") {
            self.state_file = v;
        }
        if let Some(v) = int("STEAM_API_TIMEOUT")? {
            self.api_timeout_secs = v;
        }
        if let Some(v) = int("STEAM_API_RATE_LIMIT_MS")? {
            self.rate_limit_ms = v;
        }
        if let Some(v) = int("MIN_SIZE_MB")? {
            self.min_size_mb = v;
        }
        if let Some(v) = flag("EXCLUDE_TOOLS") {
            self.exclude_tools = v;
        }
        if let Some(v) = flag("EXCLUDE_DLC") {
            self.exclude_dlc = v;
        }
        if let Some(v) = flag("REMOVE_UNINSTALLED") {
            self.remove_uninstalled = v;
        }
        if let Some(v) = int("FULL_SCAN_INTERVAL_SECS")? {
            self.full_scan_interval_secs = v;
        }
        if let Some(v) = flag("SUNSHINE_RELOAD") {
            self.reload_sunshine = v;
        }
        Ok(())
    }

    fn expand_paths(&mut self, home: Option<&Path>) {
        if let Some(p) = &self.library_path {
            self.library_path = Some(expand_home(p, home));
        }
        self.apps_file = expand_home(&self.apps_file, home);
        self.covers_dir = expand_home(&self.covers_dir, home);
        self.state_file = expand_home(&self.state_file, home);
    }

    /// Returns the library directory, failing if it could not be determined.
    pub fn library_dir(&self) -> anyhow::Result<&Path> {
        match &self.library_path {
            Some(p) => Ok(p),
            None => bail!("cannot locate the Steam library; set STEAM_LIBRARY_PATH"),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            rate_limit: Duration::from_millis(self.rate_limit_ms),
            request_timeout: Duration::from_secs(self.api_timeout_secs),
            ..RetryPolicy::default()
        }
    }

    pub fn filter_policy(&self) -> anyhow::Result<FilterPolicy> {
        let policy = FilterPolicy::new(self.min_size_mb, self.exclude_tools, self.exclude_dlc)
            .with_patterns(&self.exclude_patterns)?;
        Ok(policy)
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            remove_uninstalled: self.remove_uninstalled,
        }
    }

    pub fn processor_options(&self) -> ProcessorOptions {
        ProcessorOptions {
            full_scan_interval: (self.full_scan_interval_secs > 0)
                .then(|| Duration::from_secs(self.full_scan_interval_secs)),
            ..ProcessorOptions::default()
        }
    }
}

/// Returns the default configuration file path under `home`.
fn config_path(home: &Path) -> PathBuf {
    home.join(".config").join("steamshine").join("monitor.toml")
}

/// Replaces a leading `~` with `home`.
fn expand_home(path: &Path, home: Option<&Path>) -> PathBuf {
    match (path.strip_prefix("~"), home) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}
