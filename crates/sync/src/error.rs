use steamshine_sunshine::SunshineError;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("apps file: {0}")]
    Apps(#[from] SunshineError),

    #[error("invalid exclude pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("watcher: {0}")]
    Watch(#[from] notify::Error),

    #[error("manifest: {0}")]
    Manifest(#[from] steamshine_steam::SteamError),
}
