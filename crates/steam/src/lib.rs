pub mod keyvalues;
pub mod manifest;
pub mod paths;

// Re-export primary types.
pub use keyvalues::{KeyValues, Value};
pub use manifest::{Catalog, CatalogEntry, SkippedManifest, scan_manifest, scan_manifests};
pub use paths::{
    LibraryPaths, app_id_from_path, default_library_dir, manifest_file_name,
    parse_manifest_file_name,
};

/// Errors for Steam library operations.
#[derive(Debug, thiserror::Error)]
pub enum SteamError {
    #[error("KeyValues parse error: {0}")]
    KeyValues(String),

    #[error("not an app manifest: {0}")]
    InvalidManifestName(String),

    #[error("manifest has no AppState section")]
    MissingAppState,

    #[error("I/O error: {0}")]
    Io(String),
}
