//! Sunshine integration: the `apps.json` application list and service reload.
//!
//! `apps.json` is shared with the Sunshine web UI and manual edits, so every
//! mutation is a fresh read followed by a backup-then-atomic-replace write.
//! Keys this crate does not model are carried through untouched.

pub mod apps;
pub mod error;
pub mod reload;

pub use apps::{AppEntry, AppsFile, AppsStore, launch_uri};
pub use error::SunshineError;
pub use reload::{CommandReloader, NoopReloader, ReloadFuture, Reloader};
