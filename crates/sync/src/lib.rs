//! Library-to-Sunshine reconciliation.
//!
//! [`Engine`] owns the add/remove primitives and the full pass; the
//! [`watcher`] module feeds it filesystem events between passes.

pub mod engine;
pub mod error;
pub mod filter;
pub mod state;
pub mod watcher;

#[cfg(test)]
mod test_support;

pub use engine::{AddOutcome, Engine, EngineOptions, RemoveOutcome, SyncReport};
pub use error::SyncError;
pub use filter::{DEFAULT_EXCLUDED_PATTERNS, Decision, FilterPolicy};
pub use state::{KnownGame, StateStore, SyncState};
pub use watcher::{EventProcessor, EventSource, ManifestEvent, ManifestWatcher, ProcessorOptions, classify};
