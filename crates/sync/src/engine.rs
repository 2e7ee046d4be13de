//! Add/remove primitives and the full reconciliation pass.
//!
//! Every path that changes Sunshine's app list goes through
//! [`Engine::add_game`] or [`Engine::remove_game`]. Both re-read `apps.json`
//! before mutating it and are idempotent, so the watcher and the periodic
//! pass can overlap on the same game without producing duplicates.
//!
//! `apps.json` is always written before the state file. A crash between the
//! two leaves an entry that state doesn't know about; the next
//! [`Engine::full_sync`] adopts it.

use std::collections::BTreeSet;

use steamshine_steam::{Catalog, CatalogEntry, LibraryPaths, scan_manifests};
use steamshine_store::{CoverCache, MetadataSource};
use steamshine_sunshine::{AppEntry, AppsStore, Reloader};

use crate::error::SyncError;
use crate::filter::{Decision, FilterPolicy};
use crate::state::{StateStore, SyncState};

#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Drop Sunshine entries for games that are no longer installed.
    pub remove_uninstalled: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            remove_uninstalled: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    AlreadyPresent,
    Skipped(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    NotPresent,
}

/// Counts from one [`Engine::full_sync`] pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub scanned: usize,
    pub adopted: usize,
    pub added: usize,
    pub already_present: usize,
    pub skipped: usize,
    pub removed: usize,
    pub not_present: usize,
    pub failed: usize,
    /// The library could not be listed, so removals were skipped.
    pub root_unavailable: bool,
}

/// Reconciles a Steam library with Sunshine's `apps.json`.
pub struct Engine<M, R> {
    library: LibraryPaths,
    filter: FilterPolicy,
    metadata: M,
    covers: CoverCache,
    apps: AppsStore,
    states: StateStore,
    state: SyncState,
    reloader: R,
    options: EngineOptions,
}

impl<M: MetadataSource, R: Reloader> Engine<M, R> {
    /// Creates an engine, loading the persisted state.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        library: LibraryPaths,
        filter: FilterPolicy,
        metadata: M,
        covers: CoverCache,
        apps: AppsStore,
        states: StateStore,
        reloader: R,
        options: EngineOptions,
    ) -> Self {
        let state = states.load();
        Self {
            library,
            filter,
            metadata,
            covers,
            apps,
            states,
            state,
            reloader,
            options,
        }
    }

    pub fn library(&self) -> &LibraryPaths {
        &self.library
    }

    pub fn state(&self) -> &SyncState {
        &self.state
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Puts a game into `apps.json` if it passes the filters.
    pub async fn add_game(&mut self, entry: &CatalogEntry) -> Result<AddOutcome, SyncError> {
        let app_id = entry.app_id;

        if let Decision::Exclude { reason } = self.filter.check_local(entry) {
            tracing::info!(app_id, name = %entry.name, %reason, "[SKIP] excluded");
            return Ok(AddOutcome::Skipped(reason));
        }

        let details = self.metadata.app_details(app_id).await;
        if details.is_none() {
            tracing::debug!(app_id, "[API] no metadata, treating as playable");
        }
        if let Decision::Exclude { reason } = self.filter.check_playable(details.as_ref()) {
            tracing::info!(app_id, name = %entry.name, %reason, "[SKIP] excluded");
            return Ok(AddOutcome::Skipped(reason));
        }

        let cover = self.metadata.cover_art(app_id, &self.covers).await;

        let mut apps = self.apps.load();
        if apps.contains_app(app_id) {
            tracing::info!(app_id, name = %entry.name, "[EXISTS] already in sunshine");
            self.state.record(app_id, &entry.name);
            self.states.save(&mut self.state);
            return Ok(AddOutcome::AlreadyPresent);
        }

        apps.apps
            .push(AppEntry::for_game(app_id, &entry.name, cover.as_deref()));
        self.apps.save(&apps)?;
        tracing::info!(
            app_id,
            name = %entry.name,
            cover = cover.is_some(),
            "[SUNSHINE] added"
        );

        self.state.record(app_id, &entry.name);
        self.states.save(&mut self.state);
        self.reloader.reload().await;

        Ok(AddOutcome::Added)
    }

    /// Takes a game out of `apps.json`.
    pub async fn remove_game(&mut self, app_id: u32) -> Result<RemoveOutcome, SyncError> {
        let mut apps = self.apps.load();
        let removed = apps.remove_app(app_id);
        if removed == 0 {
            tracing::debug!(app_id, "not in sunshine, nothing to remove");
            return Ok(RemoveOutcome::NotPresent);
        }

        self.apps.save(&apps)?;

        match self.covers.remove(app_id) {
            Ok(true) => tracing::debug!(app_id, "[COVER] deleted"),
            Ok(false) => {}
            Err(e) => tracing::warn!(app_id, error = %e, "[COVER] failed to delete"),
        }

        let name = self
            .state
            .forget(app_id)
            .map(|g| g.name)
            .unwrap_or_default();
        self.states.save(&mut self.state);
        tracing::info!(app_id, %name, entries = removed, "[REMOVED] removed from sunshine");

        self.reloader.reload().await;
        Ok(RemoveOutcome::Removed)
    }

    /// Scans the library and reconciles it with `apps.json`.
    ///
    /// Removals are processed before additions, each in ascending app ID
    /// order. A failure on one game is counted and the pass continues.
    pub async fn full_sync(&mut self) -> SyncReport {
        let catalog = scan_manifests(self.library.root());
        self.reconcile(&catalog).await
    }

    async fn reconcile(&mut self, catalog: &Catalog) -> SyncReport {
        let mut report = SyncReport {
            scanned: catalog.len(),
            root_unavailable: catalog.root_unavailable,
            ..SyncReport::default()
        };

        report.adopted = self.adopt(catalog);

        if self.options.remove_uninstalled {
            if catalog.root_unavailable {
                tracing::warn!(
                    path = %self.library.root().display(),
                    "library unavailable, not removing any games"
                );
            } else {
                let gone: Vec<u32> = self
                    .state
                    .known_ids()
                    .filter(|id| !catalog.contains(*id))
                    .collect();
                for app_id in gone {
                    match self.remove_game(app_id).await {
                        Ok(RemoveOutcome::Removed) => report.removed += 1,
                        Ok(RemoveOutcome::NotPresent) => {
                            // The entry was removed by hand; stop tracking it.
                            self.state.forget(app_id);
                            self.states.save(&mut self.state);
                            report.not_present += 1;
                        }
                        Err(e) => {
                            tracing::error!(app_id, error = %e, "failed to remove game");
                            report.failed += 1;
                        }
                    }
                }
            }
        }

        let new: BTreeSet<u32> = catalog
            .ids()
            .filter(|id| !self.state.is_known(*id))
            .collect();
        for app_id in new {
            let Some(entry) = catalog.get(app_id) else {
                continue;
            };
            tracing::info!(app_id, name = %entry.name, "[NEW] found game");
            match self.add_game(entry).await {
                Ok(AddOutcome::Added) => report.added += 1,
                Ok(AddOutcome::AlreadyPresent) => report.already_present += 1,
                Ok(AddOutcome::Skipped(_)) => report.skipped += 1,
                Err(e) => {
                    tracing::error!(app_id, error = %e, "failed to add game");
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            scanned = report.scanned,
            adopted = report.adopted,
            added = report.added,
            removed = report.removed,
            skipped = report.skipped,
            failed = report.failed,
            "full sync complete"
        );
        report
    }

    /// Records installed games that are already in `apps.json` but missing
    /// from state. No network calls are made for them.
    fn adopt(&mut self, catalog: &Catalog) -> usize {
        let apps = self.apps.load();
        let mut adopted = 0;
        for entry in catalog.games.values() {
            if !self.state.is_known(entry.app_id) && apps.contains_app(entry.app_id) {
                tracing::info!(app_id = entry.app_id, name = %entry.name, "[EXISTS] adopting entry");
                self.state.record(entry.app_id, &entry.name);
                adopted += 1;
            }
        }
        if adopted > 0 {
            self.states.save(&mut self.state);
        }
        adopted
    }
}
