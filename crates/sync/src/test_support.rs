//! Fakes and fixtures shared by the engine and watcher tests.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use steamshine_steam::{CatalogEntry, LibraryPaths, manifest_file_name};
use steamshine_store::{AppDetails, CoverCache, MetadataSource, SourceFuture};
use steamshine_sunshine::{AppsStore, ReloadFuture, Reloader};

use crate::engine::{Engine, EngineOptions};
use crate::filter::FilterPolicy;
use crate::state::StateStore;

pub(crate) const MIB: u64 = 1024 * 1024;

#[derive(Default, Clone)]
pub(crate) struct Calls {
    details: Arc<AtomicUsize>,
    covers: Arc<AtomicUsize>,
    reloads: Arc<AtomicUsize>,
}

impl Calls {
    pub(crate) fn details(&self) -> usize {
        self.details.load(Ordering::SeqCst)
    }
    pub(crate) fn covers(&self) -> usize {
        self.covers.load(Ordering::SeqCst)
    }
    pub(crate) fn reloads(&self) -> usize {
        self.reloads.load(Ordering::SeqCst)
    }
}

pub(crate) struct FakeMetadata {
    details: HashMap<u32, AppDetails>,
    calls: Calls,
}

impl MetadataSource for FakeMetadata {
    fn app_details(&self, app_id: u32) -> SourceFuture<'_, Option<AppDetails>> {
        self.calls.details.fetch_add(1, Ordering::SeqCst);
        let details = self.details.get(&app_id).cloned();
        Box::pin(async move { details })
    }

    fn cover_art<'a>(
        &'a self,
        app_id: u32,
        covers: &'a CoverCache,
    ) -> SourceFuture<'a, Option<PathBuf>> {
        self.calls.covers.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            covers.ensure_dir().ok()?;
            let path = covers.cover_path(app_id);
            std::fs::write(&path, b"jpg").ok()?;
            Some(path)
        })
    }
}

pub(crate) struct FakeReloader {
    calls: Calls,
}

impl Reloader for FakeReloader {
    fn reload(&self) -> ReloadFuture<'_> {
        self.calls.reloads.fetch_add(1, Ordering::SeqCst);
        Box::pin(async { true })
    }
}

pub(crate) struct Fixture {
    pub(crate) tmp: tempfile::TempDir,
    pub(crate) calls: Calls,
}

impl Fixture {
    pub(crate) fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("steamapps")).unwrap();
        Self {
            tmp,
            calls: Calls::default(),
        }
    }

    pub(crate) fn library(&self) -> PathBuf {
        self.tmp.path().join("steamapps")
    }

    pub(crate) fn apps(&self) -> AppsStore {
        AppsStore::new(self.tmp.path().join("sunshine").join("apps.json"))
    }

    pub(crate) fn states(&self) -> StateStore {
        StateStore::new(self.tmp.path().join("state.json"))
    }

    pub(crate) fn covers(&self) -> CoverCache {
        CoverCache::new(self.tmp.path().join("covers"))
    }

    pub(crate) fn engine(&self, details: &[(u32, &str)]) -> Engine<FakeMetadata, FakeReloader> {
        self.engine_with(details, EngineOptions::default())
    }

    pub(crate) fn engine_with(
        &self,
        details: &[(u32, &str)],
        options: EngineOptions,
    ) -> Engine<FakeMetadata, FakeReloader> {
        let details = details
            .iter()
            .map(|(id, t)| (*id, AppDetails::with_type(*t)))
            .collect();
        Engine::new(
            LibraryPaths::with_root(self.library()),
            FilterPolicy::new(50, true, true),
            FakeMetadata {
                details,
                calls: self.calls.clone(),
            },
            self.covers(),
            self.apps(),
            self.states(),
            FakeReloader {
                calls: self.calls.clone(),
            },
            options,
        )
    }

    pub(crate) fn install(&self, app_id: u32, name: &str, size_mb: u64) -> CatalogEntry {
        let path = self.library().join(manifest_file_name(app_id));
        let body = format!(
            "\"AppState\"\n{{\n\t\"appid\"\t\"{app_id}\"\n\t\"name\"\t\"{name}\"\n\t\"installdir\"\t\"{name}\"\n\t\"SizeOnDisk\"\t\"{}\"\n}}\n",
            size_mb * MIB
        );
        std::fs::write(&path, body).unwrap();
        steamshine_steam::scan_manifest(&path).unwrap()
    }

    pub(crate) fn uninstall(&self, app_id: u32) {
        std::fs::remove_file(self.library().join(manifest_file_name(app_id))).unwrap();
    }

    pub(crate) fn launch_commands(&self) -> Vec<String> {
        self.apps()
            .load()
            .apps
            .iter()
            .filter_map(|a| a.cmd.clone())
            .collect()
    }
}
