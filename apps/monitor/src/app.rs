//! Wires the daemon together and runs it until interrupted.

use std::path::Path;

use anyhow::Context;
use steamshine_steam::LibraryPaths;
use steamshine_store::{CoverCache, StoreClient};
use steamshine_sunshine::{AppsStore, CommandReloader, NoopReloader, Reloader};
use steamshine_sync::watcher::DEBOUNCE_WINDOW;
use steamshine_sync::{Engine, EventProcessor, EventSource, StateStore};
use tokio_util::sync::CancellationToken;

use crate::config::Config;

/// Runs the initial full sync, then follows library changes until shutdown.
///
/// A missing or unwatchable library does not end the daemon; only setup
/// errors before the first sync are returned.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let library = config.library_dir()?.to_path_buf();
    log_banner(&config, &library);
    ensure_dirs(&config)?;

    let client = StoreClient::new(config.retry_policy())?;
    let reloader: Box<dyn Reloader> = if config.reload_sunshine {
        Box::new(CommandReloader::systemd_user(&config.sunshine_unit))
    } else {
        Box::new(NoopReloader)
    };

    let engine = Engine::new(
        LibraryPaths::with_root(&library),
        config.filter_policy()?,
        client,
        CoverCache::new(&config.covers_dir),
        AppsStore::new(&config.apps_file),
        StateStore::new(&config.state_file),
        reloader,
        config.engine_options(),
    );
    tracing::info!(known = engine.state().known_games.len(), "state loaded");

    let mut processor = EventProcessor::new(engine, config.processor_options());

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel.clone()));

    // Changes made during the first pass queue up in the watcher channel.
    let mut source = EventSource::watch(&library, DEBOUNCE_WINDOW);

    let report = processor.engine_mut().full_sync().await;
    if report.root_unavailable {
        tracing::warn!(path = %library.display(), "steam library not available");
    }
    if cancel.is_cancelled() {
        return Ok(());
    }

    tracing::info!(watching = source.is_watching(), "steamshine ready");
    processor.run(&mut source, cancel).await;

    Ok(())
}

fn log_banner(config: &Config, library: &Path) {
    tracing::info!(
        library = %library.display(),
        apps_file = %config.apps_file.display(),
        covers = %config.covers_dir.display(),
        state = %config.state_file.display(),
        "paths"
    );
    tracing::info!(
        min_size_mb = config.min_size_mb,
        exclude_tools = config.exclude_tools,
        exclude_dlc = config.exclude_dlc,
        remove_uninstalled = config.remove_uninstalled,
        reload_sunshine = config.reload_sunshine,
        full_scan_interval_secs = config.full_scan_interval_secs,
        "policy"
    );
}

/// Creates the covers directory and the parents of the state and apps files.
fn ensure_dirs(config: &Config) -> anyhow::Result<()> {
    let dirs = [
        Some(config.covers_dir.as_path()),
        config.state_file.parent(),
        config.apps_file.parent(),
    ];
    for dir in dirs.into_iter().flatten() {
        if dir.as_os_str().is_empty() {
            continue;
        }
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    Ok(())
}

/// Cancels `cancel` on Ctrl-C or SIGTERM.
async fn shutdown_signal(cancel: CancellationToken) {
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("SIGINT received, shutting down");
        }
        _ = terminate => {
            tracing::info!("SIGTERM received, shutting down");
        }
    }
    cancel.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn ensure_dirs_creates_parents() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config {
            apps_file: tmp.path().join("sunshine").join("apps.json"),
            covers_dir: tmp.path().join("share").join("covers"),
            state_file: tmp.path().join("state").join("state.json"),
            ..Config::default()
        };

        ensure_dirs(&config).unwrap();
        assert!(tmp.path().join("sunshine").is_dir());
        assert!(tmp.path().join("share").join("covers").is_dir());
        assert!(tmp.path().join("state").is_dir());
        assert!(!config.apps_file.exists());
    }

    #[test]
    fn ensure_dirs_accepts_bare_file_names() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config {
            apps_file: PathBuf::from("apps.json"),
            state_file: PathBuf::from("state.json"),
            covers_dir: tmp.path().join("covers"),
            ..Config::default()
        };
        ensure_dirs(&config).unwrap();
    }

    #[tokio::test]
    async fn run_keeps_running_without_library() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config {
            library_path: Some(tmp.path().join("missing")),
            apps_file: tmp.path().join("apps.json"),
            covers_dir: tmp.path().join("covers"),
            state_file: tmp.path().join("state.json"),
            reload_sunshine: false,
            ..Config::default()
        };

        // Still running when the timeout fires.
        let outcome = tokio::time::timeout(std::time::Duration::from_millis(500), run(config)).await;
        assert!(outcome.is_err());
        assert!(tmp.path().join("covers").is_dir());
        assert!(!tmp.path().join("apps.json").exists());
    }
}
