use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use crate::cache::CoverCache;
use crate::client::StoreClient;
use crate::types::AppDetails;

/// Boxed future returned by [`MetadataSource`] methods.
pub type SourceFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Best-effort provider of app metadata and cover art.
///
/// Both lookups return `None` instead of an error: callers treat missing
/// metadata as "playable" and a missing cover as "no image".
pub trait MetadataSource: Send + Sync {
    /// Looks up store metadata for an app.
    fn app_details(&self, app_id: u32) -> SourceFuture<'_, Option<AppDetails>>;

    /// Returns a local cover image path for an app, downloading it if needed.
    fn cover_art<'a>(
        &'a self,
        app_id: u32,
        covers: &'a CoverCache,
    ) -> SourceFuture<'a, Option<PathBuf>>;
}

impl MetadataSource for StoreClient {
    fn app_details(&self, app_id: u32) -> SourceFuture<'_, Option<AppDetails>> {
        Box::pin(self.fetch_details(app_id))
    }

    fn cover_art<'a>(
        &'a self,
        app_id: u32,
        covers: &'a CoverCache,
    ) -> SourceFuture<'a, Option<PathBuf>> {
        Box::pin(self.fetch_cover(app_id, covers))
    }
}
