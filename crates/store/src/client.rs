//! Steam Store HTTP client.
//!
//! Async client using `reqwest`. Metadata lookups are rate limited and
//! retried per [`RetryPolicy`]; cover downloads walk a fixed list of CDN
//! templates and stream the first hit to disk.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::cache::CoverCache;
use crate::policy::RetryPolicy;
use crate::types::{AppDetails, AppDetailsEnvelope};

const DEFAULT_BASE_URL: &str = "https://store.steampowered.com/api";

const USER_AGENT: &str = "SteamMonitor/1.0";

/// Portrait (600x900) cover sources, tried in order. `{appid}` is replaced
/// with the app ID.
pub const COVER_URL_TEMPLATES: &[&str] = &[
    "https://steamcdn-a.akamaihd.net/steam/apps/{appid}/library_600x900_2x.jpg",
    "https://shared.akamai.steamstatic.com/store_item_assets/steam/apps/{appid}/library_600x900_2x.jpg",
    "https://cdn.cloudflare.steamstatic.com/steam/apps/{appid}/library_600x900.jpg",
];

/// Errors from the Steam Store client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    fn is_timeout(&self) -> bool {
        matches!(self, Error::Http(e) if e.is_timeout())
    }
}

/// Steam Store client.
pub struct StoreClient {
    http: reqwest::Client,
    base_url: String,
    cover_templates: Vec<String>,
    policy: RetryPolicy,
}

impl StoreClient {
    /// Creates a new client with the given retry policy.
    pub fn new(policy: RetryPolicy) -> Result<Self, Error> {
        let http = reqwest::Client::builder().user_agent(USER_AGENT).build()?;

        Ok(Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            cover_templates: COVER_URL_TEMPLATES.iter().map(|t| t.to_string()).collect(),
            policy,
        })
    }

    /// Sets a custom base URL (for testing).
    #[cfg(test)]
    pub(crate) fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }

    /// Sets custom cover URL templates (for testing).
    #[cfg(test)]
    pub(crate) fn with_cover_templates(mut self, templates: Vec<String>) -> Self {
        self.cover_templates = templates;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetches store metadata for an app.
    ///
    /// Sleeps the rate-limit interval before every attempt. Transport
    /// errors, timeouts, error statuses and undecodable bodies are retried
    /// with exponential backoff; once attempts run out, returns `None`.
    /// A `success: false` answer is final and also returns `None`.
    pub async fn fetch_details(&self, app_id: u32) -> Option<AppDetails> {
        let attempts = self.policy.max_attempts.max(1);

        for attempt in 0..attempts {
            tokio::time::sleep(self.policy.rate_limit).await;

            match self.get_details(app_id).await {
                Ok(Some(details)) => return Some(details),
                Ok(None) => {
                    warn!(app_id, "[API] API returned success=false");
                    return None;
                }
                Err(e) if e.is_timeout() => {
                    warn!(app_id, "[API] timeout (attempt {}/{attempts})", attempt + 1);
                }
                Err(e) => {
                    warn!(
                        app_id,
                        error = %e,
                        "[API] request failed (attempt {}/{attempts})",
                        attempt + 1
                    );
                }
            }

            if self.policy.has_next(attempt) {
                tokio::time::sleep(self.policy.backoff_for(attempt)).await;
            }
        }

        warn!(app_id, "[API] no metadata after {attempts} attempts");
        None
    }

    /// Performs one `appdetails` request. `Ok(None)` is a negative lookup.
    async fn get_details(&self, app_id: u32) -> Result<Option<AppDetails>, Error> {
        let url = format!("{}/appdetails", self.base_url);
        let resp = self
            .http
            .get(&url)
            .query(&[("appids", app_id.to_string())])
            .timeout(self.policy.request_timeout)
            .send()
            .await?;
        let status = resp.status();

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                body,
            });
        }

        let body = resp.bytes().await?;
        let mut envelopes: HashMap<String, AppDetailsEnvelope> = serde_json::from_slice(&body)?;

        Ok(envelopes
            .remove(&app_id.to_string())
            .and_then(AppDetailsEnvelope::into_details))
    }

    /// Returns the cover for an app, downloading it on first use.
    ///
    /// An existing cached file is returned without touching the network.
    /// Otherwise each template is tried in order until one answers with a
    /// success status. Returns `None` if every source fails.
    pub async fn fetch_cover(&self, app_id: u32, covers: &CoverCache) -> Option<PathBuf> {
        if let Some(path) = covers.cached(app_id) {
            return Some(path);
        }

        if let Err(e) = covers.ensure_dir() {
            warn!(app_id, error = %e, "[COVER] failed to create covers dir");
            return None;
        }

        let dest = covers.cover_path(app_id);
        let part = covers.partial_path(app_id);

        for template in &self.cover_templates {
            let url = template.replace("{appid}", &app_id.to_string());
            match self.download_to(&url, &part, &dest).await {
                Ok(bytes) => {
                    info!(
                        app_id,
                        "[COVER] downloaded ({:.1}KB)",
                        bytes as f64 / 1024.0
                    );
                    return Some(dest);
                }
                Err(e) => debug!(app_id, url = %url, error = %e, "[COVER] source failed"),
            }
        }

        warn!(app_id, "[COVER] no cover found from any source");
        None
    }

    /// Streams a URL into `part`, then renames it to `dest`.
    async fn download_to(&self, url: &str, part: &Path, dest: &Path) -> Result<u64, Error> {
        let mut resp = self
            .http
            .get(url)
            .timeout(self.policy.cover_timeout)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                body: "download failed".into(),
            });
        }

        let result = async {
            let mut file = tokio::fs::File::create(part).await?;
            let mut written = 0u64;
            while let Some(chunk) = resp.chunk().await? {
                file.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }
            file.flush().await?;
            drop(file);
            tokio::fs::rename(part, dest).await?;
            Ok::<_, Error>(written)
        }
        .await;

        if result.is_err() {
            let _ = tokio::fs::remove_file(part).await;
        }
        result
    }
}
