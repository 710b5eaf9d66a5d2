//! Generation-named static asset cache with an offline fallback page.
//!
//! A fixed manifest is fetched at install time and stored under the
//! current generation's directory; activation deletes every other
//! generation. Serving follows the strategy matrix: weather API
//! requests go live-first and fall back to the offline page (plus a
//! sync registration), everything else is cache-first.

use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::sync::{SyncRegistry, SYNC_TAG_WEATHER};

/// Current cache generation. Bump to supersede every older generation
/// on the next activation.
pub const CACHE_GENERATION: &str = "skycast-static-v1";

/// Assets fetched at install time.
pub const PRECACHE_MANIFEST: &[&str] = &[
    "index.html",
    "offline.html",
    "static/js/bundle.js",
    "static/css/main.css",
    "logo.png",
    "manifest.json",
];

/// The fallback page served when neither cache nor network can help.
pub const OFFLINE_PAGE: &str = "offline.html";

const FETCH_TIMEOUT_SECS: u64 = 10;

/// Cache lifecycle, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Installing,
    Active,
    Superseded,
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Failed to build HTTP client: {0}")]
    Client(reqwest::Error),

    #[error("Install fetch failed for {url}: {message}")]
    Install { url: String, message: String },

    #[error("Cache IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Offline page is not cached")]
    OfflineUnavailable,
}

/// Where a served response came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Served {
    Network(Vec<u8>),
    Cache(Vec<u8>),
    OfflinePage(Vec<u8>),
}

impl Served {
    pub fn body(&self) -> &[u8] {
        match self {
            Served::Network(b) | Served::Cache(b) | Served::OfflinePage(b) => b,
        }
    }
}

/// The asset cache for one generation.
pub struct AssetCache {
    /// Directory holding one subdirectory per generation
    root: PathBuf,
    generation: String,
    /// Origin the precache manifest is fetched from
    origin: String,
    /// Substring identifying weather API requests
    api_host: String,
    client: reqwest::Client,
    sync: Arc<SyncRegistry>,
    state: Mutex<WorkerState>,
}

impl AssetCache {
    pub fn new(
        root: &Path,
        origin: &str,
        api_host: &str,
        sync: Arc<SyncRegistry>,
    ) -> Result<Self, CacheError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .build()
            .map_err(CacheError::Client)?;

        Ok(Self {
            root: root.to_path_buf(),
            generation: CACHE_GENERATION.to_string(),
            origin: origin.trim_end_matches('/').to_string(),
            api_host: api_host.to_string(),
            client,
            sync,
            state: Mutex::new(WorkerState::Installing),
        })
    }

    /// Override the generation name (tests, staged rollouts).
    pub fn with_generation(mut self, generation: &str) -> Self {
        self.generation = generation.to_string();
        self
    }

    pub fn state(&self) -> WorkerState {
        *self.state.lock()
    }

    pub fn generation(&self) -> &str {
        &self.generation
    }

    /// Fetch and store every manifest asset under this generation.
    /// Any failure aborts the install; already-written files stay and
    /// are overwritten on the next attempt.
    pub async fn install(&self) -> Result<(), CacheError> {
        let dir = self.generation_dir(&self.generation);
        std::fs::create_dir_all(&dir)?;

        for path in PRECACHE_MANIFEST {
            let url = format!("{}/{}", self.origin, path);
            let response = self
                .client
                .get(&url)
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| CacheError::Install {
                    url: url.clone(),
                    message: e.to_string(),
                })?;
            let body = response.bytes().await.map_err(|e| CacheError::Install {
                url: url.clone(),
                message: e.to_string(),
            })?;

            std::fs::write(dir.join(cache_key(path)), &body)?;
            tracing::debug!(%url, "Precached asset");
        }

        tracing::info!(generation = %self.generation, "Asset cache installed");
        Ok(())
    }

    /// Delete every generation other than this one and become active.
    /// Returns the number of generations removed.
    pub fn activate(&self) -> Result<usize, CacheError> {
        let mut removed = 0;
        if self.root.is_dir() {
            for entry in std::fs::read_dir(&self.root)? {
                let entry = entry?;
                if !entry.file_type()?.is_dir() {
                    continue;
                }
                if entry.file_name().to_string_lossy() != self.generation {
                    std::fs::remove_dir_all(entry.path())?;
                    removed += 1;
                    tracing::info!(
                        stale = %entry.file_name().to_string_lossy(),
                        "Deleted stale cache generation"
                    );
                }
            }
        }
        *self.state.lock() = WorkerState::Active;
        Ok(removed)
    }

    /// Mark this cache as replaced by a newer generation.
    pub fn supersede(&self) {
        *self.state.lock() = WorkerState::Superseded;
    }

    /// Cached bytes for a path or URL, if present in this generation.
    pub fn cached(&self, request: &str) -> Option<Vec<u8>> {
        let path = self
            .generation_dir(&self.generation)
            .join(cache_key(request));
        std::fs::read(path).ok()
    }

    /// Serve a request.
    ///
    /// Weather API requests: network-first; a failure registers the
    /// weather sync tag and falls back to the offline page. Everything
    /// else: cache-first, then network, then the offline page.
    pub async fn fetch(&self, request: &str) -> Result<Served, CacheError> {
        if request.contains(&self.api_host) {
            return match self.get_over_network(request).await {
                Ok(body) => Ok(Served::Network(body)),
                Err(e) => {
                    tracing::warn!("Weather API fetch failed, registering sync: {}", e);
                    self.sync.register(SYNC_TAG_WEATHER);
                    self.offline_page()
                }
            };
        }

        if let Some(body) = self.cached(request) {
            return Ok(Served::Cache(body));
        }

        match self.get_over_network(&self.absolute_url(request)).await {
            Ok(body) => Ok(Served::Network(body)),
            Err(e) => {
                tracing::debug!("Network fallback failed for {}: {}", request, e);
                self.offline_page()
            }
        }
    }

    fn offline_page(&self) -> Result<Served, CacheError> {
        self.cached(OFFLINE_PAGE)
            .map(Served::OfflinePage)
            .ok_or(CacheError::OfflineUnavailable)
    }

    async fn get_over_network(&self, url: &str) -> Result<Vec<u8>, reqwest::Error> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }

    fn absolute_url(&self, request: &str) -> String {
        if request.starts_with("http://") || request.starts_with("https://") {
            request.to_string()
        } else {
            format!("{}/{}", self.origin, request.trim_start_matches('/'))
        }
    }

    fn generation_dir(&self, generation: &str) -> PathBuf {
        self.root.join(generation)
    }
}

/// Flatten a path or URL into a single cache file name.
fn cache_key(request: &str) -> String {
    let path = match url::Url::parse(request) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => request.to_string(),
    };
    path.trim_start_matches('/').replace('/', "_")
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn serving_origin() -> MockServer {
        let server = MockServer::start().await;
        for asset in PRECACHE_MANIFEST {
            Mock::given(method("GET"))
                .and(path(format!("/{}", asset)))
                .respond_with(
                    ResponseTemplate::new(200).set_body_string(format!("content of {}", asset)),
                )
                .mount(&server)
                .await;
        }
        server
    }

    fn cache_at(root: &Path, origin: &str) -> AssetCache {
        AssetCache::new(root, origin, "api.weatherapi.com", Arc::new(SyncRegistry::new()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_install_precaches_manifest() {
        let origin = serving_origin().await;
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_at(dir.path(), &origin.uri());

        cache.install().await.unwrap();

        assert_eq!(
            cache.cached("index.html").unwrap(),
            b"content of index.html"
        );
        assert_eq!(
            cache.cached("static/js/bundle.js").unwrap(),
            b"content of static/js/bundle.js"
        );
        assert_eq!(cache.state(), WorkerState::Installing);
    }

    #[tokio::test]
    async fn test_install_fails_on_missing_asset() {
        let server = MockServer::start().await; // serves nothing -> 404
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_at(dir.path(), &server.uri());

        let err = cache.install().await.unwrap_err();
        assert!(matches!(err, CacheError::Install { .. }));
    }

    #[tokio::test]
    async fn test_activate_deletes_other_generations() {
        let origin = serving_origin().await;
        let dir = tempfile::tempdir().unwrap();

        // Leftovers from two older generations
        std::fs::create_dir_all(dir.path().join("skycast-static-v0")).unwrap();
        std::fs::write(dir.path().join("skycast-static-v0/index.html"), b"old").unwrap();
        std::fs::create_dir_all(dir.path().join("weather-app-v7")).unwrap();

        let cache = cache_at(dir.path(), &origin.uri());
        cache.install().await.unwrap();
        let removed = cache.activate().unwrap();

        assert_eq!(removed, 2);
        assert!(!dir.path().join("skycast-static-v0").exists());
        assert!(!dir.path().join("weather-app-v7").exists());
        // The current generation is retained unchanged
        assert_eq!(
            cache.cached("index.html").unwrap(),
            b"content of index.html"
        );
        assert_eq!(cache.state(), WorkerState::Active);
    }

    #[tokio::test]
    async fn test_supersede() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_at(dir.path(), "http://localhost");
        cache.supersede();
        assert_eq!(cache.state(), WorkerState::Superseded);
    }

    #[tokio::test]
    async fn test_static_requests_are_cache_first() {
        let origin = serving_origin().await;
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_at(dir.path(), &origin.uri());
        cache.install().await.unwrap();

        let served = cache.fetch("index.html").await.unwrap();
        assert!(matches!(served, Served::Cache(_)));
    }

    #[tokio::test]
    async fn test_uncached_static_request_falls_through_to_network() {
        let origin = serving_origin().await;
        Mock::given(method("GET"))
            .and(path("/extra.css"))
            .respond_with(ResponseTemplate::new(200).set_body_string("extra"))
            .mount(&origin)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let cache = cache_at(dir.path(), &origin.uri());
        cache.install().await.unwrap();

        let served = cache.fetch("extra.css").await.unwrap();
        assert_eq!(served, Served::Network(b"extra".to_vec()));
    }

    #[tokio::test]
    async fn test_static_network_failure_falls_back_to_offline_page() {
        let origin = serving_origin().await;
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_at(dir.path(), &origin.uri());
        cache.install().await.unwrap();

        // Nothing mounted for this path -> 404 -> offline page
        let served = cache.fetch("missing.html").await.unwrap();
        assert_eq!(
            served,
            Served::OfflinePage(b"content of offline.html".to_vec())
        );
    }

    #[tokio::test]
    async fn test_weather_api_request_is_network_first() {
        let origin = serving_origin().await;
        let api = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"ok\":true}"))
            .mount(&api)
            .await;

        let dir = tempfile::tempdir().unwrap();
        // The mock API's host:port is the "weather API" marker
        let api_host = api.uri().trim_start_matches("http://").to_string();
        let sync = Arc::new(SyncRegistry::new());
        let cache = AssetCache::new(dir.path(), &origin.uri(), &api_host, sync.clone()).unwrap();
        cache.install().await.unwrap();

        let served = cache
            .fetch(&format!("{}/v1/current.json?q=Paris", api.uri()))
            .await
            .unwrap();
        assert!(matches!(served, Served::Network(_)));
        assert!(sync.pending().is_empty());
    }

    #[tokio::test]
    async fn test_weather_api_failure_registers_sync_and_serves_offline_page() {
        let origin = serving_origin().await;
        let api = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&api)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let api_host = api.uri().trim_start_matches("http://").to_string();
        let sync = Arc::new(SyncRegistry::new());
        let cache = AssetCache::new(dir.path(), &origin.uri(), &api_host, sync.clone()).unwrap();
        cache.install().await.unwrap();

        let served = cache
            .fetch(&format!("{}/v1/current.json?q=Paris", api.uri()))
            .await
            .unwrap();
        assert_eq!(
            served,
            Served::OfflinePage(b"content of offline.html".to_vec())
        );
        assert_eq!(sync.pending(), vec![SYNC_TAG_WEATHER.to_string()]);
    }

    #[tokio::test]
    async fn test_offline_page_missing_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_at(dir.path(), "http://127.0.0.1:9"); // unreachable
        let err = cache.fetch("anything.html").await.unwrap_err();
        assert!(matches!(err, CacheError::OfflineUnavailable));
    }

    #[test]
    fn test_cache_key_flattens_paths_and_urls() {
        assert_eq!(cache_key("static/js/bundle.js"), "static_js_bundle.js");
        assert_eq!(cache_key("/offline.html"), "offline.html");
        assert_eq!(
            cache_key("https://example.com/static/css/main.css"),
            "static_css_main.css"
        );
    }
}
