//! Lifecycle and fetch routing for the offline shell cache.
//!
//! The controller mirrors the standard install / waiting / activating /
//! active worker lifecycle: installation precaches the shell manifest
//! into a fresh versioned store, activation prunes every superseded
//! store, and the active state intercepts shell traffic with a
//! network-first policy and layered cache fallbacks.
//!
//! Earlier revisions of the app served cache-first; network-first is the
//! canonical policy here because it keeps users on live content whenever
//! the network is up while preserving full offline capability.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::fetch::{FetchMode, FetchRequest, FetchResponse, Network, NetworkError};
use super::store::CacheStore;
use super::CacheError;

// ============================================================================
// Constants
// ============================================================================

/// URLs that must be cached before a new version reports installed: the
/// app root, the SPA entry document, the web-app manifest and the
/// placeholder image served for image requests while offline.
pub const PRECACHE_MANIFEST: &[&str] = &["/", "/index.html", "/manifest.json", "/placeholder.png"];

/// Cache path of the offline fallback image.
const PLACEHOLDER_PATH: &str = "/placeholder.png";

/// Path of the root document served to offline navigations.
const ROOT_DOCUMENT_PATH: &str = "/";

/// Extensions treated as script/stylesheet assets. A cache miss for one
/// of these falls back to the root document: build outputs carry content
/// hashes in their names and can never be precached by name.
const SCRIPT_STYLE_EXTENSIONS: &[&str] = &[".js", ".mjs", ".css"];

/// Extensions treated as images, which fall back to the placeholder.
const IMAGE_EXTENSIONS: &[&str] = &[".png", ".jpg", ".jpeg", ".gif", ".webp", ".svg", ".ico"];

/// Controller lifecycle, one state per phase of the hosting runtime's
/// worker lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Installing,
    Waiting,
    Activating,
    Active,
}

/// What to do when a precache fetch fails during install.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallPolicy {
    /// Abort the install; the store may be left partial but the version
    /// never reaches the waiting state.
    Strict,
    /// Log the misses and proceed; offline coverage is degraded for the
    /// missing entries.
    BestEffort,
}

/// The page -> controller message channel. The only accepted shape asks
/// a waiting version to activate immediately instead of waiting for the
/// previous version's documents to close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellMessage {
    SkipWaiting,
}

/// Offline cache controller for the application shell.
pub struct ShellCache<N: Network> {
    origin: String,
    cache_root: PathBuf,
    policy: InstallPolicy,
    state: LifecycleState,
    store: CacheStore,
    network: N,
}

impl<N: Network> ShellCache<N> {
    /// Create a controller for a freshly deployed version. Opens (or
    /// creates) the version's cache store and enters the installing
    /// state.
    pub fn new(
        network: N,
        cache_root: &Path,
        origin: &str,
        version: &str,
        policy: InstallPolicy,
    ) -> Result<Self, CacheError> {
        let store = CacheStore::open(cache_root, version)?;
        Ok(Self {
            origin: origin.trim_end_matches('/').to_string(),
            cache_root: cache_root.to_path_buf(),
            policy,
            state: LifecycleState::Installing,
            store,
            network,
        })
    }

    /// Re-open an already-activated version, as the hosting runtime does
    /// when it revives the controller for a new session. The store is
    /// expected to exist; a missing one simply behaves as empty.
    pub fn resume(
        network: N,
        cache_root: &Path,
        origin: &str,
        version: &str,
        policy: InstallPolicy,
    ) -> Result<Self, CacheError> {
        let mut shell = Self::new(network, cache_root, origin, version, policy)?;
        shell.state = LifecycleState::Active;
        Ok(shell)
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn version(&self) -> &str {
        self.store.version()
    }

    /// Install this version: fetch and store every precache manifest
    /// entry. On success the controller moves to the waiting state; on a
    /// miss the configured `InstallPolicy` decides.
    pub async fn install(&mut self) -> Result<(), CacheError> {
        info!(version = self.store.version(), "Installing shell cache");

        let mut failed = 0usize;
        for path in PRECACHE_MANIFEST {
            let url = self.absolute(path);
            match self.network.fetch(&FetchRequest::get(&url)).await {
                Ok(response) if response.is_ok() => {
                    self.store.put(&url, &response)?;
                }
                Ok(response) => {
                    warn!(url = %url, status = response.status, "Precache fetch returned an error status");
                    failed += 1;
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "Precache fetch failed");
                    failed += 1;
                }
            }
        }

        if failed > 0 {
            match self.policy {
                InstallPolicy::Strict => {
                    return Err(CacheError::PrecacheIncomplete { failed });
                }
                InstallPolicy::BestEffort => {
                    warn!(failed = failed, "Proceeding with incomplete precache");
                }
            }
        }

        self.state = LifecycleState::Waiting;
        info!(version = self.store.version(), "Shell cache installed, waiting to activate");
        Ok(())
    }

    /// Handle an inbound page message. Skip-waiting outside the waiting
    /// state is ignored: it must be a deliberate act, not something that
    /// silently fires on every install.
    pub fn handle_message(&mut self, message: ShellMessage) -> Result<(), CacheError> {
        match message {
            ShellMessage::SkipWaiting => {
                if self.state == LifecycleState::Waiting {
                    info!("Skip-waiting requested, activating now");
                    self.activate()
                } else {
                    debug!(state = ?self.state, "Ignoring skip-waiting outside the waiting state");
                    Ok(())
                }
            }
        }
    }

    /// Standard activation path: the last document controlled by the
    /// previous version has closed.
    #[allow(dead_code)] // Lifecycle API - hosts that do not skip-waiting activate through this
    pub fn clients_closed(&mut self) -> Result<(), CacheError> {
        if self.state == LifecycleState::Waiting {
            self.activate()
        } else {
            Ok(())
        }
    }

    fn activate(&mut self) -> Result<(), CacheError> {
        self.state = LifecycleState::Activating;

        let removed = CacheStore::prune_versions(&self.cache_root, self.store.version())?;
        for old in &removed {
            info!(old_version = %old, "Removed superseded shell cache");
        }

        // From here on this instance claims every open document: all
        // intercepted requests route through this version, including for
        // pages opened under the previous one.
        self.state = LifecycleState::Active;
        info!(version = self.store.version(), "Shell cache active");
        Ok(())
    }

    /// Route one intercepted request. Rules, first match wins:
    ///
    /// 1. non-GET requests pass through untouched;
    /// 2. non-http(s) schemes pass through untouched;
    /// 3. cross-origin requests (receipt photo downloads among them)
    ///    pass through untouched;
    /// 4. navigations go network-first, falling back to the cached root
    ///    document so client-side routing still renders offline;
    /// 5. everything else goes network-first with an async store of 200
    ///    responses, then cache fallback, then the extension-based
    ///    fallbacks, then a synthetic 404.
    ///
    /// Only an active version intercepts at all.
    pub async fn handle_fetch(
        &mut self,
        request: &FetchRequest,
    ) -> Result<FetchResponse, NetworkError> {
        if self.state != LifecycleState::Active
            || !request.is_get()
            || !request.is_http()
            || !self.same_origin(&request.url)
        {
            return self.network.fetch(request).await;
        }

        if request.mode == FetchMode::Navigate {
            return Ok(self.navigate_network_first(request).await);
        }

        Ok(self.asset_network_first(request).await)
    }

    async fn navigate_network_first(&mut self, request: &FetchRequest) -> FetchResponse {
        match self.network.fetch(request).await {
            Ok(response) => response,
            Err(e) => {
                debug!(url = %request.url, error = %e, "Navigation fetch failed, serving cached root");
                self.cache_get(&self.absolute(ROOT_DOCUMENT_PATH))
                    .unwrap_or_else(|| {
                        FetchResponse::not_found("Offline: documento radice non in cache")
                    })
            }
        }
    }

    async fn asset_network_first(&mut self, request: &FetchRequest) -> FetchResponse {
        match self.network.fetch(request).await {
            Ok(response) => {
                if response.is_ok() {
                    self.store_response(&request.url, &response);
                }
                response
            }
            Err(e) => {
                debug!(url = %request.url, error = %e, "Asset fetch failed, falling back to cache");
                self.fallback_for(request)
            }
        }
    }

    /// Store failures degrade offline support for one resource; the page
    /// already has its response and must never see them.
    fn store_response(&mut self, url: &str, response: &FetchResponse) {
        if let Err(e) = self.store.put(url, response) {
            warn!(url = url, error = %e, "Failed to store response in shell cache");
        }
    }

    fn fallback_for(&self, request: &FetchRequest) -> FetchResponse {
        if let Some(cached) = self.cache_get(&request.url) {
            return cached;
        }

        let path = request.path();
        if has_extension(path, SCRIPT_STYLE_EXTENSIONS) {
            if let Some(root) = self.cache_get(&self.absolute(ROOT_DOCUMENT_PATH)) {
                return root;
            }
        } else if has_extension(path, IMAGE_EXTENSIONS) {
            if let Some(placeholder) = self.cache_get(&self.absolute(PLACEHOLDER_PATH)) {
                return placeholder;
            }
        }

        FetchResponse::not_found("Offline: risorsa non disponibile")
    }

    /// Cache read that never propagates: the terminal fallback path must
    /// not throw.
    fn cache_get(&self, url: &str) -> Option<FetchResponse> {
        match self.store.get(url) {
            Ok(found) => found,
            Err(e) => {
                warn!(url = url, error = %e, "Shell cache read failed");
                None
            }
        }
    }

    fn absolute(&self, path: &str) -> String {
        format!("{}{}", self.origin, path)
    }

    fn same_origin(&self, url: &str) -> bool {
        match url.strip_prefix(&self.origin) {
            Some(rest) => rest.is_empty() || rest.starts_with('/') || rest.starts_with('?'),
            None => false,
        }
    }
}

fn has_extension(path: &str, extensions: &[&str]) -> bool {
    extensions.iter().any(|ext| path.ends_with(ext))
}
