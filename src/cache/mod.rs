//! Offline shell cache: versioned local storage of the application
//! shell plus the controller that keeps it in sync with deployments.
//!
//! The cache makes the shell usable without connectivity. Each deploy
//! names a new cache version; installation precaches the shell manifest
//! into that version's store, and activation deletes every superseded
//! store. Routing is network-first: live content wins while online,
//! the cache (with root-document and placeholder fallbacks) takes over
//! when the network goes away.

use thiserror::Error;

pub mod controller;
pub mod fetch;
pub mod store;

pub use controller::{
    InstallPolicy, LifecycleState, ShellCache, ShellMessage, PRECACHE_MANIFEST,
};
pub use fetch::{FetchMode, FetchRequest, FetchResponse, HttpNetwork, Network, NetworkError};
pub use store::CacheStore;

/// Failures inside the shell cache subsystem.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache index corrupt: {0}")]
    Index(#[from] serde_json::Error),

    #[error("precache incomplete: {failed} manifest entries failed to fetch")]
    PrecacheIncomplete { failed: usize },
}
