//! Versioned on-disk store for cached shell responses.
//!
//! Each cache version owns one directory under the cache root, holding
//! the response bodies plus a JSON index mapping request URLs to their
//! snapshot metadata. Superseded versions are removed wholesale at
//! activation time.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::fetch::FetchResponse;
use super::CacheError;

/// Index filename inside each version directory.
const INDEX_FILE: &str = "index.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexEntry {
    file: String,
    status: u16,
    content_type: Option<String>,
    cached_at: DateTime<Utc>,
}

/// One generation of the cached shell, named by its opaque version tag.
pub struct CacheStore {
    version: String,
    dir: PathBuf,
    index: HashMap<String, IndexEntry>,
}

impl CacheStore {
    /// Open (or create) the store for the given version.
    pub fn open(cache_root: &Path, version: &str) -> Result<Self, CacheError> {
        let dir = cache_root.join(version);
        fs::create_dir_all(&dir)?;

        let index_path = dir.join(INDEX_FILE);
        let index = if index_path.exists() {
            serde_json::from_str(&fs::read_to_string(&index_path)?)?
        } else {
            HashMap::new()
        };

        Ok(Self {
            version: version.to_string(),
            dir,
            index,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn contains(&self, url: &str) -> bool {
        self.index.contains_key(url)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Store a response snapshot under its request URL. A second write
    /// for the same URL overwrites the first.
    pub fn put(&mut self, url: &str, response: &FetchResponse) -> Result<(), CacheError> {
        let file = Self::entry_filename(url);
        fs::write(self.dir.join(&file), &response.body)?;

        self.index.insert(
            url.to_string(),
            IndexEntry {
                file,
                status: response.status,
                content_type: response.content_type.clone(),
                cached_at: Utc::now(),
            },
        );
        self.save_index()
    }

    /// Read a stored snapshot back, byte-identical to what was put.
    pub fn get(&self, url: &str) -> Result<Option<FetchResponse>, CacheError> {
        let Some(entry) = self.index.get(url) else {
            return Ok(None);
        };

        let path = self.dir.join(&entry.file);
        if !path.exists() {
            // Index and directory drifted apart; treat as a miss
            warn!(url = url, "Cache index points at a missing file");
            return Ok(None);
        }

        let body = fs::read(path)?;
        Ok(Some(FetchResponse {
            status: entry.status,
            content_type: entry.content_type.clone(),
            body,
        }))
    }

    /// Delete every version directory under the cache root except `keep`.
    /// Returns the removed version names.
    pub fn prune_versions(cache_root: &Path, keep: &str) -> Result<Vec<String>, CacheError> {
        let mut removed = Vec::new();
        if !cache_root.exists() {
            return Ok(removed);
        }

        for entry in fs::read_dir(cache_root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if name != keep {
                fs::remove_dir_all(entry.path())?;
                removed.push(name);
            }
        }

        Ok(removed)
    }

    /// List the version directories currently present under the root.
    pub fn list_versions(cache_root: &Path) -> Result<Vec<String>, CacheError> {
        let mut versions = Vec::new();
        if !cache_root.exists() {
            return Ok(versions);
        }

        for entry in fs::read_dir(cache_root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                versions.push(entry.file_name().to_string_lossy().to_string());
            }
        }

        versions.sort();
        Ok(versions)
    }

    fn save_index(&self) -> Result<(), CacheError> {
        let contents = serde_json::to_string_pretty(&self.index)?;
        fs::write(self.dir.join(INDEX_FILE), contents)?;
        Ok(())
    }

    /// Body filename for a URL. The content type lives in the index, so
    /// the filename only needs to be stable and collision-free per URL.
    fn entry_filename(url: &str) -> String {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        url.hash(&mut hasher);
        format!("entry_{:x}.bin", hasher.finish())
    }
}
