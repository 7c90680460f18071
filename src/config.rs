//! Application configuration management.
//!
//! This module handles loading and saving the application configuration:
//! the shell origin, the current shell cache version and an optional
//! download directory override.
//!
//! Configuration is stored at `~/.config/spese-trasferta/config.json`.
//! Backend credentials are deliberately not part of it - they come from
//! the environment (`SPESE_BACKEND_URL`, `SPESE_BACKEND_KEY`,
//! `SPESE_ACCESS_TOKEN`), optionally via a `.env` file.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "spese-trasferta";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Origin the shell is served from, used when none is configured.
const DEFAULT_SHELL_ORIGIN: &str = "https://spese-trasferta.app";

/// Shell cache version used when none is configured. Bumped by the
/// deploying party whenever the precache manifest changes.
const DEFAULT_SHELL_VERSION: &str = "spese-cache-v3";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub shell_origin: Option<String>,
    pub shell_cache_version: Option<String>,
    pub download_dir: Option<PathBuf>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Root directory holding the versioned shell cache stores.
    pub fn cache_root(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME).join("shell"))
    }

    /// Where finished exports land: the configured override, the user's
    /// download directory, or the current directory as a last resort.
    pub fn download_dir(&self) -> PathBuf {
        if let Some(ref dir) = self.download_dir {
            return dir.clone();
        }
        dirs::download_dir().unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn shell_origin(&self) -> &str {
        self.shell_origin.as_deref().unwrap_or(DEFAULT_SHELL_ORIGIN)
    }

    pub fn shell_version(&self) -> &str {
        self.shell_cache_version
            .as_deref()
            .unwrap_or(DEFAULT_SHELL_VERSION)
    }
}
