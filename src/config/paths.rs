//! XDG path resolution for kasane configuration and data directories.

use anyhow::Result;
use std::path::PathBuf;

use super::types::Config;
use crate::constants::{APP_NAME, CONFIG_FILENAME, CONVERSATIONS_DIRNAME, SUMMARY_STORE_FILENAME};

impl Config {
    /// Returns the platform-specific configuration directory for kasane.
    ///
    /// Returns `~/.config/kasane/` on Linux (`XDG_CONFIG_HOME/kasane`).
    ///
    /// # Errors
    ///
    /// Returns an error if the platform's config directory cannot be determined.
    pub fn config_dir() -> Result<PathBuf> {
        let dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
            .join(APP_NAME);
        Ok(dir)
    }

    /// Returns the platform-specific data directory for kasane.
    ///
    /// Returns `~/.local/share/kasane/` on Linux (`XDG_DATA_HOME/kasane`).
    /// Holds persisted summaries and conversation logs.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform's data directory cannot be determined.
    pub fn data_dir() -> Result<PathBuf> {
        let dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?
            .join(APP_NAME);
        Ok(dir)
    }

    /// Returns the full path to the kasane configuration file.
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILENAME))
    }

    /// Returns the path of the JSON summary store.
    pub fn summary_store_path() -> Result<PathBuf> {
        Ok(Self::data_dir()?.join(SUMMARY_STORE_FILENAME))
    }

    /// Returns the directory holding one JSONL log per conversation.
    pub fn conversations_dir() -> Result<PathBuf> {
        Ok(Self::data_dir()?.join(CONVERSATIONS_DIRNAME))
    }
}
