//! Library configuration.

use mediatheque_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for a media library instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Path to the SQLite catalog.
    pub database_path: PathBuf,
    /// Directory receiving generated `<media_id>.jpg` thumbnails.
    pub thumbnail_dir: PathBuf,
    /// Target width of generated thumbnails, in pixels.
    pub thumbnail_width: u32,
    /// JPEG quality of generated thumbnails.
    pub thumbnail_quality: u8,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("mediatheque.db"),
            thumbnail_dir: PathBuf::from("thumbnails"),
            thumbnail_width: 320,
            thumbnail_quality: 85,
        }
    }
}

/// Load configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<LibraryConfig> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| Error::invalid_input(format!("Failed to parse config {:?}: {}", path, e)))
}
