//! Persisted user preferences.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::warn;

use crate::error::PdfimgError;

/// Default page render resolution.
pub const DEFAULT_DPI: u32 = 200;

/// Lowest accepted render resolution.
pub const MIN_DPI: u32 = 50;

/// Highest accepted render resolution.
pub const MAX_DPI: u32 = 1200;

/// Last-used paths and render DPI, remembered between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    /// Last single-file input.
    pub last_pdf: Option<PathBuf>,

    /// Last batch input folder.
    pub input_folder: Option<PathBuf>,

    /// Last output folder.
    pub output_folder: Option<PathBuf>,

    /// DPI for page renders.
    pub dpi: u32,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            last_pdf: None,
            input_folder: None,
            output_folder: None,
            dpi: DEFAULT_DPI,
        }
    }
}

impl Preferences {
    /// Load preferences from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, PdfimgError> {
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| PdfimgError::Config(e.to_string()))
    }

    /// Load preferences, falling back to defaults when the file is missing
    /// or unreadable.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match Self::from_file(path) {
            Ok(prefs) => prefs,
            Err(e) => {
                warn!("Ignoring corrupted preferences {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Save preferences as pretty JSON, replacing the file atomically.
    pub fn save(&self, path: &Path) -> Result<(), PdfimgError> {
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent)?;
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| PdfimgError::Config(e.to_string()))?;

        let mut file = NamedTempFile::new_in(parent)?;
        file.write_all(content.as_bytes())?;
        file.as_file().sync_all()?;
        file.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    /// Whether `dpi` is inside the accepted render range.
    pub fn dpi_in_range(dpi: u32) -> bool {
        (MIN_DPI..=MAX_DPI).contains(&dpi)
    }
}
