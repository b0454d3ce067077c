//! Run configuration (`deckforge.toml`).
//!
//! ```toml
//! [library]
//! path = "library/library.pptx"
//! backup = "library/library.backup.pptx"
//! catalog = "library/slots.toml"
//! expected_slides = 42
//! title_slide = 1
//!
//! [output]
//! path = "output/output.pptx"
//! save_plan = true
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DeckError, Result};

/// Top-level settings structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub library: LibrarySettings,
    pub output: OutputSettings,
}

/// Template library location and expectations
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LibrarySettings {
    /// Primary library copy
    pub path: PathBuf,
    /// Pristine backup; defaults to `<stem>.backup.<ext>` beside the primary
    pub backup: Option<PathBuf>,
    /// Slot catalog TOML
    pub catalog: Option<PathBuf>,
    /// Minimum slide count of a healthy primary copy
    pub expected_slides: Option<usize>,
    /// Library slide prepended to plans with a `presentation_title`
    pub title_slide: Option<u32>,
}

impl Default for LibrarySettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("library/library.pptx"),
            backup: None,
            catalog: None,
            expected_slides: None,
            title_slide: None,
        }
    }
}

/// Output location
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputSettings {
    /// Generated deck
    pub path: PathBuf,
    /// Also write the content plan as `<stem>.plan.json` beside the deck
    pub save_plan: bool,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("output/output.pptx"),
            save_plan: true,
        }
    }
}

impl Settings {
    /// Parse settings from a TOML string
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        let settings: Self = toml::from_str(toml_str)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a file
    ///
    /// Relative paths in the file are taken relative to the file's directory.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| DeckError::config(format!("cannot read {}: {}", path.display(), e)))?;
        let mut settings = Self::from_toml_str(&content)?;
        if let Some(base) = path.parent() {
            settings.rebase(base);
        }
        Ok(settings)
    }

    /// Make relative paths relative to `base`
    pub fn rebase(&mut self, base: &Path) {
        let rebase = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        rebase(&mut self.library.path);
        if let Some(backup) = self.library.backup.as_mut() {
            rebase(backup);
        }
        if let Some(catalog) = self.library.catalog.as_mut() {
            rebase(catalog);
        }
        rebase(&mut self.output.path);
    }

    /// Backup library path, explicit or derived from the primary
    pub fn backup_path(&self) -> PathBuf {
        if let Some(backup) = &self.library.backup {
            return backup.clone();
        }
        let primary = &self.library.path;
        let stem = primary
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "library".to_string());
        let name = match primary.extension() {
            Some(ext) => format!("{}.backup.{}", stem, ext.to_string_lossy()),
            None => format!("{}.backup", stem),
        };
        primary.with_file_name(name)
    }

    /// Where the content plan is saved next to the output deck
    pub fn plan_path(&self) -> PathBuf {
        let stem = self
            .output
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        self.output.path.with_file_name(format!("{}.plan.json", stem))
    }

    /// Check values that TOML types cannot express
    pub fn validate(&self) -> Result<()> {
        if self.library.path.as_os_str().is_empty() {
            return Err(DeckError::config("library.path must not be empty"));
        }
        if self.output.path.as_os_str().is_empty() {
            return Err(DeckError::config("output.path must not be empty"));
        }
        if self.library.title_slide == Some(0) {
            return Err(DeckError::config("library.title_slide is 1-based"));
        }
        if self.library.backup.as_ref() == Some(&self.library.path) {
            return Err(DeckError::config(
                "library.backup must differ from library.path",
            ));
        }
        Ok(())
    }
}
