//! Recovery guard for the template library.
//!
//! The primary library copy is only ever read. It is validated at the start
//! of every run; when it cannot be indexed, or has fewer slides than
//! expected, it is restored from the pristine backup before anything else
//! happens. A crash in one run therefore cannot leave a damaged library
//! behind for the next.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::atomic::write_atomic;
use crate::catalog::SlotCatalog;
use crate::error::{DeckError, Result};
use crate::library::TemplateLibrary;

/// Outcome of the startup health check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibraryStatus {
    /// Primary copy validated
    Healthy { slides: usize },
    /// Primary copy was damaged and has been restored from the backup
    Restored { slides: usize, reason: String },
    /// No backup existed; one was created from the healthy primary
    BackupSeeded { slides: usize },
    /// Primary copy validated, but the backup could not be indexed
    ///
    /// The backup is left alone. A later failure of the primary cannot be
    /// repaired until the backup is replaced or removed (a missing backup is
    /// seeded from the next healthy primary).
    BackupUnusable { slides: usize, reason: String },
}

impl LibraryStatus {
    /// Slide count of the primary copy after the check
    pub fn slides(&self) -> usize {
        match self {
            Self::Healthy { slides }
            | Self::Restored { slides, .. }
            | Self::BackupSeeded { slides }
            | Self::BackupUnusable { slides, .. } => *slides,
        }
    }

    /// Whether the primary had to be restored
    pub fn was_restored(&self) -> bool {
        matches!(self, Self::Restored { .. })
    }

    /// Whether the next damaged primary can be restored
    pub fn backup_usable(&self) -> bool {
        !matches!(self, Self::BackupUnusable { .. })
    }

    /// One-line report for statuses that need the user's attention
    pub fn notice(&self) -> Option<String> {
        match self {
            Self::Restored { reason, .. } => {
                Some(format!("Template library restored from backup ({})", reason))
            }
            Self::BackupUnusable { reason, .. } => {
                Some(format!("Backup library is unusable ({})", reason))
            }
            Self::Healthy { .. } | Self::BackupSeeded { .. } => None,
        }
    }
}

/// Guards access to a primary/backup library pair
#[derive(Debug, Clone)]
pub struct RecoveryGuard {
    primary: PathBuf,
    backup: PathBuf,
    expected_slides: Option<usize>,
}

impl RecoveryGuard {
    pub fn new(primary: impl Into<PathBuf>, backup: impl Into<PathBuf>) -> Self {
        Self {
            primary: primary.into(),
            backup: backup.into(),
            expected_slides: None,
        }
    }

    /// Minimum slide count of a healthy primary
    ///
    /// Without it the backup's own slide count is used.
    pub fn with_expected_slides(mut self, expected: Option<usize>) -> Self {
        self.expected_slides = expected;
        self
    }

    pub fn primary(&self) -> &Path {
        &self.primary
    }

    pub fn backup(&self) -> &Path {
        &self.backup
    }

    /// Validate the primary copy, restoring it from the backup if needed
    pub fn ensure_healthy(&self) -> Result<LibraryStatus> {
        let mut backup_problem = None;
        let backup_slides = if self.backup.exists() {
            match count_slides(&self.backup) {
                Ok(count) => Some(count),
                Err(e) => {
                    warn!("Backup library {} is unusable: {}", self.backup.display(), e);
                    backup_problem = Some(e.to_string());
                    None
                }
            }
        } else {
            None
        };
        let expected = self.expected_slides.or(backup_slides);

        let problem = match count_slides(&self.primary) {
            Ok(count) if expected.map_or(true, |e| count >= e) => {
                debug!("Primary library {} has {} slides", self.primary.display(), count);
                if !self.backup.exists() {
                    let data = std::fs::read(&self.primary)?;
                    write_atomic(&self.backup, &data)?;
                    info!("Seeded backup library {}", self.backup.display());
                    return Ok(LibraryStatus::BackupSeeded { slides: count });
                }
                if let Some(reason) = backup_problem {
                    return Ok(LibraryStatus::BackupUnusable {
                        slides: count,
                        reason,
                    });
                }
                return Ok(LibraryStatus::Healthy { slides: count });
            }
            Ok(count) => format!(
                "{} slides, expected at least {}",
                count,
                expected.unwrap_or_default()
            ),
            Err(e) if e.is_library_damage() => e.to_string(),
            Err(e) => return Err(e),
        };

        warn!("Primary library {} is damaged: {}", self.primary.display(), problem);

        let Some(slides) = backup_slides else {
            return Err(DeckError::library_corrupt(format!(
                "primary library {} is damaged ({}) and no usable backup exists at {}",
                self.primary.display(),
                problem,
                self.backup.display()
            )));
        };
        if let Some(expected) = self.expected_slides.filter(|&e| slides < e) {
            return Err(DeckError::library_corrupt(format!(
                "backup library {} has {} slides, expected at least {}",
                self.backup.display(),
                slides,
                expected
            )));
        }

        self.restore()?;
        Ok(LibraryStatus::Restored {
            slides,
            reason: problem,
        })
    }

    /// Replace the primary copy with the backup
    ///
    /// The copy is atomic and verified by digest.
    pub fn restore(&self) -> Result<()> {
        let data = std::fs::read(&self.backup).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => DeckError::library_not_found(&self.backup),
            _ => DeckError::Io(e),
        })?;
        write_atomic(&self.primary, &data)?;

        let expected = sha256_hex(&data);
        let actual = sha256_hex(&std::fs::read(&self.primary)?);
        if actual != expected {
            return Err(DeckError::library_corrupt(format!(
                "restored library {} does not match its backup ({} != {})",
                self.primary.display(),
                actual,
                expected
            )));
        }

        info!(
            "Restored primary library {} from {} ({})",
            self.primary.display(),
            self.backup.display(),
            expected
        );
        Ok(())
    }

    /// Load the primary copy into memory and index it
    pub fn load(&self, catalog: Option<&SlotCatalog>) -> Result<TemplateLibrary> {
        TemplateLibrary::load_with_catalog(&self.primary, catalog)
    }

    /// Refuse output paths that would overwrite a library copy
    pub fn check_output_path(&self, output: &Path) -> Result<()> {
        if same_path(output, &self.primary) || same_path(output, &self.backup) {
            return Err(DeckError::OutputConflict {
                path: output.to_path_buf(),
            });
        }
        Ok(())
    }
}

/// Structural validation: the package indexes and has this many slides
fn count_slides(path: &Path) -> Result<usize> {
    Ok(TemplateLibrary::load(path)?.slide_count())
}

/// SHA-256 digest in `sha256:<hex>` form
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    format!(
        "sha256:{}",
        result.iter().map(|b| format!("{:02x}", b)).collect::<String>()
    )
}

fn same_path(a: &Path, b: &Path) -> bool {
    absolute(a) == absolute(b)
}

fn absolute(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    // Not created yet: canonicalize the parent and re-attach the file name
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) if !parent.as_os_str().is_empty() => parent
            .canonicalize()
            .map(|p| p.join(name))
            .unwrap_or_else(|_| path.to_path_buf()),
        (_, Some(name)) => std::env::current_dir()
            .and_then(|d| d.canonicalize())
            .map(|d| d.join(name))
            .unwrap_or_else(|_| path.to_path_buf()),
        _ => path.to_path_buf(),
    }
}
