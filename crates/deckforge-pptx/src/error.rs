//! Error types for deck materialization.

use std::path::PathBuf;

use deckforge_ooxml::OoxmlError;
use thiserror::Error;

/// Result type for deck operations
pub type Result<T> = std::result::Result<T, DeckError>;

/// Fatal errors of a materialization run
///
/// Per-slot problems are not errors; see [`crate::SlotWarning`].
#[derive(Error, Debug)]
pub enum DeckError {
    /// Library file does not exist
    #[error("Template library not found: {path}")]
    LibraryNotFound { path: PathBuf },

    /// Library cannot be parsed or its slides cannot be enumerated
    #[error("Template library is corrupt: {reason}")]
    LibraryCorrupt { reason: String },

    /// A slide index was requested that the library does not contain
    #[error("Slide {index} not found in template library ({available} slides available)")]
    SlideNotFound { index: u32, available: usize },

    /// Content plan references a slide the library does not contain
    #[error("Content plan entry {position} references unknown slide_index {index}")]
    UnknownSlide { position: usize, index: u32 },

    /// Content plan cannot be parsed
    #[error("Invalid content plan: {reason}")]
    InvalidPlan { reason: String },

    /// Slot catalog cannot be parsed or is inconsistent
    #[error("Slot catalog error: {reason}")]
    Catalog { reason: String },

    /// Settings cannot be parsed or are inconsistent
    #[error("Configuration error: {reason}")]
    Config { reason: String },

    /// Output path would overwrite a library copy
    #[error("Output path {path} would overwrite a template library copy")]
    OutputConflict { path: PathBuf },

    /// Final atomic write failed
    #[error("Failed to write {path}: {source}")]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Package-level error
    #[error("Package error: {0}")]
    Package(#[from] OoxmlError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl DeckError {
    /// Create a library not found error
    pub fn library_not_found(path: impl Into<PathBuf>) -> Self {
        Self::LibraryNotFound { path: path.into() }
    }

    /// Create a library corrupt error
    pub fn library_corrupt(reason: impl Into<String>) -> Self {
        Self::LibraryCorrupt {
            reason: reason.into(),
        }
    }

    /// Create a library corrupt error naming the offending slide
    pub fn corrupt_slide(index: u32, reason: impl std::fmt::Display) -> Self {
        Self::LibraryCorrupt {
            reason: format!("slide {}: {}", index, reason),
        }
    }

    /// Create an invalid plan error
    pub fn invalid_plan(reason: impl Into<String>) -> Self {
        Self::InvalidPlan {
            reason: reason.into(),
        }
    }

    /// Create a catalog error
    pub fn catalog(reason: impl Into<String>) -> Self {
        Self::Catalog {
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// Create an output write error
    pub fn output_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::OutputWrite {
            path: path.into(),
            source,
        }
    }

    /// Whether the library itself is unusable
    ///
    /// The recovery guard restores the primary copy on the next run when
    /// this is true.
    pub fn is_library_damage(&self) -> bool {
        matches!(
            self,
            Self::LibraryNotFound { .. } | Self::LibraryCorrupt { .. } | Self::SlideNotFound { .. }
        )
    }

    /// Get the error code for diagnostics
    pub fn code(&self) -> &'static str {
        match self {
            Self::LibraryNotFound { .. } => "DECK001",
            Self::LibraryCorrupt { .. } => "DECK002",
            Self::SlideNotFound { .. } => "DECK003",
            Self::UnknownSlide { .. } => "DECK004",
            Self::InvalidPlan { .. } => "DECK005",
            Self::Catalog { .. } => "DECK006",
            Self::Config { .. } => "DECK007",
            Self::OutputConflict { .. } => "DECK008",
            Self::OutputWrite { .. } => "DECK009",
            Self::Package(_) => "DECK010",
            Self::Io(_) => "DECK011",
            Self::Json(_) => "DECK012",
            Self::Toml(_) => "DECK013",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = DeckError::library_not_found("library.pptx");
        assert_eq!(err.code(), "DECK001");
        assert!(err.to_string().contains("library.pptx"));

        let err = DeckError::UnknownSlide {
            position: 3,
            index: 99,
        };
        assert_eq!(err.code(), "DECK004");
        assert!(err.to_string().contains("entry 3"));
        assert!(err.to_string().contains("99"));
    }

    #[test]
    fn test_corrupt_slide_names_index() {
        let err = DeckError::corrupt_slide(12, "shape tree missing");
        assert_eq!(err.code(), "DECK002");
        assert!(err.to_string().contains("slide 12"));
        assert!(err.is_library_damage());
    }

    #[test]
    fn test_plan_errors_are_not_library_damage() {
        assert!(!DeckError::invalid_plan("bad json").is_library_damage());
        assert!(!DeckError::UnknownSlide {
            position: 1,
            index: 4
        }
        .is_library_damage());
    }

    #[test]
    fn test_output_write_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = DeckError::output_write("out/deck.pptx", io);
        assert_eq!(err.code(), "DECK009");
        assert!(std::error::Error::source(&err).is_some());
    }
}
