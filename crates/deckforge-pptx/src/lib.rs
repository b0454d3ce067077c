//! # deckforge-pptx
//!
//! Deterministic slide materialization for PowerPoint decks.
//!
//! A *template library* is an ordinary `.pptx` whose slides are reusable
//! layouts. A *content plan* names library slides by 1-based index and gives
//! text for their named slots. This crate copies the requested slides, in
//! plan order and with repeats allowed, into a fresh deck that keeps the
//! library's masters, layouts, theme and media, then rewrites the slot text
//! in place so the template formatting survives.
//!
//! ## Features
//!
//! - **Template Library Index**: slide enumeration and slot discovery,
//!   optionally refined by a TOML slot catalog
//! - **Deck Assembler**: deep slide copies with fresh, deck-unique shape ids
//! - **Slot Rewriter**: text, table cell and visibility slots
//! - **Recovery Guard**: primary/backup library pair with atomic restore
//! - **Byte-stable output**: the same plan and library give the same bytes
//!
//! ## Example
//!
//! ```rust,ignore
//! use deckforge_pptx::{ContentPlan, DeckBuilder, Settings};
//!
//! let settings = Settings::from_file("deckforge.toml")?;
//! let plan = ContentPlan::from_file("plan.json")?;
//! let report = DeckBuilder::new(settings).build(&plan)?;
//! println!("{} slides written to {}", report.slides, report.output.display());
//! ```

pub mod assembler;
pub mod atomic;
pub mod builder;
pub mod catalog;
pub mod error;
pub mod guard;
pub mod ids;
pub mod library;
pub mod plan;
pub mod rewriter;
pub mod settings;
pub mod shapes;
pub mod slot;
#[cfg(feature = "test-utils")]
pub mod test_utils;

// Re-exports
pub use assembler::{assemble, DeckAssembler, OutputDeck, OutputSlide};
pub use atomic::write_atomic;
pub use builder::{render, BuildReport, DeckBuilder};
pub use catalog::{CatalogMeta, CatalogSlide, CatalogSlot, SlotCatalog, TITLE_SLOT};
pub use error::{DeckError, Result};
pub use guard::{sha256_hex, LibraryStatus, RecoveryGuard};
pub use ids::IdAllocator;
pub use library::{
    LibraryDescription, SlideTemplate, SlotDescription, TemplateDescription, TemplateLibrary,
};
pub use plan::{clean_model_response, ContentPlan, ContentPlanEntry};
pub use rewriter::{apply, apply_entry};
pub use settings::{LibrarySettings, OutputSettings, Settings};
pub use shapes::{ShapeInfo, ShapeKind};
pub use slot::{SlotDef, SlotKind, SlotTarget, SlotValue, SlotWarning};

/// Main presentation part
pub const PRESENTATION_PART: &str = "ppt/presentation.xml";

/// Relationships of the presentation part
pub const PRESENTATION_RELS_PART: &str = "ppt/_rels/presentation.xml.rels";

/// Extended properties part carrying slide statistics
pub const APP_PROPERTIES_PART: &str = "docProps/app.xml";

/// Content type of a slide part
pub const CT_SLIDE: &str = "application/vnd.openxmlformats-officedocument.presentationml.slide+xml";

/// Lowest valid `p:sldId/@id`
pub const FIRST_SLIDE_ID: u32 = 256;

/// Office relationships namespace (`r:` prefix)
pub const NS_RELATIONSHIPS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
