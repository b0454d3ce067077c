//! Slot catalog configuration.
//!
//! The catalog names the editable slots of each library slide and maps them
//! to shapes. Slides the catalog does not describe get slots derived from
//! their shape names.
//!
//! ```toml
//! [meta]
//! library = "library.pptx"
//! name = "Corporate library"
//!
//! [[slides]]
//! index = 3
//! category = "content"
//! description = "Title with a bullet list and a 2x2 table"
//! title_shape = "Titre 1"
//!
//! [slides.slots.bullets]
//! shape = "ZoneTexte 8"
//! max_items = 5
//! max_words = 60
//!
//! [slides.slots.picture]
//! shape = "Picture 3"
//! kind = "toggle"
//! ```

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DeckError, Result};
use crate::slot::{SlotDef, SlotKind, SlotTarget};

/// Slot id the title shape is exposed under
pub const TITLE_SLOT: &str = "title";

/// Slot catalog for a template library
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlotCatalog {
    #[serde(default)]
    pub meta: CatalogMeta,

    /// Described slides
    #[serde(default)]
    pub slides: Vec<CatalogSlide>,
}

/// Catalog metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogMeta {
    /// Library file name the catalog was written for
    #[serde(default)]
    pub library: String,

    /// Display name
    #[serde(default)]
    pub name: String,

    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default)]
    pub description: String,
}

impl Default for CatalogMeta {
    fn default() -> Self {
        Self {
            library: String::new(),
            name: String::new(),
            version: default_version(),
            description: String::new(),
        }
    }
}

fn default_version() -> String {
    "1.0.0".to_string()
}

/// One described library slide
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogSlide {
    /// 1-based slide position in the library
    pub index: u32,

    /// Grouping shown to the generation step (e.g. `title`, `content`, `various`)
    #[serde(default)]
    pub category: String,

    /// When the slide should be used
    #[serde(default)]
    pub description: String,

    /// Shape that receives `slide_title` values
    #[serde(default)]
    pub title_shape: Option<String>,

    #[serde(default)]
    pub slots: BTreeMap<String, CatalogSlot>,
}

/// One described slot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogSlot {
    /// Target shape name
    pub shape: String,

    /// Enclosing group shape
    #[serde(default)]
    pub group: Option<String>,

    /// 1-based `[row, column]` of a table cell
    #[serde(default)]
    pub cell: Option<[u32; 2]>,

    #[serde(default)]
    pub kind: SlotKind,

    #[serde(default)]
    pub max_words: Option<u32>,

    #[serde(default)]
    pub max_items: Option<u32>,
}

impl CatalogSlot {
    /// Convert into a slot definition
    pub fn to_slot_def(&self) -> SlotDef {
        SlotDef {
            kind: self.kind,
            target: SlotTarget {
                shape: self.shape.clone(),
                group: self.group.clone(),
                cell: self.cell.map(|[row, col]| (row, col)),
            },
            max_words: self.max_words,
            max_items: self.max_items,
        }
    }
}

impl CatalogSlide {
    /// Slot definitions of this slide, including the title slot
    pub fn slot_defs(&self) -> BTreeMap<String, SlotDef> {
        let mut defs: BTreeMap<String, SlotDef> = self
            .slots
            .iter()
            .map(|(id, slot)| (id.clone(), slot.to_slot_def()))
            .collect();
        if let Some(shape) = &self.title_shape {
            defs.entry(TITLE_SLOT.to_string())
                .or_insert_with(|| SlotDef::text(shape.clone()));
        }
        defs
    }
}

impl SlotCatalog {
    /// Load a catalog from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse a catalog from TOML and check its internal consistency
    pub fn parse(toml_content: &str) -> Result<Self> {
        let catalog: Self = toml::from_str(toml_content)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Description of a library slide, if the catalog has one
    pub fn slide(&self, index: u32) -> Option<&CatalogSlide> {
        self.slides.iter().find(|s| s.index == index)
    }

    /// Check rules that do not need the library itself
    ///
    /// Whether shapes exist is checked when the library is loaded.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();

        for slide in &self.slides {
            if slide.index == 0 {
                return Err(DeckError::catalog("slide index must be 1 or greater"));
            }
            if !seen.insert(slide.index) {
                return Err(DeckError::catalog(format!(
                    "slide {} is described more than once",
                    slide.index
                )));
            }

            for (id, slot) in &slide.slots {
                if id.trim().is_empty() {
                    return Err(DeckError::catalog(format!(
                        "slide {} has a slot with an empty id",
                        slide.index
                    )));
                }
                if slot.shape.trim().is_empty() {
                    return Err(DeckError::catalog(format!(
                        "slot '{}' on slide {} names no shape",
                        id, slide.index
                    )));
                }
                if let Some([row, col]) = slot.cell {
                    if row == 0 || col == 0 {
                        return Err(DeckError::catalog(format!(
                            "slot '{}' on slide {}: table cells are 1-based",
                            id, slide.index
                        )));
                    }
                    if slot.kind == SlotKind::Toggle {
                        return Err(DeckError::catalog(format!(
                            "slot '{}' on slide {}: a table cell cannot be a toggle",
                            id, slide.index
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"
[meta]
library = "library.pptx"
name = "Test library"

[[slides]]
index = 2
category = "title"
description = "Section opener"

[slides.slots.title]
shape = "Title"

[slides.slots.subtitle]
shape = "Subtitle"
max_words = 12

[[slides]]
index = 3
category = "content"
title_shape = "Titre 1"

[slides.slots.bullets]
shape = "ZoneTexte 8"
max_items = 5

[slides.slots.q1]
shape = "Table 7"
cell = [2, 1]

[slides.slots.caption]
shape = "TextBox 2"
group = "Group 5"

[slides.slots.picture]
shape = "Picture 3"
kind = "toggle"
"#;

    #[test]
    fn test_parse_catalog() {
        let catalog = SlotCatalog::parse(CATALOG).unwrap();

        assert_eq!(catalog.meta.name, "Test library");
        assert_eq!(catalog.meta.version, "1.0.0");
        assert_eq!(catalog.slides.len(), 2);

        let slide = catalog.slide(3).unwrap();
        assert_eq!(slide.category, "content");
        assert_eq!(slide.slots["picture"].kind, SlotKind::Toggle);
        assert_eq!(slide.slots["bullets"].kind, SlotKind::Text);
        assert_eq!(slide.slots["q1"].cell, Some([2, 1]));
        assert!(catalog.slide(9).is_none());
    }

    #[test]
    fn test_slot_defs_include_title_shape() {
        let catalog = SlotCatalog::parse(CATALOG).unwrap();
        let defs = catalog.slide(3).unwrap().slot_defs();

        assert_eq!(defs[TITLE_SLOT].target.shape, "Titre 1");
        assert_eq!(defs["q1"].target.cell, Some((2, 1)));
        assert_eq!(defs["caption"].target.group.as_deref(), Some("Group 5"));
        assert_eq!(defs["bullets"].max_items, Some(5));
    }

    #[test]
    fn test_explicit_title_slot_wins_over_title_shape() {
        let catalog = SlotCatalog::parse(
            r#"
[[slides]]
index = 1
title_shape = "Ignored"

[slides.slots.title]
shape = "Real Title"
"#,
        )
        .unwrap();
        let defs = catalog.slide(1).unwrap().slot_defs();
        assert_eq!(defs[TITLE_SLOT].target.shape, "Real Title");
    }

    #[test]
    fn test_rejects_duplicate_slide() {
        let err = SlotCatalog::parse("[[slides]]\nindex = 2\n[[slides]]\nindex = 2\n").unwrap_err();
        assert_eq!(err.code(), "DECK006");
        assert!(err.to_string().contains("slide 2"));
    }

    #[test]
    fn test_rejects_zero_based_cell() {
        let err = SlotCatalog::parse(
            "[[slides]]\nindex = 1\n[slides.slots.x]\nshape = \"Table 1\"\ncell = [0, 1]\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("1-based"));
    }

    #[test]
    fn test_rejects_toggle_cell() {
        let err = SlotCatalog::parse(
            "[[slides]]\nindex = 1\n[slides.slots.x]\nshape = \"Table 1\"\ncell = [1, 1]\nkind = \"toggle\"\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("toggle"));
    }

    #[test]
    fn test_unknown_kind_is_a_toml_error() {
        let err = SlotCatalog::parse(
            "[[slides]]\nindex = 1\n[slides.slots.x]\nshape = \"A\"\nkind = \"chart\"\n",
        )
        .unwrap_err();
        assert_eq!(err.code(), "DECK013");
    }

    #[test]
    fn test_empty_catalog() {
        let catalog = SlotCatalog::parse("").unwrap();
        assert!(catalog.slides.is_empty());
    }
}
