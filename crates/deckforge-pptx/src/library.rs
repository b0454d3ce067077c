//! Template library index.
//!
//! Reads a library deck once, fully into memory, and describes every slide
//! as a [`SlideTemplate`]: its part, its shapes and its named slots. The
//! index is read-only; the assembler deep-copies slide trees out of it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use deckforge_ooxml::{
    rels_path_for, resolve_target, OoxmlArchive, Relationships, XmlDocument,
};
use serde::Serialize;
use tracing::{debug, info};

use crate::catalog::{SlotCatalog, TITLE_SLOT};
use crate::error::{DeckError, Result};
use crate::shapes::{enumerate_shapes, names_match, shape_tree, slot_id_for, ShapeInfo, ShapeKind};
use crate::slot::{SlotDef, SlotKind};
use crate::{PRESENTATION_PART, PRESENTATION_RELS_PART};

/// One reusable slide of the library
#[derive(Debug, Clone)]
pub struct SlideTemplate {
    /// 1-based position in the library's slide list
    pub slide_index: u32,
    /// Package part holding the slide, e.g. `ppt/slides/slide7.xml`
    pub part_name: String,
    /// Named slots, by slot id
    pub slots: BTreeMap<String, SlotDef>,
    /// Slot receiving `slide_title` values, if the slide has one
    pub title_slot: Option<String>,
    pub category: String,
    pub description: String,
    /// Every shape on the slide, groups flattened
    pub shapes: Vec<ShapeInfo>,
    document: XmlDocument,
    relationships: Relationships,
}

impl SlideTemplate {
    /// Look up a slot by id
    pub fn slot(&self, slot_id: &str) -> Option<&SlotDef> {
        self.slots.get(slot_id)
    }

    /// Parsed slide part
    pub fn document(&self) -> &XmlDocument {
        &self.document
    }

    /// Relationships of the slide part
    pub fn relationships(&self) -> &Relationships {
        &self.relationships
    }
}

/// A loaded template library
#[derive(Debug, Clone)]
pub struct TemplateLibrary {
    source: Option<PathBuf>,
    archive: OoxmlArchive,
    slides: Vec<SlideTemplate>,
}

impl TemplateLibrary {
    /// Load a library, deriving slots from shape names
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::load_with_catalog(path, None)
    }

    /// Load a library, taking slots from a catalog where it describes a slide
    ///
    /// The file is read in one pass and closed before parsing starts.
    pub fn load_with_catalog(path: impl AsRef<Path>, catalog: Option<&SlotCatalog>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => DeckError::library_not_found(path),
            _ => DeckError::Io(e),
        })?;

        let mut library = Self::from_bytes(&data, catalog)?;
        library.source = Some(path.to_path_buf());
        info!(
            "Loaded template library {} ({} slides)",
            path.display(),
            library.slide_count()
        );
        Ok(library)
    }

    /// Index a library held in memory
    pub fn from_bytes(data: &[u8], catalog: Option<&SlotCatalog>) -> Result<Self> {
        let archive = OoxmlArchive::from_bytes(data)
            .map_err(|e| DeckError::library_corrupt(format!("cannot unpack package: {}", e)))?;
        Self::from_archive(archive, catalog)
    }

    /// Index an unpacked library package
    pub fn from_archive(archive: OoxmlArchive, catalog: Option<&SlotCatalog>) -> Result<Self> {
        let presentation = archive
            .xml_part(PRESENTATION_PART)
            .map_err(|e| DeckError::library_corrupt(e.to_string()))?;
        let rels = archive
            .require(PRESENTATION_RELS_PART)
            .and_then(Relationships::parse)
            .map_err(|e| DeckError::library_corrupt(e.to_string()))?;

        let mut slides = Vec::new();
        let slide_ids = presentation
            .root
            .child("sldIdLst")
            .map(|list| list.children_named("sldId").collect::<Vec<_>>())
            .unwrap_or_default();

        for (pos, sld_id) in slide_ids.into_iter().enumerate() {
            let slide_index = pos as u32 + 1;
            let rel_id = sld_id
                .prefixed_attr("id")
                .ok_or_else(|| DeckError::corrupt_slide(slide_index, "slide list entry without r:id"))?;
            let target = rels.get(rel_id).ok_or_else(|| {
                DeckError::corrupt_slide(slide_index, format!("relationship {} is missing", rel_id))
            })?;
            let part_name = resolve_target(PRESENTATION_PART, target);

            let template = index_slide(&archive, slide_index, part_name, catalog)?;
            debug!(
                "Indexed slide {} ({}): {} shapes, {} slots",
                template.slide_index,
                template.part_name,
                template.shapes.len(),
                template.slots.len()
            );
            slides.push(template);
        }

        if let Some(catalog) = catalog {
            if let Some(extra) = catalog
                .slides
                .iter()
                .find(|s| s.index as usize > slides.len())
            {
                return Err(DeckError::catalog(format!(
                    "slide {} is described but the library has {} slides",
                    extra.index,
                    slides.len()
                )));
            }
        }

        Ok(Self {
            source: None,
            archive,
            slides,
        })
    }

    /// Resolve a slide by its 1-based index
    pub fn resolve(&self, slide_index: u32) -> Result<&SlideTemplate> {
        slide_index
            .checked_sub(1)
            .and_then(|i| self.slides.get(i as usize))
            .ok_or(DeckError::SlideNotFound {
                index: slide_index,
                available: self.slides.len(),
            })
    }

    /// Number of slides in the library
    pub fn slide_count(&self) -> usize {
        self.slides.len()
    }

    /// All slide templates in library order
    pub fn templates(&self) -> &[SlideTemplate] {
        &self.slides
    }

    /// The unpacked library package
    pub fn archive(&self) -> &OoxmlArchive {
        &self.archive
    }

    /// Path the library was loaded from, if any
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Serializable description of the available templates and slots
    pub fn describe(&self) -> LibraryDescription {
        LibraryDescription {
            slides: self
                .slides
                .iter()
                .map(|template| TemplateDescription {
                    id: template.slide_index,
                    category: template.category.clone(),
                    description: template.description.clone(),
                    slots: template
                        .slots
                        .iter()
                        .map(|(id, def)| {
                            (
                                id.clone(),
                                SlotDescription {
                                    kind: def.kind,
                                    max_words: def.max_words,
                                    max_items: def.max_items,
                                },
                            )
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

fn index_slide(
    archive: &OoxmlArchive,
    slide_index: u32,
    part_name: String,
    catalog: Option<&SlotCatalog>,
) -> Result<SlideTemplate> {
    let document = archive
        .xml_part(&part_name)
        .map_err(|e| DeckError::corrupt_slide(slide_index, e))?;
    let relationships = match archive.get(&rels_path_for(&part_name)) {
        Some(bytes) => {
            Relationships::parse(bytes).map_err(|e| DeckError::corrupt_slide(slide_index, e))?
        }
        None => Relationships::new(),
    };

    let tree = shape_tree(&document.root)
        .ok_or_else(|| DeckError::corrupt_slide(slide_index, "slide has no shape tree"))?;
    let shapes = enumerate_shapes(tree).map_err(|e| DeckError::corrupt_slide(slide_index, e))?;

    let described = catalog.and_then(|c| c.slide(slide_index));
    let (slots, category, description) = match described {
        Some(entry) => {
            let slots = entry.slot_defs();
            for (id, def) in &slots {
                check_target(&shapes, def).map_err(|reason| {
                    DeckError::catalog(format!("slide {}, slot '{}': {}", slide_index, id, reason))
                })?;
            }
            (slots, entry.category.clone(), entry.description.clone())
        }
        None => (derive_slots(&shapes), String::new(), String::new()),
    };

    let title_slot = slots.contains_key(TITLE_SLOT).then(|| TITLE_SLOT.to_string());

    Ok(SlideTemplate {
        slide_index,
        part_name,
        slots,
        title_slot,
        category,
        description,
        shapes,
        document,
        relationships,
    })
}

/// Text slots for every named text shape; the title placeholder becomes `title`
fn derive_slots(shapes: &[ShapeInfo]) -> BTreeMap<String, SlotDef> {
    let mut slots = BTreeMap::new();

    for shape in shapes {
        if shape.kind != ShapeKind::Shape || !shape.has_text {
            continue;
        }
        let id = if shape.is_title() && !slots.contains_key(TITLE_SLOT) {
            TITLE_SLOT.to_string()
        } else {
            slot_id_for(&shape.name)
        };
        if id.is_empty() || slots.contains_key(&id) {
            debug!("Shape '{}' yields no distinct slot id, skipped", shape.name);
            continue;
        }

        let mut def = SlotDef::text(shape.name.clone());
        def.target.group = shape.group.clone();
        slots.insert(id, def);
    }

    slots
}

/// Check that a slot's target exists and can hold its kind of value
fn check_target(shapes: &[ShapeInfo], def: &SlotDef) -> std::result::Result<(), String> {
    let target = &def.target;
    let shape = shapes
        .iter()
        .find(|s| {
            names_match(&s.name, &target.shape)
                && match &target.group {
                    Some(group) => s.group.as_deref().is_some_and(|g| names_match(g, group)),
                    None => true,
                }
        })
        .ok_or_else(|| format!("shape {} not found", target))?;

    if let Some((row, col)) = target.cell {
        let (rows, cols) = shape
            .table
            .ok_or_else(|| format!("shape {} is not a table", target))?;
        if row > rows || col > cols {
            return Err(format!(
                "cell ({}, {}) is outside the {}x{} table '{}'",
                row, col, rows, cols, shape.name
            ));
        }
    } else if def.kind == SlotKind::Text && shape.kind != ShapeKind::Shape {
        return Err(format!("shape {} cannot hold text", target));
    }

    Ok(())
}

/// Library description handed to the plan generator
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LibraryDescription {
    pub slides: Vec<TemplateDescription>,
}

/// One template as seen by the plan generator
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateDescription {
    /// Value to use as `slide_index` in a content plan
    pub id: u32,
    pub category: String,
    pub description: String,
    pub slots: BTreeMap<String, SlotDescription>,
}

/// Slot hints for the plan generator
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotDescription {
    pub kind: SlotKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_words: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_items: Option<u32>,
}

impl LibraryDescription {
    /// Pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape(name: &str, kind: ShapeKind) -> ShapeInfo {
        ShapeInfo {
            id: 1,
            name: name.to_string(),
            kind,
            placeholder: None,
            has_text: kind == ShapeKind::Shape,
            table: None,
            hidden: false,
            group: None,
        }
    }

    #[test]
    fn test_derive_slots_names_title_placeholder() {
        let mut title = shape("Titre 1", ShapeKind::Shape);
        title.placeholder = Some("ctrTitle".to_string());
        let shapes = vec![
            title,
            shape("ZoneTexte 8", ShapeKind::Shape),
            shape("Picture 3", ShapeKind::Picture),
        ];

        let slots = derive_slots(&shapes);
        let ids: Vec<&str> = slots.keys().map(|k| k.as_str()).collect();
        assert_eq!(ids, vec!["title", "zonetexte_8"]);
        assert_eq!(slots["title"].target.shape, "Titre 1");
    }

    #[test]
    fn test_derive_slots_keeps_first_duplicate() {
        let mut grouped = shape("TextBox 2", ShapeKind::Shape);
        grouped.group = Some("Group 5".to_string());
        let shapes = vec![grouped, shape("TextBox 2", ShapeKind::Shape)];

        let slots = derive_slots(&shapes);
        assert_eq!(slots.len(), 1);
        assert_eq!(slots["textbox_2"].target.group.as_deref(), Some("Group 5"));
    }

    #[test]
    fn test_check_target() {
        let mut table = shape("Table 7", ShapeKind::GraphicFrame);
        table.table = Some((2, 2));
        let shapes = vec![table, shape("Picture 3", ShapeKind::Picture)];

        let mut cell = SlotDef::text("table 7");
        cell.target.cell = Some((2, 2));
        assert!(check_target(&shapes, &cell).is_ok());

        cell.target.cell = Some((3, 1));
        assert!(check_target(&shapes, &cell).unwrap_err().contains("outside"));

        assert!(check_target(&shapes, &SlotDef::toggle("Picture 3")).is_ok());
        assert!(check_target(&shapes, &SlotDef::text("Picture 3"))
            .unwrap_err()
            .contains("cannot hold text"));
        assert!(check_target(&shapes, &SlotDef::text("Missing"))
            .unwrap_err()
            .contains("not found"));
    }

    #[test]
    fn test_not_a_package_is_corrupt() {
        let err = TemplateLibrary::from_bytes(b"not a zip", None).unwrap_err();
        assert_eq!(err.code(), "DECK002");
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = TemplateLibrary::load(dir.path().join("absent.pptx")).unwrap_err();
        assert_eq!(err.code(), "DECK001");
    }
}
