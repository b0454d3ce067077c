//! Deck assembly.
//!
//! The output deck starts as the library package with every slide removed:
//! masters, layouts, theme and media stay, while slides, their notes and
//! comments go, together with everything that lists them
//! (`p:sldIdLst`, presentation relationships, content type overrides).
//! Template slides are then deep-copied in plan order and renumbered so
//! that shape ids stay unique across the deck.

use std::collections::HashSet;

use deckforge_ooxml::{
    rels_path_for, ContentTypes, OoxmlArchive, Relationships, XmlDocument, XmlElement, XmlNode,
    CONTENT_TYPES_PART,
};
use tracing::{debug, info};

use crate::error::{DeckError, Result};
use crate::ids::IdAllocator;
use crate::library::{SlideTemplate, TemplateLibrary};
use crate::plan::ContentPlan;
use crate::{
    APP_PROPERTIES_PART, CT_SLIDE, FIRST_SLIDE_ID, NS_RELATIONSHIPS, PRESENTATION_PART,
    PRESENTATION_RELS_PART,
};

/// Folders whose parts belong to individual slides
const SLIDE_OWNED_FOLDERS: &[&str] = &["ppt/slides/", "ppt/notesSlides/", "ppt/comments/"];

/// Slide relationships that are not carried into copies
const DROPPED_SLIDE_RELS: &[&str] = &[
    Relationships::TYPE_NOTES_SLIDE,
    Relationships::TYPE_COMMENTS,
    Relationships::TYPE_MODERN_COMMENTS,
    Relationships::TYPE_SLIDE,
];

/// Elements of `presentation.xml` that precede `p:sldIdLst`
const BEFORE_SLIDE_LIST: &[&str] = &["sldMasterIdLst", "notesMasterIdLst", "handoutMasterIdLst"];

/// One slide of the output deck
#[derive(Debug, Clone)]
pub struct OutputSlide {
    /// Index into the plan's entries, `None` for the generated title slide
    pub entry: Option<usize>,
    /// Library slide this one was copied from
    pub slide_index: u32,
    /// The copied slide part
    pub document: XmlDocument,
    /// Relationships of the copied slide part
    pub relationships: Relationships,
}

/// The presentation being built
#[derive(Debug, Clone)]
pub struct OutputDeck {
    package: OoxmlArchive,
    presentation: XmlDocument,
    presentation_rels: Relationships,
    content_types: ContentTypes,
    slides: Vec<OutputSlide>,
    ids: IdAllocator,
}

impl OutputDeck {
    /// Empty deck sharing the library's masters, layouts and theme
    pub fn new(library: &TemplateLibrary) -> Result<Self> {
        let mut package = library.archive().clone();

        let mut presentation = package.xml_part(PRESENTATION_PART)?;
        let mut presentation_rels = Relationships::parse(package.require(PRESENTATION_RELS_PART)?)?;
        let mut content_types = ContentTypes::parse(package.require(CONTENT_TYPES_PART)?)?;

        presentation_rels.retain(|rel| rel.rel_type != Relationships::TYPE_SLIDE);
        package.retain(|part| !is_slide_owned(part));
        content_types.retain_overrides(|part, _| !is_slide_owned(part));

        let root = &mut presentation.root;
        if let Some(list) = root.child_mut("sldIdLst") {
            list.children.clear();
        }
        // Custom shows and sections list slides by id
        root.remove_children(|e| e.local_name() == "custShowLst");
        if let Some(ext_list) = root.child_mut("extLst") {
            ext_list.remove_children(|ext| ext.find("sectionLst").is_some());
        }

        Ok(Self {
            package,
            presentation,
            presentation_rels,
            content_types,
            slides: Vec::new(),
            ids: IdAllocator::new(),
        })
    }

    /// Append a deep copy of a template slide
    pub fn push(&mut self, entry: Option<usize>, template: &SlideTemplate) -> &mut OutputSlide {
        let mut document = template.document().clone();
        let mut relationships = template.relationships().clone();

        // Library decks often hide their templates
        document.root.remove_attr("show");

        let mut dropped = HashSet::new();
        relationships.retain(|rel| {
            let keep = !DROPPED_SLIDE_RELS.contains(&rel.rel_type.as_str());
            if !keep {
                dropped.insert(rel.id.clone());
            }
            keep
        });
        if !dropped.is_empty() {
            prune_references(&mut document.root, &dropped);
        }

        let mapping = self.ids.renumber(&mut document.root);
        debug!(
            "Copied library slide {} as output slide {} ({} shape ids, {} relationships dropped)",
            template.slide_index,
            self.slides.len() + 1,
            mapping.len(),
            dropped.len()
        );

        self.slides.push(OutputSlide {
            entry,
            slide_index: template.slide_index,
            document,
            relationships,
        });
        let last = self.slides.len() - 1;
        &mut self.slides[last]
    }

    /// Slides in output order
    pub fn slides(&self) -> &[OutputSlide] {
        &self.slides
    }

    /// Slides in output order, mutably
    pub fn slides_mut(&mut self) -> &mut [OutputSlide] {
        &mut self.slides
    }

    /// Number of slides
    pub fn len(&self) -> usize {
        self.slides.len()
    }

    /// Check if the deck has no slides
    pub fn is_empty(&self) -> bool {
        self.slides.is_empty()
    }

    /// Write the slides into the package and return it
    pub fn into_package(self) -> Result<OoxmlArchive> {
        let Self {
            mut package,
            mut presentation,
            mut presentation_rels,
            mut content_types,
            slides,
            ..
        } = self;

        let slide_prefix = presentation
            .root
            .prefix()
            .map(|p| format!("{}:", p))
            .unwrap_or_default();
        let rel_prefix = relationship_prefix(&mut presentation.root);

        let mut entries = Vec::with_capacity(slides.len());
        for (i, slide) in slides.iter().enumerate() {
            let number = i + 1;
            let part = format!("ppt/slides/slide{}.xml", number);

            package.set_xml(part.clone(), &slide.document);
            if !slide.relationships.is_empty() {
                package.set_string(rels_path_for(&part), slide.relationships.to_xml());
            }
            content_types.set_override(&part, CT_SLIDE);

            let rel_id = presentation_rels.add(
                format!("slides/slide{}.xml", number),
                Relationships::TYPE_SLIDE,
            );
            entries.push(
                XmlElement::new(format!("{}sldId", slide_prefix))
                    .with_attr("id", (FIRST_SLIDE_ID + i as u32).to_string())
                    .with_attr(format!("{}:id", rel_prefix), rel_id),
            );
        }

        let root = &mut presentation.root;
        if entries.is_empty() {
            root.remove_children(|e| e.local_name() == "sldIdLst");
        } else {
            if root.child("sldIdLst").is_none() {
                root.insert_after(
                    BEFORE_SLIDE_LIST,
                    XmlElement::new(format!("{}sldIdLst", slide_prefix)),
                );
            }
            if let Some(list) = root.child_mut("sldIdLst") {
                for entry in entries {
                    list.push(entry);
                }
            }
        }

        update_app_properties(&mut package, slides.len())?;

        package.set_xml(PRESENTATION_PART, &presentation);
        package.set_string(PRESENTATION_RELS_PART, presentation_rels.to_xml());
        package.set_string(CONTENT_TYPES_PART, content_types.to_xml());

        info!("Assembled deck with {} slides", slides.len());
        Ok(package)
    }

    /// Serialize the finished deck
    pub fn into_bytes(self) -> Result<Vec<u8>> {
        Ok(self.into_package()?.to_bytes()?)
    }
}

/// Copies template slides into a fresh deck in plan order
#[derive(Debug, Clone, Default)]
pub struct DeckAssembler {
    /// Library slide prepended when the plan has a presentation title
    pub title_slide: Option<u32>,
}

impl DeckAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepend a title slide to titled plans
    pub fn with_title_slide(mut self, slide_index: Option<u32>) -> Self {
        self.title_slide = slide_index;
        self
    }

    /// Build the output deck for a plan
    ///
    /// Every entry is resolved before anything is copied, so an unknown
    /// `slide_index` fails the run without partial work.
    pub fn assemble(&self, plan: &ContentPlan, library: &TemplateLibrary) -> Result<OutputDeck> {
        let templates = plan
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                library
                    .resolve(entry.slide_index)
                    .map_err(|_| DeckError::UnknownSlide {
                        position: i + 1,
                        index: entry.slide_index,
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        let title_template = match (self.title_slide, &plan.presentation_title) {
            (Some(index), Some(_)) => Some(library.resolve(index).map_err(|_| {
                DeckError::config(format!(
                    "title_slide {} is not in the template library ({} slides)",
                    index,
                    library.slide_count()
                ))
            })?),
            _ => None,
        };

        let mut deck = OutputDeck::new(library)?;
        if let Some(template) = title_template {
            deck.push(None, template);
        }
        for (i, template) in templates.into_iter().enumerate() {
            deck.push(Some(i), template);
        }
        Ok(deck)
    }
}

/// Assemble a plan against a library without a title slide
pub fn assemble(plan: &ContentPlan, library: &TemplateLibrary) -> Result<OutputDeck> {
    DeckAssembler::new().assemble(plan, library)
}

fn is_slide_owned(part: &str) -> bool {
    SLIDE_OWNED_FOLDERS.iter().any(|folder| part.starts_with(folder))
}

/// Remove elements that point at dropped relationships
///
/// Returns whether anything below `element` went. An `extLst` entry emptied
/// by the removal goes with it; every other element keeps its place.
fn prune_references(element: &mut XmlElement, dropped: &HashSet<String>) -> bool {
    let before = element.children.len();
    element.remove_children(|child| {
        child
            .attributes
            .iter()
            .any(|(key, value)| key.ends_with(":id") && dropped.contains(value))
    });
    let mut pruned = element.children.len() != before;

    let ext_list = element.local_name() == "extLst";
    element.children.retain_mut(|node| {
        let XmlNode::Element(child) = node else {
            return true;
        };
        if !prune_references(child, dropped) {
            return true;
        }
        pruned = true;
        !(ext_list && child.local_name() == "ext" && child.elements().next().is_none())
    });
    pruned
}

/// Prefix bound to the relationships namespace on the presentation root
fn relationship_prefix(root: &mut XmlElement) -> String {
    let declared = root.attributes.iter().find_map(|(key, value)| {
        key.strip_prefix("xmlns:")
            .filter(|_| value == NS_RELATIONSHIPS)
            .map(str::to_string)
    });
    match declared {
        Some(prefix) => prefix,
        None => {
            root.set_attr("xmlns:r", NS_RELATIONSHIPS);
            "r".to_string()
        }
    }
}

/// Keep the slide and notes counts in `docProps/app.xml` in step
fn update_app_properties(package: &mut OoxmlArchive, slide_count: usize) -> Result<()> {
    if !package.contains(APP_PROPERTIES_PART) {
        return Ok(());
    }
    let mut app = package.xml_part(APP_PROPERTIES_PART)?;
    let mut changed = false;
    for (name, value) in [("Slides", slide_count), ("Notes", 0)] {
        if let Some(element) = app.root.child_mut(name) {
            element.children = vec![XmlNode::Text(value.to_string())];
            changed = true;
        }
    }
    if changed {
        package.set_xml(APP_PROPERTIES_PART, &app);
    }
    Ok(())
}
