//! Slot rewriting on copied slides.
//!
//! Text slots keep the shape's formatting: the first paragraph's `a:pPr` and
//! the first run's `a:rPr` are cloned onto every new paragraph, so only the
//! characters change. Empty text clears the shape and hides it, so template
//! boilerplate such as `[TITLE HERE]` never reaches the output. Problems with
//! a single slot become [`SlotWarning`]s; the slot keeps its template
//! default and the remaining slots are still applied.

use std::borrow::Cow;
use std::collections::BTreeMap;

use deckforge_ooxml::{XmlElement, XmlNode};
use tracing::{debug, warn};

use crate::assembler::OutputSlide;
use crate::library::SlideTemplate;
use crate::plan::ContentPlanEntry;
use crate::shapes::{find_shape_mut, set_visible, shape_tree_mut};
use crate::slot::{SlotDef, SlotKind, SlotValue, SlotWarning};

/// Elements of `p:sp` that precede `p:txBody`
const BEFORE_TEXT_BODY: &[&str] = &["nvSpPr", "spPr", "style"];

/// Apply slot values to a copied slide
///
/// Slot ids the template does not define are skipped silently.
pub fn apply(
    slide: &mut OutputSlide,
    values: &BTreeMap<String, SlotValue>,
    template: &SlideTemplate,
) -> Vec<SlotWarning> {
    let position = slide.entry.map(|i| i + 1).unwrap_or(0);
    let mut warnings = Vec::new();

    for (slot_id, value) in values {
        let Some(def) = template.slot(slot_id) else {
            debug!(
                "Slide {} has no slot '{}', value ignored",
                template.slide_index, slot_id
            );
            continue;
        };

        if let Err(reason) = apply_slot(slide, def, value) {
            let warning = SlotWarning {
                position,
                slide_index: template.slide_index,
                slot_id: slot_id.clone(),
                reason,
            };
            warn!("{}", warning);
            warnings.push(warning);
        }
    }

    warnings
}

/// Apply a plan entry, routing `slide_title` into the template's title slot
///
/// An explicit value for the title slot in `slots` wins over `slide_title`.
pub fn apply_entry(
    slide: &mut OutputSlide,
    entry: &ContentPlanEntry,
    template: &SlideTemplate,
) -> Vec<SlotWarning> {
    let values = match (&entry.slide_title, &template.title_slot) {
        (Some(title), Some(slot)) if !entry.slots.contains_key(slot) => {
            let mut values = entry.slots.clone();
            values.insert(slot.clone(), SlotValue::Text(title.clone()));
            Cow::Owned(values)
        }
        _ => Cow::Borrowed(&entry.slots),
    };
    apply(slide, &values, template)
}

fn apply_slot(slide: &mut OutputSlide, def: &SlotDef, value: &SlotValue) -> Result<(), String> {
    let tree = shape_tree_mut(&mut slide.document.root)
        .ok_or_else(|| "slide has no shape tree".to_string())?;
    let shape = find_shape_mut(tree, &def.target.shape, def.target.group.as_deref())
        .ok_or_else(|| format!("shape {} not found on slide", def.target))?;

    match def.kind {
        SlotKind::Toggle => {
            let visible = value.visibility()?;
            if !set_visible(shape, visible) {
                return Err(format!("shape {} has no visibility flag", def.target));
            }
        }
        SlotKind::Text => {
            let lines = value.text_lines()?;
            match def.target.cell {
                Some((row, col)) => {
                    let body = table_cell_body(shape, row, col).ok_or_else(|| {
                        format!("cell ({}, {}) not found in {}", row, col, def.target)
                    })?;
                    write_paragraphs(body, &lines);
                }
                None => {
                    let body = text_body(shape)
                        .ok_or_else(|| format!("shape {} cannot hold text", def.target))?;
                    write_paragraphs(body, &lines);
                    if lines.is_empty() {
                        set_visible(shape, false);
                    }
                }
            }
        }
    }

    Ok(())
}

/// The shape's text body, created for plain shapes that lack one
fn text_body(shape: &mut XmlElement) -> Option<&mut XmlElement> {
    if shape.child("txBody").is_none() {
        if shape.local_name() != "sp" {
            return None;
        }
        let prefix = shape.prefix().map(|p| format!("{}:", p)).unwrap_or_default();
        shape.insert_after(
            BEFORE_TEXT_BODY,
            XmlElement::new(format!("{}txBody", prefix))
                .with_child(XmlElement::new("a:bodyPr"))
                .with_child(XmlElement::new("a:lstStyle"))
                .with_child(XmlElement::new("a:p")),
        );
    }
    shape.child_mut("txBody")
}

/// `a:txBody` of a 1-based table cell
fn table_cell_body(frame: &mut XmlElement, row: u32, col: u32) -> Option<&mut XmlElement> {
    let row = row.checked_sub(1)? as usize;
    let col = col.checked_sub(1)? as usize;
    let table = frame.find_mut("tbl")?;
    let cell = table
        .children_named_mut("tr")
        .nth(row)?
        .children_named_mut("tc")
        .nth(col)?;

    if cell.child("txBody").is_none() {
        cell.children.insert(
            0,
            XmlNode::Element(
                XmlElement::new("a:txBody")
                    .with_child(XmlElement::new("a:bodyPr"))
                    .with_child(XmlElement::new("a:lstStyle"))
                    .with_child(XmlElement::new("a:p")),
            ),
        );
    }
    cell.child_mut("txBody")
}

/// Replace the paragraphs of a text body, one per line
///
/// No lines leaves a single empty paragraph that keeps the formatting.
fn write_paragraphs(body: &mut XmlElement, lines: &[String]) {
    let template = ParagraphTemplate::from_body(body);
    body.remove_children(|e| e.local_name() == "p");

    if lines.is_empty() {
        body.push(template.paragraph(None));
        return;
    }
    for line in lines {
        body.push(template.paragraph(Some(line.as_str())));
    }
}

/// Formatting captured from the placeholder's existing paragraphs
struct ParagraphTemplate {
    prefix: String,
    paragraph_props: Option<XmlElement>,
    run_props: Option<XmlElement>,
    end_props: Option<XmlElement>,
}

impl ParagraphTemplate {
    fn from_body(body: &XmlElement) -> Self {
        let first = body.child("p");
        let prefix = first
            .and_then(|p| p.prefix())
            .map(|p| format!("{}:", p))
            .unwrap_or_else(|| "a:".to_string());

        let paragraph_props = first.and_then(|p| p.child("pPr")).cloned();
        let end_props = first.and_then(|p| p.child("endParaRPr")).cloned();

        // First run anywhere in the body, falling back to the end-of-paragraph
        // properties of the first paragraph
        let run_props = body
            .children_named("p")
            .flat_map(|p| p.children_named("r"))
            .find_map(|r| r.child("rPr"))
            .cloned()
            .or_else(|| {
                end_props.clone().map(|mut props| {
                    props.name = format!("{}rPr", prefix);
                    props
                })
            });

        Self {
            prefix,
            paragraph_props,
            run_props,
            end_props,
        }
    }

    fn paragraph(&self, text: Option<&str>) -> XmlElement {
        let mut paragraph = XmlElement::new(format!("{}p", self.prefix));
        if let Some(props) = &self.paragraph_props {
            paragraph.push(props.clone());
        }

        if let Some(text) = text.map(sanitize).filter(|t| !t.is_empty()) {
            let mut run = XmlElement::new(format!("{}r", self.prefix));
            if let Some(props) = &self.run_props {
                run.push(props.clone());
            }
            run.push(XmlElement::new(format!("{}t", self.prefix)).with_text(text));
            paragraph.push(run);
        }

        if let Some(props) = &self.end_props {
            paragraph.push(props.clone());
        }
        paragraph
    }
}

/// Drop characters XML 1.0 cannot carry
fn sanitize(text: &str) -> String {
    text.chars()
        .filter(|&c| matches!(c, '\t' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..='\u{10FFFF}'))
        .collect()
}
