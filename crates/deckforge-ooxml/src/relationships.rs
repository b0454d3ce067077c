//! Part relationships (`_rels/*.rels`)
//!
//! Every part that points at another part does so through a relationship
//! ID. Slides reference their layout, images, notes and hyperlinks this
//! way, and `presentation.xml` reaches its slides through `r:id` values.
//!
//! # Example
//!
//! ```
//! use deckforge_ooxml::Relationships;
//!
//! let mut rels = Relationships::new();
//! let id = rels.add("slides/slide1.xml", Relationships::TYPE_SLIDE);
//! assert_eq!(id, "rId1");
//! assert_eq!(rels.get("rId1"), Some("slides/slide1.xml"));
//! ```

use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::Result;
use crate::xml::XML_DECLARATION;

/// OPC namespace for relationship parts
pub const RELATIONSHIPS_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

impl Relationships {
    /// Slide relationship (presentation -> slide)
    pub const TYPE_SLIDE: &'static str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide";
    /// Slide layout relationship (slide -> layout)
    pub const TYPE_SLIDE_LAYOUT: &'static str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout";
    /// Notes slide relationship (slide -> notes)
    pub const TYPE_NOTES_SLIDE: &'static str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/notesSlide";
    /// Legacy comments relationship (slide -> comments)
    pub const TYPE_COMMENTS: &'static str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/comments";
    /// Modern threaded comments relationship
    pub const TYPE_MODERN_COMMENTS: &'static str =
        "http://schemas.microsoft.com/office/2018/10/relationships/comments";
    /// Image relationship
    pub const TYPE_IMAGE: &'static str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";
    /// Hyperlink relationship
    pub const TYPE_HYPERLINK: &'static str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink";
}

/// A single relationship entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    /// Relationship ID, e.g. `rId3`
    pub id: String,
    /// Relationship type URI
    pub rel_type: String,
    /// Target path (relative to the source part's folder) or URL
    pub target: String,
    /// `External` for URLs, `None` for package-internal targets
    pub target_mode: Option<String>,
}

impl Relationship {
    /// Check whether the target lives outside the package
    pub fn is_external(&self) -> bool {
        self.target_mode.as_deref() == Some("External")
    }
}

/// Parsed relationships of one part, in document order
#[derive(Debug, Clone)]
pub struct Relationships {
    entries: Vec<Relationship>,
    next_id: u32,
}

impl Default for Relationships {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 1,
        }
    }
}

impl Relationships {
    /// Create an empty relationship set
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a `.rels` part
    pub fn parse(xml: &[u8]) -> Result<Self> {
        let mut reader = Reader::from_reader(xml);
        reader.config_mut().trim_text(true);

        let mut rels = Self::new();
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Empty(ref e) | Event::Start(ref e)
                    if e.local_name().as_ref() == b"Relationship" =>
                {
                    let mut id = None;
                    let mut target = None;
                    let mut rel_type = String::new();
                    let mut target_mode = None;

                    for attr in e.attributes() {
                        let attr = attr?;
                        let value = attr.unescape_value()?.into_owned();
                        match attr.key.as_ref() {
                            b"Id" => id = Some(value),
                            b"Target" => target = Some(value),
                            b"Type" => rel_type = value,
                            b"TargetMode" => target_mode = Some(value),
                            _ => {}
                        }
                    }

                    if let (Some(id), Some(target)) = (id, target) {
                        rels.push(Relationship {
                            id,
                            rel_type,
                            target,
                            target_mode,
                        });
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        Ok(rels)
    }

    fn push(&mut self, rel: Relationship) {
        if let Some(num) = id_number(&rel.id) {
            self.next_id = self.next_id.max(num + 1);
        }
        self.entries.push(rel);
    }

    /// Add an internal relationship and return its generated ID
    pub fn add(&mut self, target: impl Into<String>, rel_type: impl Into<String>) -> String {
        self.add_with_mode(target, rel_type, None)
    }

    /// Add a relationship with an explicit target mode
    pub fn add_with_mode(
        &mut self,
        target: impl Into<String>,
        rel_type: impl Into<String>,
        target_mode: Option<String>,
    ) -> String {
        let id = self.peek_next_id();
        self.push(Relationship {
            id: id.clone(),
            rel_type: rel_type.into(),
            target: target.into(),
            target_mode,
        });
        id
    }

    /// Serialize to a `.rels` part
    pub fn to_xml(&self) -> String {
        let mut xml = String::new();
        xml.push_str(XML_DECLARATION);
        xml.push('\n');
        xml.push_str(&format!(r#"<Relationships xmlns="{}">"#, RELATIONSHIPS_NS));

        for rel in &self.entries {
            xml.push_str(&format!(
                r#"<Relationship Id="{}" Type="{}" Target="{}""#,
                escape(rel.id.as_str()),
                escape(rel.rel_type.as_str()),
                escape(rel.target.as_str()),
            ));
            if let Some(mode) = &rel.target_mode {
                xml.push_str(&format!(r#" TargetMode="{}""#, escape(mode.as_str())));
            }
            xml.push_str("/>");
        }

        xml.push_str("</Relationships>");
        xml
    }

    /// Target of a relationship ID
    pub fn get(&self, id: &str) -> Option<&str> {
        self.get_entry(id).map(|r| r.target.as_str())
    }

    /// Full relationship entry for an ID
    pub fn get_entry(&self, id: &str) -> Option<&Relationship> {
        self.entries.iter().find(|r| r.id == id)
    }

    /// Check if a relationship ID exists
    pub fn contains(&self, id: &str) -> bool {
        self.get_entry(id).is_some()
    }

    /// All relationships of a given type, in document order
    pub fn of_type<'a>(&'a self, rel_type: &'a str) -> impl Iterator<Item = &'a Relationship> {
        self.entries.iter().filter(move |r| r.rel_type == rel_type)
    }

    /// Remove a relationship by ID
    pub fn remove(&mut self, id: &str) -> Option<Relationship> {
        let pos = self.entries.iter().position(|r| r.id == id)?;
        Some(self.entries.remove(pos))
    }

    /// Keep only the relationships for which `keep` returns true
    pub fn retain(&mut self, keep: impl FnMut(&Relationship) -> bool) {
        self.entries.retain(keep);
    }

    /// Number of relationships
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if there are no relationships
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate in document order
    pub fn iter(&self) -> impl Iterator<Item = &Relationship> {
        self.entries.iter()
    }

    /// The ID the next `add` call will return
    ///
    /// IDs are never reused within one set, even after `remove`.
    pub fn peek_next_id(&self) -> String {
        format!("rId{}", self.next_id)
    }
}

/// Path of the relationship part belonging to `part`
///
/// `ppt/slides/slide3.xml` -> `ppt/slides/_rels/slide3.xml.rels`
pub fn rels_path_for(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", part),
    }
}

/// Resolve a relationship target against its source part
///
/// Targets are relative to the source part's folder unless they start
/// with `/`. `..` segments are collapsed.
pub fn resolve_target(source_part: &str, target: &str) -> String {
    let mut segments: Vec<&str> = if let Some(absolute) = target.strip_prefix('/') {
        return normalize(absolute.split('/'));
    } else {
        source_part
            .rsplit_once('/')
            .map(|(dir, _)| dir.split('/').collect())
            .unwrap_or_default()
    };
    segments.extend(target.split('/'));
    normalize(segments.into_iter())
}

fn normalize<'a>(segments: impl Iterator<Item = &'a str>) -> String {
    let mut out: Vec<&str> = Vec::new();
    for segment in segments {
        match segment {
            "" | "." => {}
            ".." => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out.join("/")
}

/// Numeric suffix of an `rIdN` identifier
fn id_number(id: &str) -> Option<u32> {
    id.strip_prefix("rId")
        .or_else(|| id.strip_prefix("RId"))
        .or_else(|| id.strip_prefix("rid"))
        .and_then(|num| num.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SLIDE_RELS: &[u8] = br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout" Target="../slideLayouts/slideLayout2.xml"/>
  <Relationship Id="rId4" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/notesSlide" Target="../notesSlides/notesSlide1.xml"/>
  <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink" Target="https://example.com/a?b&amp;c" TargetMode="External"/>
</Relationships>"#;

    #[test]
    fn test_parse_slide_relationships() {
        let rels = Relationships::parse(SLIDE_RELS).unwrap();

        assert_eq!(rels.len(), 3);
        assert_eq!(rels.get("rId1"), Some("../slideLayouts/slideLayout2.xml"));
        assert_eq!(rels.get("rId2"), Some("https://example.com/a?b&c"));
        assert!(rels.get_entry("rId2").unwrap().is_external());
        assert!(!rels.get_entry("rId1").unwrap().is_external());

        let ids: Vec<&str> = rels.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["rId1", "rId4", "rId2"]);
    }

    #[test]
    fn test_add_continues_after_highest_id() {
        let mut rels = Relationships::parse(SLIDE_RELS).unwrap();
        assert_eq!(rels.peek_next_id(), "rId5");
        assert_eq!(rels.add("../media/image1.png", Relationships::TYPE_IMAGE), "rId5");
    }

    #[test]
    fn test_removed_ids_are_not_reused() {
        let mut rels = Relationships::new();
        rels.add("slides/slide1.xml", Relationships::TYPE_SLIDE);
        let second = rels.add("slides/slide2.xml", Relationships::TYPE_SLIDE);

        rels.remove(&second);
        assert_eq!(rels.add("slides/slide3.xml", Relationships::TYPE_SLIDE), "rId3");
    }

    #[test]
    fn test_retain_and_of_type() {
        let mut rels = Relationships::parse(SLIDE_RELS).unwrap();
        rels.retain(|r| r.rel_type != Relationships::TYPE_NOTES_SLIDE);

        assert_eq!(rels.len(), 2);
        assert_eq!(rels.of_type(Relationships::TYPE_NOTES_SLIDE).count(), 0);
        assert_eq!(rels.of_type(Relationships::TYPE_SLIDE_LAYOUT).count(), 1);
    }

    #[test]
    fn test_serialize_and_reparse() {
        let rels = Relationships::parse(SLIDE_RELS).unwrap();
        let xml = rels.to_xml();

        assert!(xml.starts_with(XML_DECLARATION));
        assert!(xml.contains(r#"Target="https://example.com/a?b&amp;c" TargetMode="External""#));

        let reparsed = Relationships::parse(xml.as_bytes()).unwrap();
        assert_eq!(reparsed.iter().collect::<Vec<_>>(), rels.iter().collect::<Vec<_>>());
    }

    #[test]
    fn test_rels_path_for() {
        assert_eq!(
            rels_path_for("ppt/slides/slide3.xml"),
            "ppt/slides/_rels/slide3.xml.rels"
        );
        assert_eq!(
            rels_path_for("ppt/presentation.xml"),
            "ppt/_rels/presentation.xml.rels"
        );
        assert_eq!(rels_path_for("root.xml"), "_rels/root.xml.rels");
    }

    #[test]
    fn test_resolve_target() {
        assert_eq!(
            resolve_target("ppt/slides/slide1.xml", "../slideLayouts/slideLayout2.xml"),
            "ppt/slideLayouts/slideLayout2.xml"
        );
        assert_eq!(
            resolve_target("ppt/presentation.xml", "slides/slide4.xml"),
            "ppt/slides/slide4.xml"
        );
        assert_eq!(
            resolve_target("ppt/slides/slide1.xml", "/ppt/media/image1.png"),
            "ppt/media/image1.png"
        );
        assert_eq!(
            resolve_target("ppt/slides/slide1.xml", "./../media/./image2.png"),
            "ppt/media/image2.png"
        );
    }

    #[test]
    fn test_id_number() {
        assert_eq!(id_number("rId1"), Some(1));
        assert_eq!(id_number("rId123"), Some(123));
        assert_eq!(id_number("RId5"), Some(5));
        assert_eq!(id_number("invalid"), None);
        assert_eq!(id_number("rIdabc"), None);
    }
}
