//! Editable, order-preserving XML tree for OOXML parts
//!
//! Slide parts have to be copied and rewritten in place without losing any
//! markup the engine does not understand. The tree keeps qualified names,
//! attribute order and whitespace exactly as read, so a part that is parsed
//! and serialized without edits keeps its meaning.
//!
//! # Example
//!
//! ```
//! use deckforge_ooxml::XmlDocument;
//!
//! let mut doc = XmlDocument::parse(br#"<p:sp><p:nvSpPr><p:cNvPr id="4" name="Title 1"/></p:nvSpPr></p:sp>"#)?;
//! let cnvpr = doc.root.find_mut("cNvPr").unwrap();
//! cnvpr.set_attr("hidden", "1");
//! assert!(doc.to_xml().contains(r#"hidden="1""#));
//! # Ok::<(), deckforge_ooxml::OoxmlError>(())
//! ```

use quick_xml::escape::{escape, partial_escape};
use quick_xml::events::{BytesDecl, BytesStart, Event};
use quick_xml::Reader;

use crate::error::{OoxmlError, Result};

/// Standard declaration written by Office applications
pub const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

/// A parsed XML part
#[derive(Debug, Clone, PartialEq)]
pub struct XmlDocument {
    /// The XML declaration, if the source had one
    pub declaration: Option<String>,
    /// The document element
    pub root: XmlElement,
}

/// A node inside an element
#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    /// Child element
    Element(XmlElement),
    /// Character data (unescaped)
    Text(String),
    /// CDATA section
    CData(String),
    /// Comment body
    Comment(String),
}

/// An XML element with its qualified name, attributes and children
#[derive(Debug, Clone, PartialEq)]
pub struct XmlElement {
    /// Qualified name, e.g. `p:cNvPr`
    pub name: String,
    /// Attributes in source order; values are unescaped
    pub attributes: Vec<(String, String)>,
    /// Child nodes in source order
    pub children: Vec<XmlNode>,
}

impl XmlDocument {
    /// Parse XML bytes into a tree
    pub fn parse(xml: &[u8]) -> Result<Self> {
        let xml = xml.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(xml);
        let mut reader = Reader::from_reader(xml);
        // Whitespace inside a:t is content
        reader.config_mut().trim_text(false);

        let mut buf = Vec::new();
        let mut declaration = None;
        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root = None;

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Decl(ref d) => {
                    declaration = Some(declaration_string(d)?);
                }
                Event::Start(ref e) => {
                    stack.push(XmlElement::from_start(e)?);
                }
                Event::Empty(ref e) => {
                    let element = XmlElement::from_start(e)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    let element = stack.pop().ok_or_else(|| {
                        OoxmlError::InvalidStructure("unbalanced end tag".to_string())
                    })?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(ref t) => {
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(XmlNode::Text(t.unescape()?.into_owned()));
                    }
                }
                Event::CData(ref t) => {
                    if let Some(parent) = stack.last_mut() {
                        let text = String::from_utf8_lossy(t).into_owned();
                        parent.children.push(XmlNode::CData(text));
                    }
                }
                Event::Comment(ref t) => {
                    if let Some(parent) = stack.last_mut() {
                        let text = String::from_utf8_lossy(t).into_owned();
                        parent.children.push(XmlNode::Comment(text));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if !stack.is_empty() {
            return Err(OoxmlError::InvalidStructure(format!(
                "unclosed element <{}>",
                stack[stack.len() - 1].name
            )));
        }

        let root = root.ok_or_else(|| {
            OoxmlError::InvalidStructure("document has no root element".to_string())
        })?;

        Ok(Self { declaration, root })
    }

    /// Create a document with the standard Office declaration
    pub fn with_root(root: XmlElement) -> Self {
        Self {
            declaration: Some(XML_DECLARATION.to_string()),
            root,
        }
    }

    /// Serialize the tree to a string
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        if let Some(decl) = &self.declaration {
            out.push_str(decl);
            out.push('\n');
        }
        self.root.write_into(&mut out);
        out
    }

    /// Serialize the tree to UTF-8 bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_xml().into_bytes()
    }
}

impl XmlElement {
    /// Create an empty element
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Builder-style attribute setter
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    /// Builder-style child append
    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(XmlNode::Element(child));
        self
    }

    /// Builder-style text append
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(XmlNode::Text(text.into()));
        self
    }

    fn from_start(e: &BytesStart) -> Result<Self> {
        let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
        let mut attributes = Vec::new();
        for attr in e.attributes() {
            let attr = attr?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value()?.into_owned();
            attributes.push((key, value));
        }
        Ok(Self {
            name,
            attributes,
            children: Vec::new(),
        })
    }

    /// Namespace prefix of the element name, if any
    pub fn prefix(&self) -> Option<&str> {
        self.name.split_once(':').map(|(prefix, _)| prefix)
    }

    /// Local part of the element name (`p:cNvPr` -> `cNvPr`)
    pub fn local_name(&self) -> &str {
        local_part(&self.name)
    }

    /// Get an attribute by its exact qualified name
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Get a namespaced attribute by local name, whatever its prefix
    ///
    /// `r:id` and `rel:id` both match `prefixed_attr("id")`, the
    /// unprefixed `id` does not.
    pub fn prefixed_attr(&self, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k.split_once(':').is_some_and(|(_, l)| l == local))
            .map(|(_, v)| v.as_str())
    }

    /// Set an attribute, replacing any existing value in place
    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((key, value)),
        }
    }

    /// Remove an attribute, returning its old value
    pub fn remove_attr(&mut self, key: &str) -> Option<String> {
        let pos = self.attributes.iter().position(|(k, _)| k == key)?;
        Some(self.attributes.remove(pos).1)
    }

    /// Iterate over child elements
    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(e) => Some(e),
            _ => None,
        })
    }

    /// Iterate mutably over child elements
    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut XmlElement> {
        self.children.iter_mut().filter_map(|node| match node {
            XmlNode::Element(e) => Some(e),
            _ => None,
        })
    }

    /// First child element with the given local name
    pub fn child(&self, local: &str) -> Option<&XmlElement> {
        self.elements().find(|e| e.local_name() == local)
    }

    /// First child element with the given local name, mutably
    pub fn child_mut(&mut self, local: &str) -> Option<&mut XmlElement> {
        self.elements_mut().find(|e| e.local_name() == local)
    }

    /// All child elements with the given local name
    pub fn children_named<'a>(&'a self, local: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.elements().filter(move |e| e.local_name() == local)
    }

    /// All child elements with the given local name, mutably
    pub fn children_named_mut<'a>(
        &'a mut self,
        local: &'a str,
    ) -> impl Iterator<Item = &'a mut XmlElement> {
        self.elements_mut().filter(move |e| e.local_name() == local)
    }

    /// First descendant (depth-first, document order) with the given local name
    pub fn find(&self, local: &str) -> Option<&XmlElement> {
        for child in self.elements() {
            if child.local_name() == local {
                return Some(child);
            }
            if let Some(found) = child.find(local) {
                return Some(found);
            }
        }
        None
    }

    /// First descendant with the given local name, mutably
    pub fn find_mut(&mut self, local: &str) -> Option<&mut XmlElement> {
        for child in self.elements_mut() {
            if child.local_name() == local {
                return Some(child);
            }
            if let Some(found) = child.find_mut(local) {
                return Some(found);
            }
        }
        None
    }

    /// Visit this element and every descendant in document order
    pub fn walk(&self, visit: &mut impl FnMut(&XmlElement)) {
        visit(self);
        for child in self.elements() {
            child.walk(visit);
        }
    }

    /// Visit this element and every descendant in document order, mutably
    pub fn walk_mut(&mut self, visit: &mut impl FnMut(&mut XmlElement)) {
        visit(self);
        for child in self.elements_mut() {
            child.walk_mut(visit);
        }
    }

    /// Append a child element
    pub fn push(&mut self, child: XmlElement) {
        self.children.push(XmlNode::Element(child));
    }

    /// Insert a child element after the last child matching one of `after`
    ///
    /// Falls back to inserting first when none of them is present. OOXML
    /// schemas are sequence-ordered, so placement matters.
    pub fn insert_after(&mut self, after: &[&str], child: XmlElement) {
        let pos = self
            .children
            .iter()
            .rposition(|node| match node {
                XmlNode::Element(e) => after.contains(&e.local_name()),
                _ => false,
            })
            .map(|p| p + 1)
            .unwrap_or(0);
        self.children.insert(pos, XmlNode::Element(child));
    }

    /// Remove every child element for which `remove` returns true
    pub fn remove_children(&mut self, mut remove: impl FnMut(&XmlElement) -> bool) {
        self.children.retain(|node| match node {
            XmlNode::Element(e) => !remove(e),
            _ => true,
        });
    }

    /// Concatenated character data of this element and its descendants
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for node in &self.children {
            match node {
                XmlNode::Text(t) | XmlNode::CData(t) => out.push_str(t),
                XmlNode::Element(e) => e.collect_text(out),
                XmlNode::Comment(_) => {}
            }
        }
    }

    /// Serialize this element
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        self.write_into(&mut out);
        out
    }

    fn write_into(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (key, value) in &self.attributes {
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            out.push_str(&escape(value.as_str()));
            out.push('"');
        }

        if self.children.is_empty() {
            out.push_str("/>");
            return;
        }

        out.push('>');
        for node in &self.children {
            match node {
                XmlNode::Element(e) => e.write_into(out),
                XmlNode::Text(t) => out.push_str(&partial_escape(t.as_str())),
                XmlNode::CData(t) => {
                    out.push_str("<![CDATA[");
                    out.push_str(t);
                    out.push_str("]]>");
                }
                XmlNode::Comment(t) => {
                    out.push_str("<!--");
                    out.push_str(t);
                    out.push_str("-->");
                }
            }
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }
}

/// Local part of a qualified name
pub fn local_part(name: &str) -> &str {
    name.rsplit_once(':').map(|(_, local)| local).unwrap_or(name)
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(XmlNode::Element(element));
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err(OoxmlError::InvalidStructure(format!(
            "second root element <{}>",
            element.name
        ))),
    }
}

fn declaration_string(decl: &BytesDecl) -> Result<String> {
    let version = decl.version()?;
    let mut out = format!(
        r#"<?xml version="{}""#,
        String::from_utf8_lossy(&version)
    );
    if let Some(encoding) = decl.encoding() {
        let encoding = encoding?;
        out.push_str(&format!(r#" encoding="{}""#, String::from_utf8_lossy(&encoding)));
    }
    if let Some(standalone) = decl.standalone() {
        let standalone = standalone?;
        out.push_str(&format!(
            r#" standalone="{}""#,
            String::from_utf8_lossy(&standalone)
        ));
    }
    out.push_str("?>");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHAPE: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sld xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
  <p:cSld>
    <p:spTree>
      <p:sp>
        <p:nvSpPr><p:cNvPr id="2" name="Title 1"/></p:nvSpPr>
        <p:txBody><a:p><a:r><a:rPr lang="en-US" b="1"/><a:t>Fish &amp; Chips  </a:t></a:r></a:p></p:txBody>
      </p:sp>
    </p:spTree>
  </p:cSld>
</p:sld>"#;

    #[test]
    fn test_parse_keeps_names_and_attributes() {
        let doc = XmlDocument::parse(SHAPE.as_bytes()).unwrap();

        assert_eq!(doc.root.name, "p:sld");
        assert_eq!(doc.root.local_name(), "sld");
        assert_eq!(doc.root.prefix(), Some("p"));

        let cnvpr = doc.root.find("cNvPr").unwrap();
        assert_eq!(cnvpr.attr("id"), Some("2"));
        assert_eq!(cnvpr.attr("name"), Some("Title 1"));
    }

    #[test]
    fn test_text_is_unescaped_and_whitespace_kept() {
        let doc = XmlDocument::parse(SHAPE.as_bytes()).unwrap();
        let t = doc.root.find("t").unwrap();
        assert_eq!(t.text(), "Fish & Chips  ");
    }

    #[test]
    fn test_roundtrip_is_stable() {
        let doc = XmlDocument::parse(SHAPE.as_bytes()).unwrap();
        let once = doc.to_xml();
        let twice = XmlDocument::parse(once.as_bytes()).unwrap().to_xml();

        assert_eq!(once, twice);
        assert!(once.starts_with(XML_DECLARATION));
        assert!(once.contains("Fish &amp; Chips  "));
    }

    #[test]
    fn test_attribute_edits() {
        let mut doc = XmlDocument::parse(SHAPE.as_bytes()).unwrap();
        let cnvpr = doc.root.find_mut("cNvPr").unwrap();

        cnvpr.set_attr("id", "42");
        cnvpr.set_attr("hidden", "1");
        assert_eq!(
            cnvpr.attributes,
            vec![
                ("id".to_string(), "42".to_string()),
                ("name".to_string(), "Title 1".to_string()),
                ("hidden".to_string(), "1".to_string()),
            ]
        );

        assert_eq!(cnvpr.remove_attr("hidden"), Some("1".to_string()));
        assert_eq!(cnvpr.attr("hidden"), None);
    }

    #[test]
    fn test_prefixed_attr() {
        let el = XmlElement::new("p:sldId")
            .with_attr("id", "256")
            .with_attr("r:id", "rId7");

        assert_eq!(el.attr("id"), Some("256"));
        assert_eq!(el.prefixed_attr("id"), Some("rId7"));
    }

    #[test]
    fn test_attribute_values_are_escaped() {
        let el = XmlElement::new("p:cNvPr").with_attr("name", "A \"quoted\" <name>");
        assert_eq!(
            el.to_xml(),
            r#"<p:cNvPr name="A &quot;quoted&quot; &lt;name&gt;"/>"#
        );
    }

    #[test]
    fn test_insert_after_respects_sequence() {
        let mut pres = XmlElement::new("p:presentation")
            .with_child(XmlElement::new("p:sldMasterIdLst"))
            .with_child(XmlElement::new("p:notesMasterIdLst"))
            .with_child(XmlElement::new("p:sldSz"));

        pres.insert_after(
            &["sldMasterIdLst", "notesMasterIdLst", "handoutMasterIdLst"],
            XmlElement::new("p:sldIdLst"),
        );

        let order: Vec<&str> = pres.elements().map(|e| e.local_name()).collect();
        assert_eq!(
            order,
            vec!["sldMasterIdLst", "notesMasterIdLst", "sldIdLst", "sldSz"]
        );
    }

    #[test]
    fn test_remove_children_and_walk() {
        let mut tree = XmlElement::new("root")
            .with_child(XmlElement::new("a:keep"))
            .with_child(XmlElement::new("a:drop"))
            .with_child(XmlElement::new("a:keep").with_child(XmlElement::new("a:drop")));

        tree.remove_children(|e| e.local_name() == "drop");

        let mut names = Vec::new();
        tree.walk(&mut |e| names.push(e.local_name().to_string()));
        assert_eq!(names, vec!["root", "keep", "keep", "drop"]);
    }

    #[test]
    fn test_rejects_unbalanced_markup() {
        assert!(XmlDocument::parse(b"<a><b></a>").is_err());
        assert!(XmlDocument::parse(b"").is_err());
    }

    #[test]
    fn test_bom_is_ignored() {
        let doc = XmlDocument::parse(b"\xEF\xBB\xBF<root/>").unwrap();
        assert_eq!(doc.root.name, "root");
        assert!(doc.declaration.is_none());
    }
}
