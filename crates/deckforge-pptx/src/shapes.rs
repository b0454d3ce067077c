//! Shape tree navigation for slide parts.
//!
//! A slide's content lives in `p:cSld/p:spTree`. Every shape carries a
//! non-visual property block (`p:nvSpPr`, `p:nvPicPr`, `p:nvGrpSpPr`, ...)
//! whose `p:cNvPr` holds the shape's `id`, `name` and `hidden` flag.

use deckforge_ooxml::{XmlElement, XmlNode};
use serde::Serialize;

/// Kind of a shape in the shape tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    /// `p:sp`, a text box, placeholder or autoshape
    Shape,
    /// `p:pic`
    Picture,
    /// `p:graphicFrame`, a table, chart or diagram
    GraphicFrame,
    /// `p:grpSp`
    Group,
    /// `p:cxnSp`
    Connector,
    /// `p:contentPart`
    ContentPart,
}

impl ShapeKind {
    /// Map a shape tree element name to its kind
    pub fn from_local_name(name: &str) -> Option<Self> {
        match name {
            "sp" => Some(Self::Shape),
            "pic" => Some(Self::Picture),
            "graphicFrame" => Some(Self::GraphicFrame),
            "grpSp" => Some(Self::Group),
            "cxnSp" => Some(Self::Connector),
            "contentPart" => Some(Self::ContentPart),
            _ => None,
        }
    }
}

/// Summary of one shape on a template slide
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShapeInfo {
    pub id: u32,
    pub name: String,
    pub kind: ShapeKind,
    /// Placeholder type (`title`, `body`, `obj`, ...) for layout placeholders
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    /// Whether the shape has a text body
    pub has_text: bool,
    /// `(rows, columns)` of a table graphic frame
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<(u32, u32)>,
    pub hidden: bool,
    /// Name of the enclosing group, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

impl ShapeInfo {
    /// Whether this is the slide's title placeholder
    pub fn is_title(&self) -> bool {
        matches!(self.placeholder.as_deref(), Some("title" | "ctrTitle"))
    }
}

/// The `p:spTree` of a slide document root
pub fn shape_tree(slide_root: &XmlElement) -> Option<&XmlElement> {
    slide_root.child("cSld")?.child("spTree")
}

/// The `p:spTree` of a slide document root, mutably
pub fn shape_tree_mut(slide_root: &mut XmlElement) -> Option<&mut XmlElement> {
    slide_root.child_mut("cSld")?.child_mut("spTree")
}

/// Non-visual drawing properties (`p:cNvPr`) of a shape element
pub fn cnv_pr(shape: &XmlElement) -> Option<&XmlElement> {
    shape
        .elements()
        .find(|e| e.local_name().starts_with("nv"))?
        .child("cNvPr")
}

/// Non-visual drawing properties of a shape element, mutably
pub fn cnv_pr_mut(shape: &mut XmlElement) -> Option<&mut XmlElement> {
    shape
        .elements_mut()
        .find(|e| e.local_name().starts_with("nv"))?
        .child_mut("cNvPr")
}

/// Name of a shape element
pub fn shape_name(shape: &XmlElement) -> Option<&str> {
    cnv_pr(shape)?.attr("name")
}

/// Set a shape's visibility
///
/// Visible shapes carry no `hidden` attribute at all.
pub fn set_visible(shape: &mut XmlElement, visible: bool) -> bool {
    match cnv_pr_mut(shape) {
        Some(props) => {
            if visible {
                props.remove_attr("hidden");
            } else {
                props.set_attr("hidden", "1");
            }
            true
        }
        None => false,
    }
}

/// Enumerate every shape of a shape tree, groups flattened in document order
///
/// Fails with a description when a shape has no usable `p:cNvPr`.
pub fn enumerate_shapes(sp_tree: &XmlElement) -> Result<Vec<ShapeInfo>, String> {
    let mut shapes = Vec::new();
    collect_shapes(sp_tree, None, &mut shapes)?;
    Ok(shapes)
}

fn collect_shapes(
    container: &XmlElement,
    group: Option<&str>,
    out: &mut Vec<ShapeInfo>,
) -> Result<(), String> {
    for element in container.elements() {
        let Some(kind) = ShapeKind::from_local_name(element.local_name()) else {
            continue;
        };

        let props = cnv_pr(element).ok_or_else(|| {
            format!("<{}> without non-visual properties", element.name)
        })?;
        let id = props
            .attr("id")
            .and_then(|id| id.parse::<u32>().ok())
            .ok_or_else(|| format!("<{}> with missing or invalid id", element.name))?;
        let name = props.attr("name").unwrap_or_default().to_string();

        let placeholder = element
            .elements()
            .find(|e| e.local_name().starts_with("nv"))
            .and_then(|nv| nv.child("nvPr"))
            .and_then(|nv_pr| nv_pr.child("ph"))
            .map(|ph| ph.attr("type").unwrap_or("obj").to_string());

        out.push(ShapeInfo {
            id,
            name: name.clone(),
            kind,
            placeholder,
            has_text: element.child("txBody").is_some(),
            table: table_size(element),
            hidden: matches!(props.attr("hidden"), Some("1" | "true")),
            group: group.map(str::to_string),
        });

        if kind == ShapeKind::Group {
            collect_shapes(element, Some(&name), out)?;
        }
    }
    Ok(())
}

/// `(rows, columns)` of the table inside a graphic frame
pub fn table_size(frame: &XmlElement) -> Option<(u32, u32)> {
    let table = frame.find("tbl")?;
    let rows = table.children_named("tr").count() as u32;
    let cols = table
        .child("tblGrid")
        .map(|grid| grid.children_named("gridCol").count() as u32)
        .unwrap_or_else(|| {
            table
                .child("tr")
                .map(|tr| tr.children_named("tc").count() as u32)
                .unwrap_or(0)
        });
    Some((rows, cols))
}

/// Locate a shape by name, optionally inside a named group
///
/// Names compare case-insensitively. The first match in document order
/// wins.
pub fn find_shape_mut<'a>(
    sp_tree: &'a mut XmlElement,
    name: &str,
    group: Option<&str>,
) -> Option<&'a mut XmlElement> {
    let path = match group {
        Some(group_name) => {
            let mut path = Vec::new();
            let is_group = |e: &XmlElement| is_named(e, group_name, Some(ShapeKind::Group));
            if !locate(sp_tree, &is_group, &mut path) {
                return None;
            }
            let mut inner = Vec::new();
            let is_shape = |e: &XmlElement| is_named(e, name, None);
            if !locate(at_path(sp_tree, &path)?, &is_shape, &mut inner) {
                return None;
            }
            path.extend(inner);
            path
        }
        None => {
            let mut path = Vec::new();
            let is_shape = |e: &XmlElement| is_named(e, name, None);
            if !locate(sp_tree, &is_shape, &mut path) {
                return None;
            }
            path
        }
    };

    at_path_mut(sp_tree, &path)
}

fn is_named(element: &XmlElement, name: &str, kind: Option<ShapeKind>) -> bool {
    let Some(element_kind) = ShapeKind::from_local_name(element.local_name()) else {
        return false;
    };
    if kind.is_some_and(|k| k != element_kind) {
        return false;
    }
    shape_name(element).is_some_and(|n| names_match(n, name))
}

/// Case-insensitive shape name comparison, ignoring surrounding whitespace
pub fn names_match(a: &str, b: &str) -> bool {
    let (a, b) = (a.trim(), b.trim());
    a.eq_ignore_ascii_case(b) || a.to_lowercase() == b.to_lowercase()
}

/// Depth-first search recording child indices; descends into groups only
fn locate(
    container: &XmlElement,
    matches: &dyn Fn(&XmlElement) -> bool,
    path: &mut Vec<usize>,
) -> bool {
    for (i, node) in container.children.iter().enumerate() {
        let XmlNode::Element(element) = node else {
            continue;
        };
        path.push(i);
        if matches(element) {
            return true;
        }
        if element.local_name() == "grpSp" && locate(element, matches, path) {
            return true;
        }
        path.pop();
    }
    false
}

fn at_path<'a>(root: &'a XmlElement, path: &[usize]) -> Option<&'a XmlElement> {
    let mut current = root;
    for &i in path {
        current = match current.children.get(i)? {
            XmlNode::Element(e) => e,
            _ => return None,
        };
    }
    Some(current)
}

fn at_path_mut<'a>(root: &'a mut XmlElement, path: &[usize]) -> Option<&'a mut XmlElement> {
    let mut current = root;
    for &i in path {
        current = match current.children.get_mut(i)? {
            XmlNode::Element(e) => e,
            _ => return None,
        };
    }
    Some(current)
}

/// Normalize a shape name into a slot id
///
/// `ZoneTexte 8` -> `zonetexte_8`
pub fn slot_id_for(shape_name: &str) -> String {
    let mut id = String::with_capacity(shape_name.len());
    let mut pending_sep = false;
    for c in shape_name.trim().chars() {
        if c.is_alphanumeric() {
            if pending_sep && !id.is_empty() {
                id.push('_');
            }
            pending_sep = false;
            id.extend(c.to_lowercase());
        } else {
            pending_sep = true;
        }
    }
    id
}
