//! Slot definitions, plan values and per-slot warnings.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What a slot controls on its shape
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotKind {
    /// Replace the shape's text, keeping its formatting
    #[default]
    Text,
    /// Show or hide the shape
    Toggle,
}

impl fmt::Display for SlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => f.write_str("text"),
            Self::Toggle => f.write_str("toggle"),
        }
    }
}

/// Where a slot lives on its slide
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotTarget {
    /// Shape name (`p:cNvPr/@name`), matched case-insensitively
    pub shape: String,
    /// Enclosing group shape, when the shape name is not unique on its own
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// 1-based `(row, column)` of a table cell inside a graphic frame
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cell: Option<(u32, u32)>,
}

impl SlotTarget {
    /// Target a shape by name
    pub fn shape(name: impl Into<String>) -> Self {
        Self {
            shape: name.into(),
            group: None,
            cell: None,
        }
    }
}

impl fmt::Display for SlotTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(group) = &self.group {
            write!(f, "{} / ", group)?;
        }
        write!(f, "'{}'", self.shape)?;
        if let Some((row, col)) = self.cell {
            write!(f, " [{}, {}]", row, col)?;
        }
        Ok(())
    }
}

/// A named, editable region of a template slide
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotDef {
    pub kind: SlotKind,
    pub target: SlotTarget,
    /// Word budget handed to the generation step
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_words: Option<u32>,
    /// Bullet budget handed to the generation step
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_items: Option<u32>,
}

impl SlotDef {
    /// Text slot on the named shape
    pub fn text(shape: impl Into<String>) -> Self {
        Self {
            kind: SlotKind::Text,
            target: SlotTarget::shape(shape),
            max_words: None,
            max_items: None,
        }
    }

    /// Visibility slot on the named shape
    pub fn toggle(shape: impl Into<String>) -> Self {
        Self {
            kind: SlotKind::Toggle,
            ..Self::text(shape)
        }
    }
}

/// A value supplied for a slot in a content plan
///
/// Plans come from an untrusted generator, so every JSON shape is accepted
/// here and checked against the slot kind when it is applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SlotValue {
    Null,
    Flag(bool),
    Text(String),
    List(Vec<String>),
    Other(Value),
}

impl SlotValue {
    /// Paragraphs to write into a text slot
    ///
    /// An empty result means the slot should be cleared.
    pub fn text_lines(&self) -> Result<Vec<String>, String> {
        match self {
            Self::Null => Ok(Vec::new()),
            Self::Text(text) => {
                if text.trim().is_empty() {
                    return Ok(Vec::new());
                }
                Ok(text
                    .split('\n')
                    .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
                    .collect())
            }
            Self::List(items) => Ok(items.clone()),
            Self::Flag(_) | Self::Other(_) => Err(format!(
                "expected text, got {}",
                self.type_name()
            )),
        }
    }

    /// Visibility for a toggle slot
    pub fn visibility(&self) -> Result<bool, String> {
        match self {
            Self::Flag(visible) => Ok(*visible),
            Self::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(true),
                "false" => Ok(false),
                _ => Err(format!(
                    "expected a boolean, got a string of {} characters",
                    text.chars().count()
                )),
            },
            _ => Err(format!("expected a boolean, got {}", self.type_name())),
        }
    }

    /// JSON type name for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Flag(_) => "boolean",
            Self::Text(_) => "string",
            Self::List(_) => "list",
            Self::Other(Value::Number(_)) => "number",
            Self::Other(Value::Object(_)) => "object",
            Self::Other(Value::Array(_)) => "mixed list",
            Self::Other(_) => "value",
        }
    }
}

impl From<&str> for SlotValue {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for SlotValue {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<bool> for SlotValue {
    fn from(flag: bool) -> Self {
        Self::Flag(flag)
    }
}

/// A slot value that could not be applied
///
/// The slot keeps its template default and the run continues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotWarning {
    /// 1-based position of the entry in the content plan
    pub position: usize,
    /// Template slide the entry was built from
    pub slide_index: u32,
    pub slot_id: String,
    pub reason: String,
}

impl fmt::Display for SlotWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "plan entry {} (slide_index {}), slot '{}': {}",
            self.position, self.slide_index, self.slot_id, self.reason
        )
    }
}
