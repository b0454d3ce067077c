//! Content plans: which template slides to use and what goes in their slots.
//!
//! A plan file is either a bare array of entries
//!
//! ```json
//! [{ "slide_index": 2, "slots": { "title": "Q3 Results", "subtitle": "" } }]
//! ```
//!
//! or the object emitted by the generation step, which adds a presentation
//! title and per-slide titles:
//!
//! ```json
//! {
//!   "presentation_title": "Quarterly review",
//!   "slides": [{ "slide_index": 2, "slide_title": "Q3", "slots": {} }]
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DeckError, Result};
use crate::slot::SlotValue;

/// One requested output slide
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentPlanEntry {
    /// 1-based library slide to copy
    pub slide_index: u32,

    /// Title written to the template's title slot unless `slots` sets it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slide_title: Option<String>,

    #[serde(default)]
    pub slots: BTreeMap<String, SlotValue>,

    /// Free-form pointer back into the source document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_section: Option<String>,
}

impl ContentPlanEntry {
    /// Entry for a slide with no slot values
    pub fn new(slide_index: u32) -> Self {
        Self {
            slide_index,
            slide_title: None,
            slots: BTreeMap::new(),
            source_section: None,
        }
    }

    /// Builder-style slot setter
    pub fn with_slot(mut self, slot_id: impl Into<String>, value: impl Into<SlotValue>) -> Self {
        self.slots.insert(slot_id.into(), value.into());
        self
    }
}

/// Ordered list of requested slides
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentPlan {
    pub presentation_title: Option<String>,
    pub entries: Vec<ContentPlanEntry>,
}

#[derive(Serialize)]
struct TitledPlan<'a> {
    presentation_title: &'a str,
    slides: &'a [ContentPlanEntry],
}

impl ContentPlan {
    /// Plan from entries, without a presentation title
    pub fn new(entries: Vec<ContentPlanEntry>) -> Self {
        Self {
            presentation_title: None,
            entries,
        }
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the plan has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Read a plan file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&content)
    }

    /// Parse a plan in either accepted shape
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| DeckError::invalid_plan(format!("not valid JSON: {}", e)))?;

        match value {
            Value::Array(items) => Ok(Self::new(parse_entries(items)?)),
            Value::Object(mut object) => {
                let presentation_title = match object.remove("presentation_title") {
                    None | Some(Value::Null) => None,
                    Some(Value::String(title)) => Some(title),
                    Some(other) => {
                        return Err(DeckError::invalid_plan(format!(
                            "presentation_title must be a string, got {}",
                            other
                        )))
                    }
                };
                let items = match object.remove("slides") {
                    Some(Value::Array(items)) => items,
                    Some(_) => return Err(DeckError::invalid_plan("'slides' must be an array")),
                    None => return Err(DeckError::invalid_plan("missing 'slides' array")),
                };
                Ok(Self {
                    presentation_title,
                    entries: parse_entries(items)?,
                })
            }
            _ => Err(DeckError::invalid_plan(
                "expected an array of slides or an object with a 'slides' array",
            )),
        }
    }

    /// Parse the raw text returned by a language model
    ///
    /// Strips Markdown code fences and trailing commas before `}` or `]`.
    pub fn from_model_response(response: &str) -> Result<Self> {
        Self::from_json(&clean_model_response(response))
    }

    /// Serialize to the shape it was read in
    pub fn to_json(&self) -> Result<String> {
        let json = match &self.presentation_title {
            Some(title) => serde_json::to_string_pretty(&TitledPlan {
                presentation_title: title,
                slides: &self.entries,
            })?,
            None => serde_json::to_string_pretty(&self.entries)?,
        };
        Ok(json)
    }
}

fn parse_entries(items: Vec<Value>) -> Result<Vec<ContentPlanEntry>> {
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            serde_json::from_value(item).map_err(|e| {
                DeckError::invalid_plan(format!("entry {}: {}", i + 1, e))
            })
        })
        .collect()
}

/// Strip code fences and trailing commas from model output
pub fn clean_model_response(response: &str) -> String {
    static TRAILING_COMMA_RE: OnceLock<Regex> = OnceLock::new();
    let re = TRAILING_COMMA_RE.get_or_init(|| Regex::new(r",(\s*[}\]])").unwrap());

    let trimmed = response.trim();
    let body = match trimmed.strip_prefix("```") {
        Some(rest) => {
            // Drop the info string (```json)
            let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
            rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
        }
        None => trimmed,
    };
    re.replace_all(body, "$1").into_owned()
}
