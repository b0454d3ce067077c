//! Package content types (`[Content_Types].xml`)

use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::Result;
use crate::xml::XML_DECLARATION;

/// OPC namespace for the content types part
pub const CONTENT_TYPES_NS: &str = "http://schemas.openxmlformats.org/package/2006/content-types";

/// Extension defaults and per-part overrides
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentTypes {
    /// `(extension, content type)` pairs
    pub defaults: Vec<(String, String)>,
    /// `(part name, content type)` pairs; part names start with `/`
    pub overrides: Vec<(String, String)>,
}

impl ContentTypes {
    /// Parse `[Content_Types].xml`
    pub fn parse(xml: &[u8]) -> Result<Self> {
        let mut reader = Reader::from_reader(xml);
        reader.config_mut().trim_text(true);

        let mut types = Self::default();
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Empty(ref e) | Event::Start(ref e) => {
                    let kind = e.local_name().as_ref().to_vec();
                    let mut key = None;
                    let mut content_type = None;
                    for attr in e.attributes() {
                        let attr = attr?;
                        match attr.key.as_ref() {
                            b"Extension" | b"PartName" => {
                                key = Some(attr.unescape_value()?.into_owned())
                            }
                            b"ContentType" => {
                                content_type = Some(attr.unescape_value()?.into_owned())
                            }
                            _ => {}
                        }
                    }
                    if let (Some(key), Some(content_type)) = (key, content_type) {
                        match kind.as_slice() {
                            b"Default" => types.defaults.push((key, content_type)),
                            b"Override" => types.overrides.push((key, content_type)),
                            _ => {}
                        }
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        Ok(types)
    }

    /// Content type declared for a part (leading `/` optional)
    pub fn content_type_of(&self, part: &str) -> Option<&str> {
        let name = part_name(part);
        if let Some((_, ct)) = self.overrides.iter().find(|(p, _)| *p == name) {
            return Some(ct);
        }
        let ext = name.rsplit_once('.')?.1;
        self.defaults
            .iter()
            .find(|(e, _)| e.eq_ignore_ascii_case(ext))
            .map(|(_, ct)| ct.as_str())
    }

    /// Declare or replace the override for a part
    pub fn set_override(&mut self, part: &str, content_type: impl Into<String>) {
        let name = part_name(part);
        let content_type = content_type.into();
        match self.overrides.iter_mut().find(|(p, _)| *p == name) {
            Some(entry) => entry.1 = content_type,
            None => self.overrides.push((name, content_type)),
        }
    }

    /// Add an extension default if none exists for it
    pub fn ensure_default(&mut self, extension: &str, content_type: impl Into<String>) {
        if !self
            .defaults
            .iter()
            .any(|(e, _)| e.eq_ignore_ascii_case(extension))
        {
            self.defaults.push((extension.to_string(), content_type.into()));
        }
    }

    /// Remove the override for a part
    pub fn remove_override(&mut self, part: &str) -> bool {
        let name = part_name(part);
        let before = self.overrides.len();
        self.overrides.retain(|(p, _)| *p != name);
        self.overrides.len() != before
    }

    /// Keep only the overrides whose part name satisfies `keep`
    ///
    /// The part name is passed without its leading `/`.
    pub fn retain_overrides(&mut self, mut keep: impl FnMut(&str, &str) -> bool) {
        self.overrides
            .retain(|(p, ct)| keep(p.trim_start_matches('/'), ct));
    }

    /// Serialize to `[Content_Types].xml`
    pub fn to_xml(&self) -> String {
        let mut xml = String::new();
        xml.push_str(XML_DECLARATION);
        xml.push('\n');
        xml.push_str(&format!(r#"<Types xmlns="{}">"#, CONTENT_TYPES_NS));
        for (ext, ct) in &self.defaults {
            xml.push_str(&format!(
                r#"<Default Extension="{}" ContentType="{}"/>"#,
                escape(ext.as_str()),
                escape(ct.as_str())
            ));
        }
        for (part, ct) in &self.overrides {
            xml.push_str(&format!(
                r#"<Override PartName="{}" ContentType="{}"/>"#,
                escape(part.as_str()),
                escape(ct.as_str())
            ));
        }
        xml.push_str("</Types>");
        xml
    }
}

fn part_name(part: &str) -> String {
    if part.starts_with('/') {
        part.to_string()
    } else {
        format!("/{}", part)
    }
}
