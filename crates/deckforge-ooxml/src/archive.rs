//! Archive handling for PPTX/POTX packages
//!
//! Office documents are ZIP archives containing XML parts and binary
//! resources. The whole package is unpacked into memory so that no file
//! handle outlives the call that opened it.

use std::collections::HashMap;
use std::fs::File;
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;

use zip::read::ZipArchive;
use zip::write::{SimpleFileOptions, ZipWriter};
use zip::{CompressionMethod, DateTime};

use crate::error::{OoxmlError, Result};
use crate::xml::XmlDocument;

/// Represents an unpacked OOXML package
#[derive(Debug, Clone, Default)]
pub struct OoxmlArchive {
    /// All parts in the archive, keyed by path
    files: HashMap<String, Vec<u8>>,
}

impl OoxmlArchive {
    /// Create an empty package
    pub fn new() -> Self {
        Self::default()
    }

    /// Open and unpack a package file
    ///
    /// The file handle is dropped before this returns.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(file)
    }

    /// Unpack a package held in memory
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::from_reader(Cursor::new(data))
    }

    /// Create from any reader that implements Read + Seek
    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self> {
        let mut archive = ZipArchive::new(reader)?;
        let mut files = HashMap::new();

        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            let name = file.name().to_string();

            // Skip directories
            if name.ends_with('/') {
                continue;
            }

            let mut contents = Vec::new();
            file.read_to_end(&mut contents)?;
            files.insert(name, contents);
        }

        Ok(Self { files })
    }

    /// Get a part's contents by path
    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(|v| v.as_slice())
    }

    /// Get a part that must exist
    pub fn require(&self, path: &str) -> Result<&[u8]> {
        self.get(path)
            .ok_or_else(|| OoxmlError::MissingPart(path.to_string()))
    }

    /// Get a part's contents as a string
    pub fn get_string(&self, path: &str) -> Option<String> {
        self.files
            .get(path)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    /// Parse a required XML part into an editable tree
    pub fn xml_part(&self, path: &str) -> Result<XmlDocument> {
        XmlDocument::parse(self.require(path)?)
    }

    /// Check if a part exists in the archive
    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    /// List all part names, sorted
    pub fn part_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.files.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Number of parts in the package
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Check if the package has no parts
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Set or update a part's contents
    pub fn set(&mut self, path: impl Into<String>, contents: Vec<u8>) {
        self.files.insert(path.into(), contents);
    }

    /// Set a part's contents from a string
    pub fn set_string(&mut self, path: impl Into<String>, contents: impl Into<String>) {
        self.files.insert(path.into(), contents.into().into_bytes());
    }

    /// Serialize an XML tree into a part
    pub fn set_xml(&mut self, path: impl Into<String>, document: &XmlDocument) {
        self.set(path, document.to_bytes());
    }

    /// Remove a part from the archive
    pub fn remove(&mut self, path: &str) -> Option<Vec<u8>> {
        self.files.remove(path)
    }

    /// Keep only the parts for which `keep` returns true
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.files.retain(|path, _| keep(path));
    }

    /// Serialize the package into a byte vector
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = Cursor::new(Vec::new());
        self.write_to(&mut buffer)?;
        Ok(buffer.into_inner())
    }

    /// Write the archive to any writer
    ///
    /// Output is byte-for-byte reproducible: parts are written in sorted
    /// order with a fixed modification time.
    pub fn write_to<W: Write + Seek>(&self, writer: W) -> Result<()> {
        let mut zip = ZipWriter::new(writer);
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(DateTime::default());

        // [Content_Types].xml first, then the rest in sorted order
        let mut paths: Vec<_> = self.files.keys().collect();
        paths.sort_by(|a, b| {
            (a.as_str() != CONTENT_TYPES_PART)
                .cmp(&(b.as_str() != CONTENT_TYPES_PART))
                .then_with(|| a.cmp(b))
        });

        for path in paths {
            let contents = &self.files[path];
            zip.start_file(path.as_str(), options)?;
            zip.write_all(contents)?;
        }

        zip.finish()?;
        Ok(())
    }
}

/// Package-level content types part
pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_operations() {
        let mut archive = OoxmlArchive::new();

        archive.set_string("test.xml", "<root/>");
        assert!(archive.contains("test.xml"));
        assert_eq!(archive.get_string("test.xml"), Some("<root/>".to_string()));

        archive.remove("test.xml");
        assert!(!archive.contains("test.xml"));
        assert!(archive.is_empty());
    }

    #[test]
    fn test_require_missing_part() {
        let archive = OoxmlArchive::new();
        let err = archive.require("ppt/presentation.xml").unwrap_err();
        assert!(err.to_string().contains("ppt/presentation.xml"));
    }

    #[test]
    fn test_retain_and_part_names() {
        let mut archive = OoxmlArchive::new();
        archive.set_string("ppt/slides/slide2.xml", "<a/>");
        archive.set_string("ppt/slides/slide1.xml", "<a/>");
        archive.set_string("ppt/theme/theme1.xml", "<a/>");

        assert_eq!(
            archive.part_names(),
            vec![
                "ppt/slides/slide1.xml",
                "ppt/slides/slide2.xml",
                "ppt/theme/theme1.xml"
            ]
        );

        archive.retain(|path| !path.starts_with("ppt/slides/"));
        assert_eq!(archive.part_names(), vec!["ppt/theme/theme1.xml"]);
    }

    #[test]
    fn test_roundtrip_through_bytes() {
        let mut archive = OoxmlArchive::new();
        archive.set_string(CONTENT_TYPES_PART, "<Types/>");
        archive.set_string("ppt/presentation.xml", "<p:presentation/>");
        archive.set("ppt/media/image1.png", vec![0x89, 0x50, 0x4e, 0x47]);

        let bytes = archive.to_bytes().unwrap();
        let restored = OoxmlArchive::from_bytes(&bytes).unwrap();

        assert_eq!(restored.len(), 3);
        assert_eq!(
            restored.get("ppt/media/image1.png"),
            Some(&[0x89, 0x50, 0x4e, 0x47][..])
        );
    }

    #[test]
    fn test_serialization_is_deterministic() {
        let mut first = OoxmlArchive::new();
        first.set_string("b.xml", "<b/>");
        first.set_string("a.xml", "<a/>");
        first.set_string(CONTENT_TYPES_PART, "<Types/>");

        let mut second = OoxmlArchive::new();
        second.set_string(CONTENT_TYPES_PART, "<Types/>");
        second.set_string("a.xml", "<a/>");
        second.set_string("b.xml", "<b/>");

        assert_eq!(first.to_bytes().unwrap(), second.to_bytes().unwrap());
    }

    #[test]
    fn test_open_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deck.pptx");

        let mut archive = OoxmlArchive::new();
        archive.set_string("ppt/presentation.xml", "<p:presentation/>");
        std::fs::write(&path, archive.to_bytes().unwrap()).unwrap();

        let reopened = OoxmlArchive::open(&path).unwrap();
        assert!(reopened.contains("ppt/presentation.xml"));
    }
}
