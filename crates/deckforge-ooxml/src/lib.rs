//! # deckforge-ooxml
//!
//! OPC package plumbing for deckforge.
//!
//! This crate provides functionality to:
//! - Unpack PPTX/POTX archives into memory and write them back deterministically
//! - Read and edit relationship parts and `[Content_Types].xml`
//! - Parse XML parts into an editable tree that preserves unknown markup
//!
//! ## Example: Listing slide relationships
//!
//! ```no_run
//! use deckforge_ooxml::{OoxmlArchive, Relationships};
//!
//! let archive = OoxmlArchive::open("library.pptx")?;
//! let rels = Relationships::parse(archive.require("ppt/_rels/presentation.xml.rels")?)?;
//!
//! for rel in rels.of_type(Relationships::TYPE_SLIDE) {
//!     println!("{} -> {}", rel.id, rel.target);
//! }
//! # Ok::<(), deckforge_ooxml::OoxmlError>(())
//! ```

pub mod archive;
pub mod content_types;
pub mod error;
pub mod relationships;
pub mod xml;

pub use archive::{OoxmlArchive, CONTENT_TYPES_PART};
pub use content_types::ContentTypes;
pub use error::{OoxmlError, Result};
pub use relationships::{rels_path_for, resolve_target, Relationship, Relationships};
pub use xml::{local_part, XmlDocument, XmlElement, XmlNode, XML_DECLARATION};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
