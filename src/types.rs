use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// One album as described by a row of the metadata CSV
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionRecord {
    pub id: String,
    pub title: String,
    pub description: String,
    pub creator: String,
    pub date_range: String,
    /// Subject vocabulary URIs in column order
    pub subject_refs: Vec<String>,
}

/// A page image with its position in reading order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageDescriptor {
    pub source_file: PathBuf,
    pub sequence_number: u32,
    pub collection_id: String,
}

impl PageDescriptor {
    pub fn file_name(&self) -> String {
        self.source_file.to_string_lossy().into_owned()
    }
}

/// The non-paginated full-document companion of an album (the PDF)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenditionAsset {
    pub source_file: PathBuf,
    pub collection_id: String,
}

impl RenditionAsset {
    pub fn file_name(&self) -> String {
        self.source_file.to_string_lossy().into_owned()
    }
}

/// Output of the page sequencer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequencedAssets {
    pub pages: Vec<PageDescriptor>,
    pub rendition: Option<RenditionAsset>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DocumentKind {
    Collection,
    Item,
    Page,
    Rendition,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Collection => "collection",
            DocumentKind::Item => "item",
            DocumentKind::Page => "page",
            DocumentKind::Rendition => "rendition",
        }
    }

    /// Only the top-level documents receive persistent identifiers
    pub fn is_mintable(&self) -> bool {
        matches!(self, DocumentKind::Collection | DocumentKind::Item)
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to another document, by kind and local id
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocRef {
    pub kind: DocumentKind,
    pub local_id: String,
}

impl DocRef {
    pub fn new(kind: DocumentKind, local_id: impl Into<String>) -> Self {
        Self {
            kind,
            local_id: local_id.into(),
        }
    }
}

impl fmt::Display for DocRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.kind, self.local_id)
    }
}

/// A persistent identifier as recorded on its document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintedIdentifier {
    pub value: String,
    pub target: DocRef,
    /// Absent when the identifier predates timestamp recording
    pub minted_at: Option<DateTime<Utc>>,
    /// True when an identifier already on the document was returned
    pub reused: bool,
}
