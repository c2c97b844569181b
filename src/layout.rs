//! Where documents live on disk and how they reference each other.
//!
//! Collection and Item documents are keyed by the collection id; Page and
//! Rendition documents by their file name, which always embeds the
//! collection id (`<id>_<seq>.<ext>` and `<id>.pdf`).

use crate::constants::{DOCUMENT_SUFFIX, RESOURCE_REF_PREFIX};
use crate::error::{AlbumError, Result};
use crate::types::{DocRef, DocumentKind};
use std::path::PathBuf;

/// Collection id that owns the given document
pub fn owning_collection(doc_ref: &DocRef) -> Result<String> {
    let owner = match doc_ref.kind {
        DocumentKind::Collection | DocumentKind::Item => Some(doc_ref.local_id.as_str()),
        DocumentKind::Page => doc_ref.local_id.rsplit_once('_').map(|(id, _)| id),
        DocumentKind::Rendition => doc_ref.local_id.rsplit_once('.').map(|(id, _)| id),
    };
    match owner {
        Some(id) if is_safe_segment(id) && is_safe_segment(&doc_ref.local_id) => Ok(id.to_string()),
        _ => Err(AlbumError::MalformedName {
            name: doc_ref.local_id.clone(),
            expected: format!("a valid {} local id", doc_ref.kind),
        }),
    }
}

/// Store-relative path of a document file
pub fn document_path(doc_ref: &DocRef) -> Result<PathBuf> {
    let owner = owning_collection(doc_ref)?;
    let file = format!("{}{}", doc_ref.local_id, DOCUMENT_SUFFIX);
    let path = match doc_ref.kind {
        DocumentKind::Collection => PathBuf::from("collection").join(file),
        DocumentKind::Item => PathBuf::from("items").join(file),
        DocumentKind::Page => pages_dir(&owner).join(file),
        DocumentKind::Rendition => renditions_dir(&owner).join(file),
    };
    Ok(path)
}

/// Directory holding page documents (and the staged page images)
pub fn pages_dir(collection_id: &str) -> PathBuf {
    PathBuf::from("items").join(collection_id).join("media").join("images")
}

/// Directory holding the rendition documents
pub fn renditions_dir(collection_id: &str) -> PathBuf {
    PathBuf::from("items").join(collection_id).join("media")
}

pub fn media_container_path(collection_id: &str) -> PathBuf {
    PathBuf::from("items").join(collection_id).join(format!("media{}", DOCUMENT_SUFFIX))
}

pub fn image_list_path(collection_id: &str) -> PathBuf {
    renditions_dir(collection_id).join(format!("images{}", DOCUMENT_SUFFIX))
}

pub fn labels_path(collection_id: &str) -> PathBuf {
    PathBuf::from("collection")
        .join(collection_id)
        .join(format!("labels{}", DOCUMENT_SUFFIX))
}

/// Reference string written into linking documents, e.g. `info:fedora/item/MC-001`
pub fn resource_ref(doc_ref: &DocRef) -> Result<String> {
    let owner = owning_collection(doc_ref)?;
    let path = match doc_ref.kind {
        DocumentKind::Collection => format!("collection/{}", doc_ref.local_id),
        DocumentKind::Item => format!("item/{}", doc_ref.local_id),
        DocumentKind::Page => format!("item/{}/media/images/{}", owner, doc_ref.local_id),
        DocumentKind::Rendition => format!("item/{}/media/{}", owner, doc_ref.local_id),
    };
    Ok(format!("{}{}", RESOURCE_REF_PREFIX, path))
}

pub fn parse_resource_ref(value: &str) -> Result<DocRef> {
    let malformed = || AlbumError::MalformedName {
        name: value.to_string(),
        expected: format!("a {}<collection|item>/... reference", RESOURCE_REF_PREFIX),
    };
    let path = value.strip_prefix(RESOURCE_REF_PREFIX).ok_or_else(malformed)?;
    let segments: Vec<&str> = path.split('/').collect();
    let doc_ref = match segments.as_slice() {
        ["collection", id] => DocRef::new(DocumentKind::Collection, *id),
        ["item", id] => DocRef::new(DocumentKind::Item, *id),
        ["item", _, "media", "images", file] => DocRef::new(DocumentKind::Page, *file),
        ["item", _, "media", file] => DocRef::new(DocumentKind::Rendition, *file),
        _ => return Err(malformed()),
    };
    let owner = owning_collection(&doc_ref).map_err(|_| malformed())?;
    if segments[1] != owner {
        return Err(malformed());
    }
    Ok(doc_ref)
}

/// A single, non-hidden path segment
pub fn is_safe_segment(value: &str) -> bool {
    !value.is_empty()
        && !value.starts_with('.')
        && !value.contains('/')
        && !value.contains('\\')
}
