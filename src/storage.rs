use crate::constants::DOCUMENT_SUFFIX;
use crate::document::Document;
use crate::error::{AlbumError, Result};
use crate::layout;
use crate::metrics;
use crate::types::{DocRef, DocumentKind};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Storage trait for the linked-data documents
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// `Ok(None)` when the document does not exist
    async fn load(&self, kind: DocumentKind, local_id: &str) -> Result<Option<Document>>;

    /// Replaces the stored document; never leaves a partial file behind
    async fn save(&self, doc: &Document) -> Result<()>;

    /// Local ids of the stored documents of `kind` owned by the collection
    async fn list_local_ids(&self, kind: DocumentKind, collection_id: &str) -> Result<Vec<String>>;

    /// Supporting documents that are not part of the graph (containers, labels)
    async fn save_auxiliary(&self, relative_path: &Path, value: &Value) -> Result<()>;

    async fn auxiliary_exists(&self, relative_path: &Path) -> Result<bool>;
}

/// Filesystem store rooted at the output directory
pub struct FsDocumentStore {
    root: PathBuf,
}

impl FsDocumentStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn write_json_atomic(&self, relative_path: &Path, value: &Value) -> Result<()> {
        let path = self.root.join(relative_path);
        let parent = path.parent().ok_or_else(|| AlbumError::Document {
            path: path.display().to_string(),
            reason: "no parent directory".into(),
        })?;
        tokio::fs::create_dir_all(parent).await?;

        let mut content = serde_json::to_string_pretty(value)?;
        content.push('\n');

        let guard = TempFile::new(parent, &path);
        let mut file = tokio::fs::File::create(guard.path()).await?;
        file.write_all(content.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(guard.path(), &path).await?;
        guard.committed();

        debug!(path = %path.display(), bytes = content.len(), "Wrote document");
        Ok(())
    }
}

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Temp file next to its destination, removed on drop unless renamed into place
struct TempFile {
    path: PathBuf,
    committed: bool,
}

impl TempFile {
    fn new(dir: &Path, destination: &Path) -> Self {
        let name = destination
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let unique = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let path = dir.join(format!(".{}.{}.{}.tmp", name, std::process::id(), unique));
        Self { path, committed: false }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn committed(mut self) {
        self.committed = true;
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

#[async_trait]
impl DocumentStore for FsDocumentStore {
    async fn load(&self, kind: DocumentKind, local_id: &str) -> Result<Option<Document>> {
        let path = self.root.join(layout::document_path(&DocRef::new(kind, local_id))?);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let unreadable = |reason: String| AlbumError::Document {
            path: path.display().to_string(),
            reason,
        };
        let value: Value = serde_json::from_str(&raw).map_err(|e| unreadable(e.to_string()))?;
        let doc = Document::from_jsonld(&value).map_err(unreadable)?;
        if doc.kind() != kind || doc.local_id() != local_id {
            return Err(unreadable(format!(
                "holds {} instead of {}",
                doc.doc_ref(),
                DocRef::new(kind, local_id)
            )));
        }
        Ok(Some(doc))
    }

    async fn save(&self, doc: &Document) -> Result<()> {
        let relative = layout::document_path(&doc.doc_ref())?;
        self.write_json_atomic(&relative, &doc.to_jsonld()?).await?;
        metrics::store::document_written(doc.kind());
        Ok(())
    }

    async fn list_local_ids(&self, kind: DocumentKind, collection_id: &str) -> Result<Vec<String>> {
        let dir = match kind {
            DocumentKind::Collection | DocumentKind::Item => {
                let exists = self.load(kind, collection_id).await?.is_some();
                return Ok(if exists { vec![collection_id.to_string()] } else { Vec::new() });
            }
            DocumentKind::Page => self.root.join(layout::pages_dir(collection_id)),
            DocumentKind::Rendition => self.root.join(layout::renditions_dir(collection_id)),
        };
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(local_id) = name.strip_suffix(DOCUMENT_SUFFIX) else {
                continue;
            };
            let doc_ref = DocRef::new(kind, local_id);
            // container documents share the directory
            if layout::owning_collection(&doc_ref).ok().as_deref() == Some(collection_id) {
                ids.push(local_id.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }

    async fn save_auxiliary(&self, relative_path: &Path, value: &Value) -> Result<()> {
        self.write_json_atomic(relative_path, value).await
    }

    async fn auxiliary_exists(&self, relative_path: &Path) -> Result<bool> {
        Ok(tokio::fs::try_exists(self.root.join(relative_path)).await?)
    }
}

/// In-memory store for tests and dry runs. Keeps the serialized form so every
/// load goes through the same decoding as the filesystem store.
#[derive(Default, Clone)]
pub struct InMemoryDocumentStore {
    documents: Arc<Mutex<HashMap<DocRef, Value>>>,
    auxiliary: Arc<Mutex<HashMap<PathBuf, Value>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn document_count(&self) -> usize {
        self.documents.lock().map(|d| d.len()).unwrap_or(0)
    }

    pub fn auxiliary(&self, relative_path: &Path) -> Option<Value> {
        self.auxiliary.lock().ok()?.get(relative_path).cloned()
    }
}

fn poisoned<T>(_: T) -> AlbumError {
    AlbumError::Document {
        path: "<memory>".into(),
        reason: "store lock poisoned".into(),
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn load(&self, kind: DocumentKind, local_id: &str) -> Result<Option<Document>> {
        let key = DocRef::new(kind, local_id);
        let value = self.documents.lock().map_err(poisoned)?.get(&key).cloned();
        match value {
            Some(value) => Document::from_jsonld(&value)
                .map(Some)
                .map_err(|reason| AlbumError::Document {
                    path: key.to_string(),
                    reason,
                }),
            None => Ok(None),
        }
    }

    async fn save(&self, doc: &Document) -> Result<()> {
        layout::document_path(&doc.doc_ref())?;
        let value = doc.to_jsonld()?;
        self.documents
            .lock()
            .map_err(poisoned)?
            .insert(doc.doc_ref(), value);
        debug!(document = %doc.doc_ref(), "Stored document in memory");
        metrics::store::document_written(doc.kind());
        Ok(())
    }

    async fn list_local_ids(&self, kind: DocumentKind, collection_id: &str) -> Result<Vec<String>> {
        let documents = self.documents.lock().map_err(poisoned)?;
        let mut ids: Vec<String> = documents
            .keys()
            .filter(|r| r.kind == kind)
            .filter(|r| layout::owning_collection(r).ok().as_deref() == Some(collection_id))
            .map(|r| r.local_id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn save_auxiliary(&self, relative_path: &Path, value: &Value) -> Result<()> {
        self.auxiliary
            .lock()
            .map_err(poisoned)?
            .insert(relative_path.to_path_buf(), value.clone());
        Ok(())
    }

    async fn auxiliary_exists(&self, relative_path: &Path) -> Result<bool> {
        Ok(self.auxiliary.lock().map_err(poisoned)?.contains_key(relative_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Relation, Relationships};
    use serde_json::{json, Map};
    use tempfile::tempdir;

    fn collection() -> Document {
        let mut payload = Map::new();
        payload.insert("schema:name".into(), json!("Family Album"));
        Document::new(DocumentKind::Collection, "MC-001", Relationships::new(), payload)
    }

    fn page(n: u32) -> Document {
        let mut payload = Map::new();
        payload.insert("schema:position".into(), json!(n));
        Document::new(
            DocumentKind::Page,
            format!("MC-001_{:04}.tif", n),
            Relationships::new().with(Relation::PartOf, DocRef::new(DocumentKind::Item, "MC-001")),
            payload,
        )
    }

    #[tokio::test]
    async fn test_fs_load_missing_is_none() {
        let dir = tempdir().unwrap();
        let store = FsDocumentStore::new(dir.path());
        assert!(store.load(DocumentKind::Item, "MC-001").await.unwrap().is_none());
        assert!(store.list_local_ids(DocumentKind::Page, "MC-001").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fs_save_then_load() {
        let dir = tempdir().unwrap();
        let store = FsDocumentStore::new(dir.path());
        let doc = collection();
        store.save(&doc).await.unwrap();

        let loaded = store.load(DocumentKind::Collection, "MC-001").await.unwrap().unwrap();
        assert_eq!(loaded, doc);
        assert!(dir.path().join("collection/MC-001.jsonld.json").exists());
    }

    #[tokio::test]
    async fn test_fs_save_leaves_no_temp_files() {
        let dir = tempdir().unwrap();
        let store = FsDocumentStore::new(dir.path());
        for n in 1..=3 {
            store.save(&page(n)).await.unwrap();
        }
        store.save(&page(2)).await.unwrap();

        let images = dir.path().join("items/MC-001/media/images");
        let names: Vec<String> = std::fs::read_dir(&images)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 3);
        assert!(names.iter().all(|n| !n.ends_with(".tmp")));

        let ids = store.list_local_ids(DocumentKind::Page, "MC-001").await.unwrap();
        assert_eq!(ids, vec!["MC-001_0001.tif", "MC-001_0002.tif", "MC-001_0003.tif"]);
    }

    #[tokio::test]
    async fn test_fs_unparseable_document_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("items");
        std::fs::create_dir_all(&path).unwrap();
        std::fs::write(path.join("MC-001.jsonld.json"), "{ not json").unwrap();

        let store = FsDocumentStore::new(dir.path());
        let err = store.load(DocumentKind::Item, "MC-001").await.unwrap_err();
        assert!(matches!(err, AlbumError::Document { .. }));
    }

    #[test]
    fn test_temp_file_removed_on_drop() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("doc.jsonld.json");
        let guard = TempFile::new(dir.path(), &dest);
        std::fs::write(guard.path(), "partial").unwrap();
        let temp_path = guard.path().to_path_buf();
        drop(guard);
        assert!(!temp_path.exists());
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_memory_store_lists_by_owner() {
        let store = InMemoryDocumentStore::new();
        store.save(&page(1)).await.unwrap();
        store.save(&page(2)).await.unwrap();
        store.save(&collection()).await.unwrap();

        assert_eq!(store.document_count(), 3);
        assert_eq!(store.list_local_ids(DocumentKind::Page, "MC-001").await.unwrap().len(), 2);
        assert!(store.list_local_ids(DocumentKind::Page, "MC-002").await.unwrap().is_empty());
    }
}
