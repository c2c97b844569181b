//! Supporting documents the importer expects next to the graph: the two LDP
//! containers under an item and the collection's subject label service.

use crate::app::ports::SubjectLabelPort;
use crate::document::jsonld_context;
use crate::error::Result;
use crate::layout;
use crate::storage::DocumentStore;
use crate::types::CollectionRecord;
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing::{debug, info};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuxiliaryReport {
    pub written: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
}

/// `items/<id>/media.jsonld.json`
pub fn media_container() -> Value {
    json!({
        "@context": jsonld_context(),
        "@id": "",
        "@type": ["ldp:DirectContainer"],
        "ldp:hasMemberRelation": { "@id": "schema:associatedMedia" },
        "ldp:isMemberOfRelation": { "@id": "schema:encodesCreativeWork" },
        "ldp:membershipResource": { "@id": "@base:.." }
    })
}

/// `items/<id>/media/images.jsonld.json`
pub fn image_list() -> Value {
    json!({
        "@context": jsonld_context(),
        "@id": "",
        "@type": ["ucdlib:ImageList", "ldp:DirectContainer", "schema:MediaObject"],
        "schema:name": "Image List",
        "ldp:hasMemberRelation": { "@id": "schema:hasPart" },
        "ldp:isMemberOfRelation": { "@id": "schema:partOf" },
        "ldp:membershipResource": { "@id": "" }
    })
}

/// Label service document naming every subject of the record. A subject
/// whose label cannot be looked up is named by its URI.
pub async fn labels_document(record: &CollectionRecord, labels: &dyn SubjectLabelPort) -> Value {
    let mut entries = vec![json!({
        "@id": "",
        "@context": { "ucdlib": crate::constants::UCDLIB_NS },
        "@type": ["ucdlib:LabelService", "ucdlib:Service"]
    })];
    for subject in &record.subject_refs {
        let name = labels.label(subject).await.unwrap_or_else(|| subject.clone());
        entries.push(json!({ "@id": subject, "http://schema.org/name": name }));
    }
    Value::Array(entries)
}

/// Write whichever supporting documents are missing. Existing ones are left
/// alone, so the label lookups only happen on the first run.
pub async fn write_auxiliary(
    record: &CollectionRecord,
    store: &dyn DocumentStore,
    labels: &dyn SubjectLabelPort,
) -> Result<AuxiliaryReport> {
    let mut report = AuxiliaryReport::default();

    let containers = [
        (layout::media_container_path(&record.id), media_container()),
        (layout::image_list_path(&record.id), image_list()),
    ];
    for (path, value) in containers {
        if store.auxiliary_exists(&path).await? {
            report.skipped.push(path);
            continue;
        }
        store.save_auxiliary(&path, &value).await?;
        report.written.push(path);
    }

    let labels_path = layout::labels_path(&record.id);
    if store.auxiliary_exists(&labels_path).await? {
        debug!(path = %labels_path.display(), "Label document exists; skipping lookups");
        report.skipped.push(labels_path);
    } else {
        let document = labels_document(record, labels).await;
        store.save_auxiliary(&labels_path, &document).await?;
        info!(collection = %record.id, subjects = record.subject_refs.len(), "Wrote subject labels");
        report.written.push(labels_path);
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::fast_labels::NoLabelLookup;
    use crate::storage::InMemoryDocumentStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingLabels(AtomicUsize);

    #[async_trait]
    impl SubjectLabelPort for CountingLabels {
        async fn label(&self, subject_uri: &str) -> Option<String> {
            self.0.fetch_add(1, Ordering::SeqCst);
            subject_uri.ends_with("/1").then(|| "Family photographs".to_string())
        }
    }

    fn record() -> CollectionRecord {
        CollectionRecord {
            id: "MC-001".into(),
            title: "Family Album".into(),
            description: String::new(),
            creator: String::new(),
            date_range: String::new(),
            subject_refs: vec![
                "http://id.worldcat.org/fast/1".into(),
                "http://id.worldcat.org/fast/2".into(),
            ],
        }
    }

    #[tokio::test]
    async fn test_labels_fall_back_to_uri() {
        let labels = CountingLabels(AtomicUsize::new(0));
        let document = labels_document(&record(), &labels).await;
        let entries = document.as_array().unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[1]["http://schema.org/name"], json!("Family photographs"));
        assert_eq!(
            entries[2]["http://schema.org/name"],
            json!("http://id.worldcat.org/fast/2")
        );
    }

    #[tokio::test]
    async fn test_existing_documents_are_not_rewritten() {
        let store = InMemoryDocumentStore::new();
        let labels = CountingLabels(AtomicUsize::new(0));

        let first = write_auxiliary(&record(), &store, &labels).await.unwrap();
        assert_eq!(first.written.len(), 3);
        assert_eq!(labels.0.load(Ordering::SeqCst), 2);

        let second = write_auxiliary(&record(), &store, &labels).await.unwrap();
        assert!(second.written.is_empty());
        assert_eq!(second.skipped.len(), 3);
        assert_eq!(labels.0.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_containers_land_under_the_item() {
        let store = InMemoryDocumentStore::new();
        write_auxiliary(&record(), &store, &NoLabelLookup).await.unwrap();
        let images = store
            .auxiliary(&PathBuf::from("items/MC-001/media/images.jsonld.json"))
            .unwrap();
        assert_eq!(images["schema:name"], json!("Image List"));
        assert!(store
            .auxiliary(&PathBuf::from("items/MC-001/media.jsonld.json"))
            .is_some());
    }
}
