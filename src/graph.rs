//! Builds the Collection → Item → Page graph for one album and reconciles it
//! with whatever an earlier run left in the store.
//!
//! Ownership runs downward (the Collection owns its Item, the Item its pages
//! and rendition) and is expressed by `CollectionGraph` itself. The
//! `memberOf` / `partOf` / `hasRendition` relationships are back-references
//! used for lookup and are fixed when a document is first built.

use crate::config::SiteConfig;
use crate::constants::{mime_type_for, XSD_GYEAR};
use crate::document::{Document, Relation, Relationships};
use crate::error::{AlbumError, Result};
use crate::layout;
use crate::metrics;
use crate::storage::DocumentStore;
use crate::types::{CollectionRecord, DocRef, DocumentKind, SequencedAssets};
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Publishing details that are not part of the CSV record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphOptions {
    pub publisher: String,
    pub publisher_authority: String,
    pub license: String,
    pub sd_publisher: String,
    pub sd_date_published: String,
}

impl GraphOptions {
    pub fn from_site(site: &SiteConfig) -> Self {
        Self {
            publisher: site.publisher.clone(),
            publisher_authority: site.publisher_authority.clone(),
            license: site.license.clone(),
            sd_publisher: site.sd_publisher.clone(),
            sd_date_published: site.sd_date_published(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollectionGraph {
    pub collection: Document,
    pub item: Document,
    pub rendition: Option<Document>,
    /// Ordered by position
    pub pages: Vec<Document>,
}

impl CollectionGraph {
    pub fn collection_id(&self) -> &str {
        self.collection.local_id()
    }

    /// Every document, predecessors before the documents that link to them
    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        std::iter::once(&self.collection)
            .chain(std::iter::once(&self.item))
            .chain(self.rendition.iter())
            .chain(self.pages.iter())
    }

    /// Structural checks required before handing the graph to the importer.
    pub fn verify(&self, require_identifiers: bool) -> Result<()> {
        let collection_ref = DocRef::new(DocumentKind::Collection, self.collection_id());
        let item_ref = DocRef::new(DocumentKind::Item, self.collection_id());

        check_shape(&self.collection, DocumentKind::Collection, Relationships::new())?;

        let mut item_links = Relationships::new().with(Relation::MemberOf, collection_ref);
        if let Some(rendition) = &self.rendition {
            item_links = item_links.with(Relation::HasRendition, rendition.doc_ref());
        }
        check_shape(&self.item, DocumentKind::Item, item_links)?;
        if self.item.local_id() != self.collection_id() {
            return Err(inconsistent(&self.item, "item id differs from its collection id"));
        }

        let part_of_item = Relationships::new().with(Relation::PartOf, item_ref);
        if let Some(rendition) = &self.rendition {
            check_shape(rendition, DocumentKind::Rendition, part_of_item.clone())?;
        }
        for (index, page) in self.pages.iter().enumerate() {
            check_shape(page, DocumentKind::Page, part_of_item.clone())?;
            let expected = index as u32 + 1;
            if page.position() != Some(expected) {
                return Err(inconsistent(
                    page,
                    &format!("position {:?} where {} was expected", page.position(), expected),
                ));
            }
        }

        if require_identifiers {
            for doc in [&self.collection, &self.item] {
                if doc.identifier().is_none() {
                    return Err(inconsistent(doc, "no persistent identifier"));
                }
            }
        }
        Ok(())
    }
}

fn check_shape(doc: &Document, kind: DocumentKind, relationships: Relationships) -> Result<()> {
    if doc.kind() != kind {
        return Err(inconsistent(doc, &format!("expected a {} document", kind)));
    }
    if *doc.relationships() != relationships {
        return Err(inconsistent(
            doc,
            &format!(
                "relationships {} where {} were expected",
                describe(doc.relationships()),
                describe(&relationships)
            ),
        ));
    }
    Ok(())
}

fn inconsistent(doc: &Document, reason: &str) -> AlbumError {
    AlbumError::GraphConsistency {
        document: doc.doc_ref().to_string(),
        reason: reason.to_string(),
    }
}

fn describe(relationships: &Relationships) -> String {
    if relationships.is_empty() {
        return "{}".into();
    }
    let parts: Vec<String> = relationships
        .iter()
        .map(|(relation, target)| format!("{} -> {}", relation.key(), target))
        .collect();
    format!("{{{}}}", parts.join(", "))
}

/// What a reconciliation run did to the store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub created: Vec<DocRef>,
    pub patched: Vec<DocRef>,
    pub unchanged: Vec<DocRef>,
}

/// Derive the documents for `record` from scratch. Pure; nothing is read or
/// written.
pub fn derive_graph(
    record: &CollectionRecord,
    assets: &SequencedAssets,
    options: &GraphOptions,
) -> Result<CollectionGraph> {
    let id = record.id.as_str();
    let foreign = assets
        .pages
        .iter()
        .map(|p| (&p.collection_id, p.file_name()))
        .chain(assets.rendition.iter().map(|r| (&r.collection_id, r.file_name())))
        .find(|(owner, _)| owner.as_str() != id);
    if let Some((owner, file)) = foreign {
        return Err(AlbumError::GraphConsistency {
            document: file,
            reason: format!("belongs to collection '{}', not '{}'", owner, id),
        });
    }

    let collection_ref = DocRef::new(DocumentKind::Collection, id);
    let item_ref = DocRef::new(DocumentKind::Item, id);
    let cover = match assets.pages.first() {
        Some(page) => Some(layout::resource_ref(&DocRef::new(DocumentKind::Page, page.file_name()))?),
        None => None,
    };

    let mut shared = descriptive_fields(record, options);
    if let Some(cover) = &cover {
        shared.insert("schema:image".into(), json!({ "@id": cover }));
    }

    let mut collection_payload = shared.clone();
    if !record.description.is_empty() {
        collection_payload.insert("schema:description".into(), json!(record.description));
    }
    collection_payload.insert(
        "schema:publisher".into(),
        json!([options.publisher, { "@id": options.publisher_authority }]),
    );
    collection_payload.insert("ucdlib:hasLabel".into(), json!({ "@id": "@base:/labels" }));
    let collection = Document::new(
        DocumentKind::Collection,
        id,
        Relationships::new(),
        collection_payload,
    );

    let rendition = assets.rendition.as_ref().map(|asset| {
        let file = asset.file_name();
        let mut payload = Map::new();
        payload.insert("ebucore:filename".into(), json!(file));
        payload.insert("ebucore:hasMimeType".into(), json!(mime_type_for(&file)));
        payload.insert("schema:associatedMedia".into(), json!({ "@id": "@base:../images" }));
        Document::new(
            DocumentKind::Rendition,
            file,
            Relationships::new().with(Relation::PartOf, item_ref.clone()),
            payload,
        )
    });

    let mut item_payload = shared;
    if !record.creator.is_empty() {
        item_payload.insert("schema:publisher".into(), json!(record.creator));
    }
    item_payload.insert(
        "schema:associatedMedia".into(),
        json!([{ "@id": "@base:/media/images" }]),
    );
    let mut item_links = Relationships::new().with(Relation::MemberOf, collection_ref);
    if let Some(rendition) = &rendition {
        item_links = item_links.with(Relation::HasRendition, rendition.doc_ref());
    }
    let item = Document::new(DocumentKind::Item, id, item_links, item_payload);

    let pages = assets
        .pages
        .iter()
        .map(|page| {
            let file = page.file_name();
            let mut payload = Map::new();
            payload.insert("schema:position".into(), json!(page.sequence_number));
            payload.insert("ebucore:filename".into(), json!(file));
            payload.insert("ebucore:hasMimeType".into(), json!(mime_type_for(&file)));
            Document::new(
                DocumentKind::Page,
                file,
                Relationships::new().with(Relation::PartOf, item_ref.clone()),
                payload,
            )
        })
        .collect();

    Ok(CollectionGraph {
        collection,
        item,
        rendition,
        pages,
    })
}

/// Fields shared by the Collection and the Item
fn descriptive_fields(record: &CollectionRecord, options: &GraphOptions) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert("schema:name".into(), json!(record.title));
    if !record.creator.is_empty() {
        fields.insert("schema:creator".into(), json!(record.creator));
    }
    if !record.date_range.is_empty() {
        fields.insert(
            "schema:datePublished".into(),
            json!({ "@type": XSD_GYEAR, "@value": record.date_range }),
        );
    }
    fields.insert("schema:license".into(), json!({ "@id": options.license }));
    fields.insert(
        "schema:sdDatePublished".into(),
        json!({ "@type": XSD_GYEAR, "@value": options.sd_date_published }),
    );
    fields.insert("schema:sdLicense".into(), json!({ "@id": options.license }));
    fields.insert("schema:sdPublisher".into(), json!(options.sd_publisher));
    if !record.subject_refs.is_empty() {
        let about: Vec<Value> = record.subject_refs.iter().map(|s| json!({ "@id": s })).collect();
        fields.insert("schema:about".into(), Value::Array(about));
    }
    fields
}

/// Derive the graph and reconcile it with the store in one step.
pub async fn build(
    record: &CollectionRecord,
    assets: &SequencedAssets,
    options: &GraphOptions,
    store: &dyn DocumentStore,
) -> Result<(CollectionGraph, ReconcileReport)> {
    let fresh = derive_graph(record, assets, options)?;
    reconcile(fresh, store).await
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Create,
    Patch,
    Keep,
}

/// Merge a freshly derived graph into the store.
///
/// Every document is planned before anything is written: a stored document
/// whose relationships (or page position) disagree with the inputs, or a
/// stored page/rendition the inputs no longer contain, aborts the run with
/// `GraphConsistency` and the store untouched. Stored documents keep their
/// identifiers and values; only payload fields they lack are added. Writes
/// then go predecessor-first so an interrupted run never leaves a page
/// pointing at a missing item.
pub async fn reconcile(
    fresh: CollectionGraph,
    store: &dyn DocumentStore,
) -> Result<(CollectionGraph, ReconcileReport)> {
    let collection_id = fresh.collection_id().to_string();

    check_no_strays(store, &collection_id, DocumentKind::Page, fresh.pages.iter()).await?;
    check_no_strays(store, &collection_id, DocumentKind::Rendition, fresh.rendition.iter()).await?;

    let collection = plan(store, fresh.collection).await?;
    let item = plan(store, fresh.item).await?;
    let rendition = match fresh.rendition {
        Some(doc) => Some(plan(store, doc).await?),
        None => None,
    };
    let mut pages = Vec::with_capacity(fresh.pages.len());
    for page in fresh.pages {
        pages.push(plan(store, page).await?);
    }

    let mut report = ReconcileReport::default();
    let ordered = std::iter::once(&collection)
        .chain(std::iter::once(&item))
        .chain(rendition.iter())
        .chain(pages.iter());
    for (doc, action) in ordered {
        match action {
            Action::Create => {
                store.save(doc).await?;
                report.created.push(doc.doc_ref());
            }
            Action::Patch => {
                store.save(doc).await?;
                report.patched.push(doc.doc_ref());
            }
            Action::Keep => report.unchanged.push(doc.doc_ref()),
        }
    }
    metrics::graph::documents_created(report.created.len());
    metrics::graph::documents_patched(report.patched.len());
    info!(
        collection = %collection_id,
        created = report.created.len(),
        patched = report.patched.len(),
        unchanged = report.unchanged.len(),
        "Reconciled collection graph"
    );

    let graph = CollectionGraph {
        collection: collection.0,
        item: item.0,
        rendition: rendition.map(|(doc, _)| doc),
        pages: pages.into_iter().map(|(doc, _)| doc).collect(),
    };
    Ok((graph, report))
}

async fn plan(store: &dyn DocumentStore, fresh: Document) -> Result<(Document, Action)> {
    let Some(mut existing) = store.load(fresh.kind(), fresh.local_id()).await? else {
        debug!(document = %fresh.doc_ref(), "New document");
        return Ok((fresh, Action::Create));
    };

    if existing.relationships() != fresh.relationships() {
        return Err(inconsistent(
            &existing,
            &format!(
                "stored relationships {} contradict derived {}",
                describe(existing.relationships()),
                describe(fresh.relationships())
            ),
        ));
    }
    if existing.kind() == DocumentKind::Page && existing.position() != fresh.position() {
        return Err(inconsistent(
            &existing,
            &format!(
                "stored position {:?} contradicts derived position {:?}",
                existing.position(),
                fresh.position()
            ),
        ));
    }

    let merge = existing.merge_missing_payload(fresh.payload());
    for key in &merge.diverged {
        warn!(document = %existing.doc_ref(), field = %key, "Stored value differs from input; keeping stored value");
    }
    if merge.added.is_empty() {
        Ok((existing, Action::Keep))
    } else {
        debug!(document = %existing.doc_ref(), added = ?merge.added, "Patching missing fields");
        Ok((existing, Action::Patch))
    }
}

async fn check_no_strays<'a>(
    store: &dyn DocumentStore,
    collection_id: &str,
    kind: DocumentKind,
    fresh: impl Iterator<Item = &'a Document>,
) -> Result<()> {
    let expected: HashSet<&str> = fresh.map(Document::local_id).collect();
    let stored = store.list_local_ids(kind, collection_id).await?;
    if let Some(stray) = stored.iter().find(|id| !expected.contains(id.as_str())) {
        return Err(AlbumError::GraphConsistency {
            document: DocRef::new(kind, stray.clone()).to_string(),
            reason: "stored document has no counterpart in the current inputs".into(),
        });
    }
    Ok(())
}

/// Reassemble a stored graph. `Ok(None)` when the collection was never built.
pub async fn load_graph(store: &dyn DocumentStore, collection_id: &str) -> Result<Option<CollectionGraph>> {
    let Some(collection) = store.load(DocumentKind::Collection, collection_id).await? else {
        return Ok(None);
    };
    let item = store
        .load(DocumentKind::Item, collection_id)
        .await?
        .ok_or_else(|| AlbumError::GraphConsistency {
            document: DocRef::new(DocumentKind::Item, collection_id).to_string(),
            reason: "collection exists but its item document is missing".into(),
        })?;

    let rendition = match item.relationships().get(Relation::HasRendition) {
        Some(target) => Some(store.load(target.kind, &target.local_id).await?.ok_or_else(|| {
            AlbumError::GraphConsistency {
                document: target.to_string(),
                reason: "referenced by hasRendition but missing".into(),
            }
        })?),
        None => None,
    };

    let mut pages = Vec::new();
    for local_id in store.list_local_ids(DocumentKind::Page, collection_id).await? {
        if let Some(page) = store.load(DocumentKind::Page, &local_id).await? {
            pages.push(page);
        }
    }
    pages.sort_by_key(|p| p.position().unwrap_or(u32::MAX));

    Ok(Some(CollectionGraph {
        collection,
        item,
        rendition,
        pages,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencer::sequence_pages;
    use crate::storage::InMemoryDocumentStore;
    use chrono::Utc;

    fn record() -> CollectionRecord {
        CollectionRecord {
            id: "MC-001".into(),
            title: "Family Album".into(),
            description: "Photographs".into(),
            creator: "J. Doe".into(),
            date_range: "1937-1941".into(),
            subject_refs: vec!["http://id.worldcat.org/fast/1".into()],
        }
    }

    fn options() -> GraphOptions {
        GraphOptions {
            publisher: "Library".into(),
            publisher_authority: "http://id.loc.gov/authorities/names/x".into(),
            license: "http://rightsstatements.org/vocab/InC-NC/1.0/".into(),
            sd_publisher: "Library".into(),
            sd_date_published: "2025".into(),
        }
    }

    fn assets(count: u32, pdf: bool) -> SequencedAssets {
        let mut names: Vec<String> = (1..=count).map(|n| format!("MC-001_{:04}.tif", n)).collect();
        if pdf {
            names.push("MC-001.pdf".into());
        }
        sequence_pages("MC-001", names).unwrap()
    }

    #[test]
    fn test_derive_links_documents() {
        let graph = derive_graph(&record(), &assets(3, true), &options()).unwrap();
        graph.verify(false).unwrap();

        assert_eq!(
            graph.item.relationships().get(Relation::MemberOf),
            Some(&DocRef::new(DocumentKind::Collection, "MC-001"))
        );
        assert_eq!(
            graph.item.relationships().get(Relation::HasRendition),
            Some(&DocRef::new(DocumentKind::Rendition, "MC-001.pdf"))
        );
        assert_eq!(graph.pages.len(), 3);
        for (i, page) in graph.pages.iter().enumerate() {
            assert_eq!(page.position(), Some(i as u32 + 1));
            assert_eq!(page.relationships().len(), 1);
        }
        assert_eq!(
            graph.collection.payload()["schema:image"]["@id"],
            json!("info:fedora/item/MC-001/media/images/MC-001_0001.tif")
        );
        assert_eq!(graph.collection.payload()["schema:about"], json!([{ "@id": "http://id.worldcat.org/fast/1" }]));
    }

    #[test]
    fn test_derive_rejects_foreign_pages() {
        let mut foreign = assets(1, false);
        foreign.pages[0].collection_id = "MC-002".into();
        assert!(matches!(
            derive_graph(&record(), &foreign, &options()),
            Err(AlbumError::GraphConsistency { .. })
        ));
    }

    #[tokio::test]
    async fn test_rebuild_is_idempotent() {
        let store = InMemoryDocumentStore::new();
        let (first, report) = build(&record(), &assets(5, true), &options(), &store).await.unwrap();
        assert_eq!(report.created.len(), 8);
        assert_eq!(store.document_count(), 8);

        let (second, report) = build(&record(), &assets(5, true), &options(), &store).await.unwrap();
        assert!(report.created.is_empty());
        assert!(report.patched.is_empty());
        assert_eq!(report.unchanged.len(), 8);
        assert_eq!(store.document_count(), 8);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_rebuild_preserves_identifiers() {
        let store = InMemoryDocumentStore::new();
        let (mut graph, _) = build(&record(), &assets(2, false), &options(), &store).await.unwrap();
        graph
            .collection
            .assign_identifier("ark:/87293/d3col".into(), Utc::now())
            .unwrap();
        store.save(&graph.collection).await.unwrap();

        let (rebuilt, _) = build(&record(), &assets(2, false), &options(), &store).await.unwrap();
        assert_eq!(rebuilt.collection.identifier(), Some("ark:/87293/d3col"));
    }

    #[tokio::test]
    async fn test_missing_fields_are_patched_and_stored_values_kept() {
        let store = InMemoryDocumentStore::new();
        let mut sparse = record();
        sparse.description.clear();
        build(&sparse, &assets(2, false), &options(), &store).await.unwrap();

        let mut changed = record();
        changed.title = "Renamed Album".into();
        let (graph, report) = build(&changed, &assets(2, false), &options(), &store).await.unwrap();

        assert_eq!(
            report.patched,
            vec![DocRef::new(DocumentKind::Collection, "MC-001")]
        );
        assert_eq!(graph.collection.payload_str("schema:description"), Some("Photographs"));
        assert_eq!(graph.collection.payload_str("schema:name"), Some("Family Album"));
        assert_eq!(graph.item.payload_str("schema:name"), Some("Family Album"));
    }

    #[tokio::test]
    async fn test_removed_page_is_a_consistency_error() {
        let store = InMemoryDocumentStore::new();
        build(&record(), &assets(3, false), &options(), &store).await.unwrap();

        let err = build(&record(), &assets(2, false), &options(), &store).await.unwrap_err();
        assert!(matches!(err, AlbumError::GraphConsistency { .. }));
    }

    #[tokio::test]
    async fn test_contradicting_relationships_abort_before_writing() {
        let store = InMemoryDocumentStore::new();
        build(&record(), &assets(2, false), &options(), &store).await.unwrap();

        // a PDF appearing later changes the item's relationships
        let err = build(&record(), &assets(3, true), &options(), &store).await.unwrap_err();
        assert!(matches!(err, AlbumError::GraphConsistency { .. }));
        assert_eq!(store.document_count(), 4);
        assert!(store.load(DocumentKind::Page, "MC-001_0003.tif").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_load_graph_round_trip() {
        let store = InMemoryDocumentStore::new();
        assert!(load_graph(&store, "MC-001").await.unwrap().is_none());

        let (built, _) = build(&record(), &assets(12, true), &options(), &store).await.unwrap();
        let loaded = load_graph(&store, "MC-001").await.unwrap().unwrap();
        assert_eq!(loaded, built);
        loaded.verify(false).unwrap();
        assert!(loaded.verify(true).is_err());
    }
}
