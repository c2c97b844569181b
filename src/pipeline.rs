use crate::app::ports::SubjectLabelPort;
use crate::auxiliary::{self, AuxiliaryReport};
use crate::constants::DOCUMENT_SUFFIX;
use crate::error::{AlbumError, Result};
use crate::graph::{self, CollectionGraph, GraphOptions, ReconcileReport};
use crate::idempotency::relationship_fingerprint;
use crate::minting::MintingClient;
use crate::sequencer::sequence_pages;
use crate::storage::DocumentStore;
use crate::types::{CollectionRecord, DocRef, DocumentKind, MintedIdentifier};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Result of building (or rebuilding) one collection's documents
#[derive(Debug, Serialize)]
pub struct BuildReport {
    pub collection_id: String,
    pub pages: usize,
    pub has_rendition: bool,
    pub created: usize,
    pub patched: usize,
    pub unchanged: usize,
    pub auxiliary_written: usize,
    pub fingerprint: String,
}

impl BuildReport {
    fn new(
        graph: &CollectionGraph,
        reconcile: &ReconcileReport,
        auxiliary: &AuxiliaryReport,
        fingerprint: String,
    ) -> Self {
        Self {
            collection_id: graph.collection_id().to_string(),
            pages: graph.pages.len(),
            has_rendition: graph.rendition.is_some(),
            created: reconcile.created.len(),
            patched: reconcile.patched.len(),
            unchanged: reconcile.unchanged.len(),
            auxiliary_written: auxiliary.written.len(),
            fingerprint,
        }
    }
}

/// Result of the minting step
#[derive(Debug, Serialize)]
pub struct MintReport {
    pub collection_id: String,
    pub collection_ark: String,
    pub item_ark: String,
    pub minted: usize,
    pub reused: usize,
}

impl MintReport {
    fn new(collection_id: &str, identifiers: &[MintedIdentifier; 2]) -> Self {
        let [collection, item] = identifiers;
        let reused = identifiers.iter().filter(|i| i.reused).count();
        Self {
            collection_id: collection_id.to_string(),
            collection_ark: collection.value.clone(),
            item_ark: item.value.clone(),
            minted: identifiers.len() - reused,
            reused,
        }
    }
}

pub struct Pipeline {
    store: Arc<dyn DocumentStore>,
    labels: Arc<dyn SubjectLabelPort>,
    options: GraphOptions,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        labels: Arc<dyn SubjectLabelPort>,
        options: GraphOptions,
    ) -> Self {
        Self {
            store,
            labels,
            options,
        }
    }

    /// Sequence the album's images, build or reconcile its documents and write
    /// the supporting containers.
    #[instrument(skip(self, record, image_dir), fields(collection = %record.id))]
    pub async fn build(&self, record: &CollectionRecord, image_dir: &Path) -> Result<BuildReport> {
        info!("📂 Scanning {}", image_dir.display());
        let names = scan_image_dir(&record.id, image_dir).await?;
        let assets = sequence_pages(&record.id, &names)?;
        info!(
            pages = assets.pages.len(),
            rendition = assets.rendition.is_some(),
            "✅ Sequenced album pages"
        );

        let (graph, reconcile) =
            graph::build(record, &assets, &self.options, self.store.as_ref()).await?;
        graph.verify(false)?;
        let auxiliary =
            auxiliary::write_auxiliary(record, self.store.as_ref(), self.labels.as_ref()).await?;

        let fingerprint = relationship_fingerprint(&graph)?;
        info!(fingerprint = %fingerprint, "💾 Collection documents are up to date");
        Ok(BuildReport::new(&graph, &reconcile, &auxiliary, fingerprint))
    }

    /// Mint the Collection's identifier, then the Item's. Already identified
    /// documents are reused without contacting the service.
    #[instrument(skip(self, minter, cancel))]
    pub async fn mint(
        &self,
        collection_id: &str,
        minter: &MintingClient,
        cancel: &CancellationToken,
    ) -> Result<MintReport> {
        let mut graph = self.load(collection_id).await?;
        graph.verify(false)?;

        let collection = minter.mint(&mut graph.collection, cancel).await?;
        let item = minter.mint(&mut graph.item, cancel).await?;
        graph.verify(true)?;

        let report = MintReport::new(collection_id, &[collection, item]);
        info!(
            minted = report.minted,
            reused = report.reused,
            collection_ark = %report.collection_ark,
            item_ark = %report.item_ark,
            "🔖 Identifiers in place"
        );
        Ok(report)
    }

    /// Check a stored graph is ready for import: structure intact and both
    /// top-level documents identified.
    pub async fn verify(&self, collection_id: &str) -> Result<CollectionGraph> {
        let graph = self.load(collection_id).await?;
        graph.verify(true)?;
        Ok(graph)
    }

    async fn load(&self, collection_id: &str) -> Result<CollectionGraph> {
        graph::load_graph(self.store.as_ref(), collection_id)
            .await?
            .ok_or_else(|| AlbumError::GraphConsistency {
                document: DocRef::new(DocumentKind::Collection, collection_id).to_string(),
                reason: "not built yet".into(),
            })
    }
}

/// File names in `image_dir` that belong to the album. Hidden files,
/// document sidecars and files named for other collections are skipped.
pub async fn scan_image_dir(collection_id: &str, image_dir: &Path) -> Result<Vec<String>> {
    let mut entries = tokio::fs::read_dir(image_dir).await.map_err(|e| {
        AlbumError::Config(format!(
            "Failed to read image directory '{}': {}",
            image_dir.display(),
            e
        ))
    })?;

    let page_prefix = format!("{}_", collection_id);
    let rendition_prefix = format!("{}.", collection_id);
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        // follows symlinks, so staged links to the masters count as images
        let metadata = match tokio::fs::metadata(entry.path()).await {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!(file = %name, error = %e, "Cannot resolve file; skipping");
                continue;
            }
        };
        if !metadata.is_file() {
            continue;
        }
        if name.starts_with('.') || name.ends_with(DOCUMENT_SUFFIX) {
            debug!(file = %name, "Skipping non-image file");
            continue;
        }
        if !name.starts_with(&page_prefix) && !name.starts_with(&rendition_prefix) {
            warn!(file = %name, collection = collection_id, "File does not belong to this collection; skipping");
            continue;
        }
        names.push(name);
    }
    names.sort();
    Ok(names)
}
