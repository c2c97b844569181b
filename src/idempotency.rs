use crate::error::Result;
use crate::graph::CollectionGraph;
use crate::layout;
use sha2::{Digest, Sha256};

/// Digest of the graph's structure: every document's reference, its page
/// position and its outgoing relationships. Identifiers and descriptive
/// fields are left out, so a re-run over the same inputs (minted or not)
/// yields the same value.
pub fn relationship_fingerprint(graph: &CollectionGraph) -> Result<String> {
    let mut s = String::new();
    for doc in graph.documents() {
        s.push_str(&layout::resource_ref(&doc.doc_ref())?);
        s.push('|');
        if let Some(position) = doc.position() {
            s.push_str(&position.to_string());
        }
        for (relation, target) in doc.relationships().iter() {
            s.push('|');
            s.push_str(relation.key());
            s.push('=');
            s.push_str(&layout::resource_ref(target)?);
        }
        s.push('\n');
    }

    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}
