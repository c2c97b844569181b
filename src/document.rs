//! The linked-data document model and its JSON-LD encoding.

use crate::constants::{
    ACL_NS, ARCHIVAL_GROUP, EBUCORE_NS, FEDORA_NS, HAS_RENDITION, IDENTIFIER_KEY,
    LDP_NS, MEMBER_OF, MINTED_AT_KEY, PART_OF, SCHEMA_NS, UCDLIB_NS, WEBAC_NS,
};
use crate::error::{AlbumError, Result};
use crate::layout;
use crate::types::{DocRef, DocumentKind};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Relation {
    MemberOf,
    PartOf,
    HasRendition,
}

impl Relation {
    pub const ALL: [Relation; 3] = [Relation::MemberOf, Relation::PartOf, Relation::HasRendition];

    pub fn key(&self) -> &'static str {
        match self {
            Relation::MemberOf => MEMBER_OF,
            Relation::PartOf => PART_OF,
            Relation::HasRendition => HAS_RENDITION,
        }
    }
}

/// Ordered relationship-name to target mapping. Fixed once a document is built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Relationships(Vec<(Relation, DocRef)>);

impl Relationships {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn with(mut self, relation: Relation, target: DocRef) -> Self {
        self.0.retain(|(r, _)| *r != relation);
        self.0.push((relation, target));
        self.0.sort_by(|a, b| a.0.cmp(&b.0));
        self
    }

    pub fn get(&self, relation: Relation) -> Option<&DocRef> {
        self.0.iter().find(|(r, _)| *r == relation).map(|(_, t)| t)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Relation, DocRef)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Result of patching a stored payload with freshly derived fields
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PayloadMerge {
    pub added: Vec<String>,
    pub diverged: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    kind: DocumentKind,
    local_id: String,
    identifier: Option<String>,
    minted_at: Option<DateTime<Utc>>,
    relationships: Relationships,
    payload: Map<String, Value>,
}

impl Document {
    pub fn new(
        kind: DocumentKind,
        local_id: impl Into<String>,
        relationships: Relationships,
        payload: Map<String, Value>,
    ) -> Self {
        Self {
            kind,
            local_id: local_id.into(),
            identifier: None,
            minted_at: None,
            relationships,
            payload,
        }
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    pub fn local_id(&self) -> &str {
        &self.local_id
    }

    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    pub fn minted_at(&self) -> Option<DateTime<Utc>> {
        self.minted_at
    }

    pub fn relationships(&self) -> &Relationships {
        &self.relationships
    }

    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    pub fn doc_ref(&self) -> DocRef {
        DocRef::new(self.kind, self.local_id.clone())
    }

    pub fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }

    /// Reading-order position of a page
    pub fn position(&self) -> Option<u32> {
        self.payload
            .get("schema:position")
            .and_then(Value::as_u64)
            .and_then(|p| u32::try_from(p).ok())
    }

    /// Attach the document's own persistent identifier. The only mutation
    /// allowed besides patching missing payload fields.
    pub fn assign_identifier(&mut self, value: String, minted_at: DateTime<Utc>) -> Result<()> {
        match &self.identifier {
            Some(existing) if *existing != value => Err(AlbumError::GraphConsistency {
                document: self.doc_ref().to_string(),
                reason: format!("already identified as {}, refusing {}", existing, value),
            }),
            Some(_) => Ok(()),
            None => {
                self.identifier = Some(value);
                self.minted_at = Some(minted_at);
                Ok(())
            }
        }
    }

    /// Add payload fields that are missing here; existing values are kept.
    pub fn merge_missing_payload(&mut self, fresh: &Map<String, Value>) -> PayloadMerge {
        let mut merge = PayloadMerge::default();
        for (key, value) in fresh {
            match self.payload.get(key) {
                None => {
                    self.payload.insert(key.clone(), value.clone());
                    merge.added.push(key.clone());
                }
                Some(existing) if existing != value => merge.diverged.push(key.clone()),
                Some(_) => {}
            }
        }
        merge
    }

    pub fn to_jsonld(&self) -> Result<Value> {
        let mut body = self.payload.clone();
        body.insert("@context".into(), jsonld_context());
        body.insert("@id".into(), Value::String(String::new()));
        body.insert("@type".into(), json!(types_for(self.kind)));

        let mut identifiers = vec![Value::String(self.local_id.clone())];
        if let Some(ark) = &self.identifier {
            identifiers.push(Value::String(ark.clone()));
        }
        body.insert(IDENTIFIER_KEY.into(), Value::Array(identifiers));
        if let Some(at) = self.minted_at {
            body.insert(
                MINTED_AT_KEY.into(),
                Value::String(at.to_rfc3339_opts(SecondsFormat::Secs, true)),
            );
        }
        for (relation, target) in self.relationships.iter() {
            body.insert(relation.key().into(), json!({ "@id": layout::resource_ref(target)? }));
        }
        Ok(Value::Object(body))
    }

    pub fn from_jsonld(value: &Value) -> std::result::Result<Self, String> {
        let body = value.as_object().ok_or("document is not a JSON object")?;

        let types: Vec<&str> = body
            .get("@type")
            .and_then(Value::as_array)
            .ok_or("missing @type")?
            .iter()
            .filter_map(Value::as_str)
            .collect();
        let kind = kind_from_types(&types).ok_or_else(|| format!("unrecognized @type {:?}", types))?;

        let identifiers: Vec<&str> = body
            .get(IDENTIFIER_KEY)
            .and_then(Value::as_array)
            .ok_or("missing schema:identifier")?
            .iter()
            .filter_map(Value::as_str)
            .collect();
        let (local_id, rest) = identifiers.split_first().ok_or("schema:identifier is empty")?;
        // the persistent identifier is opaque; at most one follows the local id
        if rest.len() > 1 {
            return Err(format!("more than one identifier recorded: {:?}", rest));
        }

        let minted_at = match body.get(MINTED_AT_KEY).and_then(Value::as_str) {
            Some(text) => Some(
                DateTime::parse_from_rfc3339(text)
                    .map_err(|e| format!("bad {}: {}", MINTED_AT_KEY, e))?
                    .with_timezone(&Utc),
            ),
            None => None,
        };

        let mut relationships = Relationships::new();
        for relation in Relation::ALL {
            if let Some(link) = body.get(relation.key()) {
                let target = link
                    .get("@id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| format!("{} has no @id", relation.key()))?;
                let target = layout::parse_resource_ref(target).map_err(|e| e.to_string())?;
                relationships = relationships.with(relation, target);
            }
        }

        let payload = body
            .iter()
            .filter(|(key, _)| !is_reserved_key(key))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Ok(Self {
            kind,
            local_id: local_id.to_string(),
            identifier: rest.first().map(|a| a.to_string()),
            minted_at,
            relationships,
            payload,
        })
    }
}

pub fn jsonld_context() -> Value {
    json!({
        "ldp": LDP_NS,
        "schema": SCHEMA_NS,
        "fedora": FEDORA_NS,
        "webac": WEBAC_NS,
        "acl": ACL_NS,
        "ucdlib": UCDLIB_NS,
        "ebucore": EBUCORE_NS,
        MEMBER_OF: { "@id": "schema:memberOf", "@type": "@id" },
        PART_OF: { "@id": "schema:isPartOf", "@type": "@id" },
        HAS_RENDITION: { "@id": "ucdlib:hasRendition", "@type": "@id" },
    })
}

pub fn types_for(kind: DocumentKind) -> &'static [&'static str] {
    match kind {
        DocumentKind::Collection => &["schema:Collection", ARCHIVAL_GROUP],
        DocumentKind::Item => &["schema:CreativeWork", "schema:Book", ARCHIVAL_GROUP],
        DocumentKind::Page => &["schema:ImageObject", "schema:MediaObject", "schema:CreativeWork"],
        DocumentKind::Rendition => &[
            "schema:DigitalDocument",
            "schema:MediaObject",
            "schema:CreativeWork",
        ],
    }
}

fn kind_from_types(types: &[&str]) -> Option<DocumentKind> {
    if types.contains(&"schema:Collection") {
        Some(DocumentKind::Collection)
    } else if types.contains(&"schema:Book") {
        Some(DocumentKind::Item)
    } else if types.contains(&"schema:ImageObject") {
        Some(DocumentKind::Page)
    } else if types.contains(&"schema:DigitalDocument") {
        Some(DocumentKind::Rendition)
    } else {
        None
    }
}

fn is_reserved_key(key: &str) -> bool {
    matches!(key, "@context" | "@id" | "@type")
        || key == IDENTIFIER_KEY
        || key == MINTED_AT_KEY
        || Relation::ALL.iter().any(|r| r.key() == key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn page() -> Document {
        let mut payload = Map::new();
        payload.insert("schema:position".into(), json!(3));
        payload.insert("ebucore:filename".into(), json!("MC-001_0003.tif"));
        Document::new(
            DocumentKind::Page,
            "MC-001_0003.tif",
            Relationships::new().with(Relation::PartOf, DocRef::new(DocumentKind::Item, "MC-001")),
            payload,
        )
    }

    #[test]
    fn test_jsonld_encoding_reads_back() {
        let mut item = Document::new(
            DocumentKind::Item,
            "MC-001",
            Relationships::new()
                .with(Relation::HasRendition, DocRef::new(DocumentKind::Rendition, "MC-001.pdf"))
                .with(Relation::MemberOf, DocRef::new(DocumentKind::Collection, "MC-001")),
            Map::new(),
        );
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        item.assign_identifier("ark:/87293/d3abc".into(), at).unwrap();

        let encoded = item.to_jsonld().unwrap();
        assert_eq!(encoded["schema:identifier"], json!(["MC-001", "ark:/87293/d3abc"]));
        assert_eq!(encoded["memberOf"]["@id"], json!("info:fedora/collection/MC-001"));
        assert_eq!(encoded["hasRendition"]["@id"], json!("info:fedora/item/MC-001/media/MC-001.pdf"));

        let decoded = Document::from_jsonld(&encoded).unwrap();
        assert_eq!(decoded, item);
    }

    #[test]
    fn test_identifier_reads_back_whatever_its_scheme() {
        let mut doc = page();
        doc.assign_identifier("doi:10.5072/FK21".into(), Utc::now()).unwrap();
        let decoded = Document::from_jsonld(&doc.to_jsonld().unwrap()).unwrap();
        assert_eq!(decoded.identifier(), Some("doi:10.5072/FK21"));

        let mut encoded = doc.to_jsonld().unwrap();
        encoded["schema:identifier"] = json!(["MC-001_0003.tif", "doi:10.5072/FK21", "ark:/1/x"]);
        assert!(Document::from_jsonld(&encoded).is_err());
    }

    #[test]
    fn test_relationship_order_is_canonical() {
        let a = Relationships::new()
            .with(Relation::HasRendition, DocRef::new(DocumentKind::Rendition, "X.pdf"))
            .with(Relation::MemberOf, DocRef::new(DocumentKind::Collection, "X"));
        let b = Relationships::new()
            .with(Relation::MemberOf, DocRef::new(DocumentKind::Collection, "X"))
            .with(Relation::HasRendition, DocRef::new(DocumentKind::Rendition, "X.pdf"));
        assert_eq!(a, b);
        assert_eq!(a.len(), 2);
    }

    #[test]
    fn test_assign_identifier_refuses_a_second_value() {
        let mut doc = page();
        let now = Utc::now();
        doc.assign_identifier("ark:/1/a".into(), now).unwrap();
        assert!(doc.assign_identifier("ark:/1/a".into(), now).is_ok());
        assert!(doc.assign_identifier("ark:/1/b".into(), now).is_err());
        assert_eq!(doc.identifier(), Some("ark:/1/a"));
    }

    #[test]
    fn test_merge_keeps_stored_values() {
        let mut doc = page();
        let mut fresh = doc.payload().clone();
        fresh.insert("schema:position".into(), json!(4));
        fresh.insert("ebucore:hasMimeType".into(), json!("image/tiff"));

        let merge = doc.merge_missing_payload(&fresh);
        assert_eq!(merge.added, vec!["ebucore:hasMimeType".to_string()]);
        assert_eq!(merge.diverged, vec!["schema:position".to_string()]);
        assert_eq!(doc.position(), Some(3));
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let value = json!({ "@type": ["schema:Thing"], "schema:identifier": ["x"] });
        assert!(Document::from_jsonld(&value).is_err());
    }
}
