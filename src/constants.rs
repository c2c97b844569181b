/// Vocabulary prefixes and well-known values shared by every generated document.

// JSON-LD context prefixes
pub const LDP_NS: &str = "http://www.w3.org/ns/ldp#";
pub const SCHEMA_NS: &str = "http://schema.org/";
pub const FEDORA_NS: &str = "http://fedora.info/definitions/v4/repository#";
pub const WEBAC_NS: &str = "http://fedora.info/definitions/v4/webac#";
pub const ACL_NS: &str = "http://www.w3.org/ns/auth/acl#";
pub const UCDLIB_NS: &str = "http://digital.ucdavis.edu/schema#";
pub const EBUCORE_NS: &str = "http://www.ebu.ch/metadata/ontologies/ebucore/ebucore#";

pub const XSD_GYEAR: &str = "http://www.w3.org/2001/XMLSchema#gYear";
pub const ARCHIVAL_GROUP: &str = "http://fedora.info/definitions/v4/repository#ArchivalGroup";

// Relationship keys, stable across runs
pub const MEMBER_OF: &str = "memberOf";
pub const PART_OF: &str = "partOf";
pub const HAS_RENDITION: &str = "hasRendition";

// Reserved document keys
pub const IDENTIFIER_KEY: &str = "schema:identifier";
pub const MINTED_AT_KEY: &str = "ucdlib:arkMintedAt";

/// Prefix used for references between documents
pub const RESOURCE_REF_PREFIX: &str = "info:fedora/";

/// File suffix of every document written by the store
pub const DOCUMENT_SUFFIX: &str = ".jsonld.json";

// Defaults for configuration
pub const DEFAULT_EZID_BASE_URL: &str = "https://ezid.cdlib.org";
pub const DEFAULT_SHOULDER: &str = "ark:/87293/d3";
pub const DEFAULT_TARGET_BASE_URL: &str = "https://digital.ucdavis.edu";
pub const DEFAULT_PUBLISHER: &str = "UC Davis Library, Archives and Special Collections";
pub const DEFAULT_PUBLISHER_AUTHORITY: &str = "http://id.loc.gov/authorities/names/no2008108707";
pub const DEFAULT_LICENSE: &str = "http://rightsstatements.org/vocab/InC-NC/1.0/";
pub const DEFAULT_FAST_BASE_URL: &str = "https://experimental.worldcat.org/fast";

// Environment variables holding registration credentials
pub const EZID_USERNAME_ENV: &str = "EZID_USERNAME";
pub const EZID_PASSWORD_ENV: &str = "EZID_PASSWORD";

/// MIME type for a page image, derived from its extension
pub fn mime_type_for(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "tif" | "tiff" => "image/tiff",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "jp2" => "image/jp2",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}
