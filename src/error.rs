use thiserror::Error;

#[derive(Error, Debug)]
pub enum AlbumError {
    #[error("malformed image file name '{name}': expected {expected}")]
    MalformedName { name: String, expected: String },

    #[error(
        "page sequence for '{collection_id}' is not 1..{expected_count}: missing {missing:?}, duplicated {duplicated:?}"
    )]
    SequenceGap {
        collection_id: String,
        expected_count: usize,
        missing: Vec<u32>,
        duplicated: Vec<u32>,
    },

    #[error("graph consistency error at {document}: {reason}")]
    GraphConsistency { document: String, reason: String },

    #[error(transparent)]
    Minting(#[from] MintingError),

    #[error("record error: {0}")]
    Record(String),

    #[error("document {path} is unreadable: {reason}")]
    Document { path: String, reason: String },

    #[error("CSV parse failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Failures of the identifier minting step. None of them leave a Document
/// partially updated.
#[derive(Error, Debug)]
pub enum MintingError {
    #[error("registration of {target} rejected (status {status:?}): {diagnostic}")]
    Rejected {
        target: String,
        status: Option<u16>,
        diagnostic: String,
    },

    #[error("registration of {target} failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        target: String,
        attempts: u32,
        last_error: String,
    },

    #[error("{target} cannot be minted before {prerequisite} has an identifier")]
    PrerequisiteMissing { target: String, prerequisite: String },

    #[error("{target} is not minted independently")]
    NotMintable { target: String },

    #[error("minting of {target} was cancelled")]
    Cancelled { target: String },

    #[error("{target} was registered as {value} but could not be persisted: {reason}")]
    Persist {
        target: String,
        value: String,
        reason: String,
    },

    #[error("document store failed while minting {target}: {reason}")]
    Store { target: String, reason: String },

    #[error("registration credentials unavailable: {0}")]
    Credentials(String),
}

pub type Result<T> = std::result::Result<T, AlbumError>;
