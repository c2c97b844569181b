use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

/// Metadata submitted when registering a new persistent identifier
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegistrationRequest {
    pub target_url: String,
    pub title: String,
    pub creator: String,
    pub date: Option<String>,
    /// Identifier of the enclosing resource, if any
    pub relation: Option<String>,
}

#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum RegistrationFailure {
    /// Worth retrying: network errors, timeouts, 5xx responses
    #[error("transient: {0}")]
    Transient(String),
    /// Retrying cannot help: rejected credentials, malformed request, quota
    #[error("{}", describe_definitive(.status, .diagnostic))]
    Definitive { status: Option<u16>, diagnostic: String },
}

fn describe_definitive(status: &Option<u16>, diagnostic: &str) -> String {
    match status {
        Some(status) => format!("HTTP {}: {}", status, diagnostic),
        None => diagnostic.to_string(),
    }
}

#[async_trait]
pub trait RegistrationPort: Send + Sync {
    /// Returns the newly assigned identifier
    async fn register(&self, request: &RegistrationRequest) -> Result<String, RegistrationFailure>;
}

#[async_trait]
pub trait ClockPort: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
    async fn sleep(&self, duration: Duration);
}

#[async_trait]
pub trait SubjectLabelPort: Send + Sync {
    /// Display name for a subject URI, if one can be found
    async fn label(&self, subject_uri: &str) -> Option<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_messages() {
        assert_eq!(
            RegistrationFailure::Transient("HTTP 503".into()).to_string(),
            "transient: HTTP 503"
        );
        let rejected = RegistrationFailure::Definitive {
            status: Some(401),
            diagnostic: "unauthorized".into(),
        };
        assert_eq!(rejected.to_string(), "HTTP 401: unauthorized");
        let bare = RegistrationFailure::Definitive {
            status: None,
            diagnostic: "error: bad request - no such shoulder".into(),
        };
        assert_eq!(bare.to_string(), "error: bad request - no such shoulder");
    }
}
