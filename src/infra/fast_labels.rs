use crate::app::ports::SubjectLabelPort;
use crate::error::{AlbumError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::warn;

/// Looks up FAST subject headings by their numeric id
pub struct FastLabelClient {
    client: reqwest::Client,
    base_url: String,
}

impl FastLabelClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AlbumError::Config(format!("cannot build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    pub fn lookup_url(&self, subject_uri: &str) -> Option<String> {
        let number = subject_uri.trim_end_matches('/').rsplit('/').next()?;
        if number.is_empty() {
            return None;
        }
        Some(format!("{}/{}.json", self.base_url.trim_end_matches('/'), number))
    }
}

/// Preferred heading from a FAST JSON response
pub fn heading_from(body: &Value) -> Option<String> {
    ["preferredLabel", "label", "name"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

#[async_trait]
impl SubjectLabelPort for FastLabelClient {
    async fn label(&self, subject_uri: &str) -> Option<String> {
        let url = self.lookup_url(subject_uri)?;
        let response = match self.client.get(&url).send().await {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                warn!(subject = subject_uri, status = response.status().as_u16(), "FAST lookup failed");
                return None;
            }
            Err(e) => {
                warn!(subject = subject_uri, error = %e, "FAST lookup failed");
                return None;
            }
        };
        match response.json::<Value>().await {
            Ok(body) => heading_from(&body),
            Err(e) => {
                warn!(subject = subject_uri, error = %e, "FAST response was not JSON");
                None
            }
        }
    }
}

/// Used when label lookups are disabled; every subject is named by its URI
pub struct NoLabelLookup;

#[async_trait]
impl SubjectLabelPort for NoLabelLookup {
    async fn label(&self, _subject_uri: &str) -> Option<String> {
        None
    }
}
