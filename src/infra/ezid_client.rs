use crate::app::ports::{RegistrationFailure, RegistrationPort, RegistrationRequest};
use crate::config::{EzidConfig, EzidCredentials};
use crate::error::{AlbumError, Result};
use crate::minting::anvl;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use std::time::Duration;
use tracing::debug;

/// EZID shoulder minting over HTTPS with basic auth
pub struct EzidRegistrar {
    client: reqwest::Client,
    mint_url: String,
    credentials: EzidCredentials,
}

impl EzidRegistrar {
    pub fn new(config: &EzidConfig, credentials: EzidCredentials) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(config.timeout_seconds.min(10)))
            .build()
            .map_err(|e| AlbumError::Config(format!("cannot build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            mint_url: format!(
                "{}/shoulder/{}",
                config.base_url.trim_end_matches('/'),
                config.shoulder
            ),
            credentials,
        })
    }

    pub fn mint_url(&self) -> &str {
        &self.mint_url
    }
}

#[async_trait]
impl RegistrationPort for EzidRegistrar {
    async fn register(&self, request: &RegistrationRequest) -> std::result::Result<String, RegistrationFailure> {
        let body = anvl::encode(request);
        debug!(url = %self.mint_url, target = %request.target_url, "POST registration");

        let response = self
            .client
            .post(&self.mint_url)
            .header(CONTENT_TYPE, "text/plain; charset=UTF-8")
            .header(ACCEPT, "text/plain")
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .body(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_builder() {
                    RegistrationFailure::Definitive {
                        status: None,
                        diagnostic: e.to_string(),
                    }
                } else {
                    RegistrationFailure::Transient(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| RegistrationFailure::Transient(e.to_string()))?;
        debug!(status, body = %text.trim(), "Registration response");
        anvl::parse_response(status, &text)
    }
}
