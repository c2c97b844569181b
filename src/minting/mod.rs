//! Registers top-level documents with the identifier service and records the
//! returned ARK on the document.

pub mod anvl;
pub mod backoff;

use crate::app::ports::{ClockPort, RegistrationFailure, RegistrationPort, RegistrationRequest};
use crate::document::{Document, Relation};
use crate::error::MintingError;
use crate::metrics;
use crate::storage::DocumentStore;
use crate::types::{DocRef, DocumentKind, MintedIdentifier};
use backoff::Backoff;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub attempt_timeout: Duration,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 500,
            max_delay_ms: 10_000,
            attempt_timeout: Duration::from_secs(30),
            jitter: true,
        }
    }
}

pub struct MintingClient {
    registrar: Arc<dyn RegistrationPort>,
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn ClockPort>,
    policy: RetryPolicy,
    target_base_url: String,
}

impl MintingClient {
    pub fn new(
        registrar: Arc<dyn RegistrationPort>,
        store: Arc<dyn DocumentStore>,
        clock: Arc<dyn ClockPort>,
        policy: RetryPolicy,
        target_base_url: impl Into<String>,
    ) -> Self {
        Self {
            registrar,
            store,
            clock,
            policy,
            target_base_url: target_base_url.into(),
        }
    }

    /// Mint an identifier for `doc`, or return the one it already carries
    /// without contacting the service. `doc` is only updated once the
    /// identified copy has been persisted.
    pub async fn mint(
        &self,
        doc: &mut Document,
        cancel: &CancellationToken,
    ) -> Result<MintedIdentifier, MintingError> {
        let target = doc.doc_ref();
        if let Some(existing) = doc.identifier() {
            info!(document = %target, identifier = existing, "Identifier already present, skipping registration");
            metrics::minting::identifier_reused();
            return Ok(MintedIdentifier {
                value: existing.to_string(),
                target,
                minted_at: doc.minted_at(),
                reused: true,
            });
        }
        if !doc.kind().is_mintable() {
            return Err(MintingError::NotMintable {
                target: target.to_string(),
            });
        }

        let request = self.registration_request(doc).await?;
        let value = self.register_with_retry(&target, &request, cancel).await?;

        let minted_at = self.clock.now();
        let mut updated = doc.clone();
        let persist_error = |reason: String| MintingError::Persist {
            target: target.to_string(),
            value: value.clone(),
            reason,
        };
        updated
            .assign_identifier(value.clone(), minted_at)
            .map_err(|e| persist_error(e.to_string()))?;
        if let Err(e) = self.store.save(&updated).await {
            error!(
                document = %target,
                identifier = %value,
                error = %e,
                "Identifier was registered but could not be persisted; record it manually"
            );
            return Err(persist_error(e.to_string()));
        }
        *doc = updated;

        metrics::minting::identifier_minted();
        info!(document = %target, identifier = %value, "Minted identifier");
        Ok(MintedIdentifier {
            value,
            target,
            minted_at: Some(minted_at),
            reused: false,
        })
    }

    pub fn target_url(&self, doc_ref: &DocRef) -> String {
        let segment = match doc_ref.kind {
            DocumentKind::Collection => "collection",
            _ => "item",
        };
        format!(
            "{}/{}/{}",
            self.target_base_url.trim_end_matches('/'),
            segment,
            doc_ref.local_id.to_lowercase()
        )
    }

    async fn registration_request(&self, doc: &Document) -> Result<RegistrationRequest, MintingError> {
        let target = doc.doc_ref();
        let relation = match doc.kind() {
            DocumentKind::Item => Some(self.collection_identifier(doc).await?),
            _ => None,
        };
        Ok(RegistrationRequest {
            target_url: self.target_url(&target),
            title: doc.payload_str("schema:name").unwrap_or_default().to_string(),
            creator: doc.payload_str("schema:creator").unwrap_or_default().to_string(),
            date: doc
                .payload()
                .get("schema:datePublished")
                .and_then(|d| d.get("@value"))
                .and_then(|v| v.as_str())
                .filter(|v| !v.is_empty())
                .map(str::to_string),
            relation,
        })
    }

    /// The Item's registration references its Collection's ARK, so the
    /// Collection has to be minted first.
    async fn collection_identifier(&self, item: &Document) -> Result<String, MintingError> {
        let target = item.doc_ref().to_string();
        let collection_ref = item
            .relationships()
            .get(Relation::MemberOf)
            .ok_or_else(|| MintingError::PrerequisiteMissing {
                target: target.clone(),
                prerequisite: "a memberOf collection".into(),
            })?;
        let collection = self
            .store
            .load(collection_ref.kind, &collection_ref.local_id)
            .await
            .map_err(|e| MintingError::Store {
                target: target.clone(),
                reason: e.to_string(),
            })?;
        collection
            .as_ref()
            .and_then(|c| c.identifier())
            .map(str::to_string)
            .ok_or_else(|| MintingError::PrerequisiteMissing {
                target,
                prerequisite: collection_ref.to_string(),
            })
    }

    async fn register_with_retry(
        &self,
        target: &DocRef,
        request: &RegistrationRequest,
        cancel: &CancellationToken,
    ) -> Result<String, MintingError> {
        let mut backoff = Backoff::new(
            self.policy.base_delay_ms,
            self.policy.max_delay_ms,
            self.policy.jitter,
        );
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(MintingError::Cancelled {
                    target: target.to_string(),
                });
            }
            attempt += 1;
            debug!(document = %target, attempt, "Submitting registration request");
            metrics::minting::registration_attempt();

            let started = Instant::now();
            let outcome = match tokio::time::timeout(
                self.policy.attempt_timeout,
                self.registrar.register(request),
            )
            .await
            {
                Ok(outcome) => outcome,
                Err(_) => Err(RegistrationFailure::Transient(format!(
                    "no response within {:?}",
                    self.policy.attempt_timeout
                ))),
            };
            metrics::minting::registration_duration(started.elapsed().as_secs_f64());

            match outcome {
                Ok(value) if value.trim().is_empty() => {
                    metrics::minting::rejected();
                    return Err(MintingError::Rejected {
                        target: target.to_string(),
                        status: None,
                        diagnostic: "service returned an empty identifier".into(),
                    });
                }
                Ok(value) => return Ok(value.trim().to_string()),
                Err(RegistrationFailure::Definitive { status, diagnostic }) => {
                    metrics::minting::rejected();
                    warn!(document = %target, ?status, %diagnostic, "Registration rejected");
                    return Err(MintingError::Rejected {
                        target: target.to_string(),
                        status,
                        diagnostic,
                    });
                }
                Err(RegistrationFailure::Transient(reason)) => {
                    metrics::minting::transient_failure();
                    if attempt >= max_attempts {
                        return Err(MintingError::RetriesExhausted {
                            target: target.to_string(),
                            attempts: attempt,
                            last_error: reason,
                        });
                    }
                    let delay = backoff.next_delay();
                    warn!(
                        document = %target,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        %reason,
                        "Transient registration failure, retrying"
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            return Err(MintingError::Cancelled { target: target.to_string() });
                        }
                        _ = self.clock.sleep(delay) => {}
                    }
                }
            }
        }
    }
}
