//! Counters for the document store and the minting client.
//!
//! Recorded through the `metrics` facade; nothing is exported unless the
//! embedding process installs a recorder.

pub mod store {
    use crate::types::DocumentKind;

    pub fn document_written(kind: DocumentKind) {
        ::metrics::counter!("album_ark_documents_written_total", "kind" => kind.as_str()).increment(1);
    }
}

pub mod graph {
    pub fn documents_created(count: usize) {
        ::metrics::counter!("album_ark_graph_documents_created_total").increment(count as u64);
    }

    pub fn documents_patched(count: usize) {
        ::metrics::counter!("album_ark_graph_documents_patched_total").increment(count as u64);
    }
}

pub mod minting {
    pub fn registration_attempt() {
        ::metrics::counter!("album_ark_registration_attempts_total").increment(1);
    }

    pub fn transient_failure() {
        ::metrics::counter!("album_ark_registration_transient_failures_total").increment(1);
    }

    pub fn rejected() {
        ::metrics::counter!("album_ark_registration_rejected_total").increment(1);
    }

    pub fn identifier_minted() {
        ::metrics::counter!("album_ark_identifiers_minted_total").increment(1);
    }

    pub fn identifier_reused() {
        ::metrics::counter!("album_ark_identifiers_reused_total").increment(1);
    }

    pub fn registration_duration(duration_secs: f64) {
        ::metrics::histogram!("album_ark_registration_duration_seconds").record(duration_secs);
    }
}
