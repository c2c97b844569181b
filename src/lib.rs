pub mod auxiliary;
pub mod config;
pub mod constants;
pub mod document;
pub mod error;
pub mod graph;
pub mod idempotency;
pub mod layout;
pub mod logging;
pub mod metrics;
pub mod minting;
pub mod pipeline;
pub mod record;
pub mod sequencer;
pub mod storage;
pub mod types;

// Port traits and their adapters
pub mod app;
pub mod infra;
