pub mod clock;
pub mod ezid_client;
pub mod fast_labels;
