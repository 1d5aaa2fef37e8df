//! Call event stream aggregation.
//!
//! Consumes batches of heterogeneous call events (utterances, transcripts,
//! contact segments, custom events and lifecycle events), normalizes them,
//! enriches them with weighted sentiment, persists each segment through a
//! mutation gateway and folds the results into per-call state that survives
//! across invocations.

pub mod config;
pub mod core;
pub mod errors;
pub mod handlers;
pub mod utils;

// Re-export commonly used items for convenience
pub use config::ProcessorConfig;
pub use errors::{ProcessorError, ProcessorResult};
pub use handlers::{BatchInput, BatchOrchestrator, BatchOutput};
