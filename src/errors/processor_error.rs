//! Error taxonomy for the call event processor.
//!
//! Every failure that can occur while handling a batch maps onto one of the
//! variants below. Per-record and per-mutation failures are collected into the
//! batch output instead of aborting sibling work; state store failures flip the
//! stale-state indicator but never fail the batch.

use thiserror::Error;

/// Result type for processor operations
pub type ProcessorResult<T> = Result<T, ProcessorError>;

/// Errors raised by the normalizer, enrichment adapter, state store,
/// aggregator, mutation gateway and batch orchestrator.
#[derive(Debug, Clone, Error)]
pub enum ProcessorError {
    // ─────────────────────────────────────────────────────────────────────────────
    // Ingestion Errors
    // ─────────────────────────────────────────────────────────────────────────────
    /// Raw record could not be decoded (bad base64, bad UTF-8, bad JSON)
    #[error("Failed to decode record: {0}")]
    RecordDecode(String),

    /// Event matched a known shape but is missing a required field
    #[error("Malformed event: {0}")]
    MalformedEvent(String),

    // ─────────────────────────────────────────────────────────────────────────────
    // Mutation Errors
    // ─────────────────────────────────────────────────────────────────────────────
    /// Network or server error calling the mutation gateway; retried with backoff
    #[error("Transient mutation error: {0}")]
    TransientMutation(String),

    /// Mutation was rejected by the gateway (GraphQL error payload); not retried
    #[error("Mutation '{mutation}' rejected: {message}")]
    MutationRejected { mutation: String, message: String },

    /// Conflict classified as ignorable by the caller (e.g. duplicate create)
    #[error("Ignorable conflict: {0}")]
    IgnorableConflict(String),

    // ─────────────────────────────────────────────────────────────────────────────
    // Collaborator Errors
    // ─────────────────────────────────────────────────────────────────────────────
    /// Restoring or persisting durable state failed
    #[error("State store error: {0}")]
    StateStore(String),

    /// Sentiment detection failed
    #[error("Sentiment scorer error: {0}")]
    Scorer(String),

    /// Agent assist dispatch failed
    #[error("Agent assist error: {0}")]
    AgentAssist(String),

    // ─────────────────────────────────────────────────────────────────────────────
    // Setup Errors
    // ─────────────────────────────────────────────────────────────────────────────
    /// Invalid or unusable configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// JSON (de)serialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ProcessorError {
    /// Whether the mutation gateway should retry after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProcessorError::TransientMutation(_))
    }

    /// Short machine-readable kind, used in the batch `errors` list.
    pub fn kind(&self) -> &'static str {
        match self {
            ProcessorError::RecordDecode(_) => "RecordDecodeError",
            ProcessorError::MalformedEvent(_) => "MalformedEventError",
            ProcessorError::TransientMutation(_) => "TransientMutationError",
            ProcessorError::MutationRejected { .. } => "MutationRejectedError",
            ProcessorError::IgnorableConflict(_) => "IgnorableConflictError",
            ProcessorError::StateStore(_) => "StateStoreError",
            ProcessorError::Scorer(_) => "ScorerError",
            ProcessorError::AgentAssist(_) => "AgentAssistError",
            ProcessorError::Configuration(_) => "ConfigurationError",
            ProcessorError::Serialization(_) => "SerializationError",
        }
    }
}

impl From<serde_json::Error> for ProcessorError {
    fn from(err: serde_json::Error) -> Self {
        ProcessorError::Serialization(err.to_string())
    }
}
