pub mod assist;
pub mod aws;
pub mod events;
pub mod mutation;
pub mod sentiment;
pub mod state;

// Re-export commonly used types for convenience
pub use assist::{AgentAssistDispatcher, WebhookAgentAssist};

pub use events::{
    CallLifecycleEvent, CanonicalTranscriptEvent, Channel, EventNormalizer, NormalizedEvent,
    NormalizerConfig, SentimentLabel, SentimentScores,
};

pub use mutation::{
    GraphQlGateway, GraphQlGatewayConfig, Mutation, MutationGateway, MutationKind, RetryPolicy,
    RetryingGateway, default_conflict_predicate,
};

pub use sentiment::{ComprehendScorer, SentimentConfig, SentimentEnricher, SentimentScorer};

pub use state::{
    AggregatorConfig, CallState, CallStateAggregator, CallStatus, DynamoDbStateBackend,
    MemoryStateBackend, PerCallState, StateBackend, StateStore, StateStoreConfig,
};
