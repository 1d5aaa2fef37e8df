//! Shared fixtures for integration tests.
//!
//! - `EchoGateway`: answers each mutation with its own input, like a GraphQL
//!   resolver that returns the stored item
//! - record builders for every source shape
//! - orchestrator wiring over `MemoryStateBackend`

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value, json};

use call_event_processor::{
    BatchInput, BatchOrchestrator, ProcessorResult,
    core::{
        events::{EventNormalizer, NormalizerConfig},
        mutation::{Mutation, MutationGateway},
        sentiment::{SentimentConfig, SentimentEnricher},
        state::{AggregatorConfig, MemoryStateBackend, StateStore, StateStoreConfig},
    },
    handlers::encode_record,
};

#[derive(Default)]
pub struct EchoGateway {
    pub executed: Mutex<Vec<Mutation>>,
}

impl EchoGateway {
    pub fn count(&self, field: &str) -> usize {
        self.executed
            .lock()
            .iter()
            .filter(|m| m.kind.field_name() == field)
            .count()
    }
}

#[async_trait]
impl MutationGateway for EchoGateway {
    async fn execute(&self, mutation: &Mutation) -> ProcessorResult<Value> {
        self.executed.lock().push(mutation.clone());
        let mut response = Map::new();
        response.insert(
            mutation.kind.field_name().to_string(),
            mutation.input().clone(),
        );
        Ok(Value::Object(response))
    }
}

pub struct Pipeline {
    pub orchestrator: BatchOrchestrator,
    pub gateway: Arc<EchoGateway>,
    pub backend: Arc<MemoryStateBackend>,
}

pub fn pipeline_with(store_config: StateStoreConfig) -> Pipeline {
    let gateway = Arc::new(EchoGateway::default());
    let backend = Arc::new(MemoryStateBackend::new());
    let orchestrator = BatchOrchestrator::new(
        EventNormalizer::new(NormalizerConfig::default()),
        SentimentEnricher::inline_only(SentimentConfig::default()),
        gateway.clone(),
        StateStore::new(backend.clone(), store_config),
        AggregatorConfig::default(),
    );
    Pipeline {
        orchestrator,
        gateway,
        backend,
    }
}

pub fn pipeline() -> Pipeline {
    pipeline_with(StateStoreConfig::default())
}

pub fn batch(payloads: &[Value]) -> BatchInput {
    BatchInput {
        records: payloads
            .iter()
            .enumerate()
            .map(|(i, p)| encode_record(p, &format!("4959{i:04}")))
            .collect(),
        ..Default::default()
    }
}

pub fn start(call_id: &str) -> Value {
    json!({
        "EventType": "START",
        "CallId": call_id,
        "CustomerPhoneNumber": "+15550100",
        "SystemPhoneNumber": "+15550199"
    })
}

pub fn end(call_id: &str) -> Value {
    json!({"EventType": "END", "CallId": call_id})
}

pub fn utterance(
    call_id: &str,
    id: &str,
    role: &str,
    begin_millis: u64,
    end_millis: u64,
    sentiment: &str,
) -> Value {
    json!({
        "CallId": call_id,
        "UtteranceEvent": {
            "UtteranceId": id,
            "ParticipantRole": role,
            "IsPartial": false,
            "BeginOffsetMillis": begin_millis,
            "EndOffsetMillis": end_millis,
            "Transcript": format!("segment {id}"),
            "Sentiment": sentiment
        }
    })
}

pub fn partial_utterance(call_id: &str, id: &str, text: &str) -> Value {
    json!({
        "CallId": call_id,
        "UtteranceEvent": {
            "UtteranceId": id,
            "ParticipantRole": "CUSTOMER",
            "IsPartial": true,
            "BeginOffsetMillis": 0,
            "EndOffsetMillis": 500,
            "Transcript": text
        }
    })
}
