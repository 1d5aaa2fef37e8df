//! Mutation gateway contract.
//!
//! The call store is reached through GraphQL mutations. The processor only
//! needs "apply this mutation"; retries with jittered backoff and the
//! ignorable-conflict hook are layered on by [`RetryingGateway`].

mod documents;
mod graphql;
mod result;
mod retry;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::core::events::CanonicalTranscriptEvent;
use crate::core::state::PerCallState;
use crate::errors::ProcessorResult;

pub use documents::MutationKind;
pub use graphql::{GraphQlGateway, GraphQlGatewayConfig};
pub use result::{MutationResult, SegmentResult, StatusResult};
pub use retry::{IgnorePredicate, RetryPolicy, RetryingGateway, default_conflict_predicate};

/// Applies mutations to the external call store.
#[async_trait]
pub trait MutationGateway: Send + Sync {
    /// Execute `mutation` and return the response `data` object.
    async fn execute(&self, mutation: &Mutation) -> ProcessorResult<Value>;
}

#[async_trait]
impl<T: MutationGateway + ?Sized> MutationGateway for std::sync::Arc<T> {
    async fn execute(&self, mutation: &Mutation) -> ProcessorResult<Value> {
        (**self).execute(mutation).await
    }
}

/// A mutation document plus its `input` variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Mutation {
    pub kind: MutationKind,
    pub variables: Value,
}

impl Mutation {
    pub fn new(kind: MutationKind, input: Value) -> Self {
        Self {
            kind,
            variables: json!({ "input": input }),
        }
    }

    pub fn input(&self) -> &Value {
        &self.variables["input"]
    }

    /// `CallId` of the input, if present.
    pub fn call_id(&self) -> Option<&str> {
        self.input().get("CallId").and_then(Value::as_str)
    }

    pub fn create_call(
        call_id: &str,
        created_at: &str,
        expires_after: i64,
        customer_phone_number: Option<&str>,
        system_phone_number: Option<&str>,
    ) -> Self {
        Self::new(
            MutationKind::CreateCall,
            json!({
                "CallId": call_id,
                "CreatedAt": created_at,
                "ExpiresAfter": expires_after,
                "CustomerPhoneNumber": customer_phone_number,
                "SystemPhoneNumber": system_phone_number,
                "Status": "STARTED",
            }),
        )
    }

    pub fn update_call_status(call_id: &str, status: &str, updated_at: &str) -> Self {
        Self::new(
            MutationKind::UpdateCallStatus,
            json!({
                "CallId": call_id,
                "Status": status,
                "UpdatedAt": updated_at,
            }),
        )
    }

    pub fn add_transcript_segment(event: &CanonicalTranscriptEvent) -> ProcessorResult<Self> {
        Ok(Self::new(
            MutationKind::AddTranscriptSegment,
            serde_json::to_value(event)?,
        ))
    }

    pub fn add_call_category(event: &CanonicalTranscriptEvent) -> Self {
        Self::new(
            MutationKind::AddCallCategory,
            json!({
                "CallId": event.call_id,
                "CategoryName": event.transcript,
                "StartTime": event.start_time,
                "EndTime": event.end_time,
                "CreatedAt": event.created_at,
                "ExpiresAfter": event.expires_after,
            }),
        )
    }

    pub fn update_call_aggregation(call_id: &str, call: &PerCallState) -> ProcessorResult<Self> {
        Ok(Self::new(
            MutationKind::UpdateCallAggregation,
            json!({
                "CallId": call_id,
                "TotalConversationDurationMillis": call.total_conversation_duration_millis,
                "Sentiment": serde_json::to_value(&call.sentiment)?,
            }),
        ))
    }

    pub fn update_agent(call_id: &str, agent_id: &str) -> Self {
        Self::new(
            MutationKind::UpdateAgent,
            json!({ "CallId": call_id, "AgentId": agent_id }),
        )
    }

    pub fn update_recording_url(call_id: &str, recording_url: &str) -> Self {
        Self::new(
            MutationKind::UpdateRecordingUrl,
            json!({ "CallId": call_id, "RecordingUrl": recording_url }),
        )
    }
}
