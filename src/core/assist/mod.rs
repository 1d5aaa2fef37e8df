//! Agent assist dispatch.
//!
//! Final caller segments are handed to an external assistant. Any text it
//! returns is written back as an `AGENT_ASSISTANT` segment that trails the
//! source segment.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::core::events::{CanonicalTranscriptEvent, Channel, DERIVED_SEGMENT_EPSILON_SECS};
use crate::errors::{ProcessorError, ProcessorResult};
use crate::utils::validate_endpoint_url;

/// External assistant invoked with a caller segment.
#[async_trait]
pub trait AgentAssistDispatcher: Send + Sync {
    /// Display text to add to the transcript, if the assistant has any.
    async fn dispatch(&self, event: &CanonicalTranscriptEvent) -> ProcessorResult<Option<String>>;
}

/// Whether `event` should be sent to the assistant.
pub fn should_dispatch(event: &CanonicalTranscriptEvent) -> bool {
    event.channel == Channel::Caller && !event.is_partial && !event.transcript.trim().is_empty()
}

/// Build the assistant segment answering `source`.
pub fn assist_segment(source: &CanonicalTranscriptEvent, text: String) -> CanonicalTranscriptEvent {
    let mut segment = source.derive(
        Channel::AgentAssistant,
        format!("{}-assist", source.segment_id),
        text,
    );
    segment.start_time = source.end_time;
    segment.end_time = source.end_time + DERIVED_SEGMENT_EPSILON_SECS;
    segment
}

// =============================================================================
// Webhook dispatcher
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct AssistRequest<'a> {
    call_id: &'a str,
    segment_id: &'a str,
    channel: Channel,
    transcript: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct AssistResponse {
    message: Option<String>,
}

/// POSTs caller segments to an HTTP endpoint and reads `{"Message": ".."}`.
#[derive(Debug, Clone)]
pub struct WebhookAgentAssist {
    client: Client,
    url: Url,
}

impl WebhookAgentAssist {
    pub fn new(url: &str, timeout: Duration) -> ProcessorResult<Self> {
        let url = validate_endpoint_url(url)
            .map_err(|e| ProcessorError::Configuration(format!("AGENT_ASSIST_URL: {e}")))?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                ProcessorError::Configuration(format!("Failed to build HTTP client: {e}"))
            })?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl AgentAssistDispatcher for WebhookAgentAssist {
    async fn dispatch(&self, event: &CanonicalTranscriptEvent) -> ProcessorResult<Option<String>> {
        let request = AssistRequest {
            call_id: &event.call_id,
            segment_id: &event.segment_id,
            channel: event.channel,
            transcript: &event.transcript,
        };

        let response = self
            .client
            .post(self.url.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| ProcessorError::AgentAssist(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProcessorError::AgentAssist(format!("HTTP {status}: {body}")));
        }

        let body: AssistResponse = response
            .json()
            .await
            .map_err(|e| ProcessorError::AgentAssist(format!("invalid response: {e}")))?;

        let message = body.message.filter(|m| !m.trim().is_empty());
        debug!(
            call_id = %event.call_id,
            segment_id = %event.segment_id,
            answered = message.is_some(),
            "Agent assist dispatched"
        );
        Ok(message)
    }
}
