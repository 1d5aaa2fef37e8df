//! Batch orchestration.
//!
//! One invocation handles one batch:
//!
//! 1. decode and normalize every record (failures are isolated per record),
//! 2. issue the resulting mutations concurrently and collect every outcome,
//! 3. fold successful results into call state inside one [`StateStore`] scope,
//!    flush aggregates of changed calls, and persist when the window closes.

use std::collections::BTreeSet;
use std::sync::Arc;

use futures::future::{BoxFuture, join_all};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use tracing::{debug, error, info, warn};

use super::records::decode_record;
use crate::core::assist::{AgentAssistDispatcher, assist_segment, should_dispatch};
use crate::core::events::{
    CallLifecycleEvent, CanonicalTranscriptEvent, Channel, EventNormalizer, LifecycleAction,
    NormalizedEvent,
};
use crate::core::mutation::{Mutation, MutationGateway};
use crate::core::sentiment::SentimentEnricher;
use crate::core::state::{
    AggregatorConfig, BatchExitReport, CallState, StateStore, WindowFlags,
};
use crate::errors::ProcessorResult;

const AGENT_ASSIST_OPERATION: &str = "agentAssist";
const NORMALIZE_OPERATION: &str = "normalize";

// =============================================================================
// Input / Output
// =============================================================================

/// One invocation's input.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchInput {
    #[serde(rename = "Records", default)]
    pub records: Vec<Value>,
    /// State carried over from the previous invocation of the window.
    #[serde(default)]
    pub state: Option<CallState>,
    #[serde(rename = "isFinalInvokeForWindow", default)]
    pub is_final_invoke_for_window: bool,
    #[serde(rename = "isWindowTerminatedEarly", default)]
    pub is_window_terminated_early: bool,
}

impl BatchInput {
    pub fn window_flags(&self) -> WindowFlags {
        WindowFlags {
            is_final_invoke_for_window: self.is_final_invoke_for_window,
            is_window_terminated_early: self.is_window_terminated_early,
        }
    }
}

/// A failed record, mutation or dispatch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchError {
    /// Identifier of the originating record, absent for aggregation flushes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_identifier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    pub operation: String,
    pub error_type: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchResults {
    pub successes: Vec<Value>,
    pub errors: Vec<BatchError>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchItemFailure {
    #[serde(rename = "itemIdentifier")]
    pub item_identifier: String,
}

/// One invocation's output.
#[derive(Debug, Clone, Serialize)]
pub struct BatchOutput {
    pub results: BatchResults,
    /// Full state, to be handed back as the next invocation's `state`.
    pub state: CallState,
    #[serde(rename = "batchItemFailures")]
    pub batch_item_failures: Vec<BatchItemFailure>,
    /// Restore or persist failed; `state` may be stale.
    #[serde(rename = "stateError")]
    pub state_error: bool,
    #[serde(skip)]
    pub report: BatchExitReport,
}

// =============================================================================
// Orchestrator
// =============================================================================

/// Outcome of one concurrent task step.
struct Outcome {
    item_identifier: Option<String>,
    call_id: String,
    operation: &'static str,
    result: ProcessorResult<Value>,
    /// Whether a failure should make the source record retryable.
    fails_record: bool,
}

/// Drives one batch from raw records to persisted call state.
pub struct BatchOrchestrator {
    normalizer: EventNormalizer,
    enricher: SentimentEnricher,
    gateway: Arc<dyn MutationGateway>,
    assist: Option<Arc<dyn AgentAssistDispatcher>>,
    store: StateStore,
    aggregator_config: AggregatorConfig,
}

impl BatchOrchestrator {
    pub fn new(
        normalizer: EventNormalizer,
        enricher: SentimentEnricher,
        gateway: Arc<dyn MutationGateway>,
        store: StateStore,
        aggregator_config: AggregatorConfig,
    ) -> Self {
        Self {
            normalizer,
            enricher,
            gateway,
            assist: None,
            store,
            aggregator_config,
        }
    }

    pub fn with_agent_assist(mut self, dispatcher: Arc<dyn AgentAssistDispatcher>) -> Self {
        self.assist = Some(dispatcher);
        self
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub async fn handle_batch(&self, input: BatchInput) -> BatchOutput {
        self.handle_batch_at(input, OffsetDateTime::now_utc()).await
    }

    /// Handle a batch as of `now`.
    pub async fn handle_batch_at(&self, input: BatchInput, now: OffsetDateTime) -> BatchOutput {
        let flags = input.window_flags();
        let carried = input.state.filter(|state| !state.is_empty());
        let record_count = input.records.len();

        let mut errors = Vec::new();
        let mut failed_items = BTreeSet::new();
        let mut tasks: Vec<BoxFuture<'_, Vec<Outcome>>> = Vec::new();

        for (index, raw) in input.records.iter().enumerate() {
            let decoded = decode_record(raw, index);
            let item = decoded.item_identifier;
            let events = decoded
                .payload
                .and_then(|payload| self.normalizer.normalize(payload, now));

            match events {
                Ok(events) => {
                    for event in events {
                        self.schedule(&mut tasks, &item, event);
                    }
                }
                Err(e) => {
                    warn!(item = %item, error = %e, "Dropping record");
                    errors.push(BatchError {
                        item_identifier: Some(item.clone()),
                        call_id: None,
                        operation: NORMALIZE_OPERATION.to_string(),
                        error_type: e.kind().to_string(),
                        message: e.to_string(),
                    });
                    failed_items.insert(item);
                }
            }
        }

        debug!(records = record_count, tasks = tasks.len(), "Dispatching mutations");
        let outcomes: Vec<Outcome> = join_all(tasks).await.into_iter().flatten().collect();

        let mut successes = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            let Outcome {
                item_identifier,
                call_id,
                operation,
                result,
                fails_record,
            } = outcome;
            match result {
                Ok(value) => successes.push(value),
                Err(e) => {
                    warn!(call_id = %call_id, operation, error = %e, "Mutation failed");
                    if fails_record && let Some(item) = &item_identifier {
                        failed_items.insert(item.clone());
                    }
                    errors.push(BatchError {
                        item_identifier,
                        call_id: Some(call_id),
                        operation: operation.to_string(),
                        error_type: e.kind().to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }

        let gateway = self.gateway.clone();
        let folded = &successes;
        let scope = self
            .store
            .with_state(
                carried,
                flags,
                now,
                self.aggregator_config.clone(),
                |mut aggregator| async move {
                    for result in folded {
                        aggregator.update_state(result);
                    }
                    let report = aggregator.finish_batch(now);

                    let mut flushes = Vec::with_capacity(report.changed_calls.len());
                    let mut flush_errors = Vec::new();
                    for call_id in &report.changed_calls {
                        let Some(call) = aggregator.state().get(call_id) else {
                            continue;
                        };
                        match Mutation::update_call_aggregation(call_id, call) {
                            Ok(mutation) => flushes.push(mutation),
                            Err(e) => flush_errors.push((call_id.clone(), e)),
                        }
                    }

                    let results = join_all(flushes.iter().map(|m| gateway.execute(m))).await;
                    let flushed: Vec<(String, ProcessorResult<Value>)> = flushes
                        .iter()
                        .map(|m| m.call_id().unwrap_or_default().to_string())
                        .zip(results)
                        .chain(flush_errors.into_iter().map(|(id, e)| (id, Err(e))))
                        .collect();

                    (aggregator, Ok((report, flushed)))
                },
            )
            .await;

        let report = match scope.result {
            Ok((report, flushed)) => {
                for (call_id, result) in flushed {
                    match result {
                        Ok(value) => successes.push(value),
                        Err(e) => {
                            warn!(call_id = %call_id, error = %e, "Aggregation flush failed");
                            errors.push(BatchError {
                                item_identifier: None,
                                call_id: Some(call_id),
                                operation: "updateCallAggregation".to_string(),
                                error_type: e.kind().to_string(),
                                message: e.to_string(),
                            });
                        }
                    }
                }
                report
            }
            Err(e) => {
                error!(error = %e, "State fold failed");
                BatchExitReport::default()
            }
        };

        info!(
            records = record_count,
            successes = successes.len(),
            errors = errors.len(),
            failed_records = failed_items.len(),
            changed_calls = report.changed_calls.len(),
            pruned_calls = report.pruned_calls.len(),
            persisted = scope.persisted,
            state_error = scope.state_error,
            "Batch processed"
        );

        BatchOutput {
            results: BatchResults { successes, errors },
            state: scope.state,
            batch_item_failures: failed_items
                .into_iter()
                .map(|item_identifier| BatchItemFailure { item_identifier })
                .collect(),
            state_error: scope.state_error,
            report,
        }
    }

    fn schedule<'a>(
        &'a self,
        tasks: &mut Vec<BoxFuture<'a, Vec<Outcome>>>,
        item: &str,
        event: NormalizedEvent,
    ) {
        match event {
            NormalizedEvent::Transcript(event) => {
                if event.channel == Channel::CategoryMatch {
                    tasks.push(Box::pin(self.add_category(item.to_string(), event.clone())));
                }
                if let Some(assist) = self.assist.clone()
                    && should_dispatch(&event)
                {
                    tasks.push(Box::pin(self.agent_assist(
                        assist,
                        item.to_string(),
                        event.clone(),
                    )));
                }
                tasks.push(Box::pin(self.add_segment(item.to_string(), event)));
            }
            NormalizedEvent::Lifecycle(event) => {
                tasks.push(Box::pin(self.lifecycle(item.to_string(), event)));
            }
        }
    }

    async fn execute(
        &self,
        item: Option<String>,
        call_id: &str,
        mutation: ProcessorResult<Mutation>,
    ) -> Outcome {
        let (operation, result) = match mutation {
            Ok(mutation) => (
                mutation.kind.field_name(),
                self.gateway.execute(&mutation).await,
            ),
            Err(e) => ("serialize", Err(e)),
        };
        Outcome {
            item_identifier: item,
            call_id: call_id.to_string(),
            operation,
            result,
            fails_record: true,
        }
    }

    /// Persist the segment, then again with sentiment once it is scored.
    async fn add_segment(&self, item: String, mut event: CanonicalTranscriptEvent) -> Vec<Outcome> {
        let needs_scoring = self.enricher.needs_scoring(&event);
        self.enricher.apply_inline(&mut event);

        let call_id = event.call_id.clone();
        let mut outcomes = vec![
            self.execute(
                Some(item.clone()),
                &call_id,
                Mutation::add_transcript_segment(&event),
            )
            .await,
        ];

        if needs_scoring && outcomes[0].result.is_ok() {
            let enriched = self.enricher.enrich(event).await;
            if enriched.sentiment.is_some() {
                outcomes.push(
                    self.execute(
                        Some(item),
                        &call_id,
                        Mutation::add_transcript_segment(&enriched),
                    )
                    .await,
                );
            }
        }
        outcomes
    }

    async fn add_category(&self, item: String, event: CanonicalTranscriptEvent) -> Vec<Outcome> {
        vec![
            self.execute(
                Some(item),
                &event.call_id,
                Ok(Mutation::add_call_category(&event)),
            )
            .await,
        ]
    }

    async fn agent_assist(
        &self,
        assist: Arc<dyn AgentAssistDispatcher>,
        item: String,
        event: CanonicalTranscriptEvent,
    ) -> Vec<Outcome> {
        match assist.dispatch(&event).await {
            Ok(Some(text)) => {
                let segment = assist_segment(&event, text);
                vec![
                    self.execute(
                        Some(item),
                        &event.call_id,
                        Mutation::add_transcript_segment(&segment),
                    )
                    .await,
                ]
            }
            Ok(None) => Vec::new(),
            Err(e) => vec![Outcome {
                item_identifier: Some(item),
                call_id: event.call_id,
                operation: AGENT_ASSIST_OPERATION,
                result: Err(e),
                fails_record: false,
            }],
        }
    }

    async fn lifecycle(&self, item: String, event: CallLifecycleEvent) -> Vec<Outcome> {
        let call_id = event.call_id.as_str();
        let mutation = match &event.action {
            LifecycleAction::Start {
                customer_phone_number,
                system_phone_number,
            } => Mutation::create_call(
                call_id,
                &event.created_at,
                event.expires_after,
                customer_phone_number.as_deref(),
                system_phone_number.as_deref(),
            ),
            LifecycleAction::End => Mutation::update_call_status(call_id, "ENDED", &event.created_at),
            LifecycleAction::UpdateStatus(status) => {
                Mutation::update_call_status(call_id, status, &event.created_at)
            }
            LifecycleAction::UpdateAgent(agent_id) => Mutation::update_agent(call_id, agent_id),
            LifecycleAction::UpdateRecordingUrl(url) => {
                Mutation::update_recording_url(call_id, url)
            }
        };
        vec![self.execute(Some(item), call_id, Ok(mutation)).await]
    }
}
