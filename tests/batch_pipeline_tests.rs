//! End-to-end batch tests
//!
//! Drive `BatchOrchestrator` from encoded stream records to call state using
//! an echoing mutation gateway and the in-memory state backend.

mod common;

use std::sync::Arc;

use serde_json::json;
use time::OffsetDateTime;
use time::macros::datetime;

use call_event_processor::{
    BatchOrchestrator,
    core::{
        events::{Channel, EventNormalizer, NormalizerConfig},
        sentiment::{SentimentConfig, SentimentEnricher},
        state::{
            AggregatorConfig, CallStatus, StateBackend, StatePayload, StateRow, StateStore,
            StateStoreConfig,
        },
    },
};
use common::{batch, end, partial_utterance, pipeline, pipeline_with, start, utterance};

const NOW: OffsetDateTime = datetime!(2024-05-01 12:00:00 UTC);

fn call_events() -> Vec<serde_json::Value> {
    vec![
        start("call-1"),
        utterance("call-1", "u-1", "CUSTOMER", 0, 1000, "NEGATIVE"),
        utterance("call-1", "u-2", "AGENT", 1000, 2500, "POSITIVE"),
        utterance("call-1", "u-3", "CUSTOMER", 2500, 3000, "NEUTRAL"),
        utterance("call-1", "u-4", "CUSTOMER", 3000, 4000, "POSITIVE"),
    ]
}

#[tokio::test]
async fn test_state_is_order_independent() {
    let events = call_events();
    let mut reversed = events.clone();
    reversed.reverse();
    let interleaved = vec![
        events[3].clone(),
        events[0].clone(),
        events[4].clone(),
        events[2].clone(),
        events[1].clone(),
    ];

    let mut states = Vec::new();
    for order in [events, reversed, interleaved] {
        let p = pipeline();
        let output = p.orchestrator.handle_batch_at(batch(&order), NOW).await;
        assert!(output.batch_item_failures.is_empty());
        states.push(output.state);
    }

    assert_eq!(states[0], states[1]);
    assert_eq!(states[0], states[2]);

    let call = states[0].get("call-1").unwrap();
    assert_eq!(call.status, CallStatus::Transcribing);
    assert_eq!(call.total_conversation_duration_millis, 4000.0);
    // NEUTRAL carries no weighted score
    assert_eq!(call.state_per_channel[&Channel::Caller].sentiment_list.len(), 2);
    assert_eq!(call.sentiment.overall_sentiment[&Channel::Agent], 5.0);
}

#[tokio::test]
async fn test_state_is_order_independent_with_distinct_created_at() {
    let stamped = |mut event: serde_json::Value, at: &str| {
        event["CreatedAt"] = json!(at);
        event
    };
    let events = vec![
        stamped(
            utterance("call-1", "u-1", "CUSTOMER", 0, 1000, "NEGATIVE"),
            "2024-05-01T11:58:00.000000Z",
        ),
        stamped(
            utterance("call-1", "u-2", "AGENT", 1000, 2500, "POSITIVE"),
            "2024-05-01T11:58:05.000000Z",
        ),
        stamped(
            utterance("call-1", "u-4", "CUSTOMER", 3000, 4000, "POSITIVE"),
            "2024-05-01T11:58:10.000000Z",
        ),
    ];
    let mut reversed = events.clone();
    reversed.reverse();

    let mut states = Vec::new();
    for order in [events, reversed] {
        let p = pipeline();
        let output = p.orchestrator.handle_batch_at(batch(&order), NOW).await;
        assert!(output.batch_item_failures.is_empty());
        states.push(output.state);
    }

    assert_eq!(states[0], states[1]);
    let call = states[0].get("call-1").unwrap();
    assert_eq!(call.created_at.as_deref(), Some("2024-05-01T11:58:00.000000Z"));
    assert_eq!(call.updated_at.as_deref(), Some("2024-05-01T11:58:10.000000Z"));
}

#[tokio::test]
async fn test_replayed_batch_is_idempotent() {
    let p = pipeline();
    let first = p
        .orchestrator
        .handle_batch_at(batch(&call_events()), NOW)
        .await;

    let mut replay = batch(&call_events());
    replay.state = Some(first.state.clone());
    let second = p.orchestrator.handle_batch_at(replay, NOW).await;

    assert_eq!(first.state, second.state);
    assert!(second.report.changed_calls.is_empty());
    assert_eq!(p.gateway.count("updateCallAggregation"), 1);
}

#[tokio::test]
async fn test_partials_converge_on_final_transcript() {
    let p = pipeline();
    p.orchestrator
        .handle_batch_at(batch(&[partial_utterance("call-1", "u-1", "Hello")]), NOW)
        .await;
    p.orchestrator
        .handle_batch_at(
            batch(&[partial_utterance("call-1", "u-1", "Hello there")]),
            NOW,
        )
        .await;

    let final_event = json!({
        "CallId": "call-1",
        "UtteranceEvent": {
            "UtteranceId": "u-1",
            "ParticipantRole": "CUSTOMER",
            "IsPartial": false,
            "BeginOffsetMillis": 0,
            "EndOffsetMillis": 2000,
            "Transcript": "Hello there, how are you?"
        }
    });
    p.orchestrator
        .handle_batch_at(batch(&[final_event]), NOW)
        .await;
    let late = p
        .orchestrator
        .handle_batch_at(batch(&[partial_utterance("call-1", "u-1", "Hello")]), NOW)
        .await;
    assert!(late.batch_item_failures.is_empty());

    let executed = p.gateway.executed.lock().clone();
    let segments: Vec<_> = executed
        .iter()
        .filter(|m| m.kind.field_name() == "addTranscriptSegment")
        .collect();
    assert_eq!(segments.len(), 3, "the late partial is not written");
    let last = segments.last().unwrap().input();
    assert_eq!(last["Transcript"], "Hello there, how are you?");
    assert_eq!(last["IsPartial"], false);
}

#[tokio::test]
async fn test_mixed_shapes_in_one_batch() {
    let p = pipeline();
    let records = [
        json!({
            "CallId": "call-2",
            "TranscriptEvent": {"Transcript": {"Results": [{
                "ResultId": "r-1",
                "StartTime": 0.0,
                "EndTime": 1.5,
                "IsPartial": false,
                "ChannelId": "ch_0",
                "Alternatives": [{"Transcript": "my bill is wrong"}]
            }]}}
        }),
        json!({
            "ContactId": "call-2",
            "Segments": [{"Categories": {
                "MatchedCategories": ["billing"],
                "MatchedDetails": {"billing": {"PointsOfInterest": [
                    {"BeginOffsetMillis": 0, "EndOffsetMillis": 1500}
                ]}}
            }}]
        }),
        json!({
            "CallId": "call-2",
            "Channel": "AGENT_ASSISTANT",
            "SegmentId": "assist-1",
            "StartTime": 1.5,
            "EndTime": 1.6,
            "Transcript": "Check the latest invoice",
            "IsPartial": false
        }),
        json!({"EventType": "UPDATE_AGENT", "CallId": "call-2", "AgentId": "agent-7"}),
        json!({"Unrelated": true}),
    ];

    let output = p.orchestrator.handle_batch_at(batch(&records), NOW).await;

    assert!(output.batch_item_failures.is_empty());
    assert_eq!(p.gateway.count("addCallCategory"), 1);
    assert_eq!(p.gateway.count("updateAgent"), 1);
    assert_eq!(p.gateway.count("addTranscriptSegment"), 3);

    let call = output.state.get("call-2").unwrap();
    assert_eq!(call.total_conversation_duration_millis, 1600.0);
}

#[tokio::test]
async fn test_malformed_record_reported_for_retry() {
    let p = pipeline();
    let records = [
        utterance("call-1", "u-1", "CUSTOMER", 0, 1000, "NEUTRAL"),
        json!({"EventType": "UPDATE_STATUS", "CallId": "call-1"}),
    ];

    let output = p.orchestrator.handle_batch_at(batch(&records), NOW).await;

    assert_eq!(output.batch_item_failures.len(), 1);
    assert_eq!(output.batch_item_failures[0].item_identifier, "49590001");
    assert_eq!(output.results.errors[0].error_type, "MalformedEventError");
    assert!(output.state.get("call-1").is_some());
}

#[tokio::test]
async fn test_window_state_survives_new_process() {
    let store_config = StateStoreConfig {
        compression_threshold_bytes: 1,
        ..Default::default()
    };
    let p = pipeline_with(store_config.clone());

    let mut first = batch(&[
        start("call-1"),
        utterance("call-1", "u-1", "CUSTOMER", 0, 1000, "POSITIVE"),
    ]);
    first.is_final_invoke_for_window = true;
    let output = p.orchestrator.handle_batch_at(first, NOW).await;
    assert!(!output.state_error);

    let rows = p.backend.rows();
    assert_eq!(rows.len(), 1);
    assert!(matches!(rows[0].payload, StatePayload::Compressed(_)));

    // A fresh orchestrator over the same table restores the snapshot
    let restarted = BatchOrchestrator::new(
        EventNormalizer::new(NormalizerConfig::default()),
        SentimentEnricher::inline_only(SentimentConfig::default()),
        p.gateway.clone(),
        StateStore::new(p.backend.clone(), store_config),
        AggregatorConfig::default(),
    );
    let later = NOW + time::Duration::seconds(60);
    let output = restarted
        .handle_batch_at(batch(&[end("call-1")]), later)
        .await;

    let call = output.state.get("call-1").unwrap();
    assert_eq!(call.status, CallStatus::Ended);
    assert_eq!(call.state_per_channel[&Channel::Caller].sentiment_list.len(), 1);
    assert!(!output.state_error);
}

#[tokio::test]
async fn test_corrupt_snapshot_sets_state_error() {
    let p = pipeline();
    p.backend
        .put(StateRow {
            partition_key: "CallEventProcessorState".to_string(),
            sort_key: "2024-05-01T11:59:00.000000Z".to_string(),
            payload: StatePayload::Json("{broken".to_string()),
            expires_after: 0,
        })
        .await
        .unwrap();

    let output = p
        .orchestrator
        .handle_batch_at(batch(&[start("call-9")]), NOW)
        .await;

    assert!(output.state_error);
    assert!(output.state.get("call-9").is_some());
}

#[tokio::test]
async fn test_agent_assist_segment_written() {
    use async_trait::async_trait;
    use call_event_processor::ProcessorResult;
    use call_event_processor::core::assist::AgentAssistDispatcher;
    use call_event_processor::core::events::CanonicalTranscriptEvent;

    struct Canned;

    #[async_trait]
    impl AgentAssistDispatcher for Canned {
        async fn dispatch(
            &self,
            _event: &CanonicalTranscriptEvent,
        ) -> ProcessorResult<Option<String>> {
            Ok(Some("Offer a refund".to_string()))
        }
    }

    let p = pipeline();
    let gateway = p.gateway.clone();
    let orchestrator = p.orchestrator.with_agent_assist(Arc::new(Canned));
    orchestrator
        .handle_batch_at(
            batch(&[utterance("call-1", "u-1", "CUSTOMER", 0, 1000, "NEGATIVE")]),
            NOW,
        )
        .await;

    let executed = gateway.executed.lock().clone();
    let assist = executed
        .iter()
        .find(|m| m.input()["Channel"] == "AGENT_ASSISTANT")
        .expect("assist segment");
    assert_eq!(assist.input()["Transcript"], "Offer a refund");
    assert_eq!(assist.input()["SegmentId"], "u-1-assist");
}
