use std::collections::BTreeSet;

use serde_json::Value;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use super::rollup::call_sentiment;
use super::types::{CallState, CallStatus, PerCallState, SentimentEntry};
use crate::core::mutation::{MutationResult, SegmentResult, StatusResult};
use crate::utils::{normalize_timestamp, timestamp_seconds_before};

/// Aggregator settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatorConfig {
    /// Calls not updated for this long are flagged at batch exit.
    pub max_inactivity_seconds: u64,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            max_inactivity_seconds: 1200,
        }
    }
}

/// Outcome of [`CallStateAggregator::finish_batch`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchExitReport {
    /// Calls whose duration or sentiment changed; their aggregates were recomputed.
    pub changed_calls: Vec<String>,
    /// Calls past the inactivity window. Flagged only, still in state.
    pub inactive_calls: Vec<String>,
    /// ENDED calls not touched this batch, removed from state.
    pub pruned_calls: Vec<String>,
}

/// Folds mutation results into [`CallState`].
///
/// Every merge rule is order independent: the status with the latest
/// `UpdatedAt` wins except that ENDED always wins, durations take the max, and
/// sentiment entries are replaced by segment id. Aggregates are recomputed once
/// per changed call in [`finish_batch`](Self::finish_batch).
#[derive(Debug, Clone)]
pub struct CallStateAggregator {
    state: CallState,
    changed: BTreeSet<String>,
    touched: BTreeSet<String>,
    config: AggregatorConfig,
}

impl CallStateAggregator {
    pub fn new(state: CallState, config: AggregatorConfig) -> Self {
        Self {
            state,
            changed: BTreeSet::new(),
            touched: BTreeSet::new(),
            config,
        }
    }

    pub fn state(&self) -> &CallState {
        &self.state
    }

    pub fn into_state(self) -> CallState {
        self.state
    }

    pub fn changed_calls(&self) -> impl Iterator<Item = &String> {
        self.changed.iter()
    }

    pub fn is_changed(&self, call_id: &str) -> bool {
        self.changed.contains(call_id)
    }

    /// Fold one raw mutation response.
    ///
    /// Responses that are neither segment nor status results, and responses
    /// that fail to parse, leave the state unchanged.
    pub fn update_state(&mut self, result: &Value) -> &CallState {
        match MutationResult::from_value(result) {
            Ok(parsed) => self.apply(parsed),
            Err(e) => warn!(error = %e, "Ignoring unparseable mutation result"),
        }
        &self.state
    }

    pub fn apply(&mut self, result: MutationResult) {
        match result {
            MutationResult::Segment(segment) => self.apply_segment(segment),
            MutationResult::Status(status) => self.apply_status(status),
            MutationResult::Other => {}
        }
    }

    fn apply_segment(&mut self, segment: SegmentResult) {
        let timestamp = segment
            .updated_at
            .as_deref()
            .or(segment.created_at.as_deref())
            .map(normalize_timestamp);

        let call_id = segment.call_id.clone();
        self.touched.insert(call_id.clone());
        let call = self.state.0.entry(call_id.clone()).or_default();
        merge_status(call, CallStatus::Transcribing, timestamp.as_deref());

        let mut changed = false;
        let end_millis = segment.end_time * 1000.0;
        if end_millis > call.total_conversation_duration_millis {
            call.total_conversation_duration_millis = end_millis;
            changed = true;
        }

        if let (false, Some(score)) = (segment.is_partial, segment.sentiment_weighted) {
            let entry = SentimentEntry {
                id: segment.segment_id,
                begin_offset_millis: segment.start_time * 1000.0,
                end_offset_millis: end_millis,
                sentiment: segment.sentiment.unwrap_or_default(),
                score,
            };
            changed |= call
                .state_per_channel
                .entry(segment.channel)
                .or_default()
                .upsert(entry);
        }

        if changed {
            self.changed.insert(call_id);
        }
    }

    fn apply_status(&mut self, result: StatusResult) {
        let Some(status) = result.status.as_deref().and_then(CallStatus::parse) else {
            debug!(call_id = %result.call_id, status = ?result.status, "Ignoring unknown call status");
            return;
        };
        let timestamp = result
            .updated_at
            .as_deref()
            .or(result.created_at.as_deref())
            .map(normalize_timestamp);

        self.touched.insert(result.call_id.clone());
        let call = self.state.0.entry(result.call_id).or_default();
        merge_status(call, status, timestamp.as_deref());
    }

    /// Recompute aggregates for changed calls, flag inactive calls and drop
    /// ENDED calls that were not touched in this batch.
    pub fn finish_batch(&mut self, now: OffsetDateTime) -> BatchExitReport {
        for call_id in &self.changed {
            if let Some(call) = self.state.0.get_mut(call_id) {
                call.sentiment = call_sentiment(&call.state_per_channel);
            }
        }

        let cutoff = timestamp_seconds_before(now, self.config.max_inactivity_seconds);
        let inactive_calls: Vec<String> = self
            .state
            .0
            .iter()
            .filter(|(_, call)| !call.status.is_terminal())
            .filter(|(_, call)| call.updated_at.as_deref().is_some_and(|at| at < cutoff.as_str()))
            .map(|(id, _)| id.clone())
            .collect();
        for call_id in &inactive_calls {
            warn!(call_id = %call_id, cutoff = %cutoff, "Call inactive past the inactivity window");
        }

        let pruned_calls: Vec<String> = self
            .state
            .0
            .iter()
            .filter(|(id, call)| call.status.is_terminal() && !self.touched.contains(*id))
            .map(|(id, _)| id.clone())
            .collect();
        for call_id in &pruned_calls {
            self.state.0.remove(call_id);
            info!(call_id = %call_id, "Pruned ended call from state");
        }

        BatchExitReport {
            changed_calls: self.changed.iter().cloned().collect(),
            inactive_calls,
            pruned_calls,
        }
    }
}

/// Merge a status observed at `at` into `call`.
///
/// ENDED is sticky. Otherwise the later timestamp wins, ties go to the higher
/// ranked status. `UpdatedAt` becomes the max and `CreatedAt` the min.
fn merge_status(call: &mut PerCallState, incoming: CallStatus, at: Option<&str>) {
    let current_at = call.updated_at.as_deref();
    call.status = if call.status.is_terminal() || incoming.is_terminal() {
        CallStatus::Ended
    } else {
        match at.cmp(&current_at) {
            std::cmp::Ordering::Greater => incoming,
            std::cmp::Ordering::Less => call.status,
            std::cmp::Ordering::Equal => {
                if incoming.rank() >= call.status.rank() {
                    incoming
                } else {
                    call.status
                }
            }
        }
    };

    if let Some(at) = at {
        if call.created_at.as_deref().is_none_or(|created| at < created) {
            call.created_at = Some(at.to_string());
        }
        if current_at.is_none_or(|current| at > current) {
            call.updated_at = Some(at.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::events::Channel;
    use serde_json::json;
    use time::macros::datetime;

    fn segment(call: &str, id: &str, channel: &str, start: f64, end: f64, score: Option<f64>, at: &str) -> Value {
        json!({"addTranscriptSegment": {
            "CallId": call,
            "Channel": channel,
            "SegmentId": id,
            "StartTime": start,
            "EndTime": end,
            "IsPartial": false,
            "Sentiment": score.map(|s| if s >= 0.0 { "POSITIVE" } else { "NEGATIVE" }),
            "SentimentWeighted": score,
            "CreatedAt": at,
            "UpdatedAt": at
        }})
    }

    fn status(call: &str, status: &str, at: &str) -> Value {
        json!({"updateCallStatus": {"CallId": call, "Status": status, "UpdatedAt": at}})
    }

    fn aggregator() -> CallStateAggregator {
        CallStateAggregator::new(CallState::new(), AggregatorConfig::default())
    }

    const T1: &str = "2024-05-01T12:00:00.000000Z";
    const T2: &str = "2024-05-01T12:00:05.000000Z";
    const T3: &str = "2024-05-01T12:00:10.000000Z";

    #[test]
    fn test_ended_wins_over_later_transcribing() {
        let mut agg = aggregator();
        agg.update_state(&status("c", "ENDED", T1));
        agg.update_state(&status("c", "TRANSCRIBING", T2));
        let call = agg.state().get("c").unwrap();
        assert_eq!(call.status, CallStatus::Ended);
        assert_eq!(call.updated_at.as_deref(), Some(T2));
    }

    #[test]
    fn test_later_status_wins_and_created_at_is_earliest() {
        let mut agg = aggregator();
        agg.update_state(&status("c", "ERRORED", T2));
        agg.update_state(&status("c", "STARTED", T1));
        let call = agg.state().get("c").unwrap();
        assert_eq!(call.status, CallStatus::Errored);
        assert_eq!(call.created_at.as_deref(), Some(T1));
        assert_eq!(call.updated_at.as_deref(), Some(T2));
    }

    #[test]
    fn test_segment_order_does_not_change_state() {
        let first = segment("c", "s1", "CALLER", 0.0, 1.0, Some(2.0), T1);
        let second = segment("c", "s2", "CALLER", 1.0, 2.0, Some(-3.0), T2);

        let mut forward = aggregator();
        forward.update_state(&first);
        forward.update_state(&second);
        let mut reverse = aggregator();
        reverse.update_state(&second);
        reverse.update_state(&first);

        let call = forward.state().get("c").unwrap();
        assert_eq!(call.created_at.as_deref(), Some(T1));
        assert_eq!(call.updated_at.as_deref(), Some(T2));
        assert_eq!(forward.state(), reverse.state());
    }

    #[test]
    fn test_segment_updates_duration_and_sentiment() {
        let mut agg = aggregator();
        agg.update_state(&segment("c", "s1", "CALLER", 0.0, 2.5, Some(4.5), T1));
        let call = agg.state().get("c").unwrap();
        assert_eq!(call.status, CallStatus::Transcribing);
        assert_eq!(call.total_conversation_duration_millis, 2500.0);
        assert_eq!(call.state_per_channel[&Channel::Caller].sentiment_list.len(), 1);
        assert!(agg.is_changed("c"));
    }

    #[test]
    fn test_segment_without_score_only_touches_duration() {
        let mut agg = aggregator();
        agg.update_state(&segment("c", "s1", "AGENT", 0.0, 1.0, None, T1));
        let call = agg.state().get("c").unwrap();
        assert!(call.state_per_channel.is_empty());
        assert_eq!(call.total_conversation_duration_millis, 1000.0);
    }

    #[test]
    fn test_replay_is_idempotent() {
        let mut agg = aggregator();
        let event = segment("c", "s1", "CALLER", 1.0, 2.0, Some(-3.0), T1);
        agg.update_state(&event);
        let once = agg.state().clone();
        agg.update_state(&event);
        assert_eq!(agg.state(), &once);
    }

    #[test]
    fn test_other_results_are_passthrough() {
        let mut agg = aggregator();
        agg.update_state(&json!({"updateAgent": {"CallId": "c", "AgentId": "a"}}));
        agg.update_state(&json!({"addTranscriptSegment": {"bogus": true}}));
        assert!(agg.state().is_empty());
    }

    #[test]
    fn test_finish_batch_recomputes_aggregates() {
        let mut agg = aggregator();
        agg.update_state(&segment("c", "s1", "CALLER", 0.0, 1.0, Some(2.0), T1));
        agg.update_state(&segment("c", "s2", "CALLER", 3.0, 4.0, Some(4.0), T2));
        let report = agg.finish_batch(datetime!(2024-05-01 12:01:00 UTC));
        assert_eq!(report.changed_calls, vec!["c".to_string()]);

        let call = agg.state().get("c").unwrap();
        assert_eq!(call.sentiment.overall_sentiment[&Channel::Caller], 3.0);
        let quarters = &call.sentiment.sentiment_by_period.quarter[&Channel::Caller];
        assert_eq!(quarters[0].score, 2.0);
        assert_eq!(quarters[3].score, 4.0);
    }

    #[test]
    fn test_untouched_ended_call_is_pruned() {
        let mut state = CallState::new();
        state.0.insert(
            "old".into(),
            PerCallState {
                status: CallStatus::Ended,
                updated_at: Some(T1.into()),
                ..Default::default()
            },
        );
        let mut agg = CallStateAggregator::new(state, AggregatorConfig::default());
        agg.update_state(&status("live", "ENDED", T3));

        let report = agg.finish_batch(datetime!(2024-05-01 12:01:00 UTC));
        assert_eq!(report.pruned_calls, vec!["old".to_string()]);
        assert!(agg.state().get("old").is_none());
        assert!(agg.state().get("live").is_some(), "touched ENDED call is kept");
    }

    #[test]
    fn test_inactive_call_is_flagged_not_deleted() {
        let mut state = CallState::new();
        state.0.insert(
            "idle".into(),
            PerCallState {
                status: CallStatus::Transcribing,
                updated_at: Some(T1.into()),
                ..Default::default()
            },
        );
        let mut agg = CallStateAggregator::new(state, AggregatorConfig::default());
        let report = agg.finish_batch(datetime!(2024-05-01 12:30:00 UTC));
        assert_eq!(report.inactive_calls, vec!["idle".to_string()]);
        assert!(agg.state().get("idle").is_some());
    }
}
