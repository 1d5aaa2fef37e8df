use std::time::Duration;

use serde_json::Value;
use time::OffsetDateTime;
use tracing::{debug, warn};

use super::accumulator::PartialAccumulator;
use super::messages::{
    ContactCategories, ContactSegmentsEnvelope, ContactTranscript, ContactUtterance,
    CustomTranscriptEvent, LifecycleEnvelope, SourceEvent, TranscriptEnvelope, TranscriptResult,
    UtteranceEnvelope,
};
use super::types::{
    CallLifecycleEvent, CanonicalTranscriptEvent, Channel, IssueDetected, LifecycleAction,
    NormalizedEvent, SentimentLabel, TRANSCRIBING_STATUS,
};
use crate::errors::{ProcessorError, ProcessorResult};
use crate::utils::{epoch_seconds, format_timestamp, normalize_timestamp};

const SECONDS_PER_DAY: i64 = 86_400;

/// Normalizer settings.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizerConfig {
    /// Maximum number of segments held in the partial accumulator.
    pub partial_cache_capacity: u64,
    /// Idle time after which an unfinished partial is forgotten.
    pub partial_cache_ttl: Duration,
    /// Days until a persisted segment expires (`ExpiresAfter`).
    pub segment_expiration_days: u32,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            partial_cache_capacity: 10_000,
            partial_cache_ttl: Duration::from_secs(3600),
            segment_expiration_days: 90,
        }
    }
}

/// Per-record values shared by every event derived from one raw record.
struct Stamp {
    created_at: String,
    expires_after: i64,
}

/// Reduces every recognized source shape to canonical events.
#[derive(Debug, Clone)]
pub struct EventNormalizer {
    accumulator: PartialAccumulator,
    config: NormalizerConfig,
}

impl EventNormalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self {
            accumulator: PartialAccumulator::new(
                config.partial_cache_capacity,
                config.partial_cache_ttl,
            ),
            config,
        }
    }

    pub fn accumulator(&self) -> &PartialAccumulator {
        &self.accumulator
    }

    /// Normalize one raw decoded record.
    ///
    /// An unrecognized shape is logged and yields an empty list. A recognized
    /// shape missing `CallId` or `Transcript` fails with `MalformedEvent`.
    pub fn normalize(&self, raw: Value, now: OffsetDateTime) -> ProcessorResult<Vec<NormalizedEvent>> {
        let Some(source) = SourceEvent::classify(raw)? else {
            warn!("Dropping event with no recognized shape marker");
            return Ok(Vec::new());
        };
        debug!(shape = source.shape(), "Normalizing event");

        match source {
            SourceEvent::Utterance(envelope) => self.from_utterance(envelope, now),
            SourceEvent::Transcript(envelope) => self.from_transcript_event(envelope, now),
            SourceEvent::ContactSegments(envelope) => self.from_contact_segments(envelope, now),
            SourceEvent::Custom(event) => self.from_custom(event, now),
            SourceEvent::Lifecycle(envelope) => self.from_lifecycle(envelope, now),
        }
    }

    fn stamp(&self, created_at: Option<&str>, now: OffsetDateTime) -> Stamp {
        Stamp {
            created_at: created_at
                .map(normalize_timestamp)
                .unwrap_or_else(|| format_timestamp(now)),
            expires_after: epoch_seconds(now)
                + i64::from(self.config.segment_expiration_days) * SECONDS_PER_DAY,
        }
    }

    // =========================================================================
    // Utterance shape
    // =========================================================================

    fn from_utterance(
        &self,
        envelope: UtteranceEnvelope,
        now: OffsetDateTime,
    ) -> ProcessorResult<Vec<NormalizedEvent>> {
        let call_id = require_call_id(envelope.call_id)?;
        let stamp = self.stamp(envelope.created_at.as_deref(), now);
        let utterance = envelope.utterance_event;
        let transcript = require_transcript(utterance.transcript, &call_id)?;
        let segment_id = utterance.utterance_id.unwrap_or_else(new_segment_id);
        let is_partial = utterance.is_partial.unwrap_or(false);

        let Some(transcript) = self.track(&call_id, &segment_id, transcript, is_partial) else {
            return Ok(Vec::new());
        };

        let event = CanonicalTranscriptEvent {
            call_id,
            channel: Channel::from_participant_role(utterance.participant_role.as_deref()),
            segment_id,
            start_time: millis_to_seconds(utterance.begin_offset_millis),
            end_time: millis_to_seconds(utterance.end_offset_millis),
            transcript,
            is_partial,
            sentiment: utterance.sentiment.as_deref().and_then(SentimentLabel::parse),
            sentiment_score: None,
            sentiment_weighted: None,
            issues_detected: utterance.issues_detected,
            created_at: stamp.created_at,
            expires_after: stamp.expires_after,
            status: TRANSCRIBING_STATUS.to_string(),
        };
        Ok(with_issue_segments(event))
    }

    // =========================================================================
    // Standard transcript shape
    // =========================================================================

    fn from_transcript_event(
        &self,
        envelope: TranscriptEnvelope,
        now: OffsetDateTime,
    ) -> ProcessorResult<Vec<NormalizedEvent>> {
        let call_id = require_call_id(envelope.call_id)?;
        let stamp = self.stamp(envelope.created_at.as_deref(), now);

        let mut events = Vec::new();
        for result in envelope.transcript_event.results() {
            let Some(text) = result.best_transcript() else {
                return Err(ProcessorError::MalformedEvent(format!(
                    "transcript result without alternatives for call {call_id}"
                )));
            };
            let segment_id = result.result_id.clone().unwrap_or_else(new_segment_id);
            let is_partial = !result.is_final();
            let Some(transcript) = self.track(&call_id, &segment_id, text.to_string(), is_partial)
            else {
                continue;
            };

            events.push(NormalizedEvent::Transcript(CanonicalTranscriptEvent {
                call_id: call_id.clone(),
                channel: transcript_channel(envelope.channel.as_deref(), result),
                segment_id,
                start_time: result.start_time.unwrap_or(0.0),
                end_time: result.end_time.unwrap_or(0.0),
                transcript,
                is_partial,
                sentiment: None,
                sentiment_score: None,
                sentiment_weighted: None,
                issues_detected: None,
                created_at: stamp.created_at.clone(),
                expires_after: stamp.expires_after,
                status: TRANSCRIBING_STATUS.to_string(),
            }));
        }
        Ok(events)
    }

    // =========================================================================
    // Contact segment shape
    // =========================================================================

    fn from_contact_segments(
        &self,
        envelope: ContactSegmentsEnvelope,
        now: OffsetDateTime,
    ) -> ProcessorResult<Vec<NormalizedEvent>> {
        let call_id = require_call_id(envelope.contact_id)?;
        let stamp = self.stamp(envelope.created_at.as_deref(), now);

        let mut events = Vec::new();
        for segment in envelope.segments {
            if let Some(utterance) = segment.utterance {
                events.extend(self.contact_utterance(&call_id, &stamp, utterance));
            }
            if let Some(transcript) = segment.transcript {
                events.extend(self.contact_transcript(&call_id, &stamp, transcript)?);
            }
            if let Some(categories) = segment.categories {
                events.extend(contact_categories(&call_id, &stamp, categories));
            }
        }
        Ok(events)
    }

    fn contact_utterance(
        &self,
        call_id: &str,
        stamp: &Stamp,
        utterance: ContactUtterance,
    ) -> Option<NormalizedEvent> {
        let segment_id = utterance
            .transcript_id
            .or(utterance.id)
            .unwrap_or_else(new_segment_id);
        let delta = utterance.partial_content.unwrap_or_default();
        let Some(transcript) = self.accumulator.append(call_id, &segment_id, &delta) else {
            debug!(call_id, segment_id, "Dropping partial for finalized segment");
            return None;
        };

        Some(NormalizedEvent::Transcript(CanonicalTranscriptEvent {
            call_id: call_id.to_string(),
            channel: Channel::from_participant_role(utterance.participant_role.as_deref()),
            segment_id,
            start_time: millis_to_seconds(utterance.begin_offset_millis),
            end_time: millis_to_seconds(utterance.end_offset_millis),
            transcript,
            is_partial: true,
            sentiment: None,
            sentiment_score: None,
            sentiment_weighted: None,
            issues_detected: None,
            created_at: stamp.created_at.clone(),
            expires_after: stamp.expires_after,
            status: TRANSCRIBING_STATUS.to_string(),
        }))
    }

    fn contact_transcript(
        &self,
        call_id: &str,
        stamp: &Stamp,
        transcript: ContactTranscript,
    ) -> ProcessorResult<Vec<NormalizedEvent>> {
        let content = require_transcript(transcript.content, call_id)?;
        let segment_id = transcript.id.unwrap_or_else(new_segment_id);
        self.accumulator.finalize(call_id, &segment_id);

        let event = CanonicalTranscriptEvent {
            call_id: call_id.to_string(),
            channel: Channel::from_participant_role(transcript.participant_role.as_deref()),
            segment_id,
            start_time: millis_to_seconds(transcript.begin_offset_millis),
            end_time: millis_to_seconds(transcript.end_offset_millis),
            transcript: content,
            is_partial: false,
            sentiment: transcript.sentiment.as_deref().and_then(SentimentLabel::parse),
            sentiment_score: None,
            sentiment_weighted: None,
            issues_detected: transcript.issues_detected,
            created_at: stamp.created_at.clone(),
            expires_after: stamp.expires_after,
            status: TRANSCRIBING_STATUS.to_string(),
        };
        Ok(with_issue_segments(event))
    }

    // =========================================================================
    // Custom flat shape
    // =========================================================================

    fn from_custom(
        &self,
        event: CustomTranscriptEvent,
        now: OffsetDateTime,
    ) -> ProcessorResult<Vec<NormalizedEvent>> {
        let call_id = require_call_id(event.call_id)?;
        let stamp = self.stamp(event.created_at.as_deref(), now);
        let transcript = require_transcript(event.transcript, &call_id)?;
        let segment_id = event.segment_id.unwrap_or_else(new_segment_id);
        let is_partial = event.is_partial.unwrap_or(false);

        let Some(transcript) = self.track(&call_id, &segment_id, transcript, is_partial) else {
            return Ok(Vec::new());
        };

        let event = CanonicalTranscriptEvent {
            call_id,
            channel: Channel::from_label(event.channel.as_deref()),
            segment_id,
            start_time: event.start_time.unwrap_or(0.0),
            end_time: event.end_time.unwrap_or(0.0),
            transcript,
            is_partial,
            sentiment: event.sentiment.as_deref().and_then(SentimentLabel::parse),
            sentiment_score: None,
            sentiment_weighted: None,
            issues_detected: event.issues_detected,
            created_at: stamp.created_at,
            expires_after: stamp.expires_after,
            status: event
                .status
                .unwrap_or_else(|| TRANSCRIBING_STATUS.to_string()),
        };
        Ok(with_issue_segments(event))
    }

    // =========================================================================
    // Lifecycle events
    // =========================================================================

    fn from_lifecycle(
        &self,
        envelope: LifecycleEnvelope,
        now: OffsetDateTime,
    ) -> ProcessorResult<Vec<NormalizedEvent>> {
        let call_id = require_call_id(envelope.call_id)?;
        let stamp = self.stamp(envelope.created_at.as_deref(), now);

        let action = match envelope.event_type.as_str() {
            "START" => LifecycleAction::Start {
                customer_phone_number: envelope.customer_phone_number,
                system_phone_number: envelope.system_phone_number,
            },
            "END" => LifecycleAction::End,
            "UPDATE_STATUS" => LifecycleAction::UpdateStatus(require_field(
                envelope.status,
                "Status",
                &call_id,
            )?),
            "UPDATE_AGENT" => LifecycleAction::UpdateAgent(require_field(
                envelope.agent_id,
                "AgentId",
                &call_id,
            )?),
            "ADD_S3_RECORDING_URL" => LifecycleAction::UpdateRecordingUrl(require_field(
                envelope.recording_url,
                "RecordingUrl",
                &call_id,
            )?),
            other => {
                warn!(call_id, event_type = other, "Dropping unsupported lifecycle event");
                return Ok(Vec::new());
            }
        };

        Ok(vec![NormalizedEvent::Lifecycle(CallLifecycleEvent {
            call_id,
            action,
            created_at: stamp.created_at,
            expires_after: stamp.expires_after,
        })])
    }

    /// Run a full-text segment through the accumulator.
    ///
    /// Partials keep the longest text seen, finals clear the entry. Returns
    /// `None` for a partial that arrived after its final.
    fn track(
        &self,
        call_id: &str,
        segment_id: &str,
        transcript: String,
        is_partial: bool,
    ) -> Option<String> {
        if is_partial {
            let tracked = self.accumulator.replace(call_id, segment_id, &transcript);
            if tracked.is_none() {
                debug!(call_id, segment_id, "Dropping partial for finalized segment");
            }
            tracked
        } else {
            self.accumulator.finalize(call_id, segment_id);
            Some(transcript)
        }
    }
}

impl Default for EventNormalizer {
    fn default() -> Self {
        Self::new(NormalizerConfig::default())
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn require_call_id(call_id: Option<String>) -> ProcessorResult<String> {
    match call_id {
        Some(id) if !id.trim().is_empty() => Ok(id),
        _ => Err(ProcessorError::MalformedEvent(
            "event is missing CallId".to_string(),
        )),
    }
}

fn require_transcript(transcript: Option<String>, call_id: &str) -> ProcessorResult<String> {
    require_field(transcript, "Transcript", call_id)
}

fn require_field(value: Option<String>, field: &str, call_id: &str) -> ProcessorResult<String> {
    value.ok_or_else(|| {
        ProcessorError::MalformedEvent(format!("event for call {call_id} is missing {field}"))
    })
}

fn new_segment_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[inline]
fn millis_to_seconds(millis: Option<f64>) -> f64 {
    millis.unwrap_or(0.0) / 1000.0
}

/// `ch_0` is the caller leg of dual-channel audio.
fn transcript_channel(label: Option<&str>, result: &TranscriptResult) -> Channel {
    if label.is_some() {
        return Channel::from_label(label);
    }
    match result.channel_id.as_deref() {
        Some("ch_0") => Channel::Caller,
        _ => Channel::Agent,
    }
}

/// Emit `event` followed by one `AGENT_ASSISTANT` segment per valid issue span.
fn with_issue_segments(event: CanonicalTranscriptEvent) -> Vec<NormalizedEvent> {
    let issues = if event.is_partial {
        Vec::new()
    } else {
        issue_segments(&event, event.issues_detected.as_deref().unwrap_or(&[]))
    };
    let mut events = Vec::with_capacity(1 + issues.len());
    events.push(NormalizedEvent::Transcript(event));
    events.extend(issues.into_iter().map(NormalizedEvent::Transcript));
    events
}

fn issue_segments(
    event: &CanonicalTranscriptEvent,
    issues: &[IssueDetected],
) -> Vec<CanonicalTranscriptEvent> {
    let chars: Vec<char> = event.transcript.chars().collect();
    issues
        .iter()
        .enumerate()
        .filter_map(|(index, issue)| {
            let span = issue.character_offsets;
            if span.begin >= span.end || span.end > chars.len() {
                warn!(
                    call_id = %event.call_id,
                    segment_id = %event.segment_id,
                    begin = span.begin,
                    end = span.end,
                    "Skipping issue span outside transcript"
                );
                return None;
            }
            let text: String = chars[span.begin..span.end].iter().collect();
            Some(event.derive(
                Channel::AgentAssistant,
                format!("{}-issue-{index}", event.segment_id),
                text,
            ))
        })
        .collect()
}

fn contact_categories(
    call_id: &str,
    stamp: &Stamp,
    categories: ContactCategories,
) -> Vec<NormalizedEvent> {
    categories
        .matched_categories
        .iter()
        .map(|name| {
            let points = categories
                .matched_details
                .get(name)
                .map(|details| details.points_of_interest.as_slice())
                .unwrap_or(&[]);
            let begin = points
                .iter()
                .filter_map(|p| p.begin_offset_millis)
                .reduce(f64::min)
                .unwrap_or(0.0);
            let end = points
                .iter()
                .filter_map(|p| p.end_offset_millis)
                .reduce(f64::max)
                .unwrap_or(begin);

            NormalizedEvent::Transcript(CanonicalTranscriptEvent {
                call_id: call_id.to_string(),
                channel: Channel::CategoryMatch,
                segment_id: format!("category-{name}-{}", begin as i64),
                start_time: begin / 1000.0,
                end_time: end / 1000.0,
                transcript: name.clone(),
                is_partial: false,
                sentiment: None,
                sentiment_score: None,
                sentiment_weighted: None,
                issues_detected: None,
                created_at: stamp.created_at.clone(),
                expires_after: stamp.expires_after,
                status: TRANSCRIBING_STATUS.to_string(),
            })
        })
        .collect()
}
