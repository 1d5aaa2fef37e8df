//! Source message shapes accepted by the normalizer.
//!
//! Four transcript shapes arrive on the stream, plus call lifecycle events:
//!
//! | Shape | Marker field | Producer |
//! |-------|--------------|----------|
//! | Utterance | `UtteranceEvent` | Transcribe Call Analytics streaming |
//! | Transcript | `TranscriptEvent` | Transcribe standard streaming |
//! | Contact segments | `Segments` (+ `ContactId`) | Contact Lens real-time analytics |
//! | Custom | flat `SegmentId` / `Channel` / `Transcript` | any producer |
//! | Lifecycle | `EventType` (START, END, ...) | call control |
//!
//! [`SourceEvent::classify`] inspects the marker fields once and deserializes
//! the payload into the matching variant.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

use super::types::IssueDetected;
use crate::errors::{ProcessorError, ProcessorResult};

// =============================================================================
// Transcribe Call Analytics (utterance shape)
// =============================================================================

/// Per-utterance update from a call analytics stream.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UtteranceEvent {
    pub utterance_id: Option<String>,
    pub participant_role: Option<String>,
    pub is_partial: Option<bool>,
    pub begin_offset_millis: Option<f64>,
    pub end_offset_millis: Option<f64>,
    pub transcript: Option<String>,
    pub sentiment: Option<String>,
    pub issues_detected: Option<Vec<IssueDetected>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UtteranceEnvelope {
    pub call_id: Option<String>,
    pub created_at: Option<String>,
    pub utterance_event: UtteranceEvent,
}

// =============================================================================
// Transcribe standard streaming (transcript shape)
// =============================================================================

/// An alternative transcription.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Alternative {
    pub transcript: Option<String>,
}

/// A transcription result segment, partial or final.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TranscriptResult {
    pub result_id: Option<String>,
    /// Seconds from the start of the stream.
    pub start_time: Option<f64>,
    /// Seconds from the start of the stream.
    pub end_time: Option<f64>,
    pub is_partial: Option<bool>,
    pub alternatives: Option<Vec<Alternative>>,
    /// `ch_0` / `ch_1` for dual-channel audio.
    pub channel_id: Option<String>,
}

impl TranscriptResult {
    /// Transcript of the first (highest confidence) alternative.
    pub fn best_transcript(&self) -> Option<&str> {
        self.alternatives
            .as_ref()
            .and_then(|alts| alts.first())
            .and_then(|alt| alt.transcript.as_deref())
    }

    /// Partial unless the producer said otherwise.
    pub fn is_final(&self) -> bool {
        self.is_partial.map(|p| !p).unwrap_or(false)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Transcript {
    pub results: Option<Vec<TranscriptResult>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TranscriptEvent {
    pub transcript: Option<Transcript>,
}

impl TranscriptEvent {
    pub fn results(&self) -> &[TranscriptResult] {
        self.transcript
            .as_ref()
            .and_then(|t| t.results.as_deref())
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TranscriptEnvelope {
    pub call_id: Option<String>,
    pub created_at: Option<String>,
    /// Explicit channel label; overrides `ChannelId` mapping.
    pub channel: Option<String>,
    pub transcript_event: TranscriptEvent,
}

// =============================================================================
// Contact Lens real-time analytics (contact-segment shape)
// =============================================================================

/// Streaming word-level partial content for one transcript id.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContactUtterance {
    pub id: Option<String>,
    pub transcript_id: Option<String>,
    pub participant_role: Option<String>,
    pub partial_content: Option<String>,
    pub begin_offset_millis: Option<f64>,
    pub end_offset_millis: Option<f64>,
}

/// Final transcript for one transcript id.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContactTranscript {
    pub id: Option<String>,
    pub participant_role: Option<String>,
    pub content: Option<String>,
    pub begin_offset_millis: Option<f64>,
    pub end_offset_millis: Option<f64>,
    pub sentiment: Option<String>,
    pub issues_detected: Option<Vec<IssueDetected>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PointOfInterest {
    pub begin_offset_millis: Option<f64>,
    pub end_offset_millis: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct CategoryDetails {
    pub points_of_interest: Vec<PointOfInterest>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ContactCategories {
    pub matched_categories: Vec<String>,
    pub matched_details: HashMap<String, CategoryDetails>,
}

/// One entry of a contact segment batch. Exactly one field is expected to be set.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ContactSegment {
    pub utterance: Option<ContactUtterance>,
    pub transcript: Option<ContactTranscript>,
    pub categories: Option<ContactCategories>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContactSegmentsEnvelope {
    pub contact_id: Option<String>,
    pub created_at: Option<String>,
    #[serde(default)]
    pub segments: Vec<ContactSegment>,
}

// =============================================================================
// Custom flat shape
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CustomTranscriptEvent {
    pub call_id: Option<String>,
    pub channel: Option<String>,
    pub segment_id: Option<String>,
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
    pub transcript: Option<String>,
    pub is_partial: Option<bool>,
    pub sentiment: Option<String>,
    pub issues_detected: Option<Vec<IssueDetected>>,
    pub created_at: Option<String>,
    pub status: Option<String>,
}

// =============================================================================
// Lifecycle events
// =============================================================================

pub const LIFECYCLE_EVENT_TYPES: &[&str] = &[
    "START",
    "END",
    "UPDATE_STATUS",
    "UPDATE_AGENT",
    "ADD_S3_RECORDING_URL",
];

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LifecycleEnvelope {
    pub event_type: String,
    pub call_id: Option<String>,
    pub created_at: Option<String>,
    pub status: Option<String>,
    pub agent_id: Option<String>,
    pub recording_url: Option<String>,
    pub customer_phone_number: Option<String>,
    pub system_phone_number: Option<String>,
}

// =============================================================================
// Classification
// =============================================================================

/// A raw event classified by its marker fields.
#[derive(Debug, Clone)]
pub enum SourceEvent {
    Utterance(UtteranceEnvelope),
    Transcript(TranscriptEnvelope),
    ContactSegments(ContactSegmentsEnvelope),
    Custom(CustomTranscriptEvent),
    Lifecycle(LifecycleEnvelope),
}

fn decode<T: for<'de> Deserialize<'de>>(shape: &str, value: Value) -> ProcessorResult<T> {
    serde_json::from_value(value)
        .map_err(|e| ProcessorError::MalformedEvent(format!("invalid {shape} event: {e}")))
}

impl SourceEvent {
    /// Shape name used in logs.
    pub fn shape(&self) -> &'static str {
        match self {
            Self::Utterance(_) => "utterance",
            Self::Transcript(_) => "transcript",
            Self::ContactSegments(_) => "contact-segments",
            Self::Custom(_) => "custom",
            Self::Lifecycle(_) => "lifecycle",
        }
    }

    /// Decide which shape `value` is.
    ///
    /// Returns `Ok(None)` when no marker is present. Returns
    /// `MalformedEvent` when more than one transcript marker is present or the
    /// payload does not fit the shape its marker announces.
    pub fn classify(value: Value) -> ProcessorResult<Option<Self>> {
        let Some(object) = value.as_object() else {
            return Ok(None);
        };

        let has_utterance = object.contains_key("UtteranceEvent");
        let has_transcript_event = object.contains_key("TranscriptEvent");
        let has_segments = object.contains_key("Segments");
        let has_custom = object.contains_key("SegmentId")
            || object.contains_key("Channel") && !has_transcript_event
            || object.get("Transcript").is_some_and(Value::is_string);

        let markers = [has_utterance, has_transcript_event, has_segments, has_custom]
            .iter()
            .filter(|m| **m)
            .count();
        if markers > 1 {
            return Err(ProcessorError::MalformedEvent(
                "event carries more than one transcript shape marker".to_string(),
            ));
        }

        if has_utterance {
            return decode("utterance", value).map(|e| Some(Self::Utterance(e)));
        }
        if has_transcript_event {
            return decode("transcript", value).map(|e| Some(Self::Transcript(e)));
        }
        if has_segments {
            return decode("contact-segments", value).map(|e| Some(Self::ContactSegments(e)));
        }
        if has_custom {
            return decode("custom", value).map(|e| Some(Self::Custom(e)));
        }

        let is_lifecycle = object
            .get("EventType")
            .and_then(Value::as_str)
            .is_some_and(|t| LIFECYCLE_EVENT_TYPES.contains(&t));
        if is_lifecycle {
            return decode("lifecycle", value).map(|e| Some(Self::Lifecycle(e)));
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classify_utterance() {
        let value = json!({
            "CallId": "c1",
            "UtteranceEvent": {"UtteranceId": "u1", "ParticipantRole": "CUSTOMER", "Transcript": "hi"}
        });
        let event = SourceEvent::classify(value).unwrap().unwrap();
        assert_eq!(event.shape(), "utterance");
    }

    #[test]
    fn test_classify_transcript_event_with_channel() {
        let value = json!({
            "CallId": "c1",
            "Channel": "AGENT",
            "TranscriptEvent": {"Transcript": {"Results": []}}
        });
        let event = SourceEvent::classify(value).unwrap().unwrap();
        assert_eq!(event.shape(), "transcript");
    }

    #[test]
    fn test_classify_contact_segments() {
        let value = json!({"ContactId": "c1", "Segments": []});
        let event = SourceEvent::classify(value).unwrap().unwrap();
        assert_eq!(event.shape(), "contact-segments");
    }

    #[test]
    fn test_classify_custom() {
        let value = json!({"CallId": "c1", "SegmentId": "s1", "Transcript": "hello"});
        let event = SourceEvent::classify(value).unwrap().unwrap();
        assert_eq!(event.shape(), "custom");
    }

    #[test]
    fn test_classify_lifecycle() {
        let value = json!({"CallId": "c1", "EventType": "END"});
        let event = SourceEvent::classify(value).unwrap().unwrap();
        assert_eq!(event.shape(), "lifecycle");
    }

    #[test]
    fn test_classify_unknown_shape() {
        assert!(SourceEvent::classify(json!({"Foo": 1})).unwrap().is_none());
        assert!(SourceEvent::classify(json!([1, 2])).unwrap().is_none());
        assert!(
            SourceEvent::classify(json!({"CallId": "c", "EventType": "SOMETHING_ELSE"}))
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_classify_ambiguous_markers() {
        let value = json!({
            "CallId": "c1",
            "UtteranceEvent": {},
            "Segments": []
        });
        assert!(matches!(
            SourceEvent::classify(value),
            Err(ProcessorError::MalformedEvent(_))
        ));
    }

    #[test]
    fn test_classify_wrong_types_is_malformed() {
        let value = json!({"CallId": "c1", "UtteranceEvent": {"IsPartial": "maybe"}});
        assert!(matches!(
            SourceEvent::classify(value),
            Err(ProcessorError::MalformedEvent(_))
        ));
    }

    #[test]
    fn test_transcript_result_helpers() {
        let result: TranscriptResult = serde_json::from_value(json!({
            "ResultId": "r1",
            "IsPartial": false,
            "Alternatives": [{"Transcript": "Hello world"}, {"Transcript": "Hollow world"}]
        }))
        .unwrap();
        assert_eq!(result.best_transcript(), Some("Hello world"));
        assert!(result.is_final());
    }
}
