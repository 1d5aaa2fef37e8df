//! Canonical event types produced by the normalizer.
//!
//! Every source shape is reduced to either a [`CanonicalTranscriptEvent`]
//! (one transcript segment on one channel) or a [`CallLifecycleEvent`]
//! (call start/end/status/metadata change).

use serde::{Deserialize, Serialize};

// =============================================================================
// Channel
// =============================================================================

/// Logical channel a transcript segment belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Channel {
    /// Contact center agent
    Agent,
    /// Customer / caller
    Caller,
    /// Derived assistant output (issues, agent assist answers)
    AgentAssistant,
    /// Matched call categories
    CategoryMatch,
}

impl Channel {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Agent => "AGENT",
            Self::Caller => "CALLER",
            Self::AgentAssistant => "AGENT_ASSISTANT",
            Self::CategoryMatch => "CATEGORY_MATCH",
        }
    }

    /// Map a source participant role onto a channel.
    ///
    /// `CUSTOMER` becomes `CALLER`; everything else is treated as the agent.
    pub fn from_participant_role(role: Option<&str>) -> Self {
        match role.map(|r| r.trim().to_ascii_uppercase()) {
            Some(r) if r == "CUSTOMER" || r == "CALLER" => Self::Caller,
            _ => Self::Agent,
        }
    }

    /// Parse an explicit channel label, falling back to participant-role rules.
    pub fn from_label(label: Option<&str>) -> Self {
        match label.map(|l| l.trim().to_ascii_uppercase()).as_deref() {
            Some("AGENT_ASSISTANT") => Self::AgentAssistant,
            Some("CATEGORY_MATCH") => Self::CategoryMatch,
            other => Self::from_participant_role(other),
        }
    }

    /// Whether segments on this channel are spoken by a call participant.
    #[inline]
    pub fn is_participant(&self) -> bool {
        matches!(self, Self::Agent | Self::Caller)
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Sentiment
// =============================================================================

/// Categorical sentiment label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
    Mixed,
}

impl SentimentLabel {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "POSITIVE",
            Self::Negative => "NEGATIVE",
            Self::Neutral => "NEUTRAL",
            Self::Mixed => "MIXED",
        }
    }

    /// Case-insensitive parse. Unknown labels yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "POSITIVE" => Some(Self::Positive),
            "NEGATIVE" => Some(Self::Negative),
            "NEUTRAL" => Some(Self::Neutral),
            "MIXED" => Some(Self::Mixed),
            _ => None,
        }
    }
}

/// Raw per-label confidence scores reported by a sentiment scorer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SentimentScores {
    pub positive: f64,
    pub negative: f64,
    pub neutral: f64,
    pub mixed: f64,
}

impl SentimentScores {
    /// Scores for a label reported without confidences: full weight on the label.
    pub fn certain(label: SentimentLabel) -> Self {
        let mut scores = Self::default();
        match label {
            SentimentLabel::Positive => scores.positive = 1.0,
            SentimentLabel::Negative => scores.negative = 1.0,
            SentimentLabel::Neutral => scores.neutral = 1.0,
            SentimentLabel::Mixed => scores.mixed = 1.0,
        }
        scores
    }
}

// =============================================================================
// Issues
// =============================================================================

/// Character offsets into a segment's transcript text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CharacterOffsets {
    pub begin: usize,
    pub end: usize,
}

/// A detected issue span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct IssueDetected {
    pub character_offsets: CharacterOffsets,
}

// =============================================================================
// Canonical Transcript Event
// =============================================================================

/// Default status label carried by transcript segments.
pub const TRANSCRIBING_STATUS: &str = "TRANSCRIBING";

/// Seconds added to derived segments so they sort after their source segment.
pub const DERIVED_SEGMENT_EPSILON_SECS: f64 = 0.001;

/// The normalized, shape-independent transcript segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CanonicalTranscriptEvent {
    pub call_id: String,
    pub channel: Channel,
    pub segment_id: String,
    /// Seconds from the start of the call.
    pub start_time: f64,
    /// Seconds from the start of the call.
    pub end_time: f64,
    pub transcript: String,
    pub is_partial: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<SentimentLabel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment_score: Option<SentimentScores>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment_weighted: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issues_detected: Option<Vec<IssueDetected>>,
    pub created_at: String,
    pub expires_after: i64,
    pub status: String,
}

impl CanonicalTranscriptEvent {
    /// Build a derived segment on another channel that trails `self` by the epsilon.
    pub fn derive(&self, channel: Channel, segment_id: String, transcript: String) -> Self {
        Self {
            call_id: self.call_id.clone(),
            channel,
            segment_id,
            start_time: self.start_time,
            end_time: self.end_time + DERIVED_SEGMENT_EPSILON_SECS,
            transcript,
            is_partial: false,
            sentiment: None,
            sentiment_score: None,
            sentiment_weighted: None,
            issues_detected: None,
            created_at: self.created_at.clone(),
            expires_after: self.expires_after,
            status: self.status.clone(),
        }
    }
}

// =============================================================================
// Call Lifecycle Event
// =============================================================================

/// What a lifecycle event asks for.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleAction {
    /// Call started
    Start {
        customer_phone_number: Option<String>,
        system_phone_number: Option<String>,
    },
    /// Call ended
    End,
    /// Explicit status label change
    UpdateStatus(String),
    /// Agent assigned
    UpdateAgent(String),
    /// Recording location known
    UpdateRecordingUrl(String),
}

/// A status or metadata event for a call.
#[derive(Debug, Clone, PartialEq)]
pub struct CallLifecycleEvent {
    pub call_id: String,
    pub action: LifecycleAction,
    pub created_at: String,
    pub expires_after: i64,
}

/// Output of the normalizer: one unit of downstream work.
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedEvent {
    Transcript(CanonicalTranscriptEvent),
    Lifecycle(CallLifecycleEvent),
}

impl NormalizedEvent {
    pub fn call_id(&self) -> &str {
        match self {
            Self::Transcript(event) => &event.call_id,
            Self::Lifecycle(event) => &event.call_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_participant_role_mapping() {
        assert_eq!(Channel::from_participant_role(Some("CUSTOMER")), Channel::Caller);
        assert_eq!(Channel::from_participant_role(Some("customer")), Channel::Caller);
        assert_eq!(Channel::from_participant_role(Some("AGENT")), Channel::Agent);
        assert_eq!(Channel::from_participant_role(Some("SUPERVISOR")), Channel::Agent);
        assert_eq!(Channel::from_participant_role(None), Channel::Agent);
    }

    #[test]
    fn test_channel_label_parsing() {
        assert_eq!(Channel::from_label(Some("AGENT_ASSISTANT")), Channel::AgentAssistant);
        assert_eq!(Channel::from_label(Some("category_match")), Channel::CategoryMatch);
        assert_eq!(Channel::from_label(Some("CALLER")), Channel::Caller);
        assert_eq!(Channel::from_label(Some("whatever")), Channel::Agent);
    }

    #[test]
    fn test_channel_serializes_screaming_snake() {
        assert_eq!(
            serde_json::to_string(&Channel::AgentAssistant).unwrap(),
            "\"AGENT_ASSISTANT\""
        );
    }

    #[test]
    fn test_canonical_event_field_names() {
        let event = CanonicalTranscriptEvent {
            call_id: "call-1".into(),
            channel: Channel::Caller,
            segment_id: "seg-1".into(),
            start_time: 1.0,
            end_time: 2.5,
            transcript: "hello".into(),
            is_partial: false,
            sentiment: Some(SentimentLabel::Positive),
            sentiment_score: None,
            sentiment_weighted: Some(4.5),
            issues_detected: None,
            created_at: "2024-05-01T12:00:00.000000Z".into(),
            expires_after: 1_700_000_000,
            status: TRANSCRIBING_STATUS.into(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["CallId"], "call-1");
        assert_eq!(value["Channel"], "CALLER");
        assert_eq!(value["IsPartial"], false);
        assert_eq!(value["SentimentWeighted"], 4.5);
        assert!(value.get("SentimentScore").is_none());
    }

    #[test]
    fn test_derive_adds_epsilon() {
        let event = CanonicalTranscriptEvent {
            call_id: "c".into(),
            channel: Channel::Caller,
            segment_id: "s".into(),
            start_time: 1.0,
            end_time: 2.0,
            transcript: "my card was charged twice".into(),
            is_partial: false,
            sentiment: Some(SentimentLabel::Negative),
            sentiment_score: None,
            sentiment_weighted: Some(-5.0),
            issues_detected: None,
            created_at: "t".into(),
            expires_after: 0,
            status: TRANSCRIBING_STATUS.into(),
        };
        let derived = event.derive(Channel::AgentAssistant, "s-issue-0".into(), "charged twice".into());
        assert_eq!(derived.channel, Channel::AgentAssistant);
        assert!((derived.end_time - 2.001).abs() < 1e-9);
        assert!(derived.sentiment.is_none());
    }
}
