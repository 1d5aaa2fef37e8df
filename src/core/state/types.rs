//! Aggregated per-call state.
//!
//! Field names are PascalCase on the wire so a serialized [`CallState`] is the
//! exact snapshot stored in the durable backend and handed back to the caller.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::events::Channel;

// =============================================================================
// Status
// =============================================================================

/// Call status label.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallStatus {
    #[default]
    Started,
    Transcribing,
    Errored,
    Ended,
}

impl CallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Started => "STARTED",
            Self::Transcribing => "TRANSCRIBING",
            Self::Errored => "ERRORED",
            Self::Ended => "ENDED",
        }
    }

    /// Parse a status label. Unknown labels yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "STARTED" => Some(Self::Started),
            "TRANSCRIBING" => Some(Self::Transcribing),
            "ERRORED" => Some(Self::Errored),
            "ENDED" => Some(Self::Ended),
            _ => None,
        }
    }

    /// Tie-break order for updates carrying the same timestamp.
    pub(crate) fn rank(&self) -> u8 {
        match self {
            Self::Started => 0,
            Self::Transcribing => 1,
            Self::Errored => 2,
            Self::Ended => 3,
        }
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ended)
    }
}

// =============================================================================
// Sentiment
// =============================================================================

/// Weighted sentiment of one final segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SentimentEntry {
    pub id: String,
    pub begin_offset_millis: f64,
    pub end_offset_millis: f64,
    pub sentiment: String,
    pub score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PerChannelState {
    /// Unique by `Id`, sorted by `BeginOffsetMillis`.
    pub sentiment_list: Vec<SentimentEntry>,
}

impl PerChannelState {
    /// Insert or replace an entry by id, keeping the list sorted.
    ///
    /// Returns `false` when an identical entry was already present.
    pub fn upsert(&mut self, entry: SentimentEntry) -> bool {
        match self.sentiment_list.iter_mut().find(|e| e.id == entry.id) {
            Some(existing) if *existing == entry => return false,
            Some(existing) => *existing = entry,
            None => self.sentiment_list.push(entry),
        }
        self.sort();
        true
    }

    /// Drop duplicate ids (last occurrence wins) and restore sort order.
    pub fn dedupe(&mut self) {
        let mut unique: Vec<SentimentEntry> = Vec::with_capacity(self.sentiment_list.len());
        for entry in self.sentiment_list.drain(..) {
            match unique.iter_mut().find(|e| e.id == entry.id) {
                Some(existing) => *existing = entry,
                None => unique.push(entry),
            }
        }
        self.sentiment_list = unique;
        self.sort();
    }

    fn sort(&mut self) {
        self.sentiment_list.sort_by(|a, b| {
            a.begin_offset_millis
                .total_cmp(&b.begin_offset_millis)
                .then_with(|| a.id.cmp(&b.id))
        });
    }
}

/// One of the four time-quarter buckets of a channel's sentiment timeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QuarterBucket {
    pub begin_offset_millis: f64,
    pub end_offset_millis: f64,
    pub score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SentimentByPeriod {
    #[serde(rename = "QUARTER", default)]
    pub quarter: BTreeMap<Channel, Vec<QuarterBucket>>,
}

/// Per-call sentiment aggregate, recomputed from the channel lists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct CallSentiment {
    pub overall_sentiment: BTreeMap<Channel, f64>,
    pub sentiment_by_period: SentimentByPeriod,
}

// =============================================================================
// Call state
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PerCallState {
    pub status: CallStatus,
    /// Fixed at first observation.
    pub created_at: Option<String>,
    /// Max of every contributing timestamp.
    pub updated_at: Option<String>,
    pub total_conversation_duration_millis: f64,
    pub sentiment: CallSentiment,
    pub state_per_channel: BTreeMap<Channel, PerChannelState>,
}

/// Root aggregate: `CallId` to per-call state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallState(pub BTreeMap<String, PerCallState>);

impl CallState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, call_id: &str) -> Option<&PerCallState> {
        self.0.get(call_id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn call_ids(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// Parse a snapshot that may have been produced by a deep merge of
    /// several stored snapshots, deduplicating the concatenated lists.
    pub fn from_merged(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        let mut state: Self = serde_json::from_value(value)?;
        state.normalize();
        Ok(state)
    }

    /// Deduplicate sentiment lists and recompute aggregates.
    pub fn normalize(&mut self) {
        for call in self.0.values_mut() {
            for channel in call.state_per_channel.values_mut() {
                channel.dedupe();
            }
            call.sentiment = super::rollup::call_sentiment(&call.state_per_channel);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(id: &str, begin: f64, score: f64) -> SentimentEntry {
        SentimentEntry {
            id: id.into(),
            begin_offset_millis: begin,
            end_offset_millis: begin + 500.0,
            sentiment: "POSITIVE".into(),
            score,
        }
    }

    #[test]
    fn test_upsert_replaces_by_id_and_sorts() {
        let mut channel = PerChannelState::default();
        assert!(channel.upsert(entry("b", 2000.0, 1.0)));
        assert!(channel.upsert(entry("a", 1000.0, 2.0)));
        assert!(channel.upsert(entry("b", 2000.0, 3.0)));
        assert!(!channel.upsert(entry("b", 2000.0, 3.0)));

        let ids: Vec<_> = channel.sentiment_list.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
        assert_eq!(channel.sentiment_list[1].score, 3.0);
    }

    #[test]
    fn test_dedupe_last_wins() {
        let mut channel = PerChannelState {
            sentiment_list: vec![entry("x", 10.0, 1.0), entry("y", 5.0, 1.0), entry("x", 10.0, 4.0)],
        };
        channel.dedupe();
        assert_eq!(channel.sentiment_list.len(), 2);
        assert_eq!(channel.sentiment_list[0].id, "y");
        assert_eq!(channel.sentiment_list[1].score, 4.0);
    }

    #[test]
    fn test_state_wire_shape() {
        let mut state = CallState::new();
        let mut call = PerCallState {
            status: CallStatus::Transcribing,
            ..Default::default()
        };
        call.state_per_channel
            .entry(Channel::Caller)
            .or_default()
            .upsert(entry("s1", 0.0, 4.5));
        state.0.insert("call-1".into(), call);

        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value["call-1"]["Status"], "TRANSCRIBING");
        assert_eq!(
            value["call-1"]["StatePerChannel"]["CALLER"]["SentimentList"][0]["Id"],
            "s1"
        );
        assert!(value["call-1"]["Sentiment"]["SentimentByPeriod"]["QUARTER"].is_object());
    }

    #[test]
    fn test_from_merged_dedupes_and_recomputes() {
        let merged = json!({
            "call-1": {
                "Status": "TRANSCRIBING",
                "StatePerChannel": {"AGENT": {"SentimentList": [
                    {"Id": "a", "BeginOffsetMillis": 0, "EndOffsetMillis": 100, "Sentiment": "POSITIVE", "Score": 2.0},
                    {"Id": "a", "BeginOffsetMillis": 0, "EndOffsetMillis": 100, "Sentiment": "POSITIVE", "Score": 2.0},
                    {"Id": "b", "BeginOffsetMillis": 200, "EndOffsetMillis": 300, "Sentiment": "NEGATIVE", "Score": -4.0}
                ]}}
            }
        });
        let state = CallState::from_merged(merged).unwrap();
        let call = state.get("call-1").unwrap();
        assert_eq!(call.state_per_channel[&Channel::Agent].sentiment_list.len(), 2);
        assert_eq!(call.sentiment.overall_sentiment[&Channel::Agent], -1.0);
    }

    #[test]
    fn test_status_parse_and_terminal() {
        assert_eq!(CallStatus::parse("ended"), Some(CallStatus::Ended));
        assert_eq!(CallStatus::parse("bogus"), None);
        assert!(CallStatus::Ended.is_terminal());
        assert!(!CallStatus::Errored.is_terminal());
    }
}
