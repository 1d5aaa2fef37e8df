use serde::Deserialize;
use serde_json::Value;

use super::documents::MutationKind;
use crate::core::events::Channel;
use crate::errors::{ProcessorError, ProcessorResult};

/// Result of an `addTranscriptSegment` mutation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SegmentResult {
    pub call_id: String,
    pub channel: Channel,
    pub segment_id: String,
    #[serde(default)]
    pub start_time: f64,
    #[serde(default)]
    pub end_time: f64,
    #[serde(default)]
    pub is_partial: bool,
    #[serde(default)]
    pub sentiment: Option<String>,
    #[serde(default)]
    pub sentiment_weighted: Option<f64>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Result of a `createCall` or `updateCallStatus` mutation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StatusResult {
    pub call_id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// A mutation response classified by the field it was returned under.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationResult {
    Segment(SegmentResult),
    Status(StatusResult),
    /// Anything the aggregator does not fold.
    Other,
}

impl MutationResult {
    /// Classify a gateway response (`{"<field>": {...}}`).
    pub fn from_value(value: &Value) -> ProcessorResult<Self> {
        let Some(object) = value.as_object() else {
            return Ok(Self::Other);
        };

        if let Some(segment) = object.get(MutationKind::AddTranscriptSegment.field_name()) {
            return SegmentResult::deserialize(segment)
                .map(Self::Segment)
                .map_err(|e| ProcessorError::Serialization(format!("segment result: {e}")));
        }

        for (kind, default_status) in [
            (MutationKind::CreateCall, Some("STARTED")),
            (MutationKind::UpdateCallStatus, None),
        ] {
            if let Some(status) = object.get(kind.field_name()) {
                let mut result = StatusResult::deserialize(status)
                    .map_err(|e| ProcessorError::Serialization(format!("{kind} result: {e}")))?;
                if result.status.is_none() {
                    result.status = default_status.map(str::to_string);
                }
                return Ok(Self::Status(result));
            }
        }

        Ok(Self::Other)
    }

    pub fn call_id(&self) -> Option<&str> {
        match self {
            Self::Segment(r) => Some(&r.call_id),
            Self::Status(r) => Some(&r.call_id),
            Self::Other => None,
        }
    }
}
