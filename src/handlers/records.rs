//! Raw stream record decoding.
//!
//! Records arrive in the Kinesis event layout:
//!
//! ```json
//! {"eventID": "shardId-000:4954...", "kinesis": {"data": "<base64 JSON>", "sequenceNumber": "4954..."}}
//! ```

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use serde_json::Value;

use crate::errors::{ProcessorError, ProcessorResult};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KinesisData {
    pub data: String,
    #[serde(default)]
    pub sequence_number: Option<String>,
    #[serde(default)]
    pub partition_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamRecord {
    #[serde(rename = "eventID", default)]
    pub event_id: Option<String>,
    pub kinesis: KinesisData,
}

impl StreamRecord {
    /// Identifier reported back for partial batch failures.
    pub fn item_identifier(&self) -> Option<&str> {
        self.kinesis
            .sequence_number
            .as_deref()
            .or(self.event_id.as_deref())
    }

    /// Decode the base64 payload into JSON.
    pub fn decode(&self) -> ProcessorResult<Value> {
        let bytes = BASE64
            .decode(self.kinesis.data.trim())
            .map_err(|e| ProcessorError::RecordDecode(format!("invalid base64 payload: {e}")))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| ProcessorError::RecordDecode(format!("payload is not JSON: {e}")))
    }
}

/// A record after decoding, tagged with the identifier to report on failure.
#[derive(Debug)]
pub struct DecodedRecord {
    pub item_identifier: String,
    pub payload: ProcessorResult<Value>,
}

/// Decode one raw record. `index` stands in for records without an identifier.
pub fn decode_record(raw: &Value, index: usize) -> DecodedRecord {
    match StreamRecord::deserialize(raw) {
        Ok(record) => DecodedRecord {
            item_identifier: record
                .item_identifier()
                .map(str::to_string)
                .unwrap_or_else(|| index.to_string()),
            payload: record.decode(),
        },
        Err(e) => DecodedRecord {
            item_identifier: raw
                .pointer("/kinesis/sequenceNumber")
                .or_else(|| raw.get("eventID"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| index.to_string()),
            payload: Err(ProcessorError::RecordDecode(format!(
                "record does not match the stream layout: {e}"
            ))),
        },
    }
}

/// Encode `payload` as a stream record. Used by tests and the CLI to build input.
pub fn encode_record(payload: &Value, sequence_number: &str) -> Value {
    serde_json::json!({
        "eventID": format!("shardId-000000000000:{sequence_number}"),
        "kinesis": {
            "data": BASE64.encode(payload.to_string()),
            "sequenceNumber": sequence_number,
        }
    })
}
