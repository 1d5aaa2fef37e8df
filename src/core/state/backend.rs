//! State backends: in-process memory and DynamoDB.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::primitives::Blob;
use aws_sdk_dynamodb::types::AttributeValue;
use parking_lot::Mutex;
use tracing::{debug, warn};

use super::store::{SnapshotRows, StateBackend, StatePayload, StateRow};
use crate::errors::{ProcessorError, ProcessorResult};

// =============================================================================
// Memory
// =============================================================================

/// Keeps rows in process. Used when no table is configured and in tests.
#[derive(Debug, Default)]
pub struct MemoryStateBackend {
    rows: Mutex<Vec<StateRow>>,
}

impl MemoryStateBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored row, in write order.
    pub fn rows(&self) -> Vec<StateRow> {
        self.rows.lock().clone()
    }
}

#[async_trait]
impl StateBackend for MemoryStateBackend {
    async fn query_since(
        &self,
        partition_key: &str,
        sort_key_lower_bound: &str,
    ) -> ProcessorResult<SnapshotRows> {
        let mut rows: Vec<StateRow> = self
            .rows
            .lock()
            .iter()
            .filter(|row| row.partition_key == partition_key)
            .filter(|row| row.sort_key.as_str() > sort_key_lower_bound)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.sort_key.cmp(&a.sort_key));
        Ok(rows.into())
    }

    async fn put(&self, row: StateRow) -> ProcessorResult<()> {
        self.rows.lock().push(row);
        Ok(())
    }
}

// =============================================================================
// DynamoDB
// =============================================================================

const PARTITION_KEY_ATTR: &str = "PartitionKey";
const SORT_KEY_ATTR: &str = "SortKey";
const STATE_ATTR: &str = "State";
const EXPIRES_AFTER_ATTR: &str = "ExpiresAfter";

/// Snapshot rows in a DynamoDB table keyed by (`PartitionKey`, `SortKey`).
///
/// `State` is a string attribute for plain JSON and a binary attribute for
/// zlib-compressed payloads. `ExpiresAfter` is meant to be the table's TTL
/// attribute.
#[derive(Debug, Clone)]
pub struct DynamoDbStateBackend {
    client: DynamoDbClient,
    table_name: String,
}

impl DynamoDbStateBackend {
    pub fn new(sdk_config: &aws_config::SdkConfig, table_name: impl Into<String>) -> Self {
        Self {
            client: DynamoDbClient::new(sdk_config),
            table_name: table_name.into(),
        }
    }

    fn parse_row(item: &HashMap<String, AttributeValue>) -> ProcessorResult<StateRow> {
        let string_attr = |name: &str| {
            item.get(name)
                .and_then(|v| v.as_s().ok())
                .cloned()
                .ok_or_else(|| ProcessorError::StateStore(format!("row is missing {name}")))
        };

        let payload = match item.get(STATE_ATTR) {
            Some(AttributeValue::S(json)) => StatePayload::Json(json.clone()),
            Some(AttributeValue::B(blob)) => StatePayload::Compressed(blob.as_ref().to_vec()),
            _ => {
                return Err(ProcessorError::StateStore(format!(
                    "row has no usable {STATE_ATTR} attribute"
                )));
            }
        };

        let expires_after = item
            .get(EXPIRES_AFTER_ATTR)
            .and_then(|v| v.as_n().ok())
            .and_then(|n| n.parse::<i64>().ok())
            .unwrap_or_default();

        Ok(StateRow {
            partition_key: string_attr(PARTITION_KEY_ATTR)?,
            sort_key: string_attr(SORT_KEY_ATTR)?,
            payload,
            expires_after,
        })
    }

    /// Parse one query page into `page`, counting items that do not parse.
    fn collect_page(items: &[HashMap<String, AttributeValue>], page: &mut SnapshotRows) {
        for item in items {
            match Self::parse_row(item) {
                Ok(row) => page.rows.push(row),
                Err(e) => {
                    page.unreadable += 1;
                    let sort_key = item.get(SORT_KEY_ATTR).and_then(|v| v.as_s().ok());
                    warn!(sort_key = ?sort_key, error = %e, "Skipping unreadable state item");
                }
            }
        }
    }
}

#[async_trait]
impl StateBackend for DynamoDbStateBackend {
    async fn query_since(
        &self,
        partition_key: &str,
        sort_key_lower_bound: &str,
    ) -> ProcessorResult<SnapshotRows> {
        let mut page = SnapshotRows::default();
        let mut start_key: Option<HashMap<String, AttributeValue>> = None;

        loop {
            let output = self
                .client
                .query()
                .table_name(&self.table_name)
                .key_condition_expression("#pk = :pk AND #sk > :lower")
                .expression_attribute_names("#pk", PARTITION_KEY_ATTR)
                .expression_attribute_names("#sk", SORT_KEY_ATTR)
                .expression_attribute_values(":pk", AttributeValue::S(partition_key.to_string()))
                .expression_attribute_values(
                    ":lower",
                    AttributeValue::S(sort_key_lower_bound.to_string()),
                )
                .scan_index_forward(false)
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|e| {
                    ProcessorError::StateStore(format!(
                        "query on {} failed: {}",
                        self.table_name,
                        DisplayErrorContext(&e)
                    ))
                })?;

            Self::collect_page(output.items(), &mut page);

            match output.last_evaluated_key() {
                Some(key) if !key.is_empty() => start_key = Some(key.clone()),
                _ => break,
            }
        }

        debug!(
            table = %self.table_name,
            rows = page.rows.len(),
            unreadable = page.unreadable,
            "Queried state snapshots"
        );
        Ok(page)
    }

    async fn put(&self, row: StateRow) -> ProcessorResult<()> {
        let state = match row.payload {
            StatePayload::Json(json) => AttributeValue::S(json),
            StatePayload::Compressed(bytes) => AttributeValue::B(Blob::new(bytes)),
        };

        self.client
            .put_item()
            .table_name(&self.table_name)
            .item(PARTITION_KEY_ATTR, AttributeValue::S(row.partition_key))
            .item(SORT_KEY_ATTR, AttributeValue::S(row.sort_key))
            .item(STATE_ATTR, state)
            .item(EXPIRES_AFTER_ATTR, AttributeValue::N(row.expires_after.to_string()))
            .send()
            .await
            .map_err(|e| {
                ProcessorError::StateStore(format!(
                    "put on {} failed: {}",
                    self.table_name,
                    DisplayErrorContext(&e)
                ))
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pk: &str, sk: &str) -> StateRow {
        StateRow {
            partition_key: pk.into(),
            sort_key: sk.into(),
            payload: StatePayload::Json("{}".into()),
            expires_after: 0,
        }
    }

    #[tokio::test]
    async fn test_memory_query_filters_and_orders() {
        let backend = MemoryStateBackend::new();
        backend.put(row("pk", "2024-01-01T00:00:01.000000Z")).await.unwrap();
        backend.put(row("pk", "2024-01-01T00:00:03.000000Z")).await.unwrap();
        backend.put(row("other", "2024-01-01T00:00:04.000000Z")).await.unwrap();
        backend.put(row("pk", "2024-01-01T00:00:00.000000Z")).await.unwrap();

        let rows = backend
            .query_since("pk", "2024-01-01T00:00:00.500000Z")
            .await
            .unwrap();
        assert_eq!(rows.unreadable, 0);
        let keys: Vec<_> = rows.rows.iter().map(|r| r.sort_key.as_str()).collect();
        assert_eq!(
            keys,
            ["2024-01-01T00:00:03.000000Z", "2024-01-01T00:00:01.000000Z"]
        );
    }

    #[test]
    fn test_parse_dynamodb_row() {
        let mut item = HashMap::new();
        item.insert(PARTITION_KEY_ATTR.to_string(), AttributeValue::S("pk".into()));
        item.insert(SORT_KEY_ATTR.to_string(), AttributeValue::S("sk".into()));
        item.insert(STATE_ATTR.to_string(), AttributeValue::B(Blob::new(vec![1, 2, 3])));
        item.insert(EXPIRES_AFTER_ATTR.to_string(), AttributeValue::N("42".into()));

        let row = DynamoDbStateBackend::parse_row(&item).unwrap();
        assert_eq!(row.payload, StatePayload::Compressed(vec![1, 2, 3]));
        assert_eq!(row.expires_after, 42);
    }

    #[test]
    fn test_parse_row_without_state_fails() {
        let mut item = HashMap::new();
        item.insert(PARTITION_KEY_ATTR.to_string(), AttributeValue::S("pk".into()));
        assert!(DynamoDbStateBackend::parse_row(&item).is_err());
    }

    fn item(sort_key: &str, state: Option<AttributeValue>) -> HashMap<String, AttributeValue> {
        let mut item = HashMap::new();
        item.insert(PARTITION_KEY_ATTR.to_string(), AttributeValue::S("pk".into()));
        item.insert(SORT_KEY_ATTR.to_string(), AttributeValue::S(sort_key.into()));
        if let Some(state) = state {
            item.insert(STATE_ATTR.to_string(), state);
        }
        item
    }

    #[test]
    fn test_page_with_bad_item_keeps_good_rows() {
        let items = vec![
            item("2024-01-01T00:00:03.000000Z", Some(AttributeValue::S("{}".into()))),
            item("2024-01-01T00:00:02.000000Z", None),
            item("2024-01-01T00:00:01.000000Z", Some(AttributeValue::N("7".into()))),
            item("2024-01-01T00:00:00.000000Z", Some(AttributeValue::S("{}".into()))),
        ];

        let mut page = SnapshotRows::default();
        DynamoDbStateBackend::collect_page(&items, &mut page);

        assert_eq!(page.unreadable, 2);
        let keys: Vec<_> = page.rows.iter().map(|r| r.sort_key.as_str()).collect();
        assert_eq!(
            keys,
            ["2024-01-01T00:00:03.000000Z", "2024-01-01T00:00:00.000000Z"]
        );
    }
}
