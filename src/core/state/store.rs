//! Durable state manager.
//!
//! Each persist appends one snapshot row under a fixed partition key, sorted by
//! write timestamp. Restore reads every row inside the recovery window and
//! deep-merges them oldest first, so concurrent writers never need a lock:
//! the merge on restore reconciles them.

use std::future::Future;
use std::io::{Read, Write};
use std::sync::Arc;

use async_trait::async_trait;
use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use serde_json::Value;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use super::aggregator::{AggregatorConfig, CallStateAggregator};
use super::merge::deep_merge;
use super::types::CallState;
use crate::errors::{ProcessorError, ProcessorResult};
use crate::utils::{epoch_seconds, format_timestamp, timestamp_seconds_before};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateStoreConfig {
    pub partition_key: String,
    /// Rows older than this are ignored on restore.
    pub max_window_seconds: u64,
    /// Retention of each written row.
    pub ttl_seconds: u64,
    /// Payloads at or above this size are zlib-compressed.
    pub compression_threshold_bytes: usize,
}

impl Default for StateStoreConfig {
    fn default() -> Self {
        Self {
            partition_key: "CallEventProcessorState".to_string(),
            max_window_seconds: 900,
            ttl_seconds: 86_400,
            compression_threshold_bytes: 100 * 1024,
        }
    }
}

/// Serialized snapshot body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatePayload {
    Json(String),
    Compressed(Vec<u8>),
}

/// One stored snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateRow {
    pub partition_key: String,
    /// Write timestamp in the fixed-width layout.
    pub sort_key: String,
    pub payload: StatePayload,
    /// Epoch seconds after which the backend may drop the row.
    pub expires_after: i64,
}

/// Rows returned by [`StateBackend::query_since`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotRows {
    /// Most recent first.
    pub rows: Vec<StateRow>,
    /// Stored items the backend could not turn into a [`StateRow`].
    pub unreadable: usize,
}

impl From<Vec<StateRow>> for SnapshotRows {
    fn from(rows: Vec<StateRow>) -> Self {
        Self {
            rows,
            unreadable: 0,
        }
    }
}

/// Append-only key-value backend for snapshot rows.
#[async_trait]
pub trait StateBackend: Send + Sync {
    /// Rows under `partition_key` with a sort key after `sort_key_lower_bound`.
    ///
    /// A single unreadable item is counted in [`SnapshotRows::unreadable`]
    /// and does not fail the query.
    async fn query_since(
        &self,
        partition_key: &str,
        sort_key_lower_bound: &str,
    ) -> ProcessorResult<SnapshotRows>;

    async fn put(&self, row: StateRow) -> ProcessorResult<()>;
}

/// Tumbling-window flags of one invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowFlags {
    pub is_final_invoke_for_window: bool,
    pub is_window_terminated_early: bool,
}

impl WindowFlags {
    #[inline]
    pub fn should_persist(&self) -> bool {
        self.is_final_invoke_for_window || self.is_window_terminated_early
    }
}

/// State merged by [`StateStore::restore`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RestoredState {
    pub state: CallState,
    pub snapshots: usize,
    /// Rows inside the window that were skipped as unreadable.
    pub skipped: usize,
}

impl RestoredState {
    /// Whether any snapshot in the window was lost.
    #[inline]
    pub fn is_degraded(&self) -> bool {
        self.skipped > 0
    }
}

/// Outcome of [`StateStore::with_state`].
#[derive(Debug)]
pub struct StateScope<T> {
    /// What the scoped closure returned.
    pub result: ProcessorResult<T>,
    /// State after the closure, persisted or not.
    pub state: CallState,
    /// Set when restore or persist failed; the state may be stale.
    pub state_error: bool,
    pub persisted: bool,
}

pub struct StateStore {
    backend: Arc<dyn StateBackend>,
    config: StateStoreConfig,
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl StateStore {
    pub fn new(backend: Arc<dyn StateBackend>, config: StateStoreConfig) -> Self {
        Self { backend, config }
    }

    pub fn config(&self) -> &StateStoreConfig {
        &self.config
    }

    /// Merge every snapshot inside the recovery window.
    ///
    /// Rows that fail to decode are skipped and counted in
    /// [`RestoredState::skipped`].
    pub async fn restore(&self, now: OffsetDateTime) -> ProcessorResult<RestoredState> {
        let lower_bound = timestamp_seconds_before(now, self.config.max_window_seconds);
        let SnapshotRows { rows, unreadable } = self
            .backend
            .query_since(&self.config.partition_key, &lower_bound)
            .await?;

        let mut merged = Value::Object(Default::default());
        let mut snapshots = 0usize;
        let mut skipped = unreadable;
        for row in rows.iter().rev() {
            match decode_payload(&row.payload) {
                Ok(snapshot) => {
                    deep_merge(&mut merged, snapshot);
                    snapshots += 1;
                }
                Err(e) => {
                    skipped += 1;
                    warn!(sort_key = %row.sort_key, error = %e, "Skipping unreadable state snapshot");
                }
            }
        }

        let state = CallState::from_merged(merged).map_err(|e| {
            ProcessorError::StateStore(format!("merged snapshot does not fit call state: {e}"))
        })?;
        info!(
            snapshots,
            skipped,
            calls = state.len(),
            since = %lower_bound,
            "Restored call state"
        );
        Ok(RestoredState {
            state,
            snapshots,
            skipped,
        })
    }

    /// Append `state` as a new snapshot row.
    pub async fn persist(&self, state: &CallState, now: OffsetDateTime) -> ProcessorResult<()> {
        let payload = self.encode(state)?;
        let compressed = matches!(payload, StatePayload::Compressed(_));
        let row = StateRow {
            partition_key: self.config.partition_key.clone(),
            sort_key: format_timestamp(now),
            payload,
            expires_after: epoch_seconds(now) + self.config.ttl_seconds as i64,
        };
        let sort_key = row.sort_key.clone();

        self.backend.put(row).await?;
        info!(sort_key = %sort_key, calls = state.len(), compressed, "Persisted call state");
        Ok(())
    }

    /// Serialize, compressing at or above the threshold.
    pub fn encode(&self, state: &CallState) -> ProcessorResult<StatePayload> {
        let json = serde_json::to_string(state)?;
        if json.len() < self.config.compression_threshold_bytes {
            return Ok(StatePayload::Json(json));
        }

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(json.as_bytes())
            .map_err(|e| ProcessorError::StateStore(format!("zlib compression failed: {e}")))?;
        let bytes = encoder
            .finish()
            .map_err(|e| ProcessorError::StateStore(format!("zlib compression failed: {e}")))?;
        Ok(StatePayload::Compressed(bytes))
    }

    /// Run `f` over the batch state.
    ///
    /// State comes from `carried` when the caller handed one in, otherwise
    /// from [`restore`](Self::restore). Whatever `f` returns, the state is
    /// persisted afterwards when `flags` say the window is closing. Restore
    /// and persist failures never fail the scope: they set `state_error`,
    /// which belongs to this call alone.
    pub async fn with_state<T, F, Fut>(
        &self,
        carried: Option<CallState>,
        flags: WindowFlags,
        now: OffsetDateTime,
        aggregator_config: AggregatorConfig,
        f: F,
    ) -> StateScope<T>
    where
        F: FnOnce(CallStateAggregator) -> Fut,
        Fut: Future<Output = (CallStateAggregator, ProcessorResult<T>)>,
    {
        let mut state_error = false;
        let initial = match carried {
            Some(state) => {
                debug!(calls = state.len(), "Using carried-over call state");
                state
            }
            None => match self.restore(now).await {
                Ok(restored) => {
                    state_error |= restored.is_degraded();
                    restored.state
                }
                Err(e) => {
                    warn!(error = %e, "State restore failed, starting from empty state");
                    state_error = true;
                    CallState::new()
                }
            },
        };

        let (aggregator, result) = f(CallStateAggregator::new(initial, aggregator_config)).await;
        let state = aggregator.into_state();

        let mut persisted = false;
        if flags.should_persist() {
            match self.persist(&state, now).await {
                Ok(()) => persisted = true,
                Err(e) => {
                    warn!(error = %e, "State persist failed");
                    state_error = true;
                }
            }
        }

        StateScope {
            result,
            state,
            state_error,
            persisted,
        }
    }
}

/// Parse a stored payload, decompressing when needed.
pub fn decode_payload(payload: &StatePayload) -> ProcessorResult<Value> {
    let json = match payload {
        StatePayload::Json(json) => std::borrow::Cow::Borrowed(json.as_str()),
        StatePayload::Compressed(bytes) => {
            let mut decoder = ZlibDecoder::new(bytes.as_slice());
            let mut json = String::new();
            decoder
                .read_to_string(&mut json)
                .map_err(|e| ProcessorError::StateStore(format!("zlib decompression failed: {e}")))?;
            std::borrow::Cow::Owned(json)
        }
    };
    serde_json::from_str(&json)
        .map_err(|e| ProcessorError::StateStore(format!("snapshot is not valid JSON: {e}")))
}
