//! Call state aggregation and durable persistence.
//!
//! - [`CallStateAggregator`] folds mutation results into [`CallState`].
//! - [`StateStore`] restores state from, and appends snapshots to, a
//!   [`StateBackend`] around one batch.

mod aggregator;
mod backend;
mod merge;
pub mod rollup;
mod store;
mod types;


pub use aggregator::{AggregatorConfig, BatchExitReport, CallStateAggregator};
pub use backend::{DynamoDbStateBackend, MemoryStateBackend};
pub use merge::deep_merge;
pub use store::{
    RestoredState, SnapshotRows, StateBackend, StatePayload, StateRow, StateScope, StateStore,
    StateStoreConfig, WindowFlags, decode_payload,
};
pub use types::{
    CallSentiment, CallState, CallStatus, PerCallState, PerChannelState, QuarterBucket,
    SentimentByPeriod, SentimentEntry,
};
