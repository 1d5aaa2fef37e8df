//! Invocation handlers
//!
//! - `records` - stream record envelope decoding
//! - `batch` - per-invocation orchestration from records to persisted state

pub mod batch;
pub mod records;

// Re-export commonly used handler types for convenient access
pub use batch::{
    BatchError, BatchInput, BatchItemFailure, BatchOrchestrator, BatchOutput, BatchResults,
};
pub use records::{DecodedRecord, StreamRecord, decode_record, encode_record};
