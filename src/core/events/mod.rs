//! Event normalization.
//!
//! Raw stream records arrive in one of several incompatible shapes. This module
//! classifies each record once ([`SourceEvent`]), then reduces it to
//! [`NormalizedEvent`]s: canonical transcript segments and call lifecycle
//! events.
//!
//! - Millisecond offsets are converted to seconds.
//! - `CUSTOMER` participants map to the `CALLER` channel, everything else to `AGENT`.
//! - Streaming partials are accumulated per segment and discarded once the
//!   final segment arrives.
//! - Detected issue spans and matched categories become derived segments.

mod accumulator;
mod messages;
mod normalizer;
mod types;


pub use accumulator::PartialAccumulator;
pub use messages::{
    ContactCategories, ContactSegment, ContactSegmentsEnvelope, ContactTranscript,
    ContactUtterance, CustomTranscriptEvent, LIFECYCLE_EVENT_TYPES, LifecycleEnvelope,
    SourceEvent, TranscriptEnvelope, TranscriptEvent, TranscriptResult, UtteranceEnvelope,
    UtteranceEvent,
};
pub use normalizer::{EventNormalizer, NormalizerConfig};
pub use types::{
    CallLifecycleEvent, CanonicalTranscriptEvent, Channel, CharacterOffsets,
    DERIVED_SEGMENT_EPSILON_SECS, IssueDetected, LifecycleAction, NormalizedEvent,
    SentimentLabel, SentimentScores, TRANSCRIBING_STATUS,
};
