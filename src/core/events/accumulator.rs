//! Partial transcript accumulation keyed by `(call id, segment id)`.

use std::time::Duration;

use moka::sync::Cache;

/// Streaming partial accumulator.
///
/// Shapes that stream word-level deltas append onto the text already seen for
/// a segment, so the emitted partial transcript only ever grows. When the final
/// segment arrives the entry is dropped and the segment id is remembered so a
/// late partial cannot overwrite it.
///
/// Both maps are bounded caches owned by the normalizer instance.
#[derive(Clone)]
pub struct PartialAccumulator {
    partials: Cache<String, String>,
    finalized: Cache<String, ()>,
}

impl std::fmt::Debug for PartialAccumulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartialAccumulator")
            .field("pending", &self.partials.entry_count())
            .field("finalized", &self.finalized.entry_count())
            .finish()
    }
}

#[inline]
fn key(call_id: &str, segment_id: &str) -> String {
    format!("{call_id}:{segment_id}")
}

impl PartialAccumulator {
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        Self {
            partials: Cache::builder()
                .max_capacity(capacity)
                .time_to_idle(ttl)
                .build(),
            finalized: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Append `delta` to the accumulated text and return the new full text.
    ///
    /// Returns `None` when the segment was already finalized.
    pub fn append(&self, call_id: &str, segment_id: &str, delta: &str) -> Option<String> {
        let key = key(call_id, segment_id);
        if self.finalized.contains_key(&key) {
            return None;
        }
        let mut text = self.partials.get(&key).unwrap_or_default();
        text.push_str(delta);
        self.partials.insert(key, text.clone());
        Some(text)
    }

    /// Record a full (non-delta) partial transcript.
    ///
    /// Keeps the longer of the stored and incoming text so the visible partial
    /// never shrinks. Returns `None` when the segment was already finalized.
    pub fn replace(&self, call_id: &str, segment_id: &str, text: &str) -> Option<String> {
        let key = key(call_id, segment_id);
        if self.finalized.contains_key(&key) {
            return None;
        }
        let current = self.partials.get(&key).unwrap_or_default();
        let next = if text.chars().count() >= current.chars().count() {
            text.to_string()
        } else {
            current
        };
        self.partials.insert(key, next.clone());
        Some(next)
    }

    /// Drop accumulated text for a segment and remember that it is final.
    pub fn finalize(&self, call_id: &str, segment_id: &str) {
        let key = key(call_id, segment_id);
        self.partials.invalidate(&key);
        self.finalized.insert(key, ());
    }

    pub fn is_finalized(&self, call_id: &str, segment_id: &str) -> bool {
        self.finalized.contains_key(&key(call_id, segment_id))
    }

    /// Accumulated partial text, if any.
    pub fn pending(&self, call_id: &str, segment_id: &str) -> Option<String> {
        self.partials.get(&key(call_id, segment_id))
    }
}
