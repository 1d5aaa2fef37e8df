use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tracing::{debug, warn};
use xxhash_rust::xxh3::xxh3_64;

use super::scorer::{SentimentDetection, SentimentScorer};
use super::scoring::{ScoringConfig, weighted_sentiment};
use crate::core::events::{CanonicalTranscriptEvent, SentimentScores};

/// Enrichment settings.
#[derive(Debug, Clone)]
pub struct SentimentConfig {
    pub scoring: ScoringConfig,
    /// Language hint passed to the scorer.
    pub language_code: String,
    pub cache_capacity: u64,
    pub cache_ttl: Duration,
}

impl Default for SentimentConfig {
    fn default() -> Self {
        Self {
            scoring: ScoringConfig::default(),
            language_code: "en".to_string(),
            cache_capacity: 10_000,
            cache_ttl: Duration::from_secs(3600),
        }
    }
}

/// Attaches sentiment to final participant segments.
///
/// Inline labels from the source are used as-is. Otherwise the configured
/// scorer is called, with results cached by `(language, text)` hash so a
/// replayed segment does not hit the scorer twice.
#[derive(Clone)]
pub struct SentimentEnricher {
    scorer: Option<Arc<dyn SentimentScorer>>,
    cache: Cache<u64, SentimentDetection>,
    config: SentimentConfig,
}

impl std::fmt::Debug for SentimentEnricher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SentimentEnricher")
            .field("has_scorer", &self.scorer.is_some())
            .field("config", &self.config)
            .finish()
    }
}

impl SentimentEnricher {
    pub fn new(scorer: Option<Arc<dyn SentimentScorer>>, config: SentimentConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.cache_capacity)
            .time_to_live(config.cache_ttl)
            .build();
        Self {
            scorer,
            cache,
            config,
        }
    }

    /// Enricher that only applies inline labels.
    pub fn inline_only(config: SentimentConfig) -> Self {
        Self::new(None, config)
    }

    pub fn config(&self) -> &SentimentConfig {
        &self.config
    }

    /// Whether `event` needs an external scorer call.
    pub fn needs_scoring(&self, event: &CanonicalTranscriptEvent) -> bool {
        self.scorer.is_some()
            && !event.is_partial
            && event.channel.is_participant()
            && event.sentiment.is_none()
            && !event.transcript.trim().is_empty()
    }

    /// Weight an inline label already present on the event.
    ///
    /// Labels without raw scores are treated as fully confident.
    pub fn apply_inline(&self, event: &mut CanonicalTranscriptEvent) {
        let Some(label) = event.sentiment else {
            return;
        };
        if event.is_partial {
            return;
        }
        let scores = event
            .sentiment_score
            .unwrap_or_else(|| SentimentScores::certain(label));
        let weighted = weighted_sentiment(label, &scores, &self.config.scoring);
        event.sentiment = Some(weighted.label);
        event.sentiment_score = Some(scores);
        event.sentiment_weighted = weighted.score;
    }

    /// Return `event` with sentiment attached when possible.
    ///
    /// Scorer failures are logged and leave the event without sentiment.
    pub async fn enrich(&self, mut event: CanonicalTranscriptEvent) -> CanonicalTranscriptEvent {
        if event.sentiment.is_some() {
            self.apply_inline(&mut event);
            return event;
        }
        if !self.needs_scoring(&event) {
            return event;
        }

        match self.detect(&event.transcript).await {
            Ok(detection) => {
                let weighted =
                    weighted_sentiment(detection.label, &detection.scores, &self.config.scoring);
                debug!(
                    call_id = %event.call_id,
                    segment_id = %event.segment_id,
                    label = weighted.label.as_str(),
                    score = ?weighted.score,
                    "Sentiment detected"
                );
                event.sentiment = Some(weighted.label);
                event.sentiment_score = Some(detection.scores);
                event.sentiment_weighted = weighted.score;
            }
            Err(e) => {
                warn!(
                    call_id = %event.call_id,
                    segment_id = %event.segment_id,
                    error = %e,
                    "Sentiment detection failed, continuing without sentiment"
                );
            }
        }
        event
    }

    async fn detect(&self, text: &str) -> crate::errors::ProcessorResult<SentimentDetection> {
        let Some(scorer) = self.scorer.as_ref() else {
            return Err(crate::errors::ProcessorError::Scorer(
                "no sentiment scorer configured".to_string(),
            ));
        };

        let language = &self.config.language_code;
        let key = cache_key(language, text);
        if let Some(hit) = self.cache.get(&key).await {
            return Ok(hit);
        }

        let detection = scorer.detect_sentiment(text, language).await?;
        self.cache.insert(key, detection).await;
        Ok(detection)
    }
}

fn cache_key(language: &str, text: &str) -> u64 {
    let mut bytes = Vec::with_capacity(language.len() + text.len() + 1);
    bytes.extend_from_slice(language.as_bytes());
    bytes.push(0x1f);
    bytes.extend_from_slice(text.as_bytes());
    xxh3_64(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::events::{Channel, SentimentLabel, TRANSCRIBING_STATUS};
    use crate::errors::{ProcessorError, ProcessorResult};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedScorer {
        calls: AtomicUsize,
        detection: Option<SentimentDetection>,
    }

    #[async_trait]
    impl SentimentScorer for FixedScorer {
        async fn detect_sentiment(
            &self,
            _text: &str,
            _language_code: &str,
        ) -> ProcessorResult<SentimentDetection> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.detection
                .ok_or_else(|| ProcessorError::Scorer("throttled".to_string()))
        }
    }

    fn segment(channel: Channel, text: &str) -> CanonicalTranscriptEvent {
        CanonicalTranscriptEvent {
            call_id: "call-1".into(),
            channel,
            segment_id: "seg-1".into(),
            start_time: 0.0,
            end_time: 1.0,
            transcript: text.into(),
            is_partial: false,
            sentiment: None,
            sentiment_score: None,
            sentiment_weighted: None,
            issues_detected: None,
            created_at: "2024-05-01T12:00:00.000000Z".into(),
            expires_after: 0,
            status: TRANSCRIBING_STATUS.into(),
        }
    }

    fn enricher(detection: Option<SentimentDetection>) -> (SentimentEnricher, Arc<FixedScorer>) {
        let scorer = Arc::new(FixedScorer {
            calls: AtomicUsize::new(0),
            detection,
        });
        let enricher = SentimentEnricher::new(
            Some(scorer.clone() as Arc<dyn SentimentScorer>),
            SentimentConfig::default(),
        );
        (enricher, scorer)
    }

    #[tokio::test]
    async fn test_scorer_result_is_weighted_and_cached() {
        let (enricher, scorer) = enricher(Some(SentimentDetection {
            label: SentimentLabel::Positive,
            scores: SentimentScores {
                positive: 0.9,
                ..Default::default()
            },
        }));

        let first = enricher.enrich(segment(Channel::Caller, "thanks a lot")).await;
        assert_eq!(first.sentiment, Some(SentimentLabel::Positive));
        assert_eq!(first.sentiment_weighted, Some(4.5));

        let second = enricher.enrich(segment(Channel::Caller, "thanks a lot")).await;
        assert_eq!(second.sentiment_weighted, Some(4.5));
        assert_eq!(scorer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_inline_label_skips_scorer() {
        let (enricher, scorer) = enricher(None);
        let mut event = segment(Channel::Caller, "this is terrible");
        event.sentiment = Some(SentimentLabel::Negative);

        let enriched = enricher.enrich(event).await;
        assert_eq!(enriched.sentiment_weighted, Some(-5.0));
        assert_eq!(scorer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_scorer_failure_leaves_event_unscored() {
        let (enricher, scorer) = enricher(None);
        let enriched = enricher.enrich(segment(Channel::Agent, "hello")).await;
        assert!(enriched.sentiment.is_none());
        assert!(enriched.sentiment_weighted.is_none());
        assert_eq!(scorer.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_needs_scoring_filters() {
        let (enricher, _) = enricher(None);
        assert!(enricher.needs_scoring(&segment(Channel::Caller, "hi")));
        assert!(!enricher.needs_scoring(&segment(Channel::AgentAssistant, "hi")));
        assert!(!enricher.needs_scoring(&segment(Channel::Caller, "   ")));

        let mut partial = segment(Channel::Caller, "hi");
        partial.is_partial = true;
        assert!(!enricher.needs_scoring(&partial));

        let inline_only = SentimentEnricher::inline_only(SentimentConfig::default());
        assert!(!inline_only.needs_scoring(&segment(Channel::Caller, "hi")));
    }

    #[test]
    fn test_cache_key_separates_language() {
        assert_ne!(cache_key("en", "hola"), cache_key("es", "hola"));
    }
}
