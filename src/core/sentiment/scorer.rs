use async_trait::async_trait;

use crate::core::events::{SentimentLabel, SentimentScores};
use crate::errors::ProcessorResult;

/// Label and raw per-label confidences returned by a scorer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SentimentDetection {
    pub label: SentimentLabel,
    pub scores: SentimentScores,
}

/// External sentiment detection capability.
#[async_trait]
pub trait SentimentScorer: Send + Sync {
    /// Detect the sentiment of `text` written in `language_code`.
    async fn detect_sentiment(
        &self,
        text: &str,
        language_code: &str,
    ) -> ProcessorResult<SentimentDetection>;
}
