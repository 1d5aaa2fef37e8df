//! Amazon Comprehend sentiment scorer.

use async_trait::async_trait;
use aws_sdk_comprehend::Client as ComprehendClient;
use aws_sdk_comprehend::error::DisplayErrorContext;
use aws_sdk_comprehend::types::LanguageCode;

use super::scorer::{SentimentDetection, SentimentScorer};
use crate::core::events::{SentimentLabel, SentimentScores};
use crate::errors::{ProcessorError, ProcessorResult};

/// Comprehend rejects documents above this many UTF-8 bytes.
pub const MAX_TEXT_BYTES: usize = 5000;

#[derive(Debug, Clone)]
pub struct ComprehendScorer {
    client: ComprehendClient,
}

impl ComprehendScorer {
    pub fn new(sdk_config: &aws_config::SdkConfig) -> Self {
        Self {
            client: ComprehendClient::new(sdk_config),
        }
    }
}

#[async_trait]
impl SentimentScorer for ComprehendScorer {
    async fn detect_sentiment(
        &self,
        text: &str,
        language_code: &str,
    ) -> ProcessorResult<SentimentDetection> {
        let output = self
            .client
            .detect_sentiment()
            .text(truncate_to_bytes(text, MAX_TEXT_BYTES))
            .language_code(LanguageCode::from(language_code))
            .send()
            .await
            .map_err(|e| ProcessorError::Scorer(DisplayErrorContext(&e).to_string()))?;

        let label = output
            .sentiment()
            .and_then(|s| SentimentLabel::parse(s.as_str()))
            .ok_or_else(|| ProcessorError::Scorer("response carried no sentiment".to_string()))?;

        let scores = output
            .sentiment_score()
            .map(|s| SentimentScores {
                positive: f64::from(s.positive().unwrap_or_default()),
                negative: f64::from(s.negative().unwrap_or_default()),
                neutral: f64::from(s.neutral().unwrap_or_default()),
                mixed: f64::from(s.mixed().unwrap_or_default()),
            })
            .unwrap_or_else(|| SentimentScores::certain(label));

        Ok(SentimentDetection { label, scores })
    }
}

/// Longest prefix of `text` within `max` bytes that ends on a char boundary.
fn truncate_to_bytes(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate_to_bytes("hello", 10), "hello");
        assert_eq!(truncate_to_bytes("hello", 3), "hel");
        // "é" is two bytes
        assert_eq!(truncate_to_bytes("aé", 2), "a");
    }
}
