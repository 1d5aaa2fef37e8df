//! Thresholded projection of a categorical label onto a numeric scale.

use crate::core::events::{SentimentLabel, SentimentScores};

/// Weighted scoring parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringConfig {
    /// Magnitude of a fully confident POSITIVE or NEGATIVE score.
    pub scale_range: f64,
    /// Minimum raw positive confidence for a POSITIVE label to count.
    pub positive_threshold: f64,
    /// Minimum raw negative confidence for a NEGATIVE label to count.
    /// A POSITIVE label whose raw negative confidence exceeds it is reclassified.
    pub negative_threshold: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            scale_range: 5.0,
            positive_threshold: 0.4,
            negative_threshold: 0.4,
        }
    }
}

/// Outcome of weighting one detection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedSentiment {
    /// Label after the negativity override.
    pub label: SentimentLabel,
    /// `None` for NEUTRAL/MIXED and for labels under their threshold.
    pub score: Option<f64>,
}

/// Compute the weighted score for a detected label.
///
/// ```
/// use call_event_processor::core::events::{SentimentLabel, SentimentScores};
/// use call_event_processor::core::sentiment::{ScoringConfig, weighted_sentiment};
///
/// let scores = SentimentScores { positive: 0.9, ..Default::default() };
/// let weighted = weighted_sentiment(SentimentLabel::Positive, &scores, &ScoringConfig::default());
/// assert_eq!(weighted.score, Some(4.5));
/// ```
pub fn weighted_sentiment(
    label: SentimentLabel,
    scores: &SentimentScores,
    config: &ScoringConfig,
) -> WeightedSentiment {
    let label = match label {
        SentimentLabel::Positive if scores.negative > config.negative_threshold => {
            SentimentLabel::Negative
        }
        other => other,
    };

    let score = match label {
        SentimentLabel::Positive if scores.positive >= config.positive_threshold => {
            Some(config.scale_range * scores.positive)
        }
        SentimentLabel::Negative if scores.negative >= config.negative_threshold => {
            Some(-config.scale_range * scores.negative)
        }
        _ => None,
    };

    WeightedSentiment { label, score }
}
