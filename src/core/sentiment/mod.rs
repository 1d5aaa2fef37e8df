//! Sentiment enrichment.
//!
//! Final participant segments get a categorical label (inline from the source
//! or from a [`SentimentScorer`]) and a weighted numeric score used by the
//! call state aggregates.

mod comprehend;
mod enricher;
mod scorer;
mod scoring;

pub use comprehend::ComprehendScorer;
pub use enricher::{SentimentConfig, SentimentEnricher};
pub use scorer::{SentimentDetection, SentimentScorer};
pub use scoring::{ScoringConfig, WeightedSentiment, weighted_sentiment};
