//! Sentiment aggregates: per-channel overall mean and time-quarter buckets.

use std::collections::BTreeMap;

use super::types::{CallSentiment, PerChannelState, QuarterBucket, SentimentEntry};
use crate::core::events::Channel;

pub const QUARTER_COUNT: usize = 4;

/// Recompute the full sentiment aggregate of one call.
///
/// Channels with an empty sentiment list are left out.
pub fn call_sentiment(channels: &BTreeMap<Channel, PerChannelState>) -> CallSentiment {
    let mut sentiment = CallSentiment::default();
    for (channel, state) in channels {
        if state.sentiment_list.is_empty() {
            continue;
        }
        sentiment
            .overall_sentiment
            .insert(*channel, mean(state.sentiment_list.iter().map(|e| e.score)));
        sentiment
            .sentiment_by_period
            .quarter
            .insert(*channel, quarter_buckets(&state.sentiment_list));
    }
    sentiment
}

/// Split the observed `[min begin, max end]` range into four equal intervals
/// and average the scores of entries whose end offset falls in each.
///
/// An entry belongs to the bucket `(lo, hi]` containing its end offset. Ends at
/// or before the range start, and every entry of a zero-width range, land in
/// the first bucket. Reported bounds are the min begin / max end of the
/// assigned entries, or zero for an empty bucket.
pub fn quarter_buckets(entries: &[SentimentEntry]) -> Vec<QuarterBucket> {
    if entries.is_empty() {
        return vec![QuarterBucket::default(); QUARTER_COUNT];
    }

    let mut sorted: Vec<&SentimentEntry> = entries.iter().collect();
    sorted.sort_by(|a, b| a.begin_offset_millis.total_cmp(&b.begin_offset_millis));

    let min_begin = sorted
        .iter()
        .map(|e| e.begin_offset_millis)
        .fold(f64::INFINITY, f64::min);
    let max_end = sorted
        .iter()
        .map(|e| e.end_offset_millis)
        .fold(f64::NEG_INFINITY, f64::max);
    let width = (max_end - min_begin) / QUARTER_COUNT as f64;

    let upper_bound = |index: usize| {
        if index + 1 == QUARTER_COUNT {
            max_end
        } else {
            min_begin + width * (index + 1) as f64
        }
    };

    let mut assigned: Vec<Vec<&SentimentEntry>> = vec![Vec::new(); QUARTER_COUNT];
    for entry in sorted {
        let end = entry.end_offset_millis;
        let index = if width <= 0.0 || end <= min_begin {
            0
        } else {
            (0..QUARTER_COUNT)
                .find(|&i| end <= upper_bound(i))
                .unwrap_or(QUARTER_COUNT - 1)
        };
        assigned[index].push(entry);
    }

    assigned
        .into_iter()
        .map(|bucket| {
            if bucket.is_empty() {
                return QuarterBucket::default();
            }
            QuarterBucket {
                begin_offset_millis: bucket
                    .iter()
                    .map(|e| e.begin_offset_millis)
                    .fold(f64::INFINITY, f64::min),
                end_offset_millis: bucket
                    .iter()
                    .map(|e| e.end_offset_millis)
                    .fold(f64::NEG_INFINITY, f64::max),
                score: mean(bucket.iter().map(|e| e.score)),
            }
        })
        .collect()
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}
