//! Configuration validation.

use super::ProcessorConfig;
use crate::errors::{ProcessorError, ProcessorResult};
use crate::utils::validate_endpoint_url;

fn invalid(message: String) -> ProcessorError {
    ProcessorError::Configuration(message)
}

/// Thresholds are raw confidences and must lie in `[0, 1]`.
pub(super) fn validate_sentiment(config: &ProcessorConfig) -> ProcessorResult<()> {
    for (name, value) in [
        ("SENTIMENT_POSITIVE_THRESHOLD", config.sentiment_positive_threshold),
        ("SENTIMENT_NEGATIVE_THRESHOLD", config.sentiment_negative_threshold),
    ] {
        if !(0.0..=1.0).contains(&value) {
            return Err(invalid(format!("{name} must be within [0, 1], got {value}")));
        }
    }
    if config.sentiment_scale_range.is_nan() || config.sentiment_scale_range <= 0.0 {
        return Err(invalid(format!(
            "SENTIMENT_SCALE_RANGE must be positive, got {}",
            config.sentiment_scale_range
        )));
    }
    if config.sentiment_language_code.is_empty() {
        return Err(invalid("SENTIMENT_LANGUAGE_CODE must not be empty".to_string()));
    }
    Ok(())
}

pub(super) fn validate_windows(config: &ProcessorConfig) -> ProcessorResult<()> {
    for (name, value) in [
        ("STATE_MAX_WINDOW_SECONDS", config.state_max_window_seconds),
        ("STATE_TTL_SECONDS", config.state_ttl_seconds),
        ("MAX_INACTIVITY_SECONDS", config.max_inactivity_seconds),
    ] {
        if value == 0 {
            return Err(invalid(format!("{name} must be greater than 0")));
        }
    }
    if config.state_partition_key.is_empty() {
        return Err(invalid("STATE_PARTITION_KEY must not be empty".to_string()));
    }
    Ok(())
}

pub(super) fn validate_retry(config: &ProcessorConfig) -> ProcessorResult<()> {
    if config.mutation_min_sleep_ms > config.mutation_max_sleep_ms {
        return Err(invalid(format!(
            "MUTATION_MIN_SLEEP_MS ({}) must not exceed MUTATION_MAX_SLEEP_MS ({})",
            config.mutation_min_sleep_ms, config.mutation_max_sleep_ms
        )));
    }
    Ok(())
}

pub(super) fn validate_endpoints(config: &ProcessorConfig) -> ProcessorResult<()> {
    for (name, url) in [
        ("GRAPHQL_ENDPOINT", config.graphql_endpoint.as_deref()),
        ("AGENT_ASSIST_URL", config.agent_assist_url.as_deref()),
    ] {
        if let Some(url) = url {
            validate_endpoint_url(url).map_err(|e| invalid(format!("{name}: {e}")))?;
        }
    }
    Ok(())
}

/// Run every check against a merged configuration.
pub(super) fn validate(config: &ProcessorConfig) -> ProcessorResult<()> {
    validate_sentiment(config)?;
    validate_windows(config)?;
    validate_retry(config)?;
    validate_endpoints(config)
}
