//! Environment variable loading.

use std::str::FromStr;

use super::{AwsSettings, ProcessorConfig};
use crate::errors::{ProcessorError, ProcessorResult};

/// Read a variable, treating empty values as unset.
pub(super) fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse a variable, falling back to `default` when unset.
pub(super) fn parse_env<T>(name: &str, default: T) -> ProcessorResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_var(name) {
        Some(raw) => raw
            .parse()
            .map_err(|e| ProcessorError::Configuration(format!("Invalid {name} '{raw}': {e}"))),
        None => Ok(default),
    }
}

/// Parse a boolean flag. Accepts `true/false`, `1/0`, `yes/no`, `on/off`.
pub(super) fn parse_bool_env(name: &str, default: bool) -> ProcessorResult<bool> {
    let Some(raw) = env_var(name) else {
        return Ok(default);
    };
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ProcessorError::Configuration(format!(
            "Invalid {name} '{raw}': expected a boolean"
        ))),
    }
}

/// Build a configuration from environment variables and defaults.
pub(super) fn from_env() -> ProcessorResult<ProcessorConfig> {
    let defaults = ProcessorConfig::default();

    Ok(ProcessorConfig {
        aws: AwsSettings {
            region: env_var("AWS_REGION"),
            access_key_id: env_var("AWS_ACCESS_KEY_ID"),
            secret_access_key: env_var("AWS_SECRET_ACCESS_KEY"),
            session_token: env_var("AWS_SESSION_TOKEN"),
        },

        state_table_name: env_var("STATE_TABLE_NAME"),
        state_partition_key: env_var("STATE_PARTITION_KEY")
            .unwrap_or(defaults.state_partition_key),
        state_max_window_seconds: parse_env(
            "STATE_MAX_WINDOW_SECONDS",
            defaults.state_max_window_seconds,
        )?,
        state_ttl_seconds: parse_env("STATE_TTL_SECONDS", defaults.state_ttl_seconds)?,
        state_compression_threshold_bytes: parse_env(
            "STATE_COMPRESSION_THRESHOLD_BYTES",
            defaults.state_compression_threshold_bytes,
        )?,
        max_inactivity_seconds: parse_env(
            "MAX_INACTIVITY_SECONDS",
            defaults.max_inactivity_seconds,
        )?,

        sentiment_enabled: parse_bool_env("SENTIMENT_ENABLED", defaults.sentiment_enabled)?,
        sentiment_scale_range: parse_env("SENTIMENT_SCALE_RANGE", defaults.sentiment_scale_range)?,
        sentiment_positive_threshold: parse_env(
            "SENTIMENT_POSITIVE_THRESHOLD",
            defaults.sentiment_positive_threshold,
        )?,
        sentiment_negative_threshold: parse_env(
            "SENTIMENT_NEGATIVE_THRESHOLD",
            defaults.sentiment_negative_threshold,
        )?,
        sentiment_language_code: env_var("SENTIMENT_LANGUAGE_CODE")
            .unwrap_or(defaults.sentiment_language_code),
        sentiment_cache_capacity: parse_env(
            "SENTIMENT_CACHE_CAPACITY",
            defaults.sentiment_cache_capacity,
        )?,
        sentiment_cache_ttl_seconds: parse_env(
            "SENTIMENT_CACHE_TTL_SECONDS",
            defaults.sentiment_cache_ttl_seconds,
        )?,

        graphql_endpoint: env_var("GRAPHQL_ENDPOINT"),
        graphql_api_key: env_var("GRAPHQL_API_KEY"),
        graphql_timeout_seconds: parse_env(
            "GRAPHQL_TIMEOUT_SECONDS",
            defaults.graphql_timeout_seconds,
        )?,
        mutation_max_retries: parse_env("MUTATION_MAX_RETRIES", defaults.mutation_max_retries)?,
        mutation_min_sleep_ms: parse_env("MUTATION_MIN_SLEEP_MS", defaults.mutation_min_sleep_ms)?,
        mutation_max_sleep_ms: parse_env("MUTATION_MAX_SLEEP_MS", defaults.mutation_max_sleep_ms)?,

        partial_cache_capacity: parse_env(
            "PARTIAL_CACHE_CAPACITY",
            defaults.partial_cache_capacity,
        )?,
        partial_cache_ttl_seconds: parse_env(
            "PARTIAL_CACHE_TTL_SECONDS",
            defaults.partial_cache_ttl_seconds,
        )?,
        segment_expiration_days: parse_env(
            "SEGMENT_EXPIRATION_DAYS",
            defaults.segment_expiration_days,
        )?,

        agent_assist_url: env_var("AGENT_ASSIST_URL"),
        agent_assist_timeout_seconds: parse_env(
            "AGENT_ASSIST_TIMEOUT_SECONDS",
            defaults.agent_assist_timeout_seconds,
        )?,
    })
}
