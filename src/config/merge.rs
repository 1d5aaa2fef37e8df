//! Merging YAML overrides onto the environment configuration.

use super::ProcessorConfig;
use super::env;
use super::yaml::YamlConfig;
use crate::errors::ProcessorResult;

/// Overwrite `target` when `value` is present.
fn set<T>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

/// Like [`set`] for optional settings.
fn set_opt<T>(target: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *target = value;
    }
}

/// Load the environment configuration and apply `yaml` on top.
pub(super) fn merge_config(yaml: Option<YamlConfig>) -> ProcessorResult<ProcessorConfig> {
    let mut config = env::from_env()?;
    let Some(yaml) = yaml else {
        return Ok(config);
    };

    if let Some(aws) = yaml.aws {
        set_opt(&mut config.aws.region, aws.region);
        set_opt(&mut config.aws.access_key_id, aws.access_key_id);
        set_opt(&mut config.aws.secret_access_key, aws.secret_access_key);
        set_opt(&mut config.aws.session_token, aws.session_token);
    }

    if let Some(state) = yaml.state {
        set_opt(&mut config.state_table_name, state.table_name);
        set(&mut config.state_partition_key, state.partition_key);
        set(&mut config.state_max_window_seconds, state.max_window_seconds);
        set(&mut config.state_ttl_seconds, state.ttl_seconds);
        set(
            &mut config.state_compression_threshold_bytes,
            state.compression_threshold_bytes,
        );
        set(&mut config.max_inactivity_seconds, state.max_inactivity_seconds);
    }

    if let Some(sentiment) = yaml.sentiment {
        set(&mut config.sentiment_enabled, sentiment.enabled);
        set(&mut config.sentiment_scale_range, sentiment.scale_range);
        set(
            &mut config.sentiment_positive_threshold,
            sentiment.positive_threshold,
        );
        set(
            &mut config.sentiment_negative_threshold,
            sentiment.negative_threshold,
        );
        set(&mut config.sentiment_language_code, sentiment.language_code);
        set(&mut config.sentiment_cache_capacity, sentiment.cache_capacity);
        set(
            &mut config.sentiment_cache_ttl_seconds,
            sentiment.cache_ttl_seconds,
        );
    }

    if let Some(graphql) = yaml.graphql {
        set_opt(&mut config.graphql_endpoint, graphql.endpoint);
        set_opt(&mut config.graphql_api_key, graphql.api_key);
        set(&mut config.graphql_timeout_seconds, graphql.timeout_seconds);
        set(&mut config.mutation_max_retries, graphql.max_retries);
        set(&mut config.mutation_min_sleep_ms, graphql.min_sleep_ms);
        set(&mut config.mutation_max_sleep_ms, graphql.max_sleep_ms);
    }

    if let Some(normalizer) = yaml.normalizer {
        set(
            &mut config.partial_cache_capacity,
            normalizer.partial_cache_capacity,
        );
        set(
            &mut config.partial_cache_ttl_seconds,
            normalizer.partial_cache_ttl_seconds,
        );
        set(
            &mut config.segment_expiration_days,
            normalizer.segment_expiration_days,
        );
    }

    if let Some(assist) = yaml.agent_assist {
        set_opt(&mut config.agent_assist_url, assist.url);
        set(&mut config.agent_assist_timeout_seconds, assist.timeout_seconds);
    }

    Ok(config)
}
