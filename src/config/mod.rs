//! Configuration module for the call event processor
//!
//! Configuration comes from .env files, environment variables and an optional
//! YAML file. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//!
//! # Example
//! ```rust,no_run
//! use call_event_processor::config::ProcessorConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ProcessorConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let config = ProcessorConfig::from_file(&config_path)?;
//!
//! println!("State table: {:?}", config.state_table_name);
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

mod env;
mod merge;
mod validation;
mod yaml;

use crate::core::events::NormalizerConfig;
use crate::core::mutation::{GraphQlGatewayConfig, RetryPolicy};
use crate::core::sentiment::{ScoringConfig, SentimentConfig};
use crate::core::state::{AggregatorConfig, StateStoreConfig};
use crate::errors::{ProcessorError, ProcessorResult};

/// AWS region and optional static credentials.
///
/// When the keys are absent the SDK default provider chain is used.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AwsSettings {
    pub region: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
}

impl std::fmt::Debug for AwsSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsSettings")
            .field("region", &self.region)
            .field("access_key_id", &self.access_key_id)
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "<redacted>"),
            )
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Processor configuration
///
/// Contains everything needed to run one processor instance:
/// - AWS settings
/// - Durable state (table, window, TTL, compression)
/// - Sentiment scoring
/// - Mutation gateway and retry policy
/// - Normalizer caches
/// - Agent assist webhook
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessorConfig {
    pub aws: AwsSettings,

    // Durable state
    /// Unset means the in-memory backend.
    pub state_table_name: Option<String>,
    pub state_partition_key: String,
    pub state_max_window_seconds: u64,
    pub state_ttl_seconds: u64,
    pub state_compression_threshold_bytes: usize,
    pub max_inactivity_seconds: u64,

    // Sentiment
    pub sentiment_enabled: bool,
    pub sentiment_scale_range: f64,
    pub sentiment_positive_threshold: f64,
    pub sentiment_negative_threshold: f64,
    pub sentiment_language_code: String,
    pub sentiment_cache_capacity: u64,
    pub sentiment_cache_ttl_seconds: u64,

    // Mutation gateway
    pub graphql_endpoint: Option<String>,
    pub graphql_api_key: Option<String>,
    pub graphql_timeout_seconds: u64,
    pub mutation_max_retries: u32,
    pub mutation_min_sleep_ms: u64,
    pub mutation_max_sleep_ms: u64,

    // Normalizer
    pub partial_cache_capacity: u64,
    pub partial_cache_ttl_seconds: u64,
    pub segment_expiration_days: u32,

    // Agent assist
    /// Unset disables dispatch.
    pub agent_assist_url: Option<String>,
    pub agent_assist_timeout_seconds: u64,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            aws: AwsSettings::default(),
            state_table_name: None,
            state_partition_key: "CallEventProcessorState".to_string(),
            state_max_window_seconds: 900,
            state_ttl_seconds: 86_400,
            state_compression_threshold_bytes: 102_400,
            max_inactivity_seconds: 1200,
            sentiment_enabled: true,
            sentiment_scale_range: 5.0,
            sentiment_positive_threshold: 0.4,
            sentiment_negative_threshold: 0.4,
            sentiment_language_code: "en".to_string(),
            sentiment_cache_capacity: 10_000,
            sentiment_cache_ttl_seconds: 3600,
            graphql_endpoint: None,
            graphql_api_key: None,
            graphql_timeout_seconds: 10,
            mutation_max_retries: 3,
            mutation_min_sleep_ms: 750,
            mutation_max_sleep_ms: 10_000,
            partial_cache_capacity: 10_000,
            partial_cache_ttl_seconds: 3600,
            segment_expiration_days: 90,
            agent_assist_url: None,
            agent_assist_timeout_seconds: 10,
        }
    }
}

impl ProcessorConfig {
    /// Load configuration from environment variables and defaults.
    ///
    /// The .env file is loaded in `main` at startup, so its values are
    /// visible here as ordinary environment variables.
    pub fn from_env() -> ProcessorResult<Self> {
        let config = merge::merge_config(None)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// # Errors
    /// Returns a configuration error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &PathBuf) -> ProcessorResult<Self> {
        let yaml_config = yaml::YamlConfig::from_file(path).map_err(ProcessorError::Configuration)?;
        let config = merge::merge_config(Some(yaml_config))?;
        validation::validate(&config)?;
        Ok(config)
    }

    pub fn normalizer_config(&self) -> NormalizerConfig {
        NormalizerConfig {
            partial_cache_capacity: self.partial_cache_capacity,
            partial_cache_ttl: Duration::from_secs(self.partial_cache_ttl_seconds),
            segment_expiration_days: self.segment_expiration_days,
        }
    }

    pub fn sentiment_config(&self) -> SentimentConfig {
        SentimentConfig {
            scoring: ScoringConfig {
                scale_range: self.sentiment_scale_range,
                positive_threshold: self.sentiment_positive_threshold,
                negative_threshold: self.sentiment_negative_threshold,
            },
            language_code: self.sentiment_language_code.clone(),
            cache_capacity: self.sentiment_cache_capacity,
            cache_ttl: Duration::from_secs(self.sentiment_cache_ttl_seconds),
        }
    }

    pub fn state_store_config(&self) -> StateStoreConfig {
        StateStoreConfig {
            partition_key: self.state_partition_key.clone(),
            max_window_seconds: self.state_max_window_seconds,
            ttl_seconds: self.state_ttl_seconds,
            compression_threshold_bytes: self.state_compression_threshold_bytes,
        }
    }

    pub fn aggregator_config(&self) -> AggregatorConfig {
        AggregatorConfig {
            max_inactivity_seconds: self.max_inactivity_seconds,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.mutation_max_retries,
            min_sleep: Duration::from_millis(self.mutation_min_sleep_ms),
            max_sleep: Duration::from_millis(self.mutation_max_sleep_ms),
        }
    }

    /// Gateway settings, or an error when no endpoint is configured.
    pub fn graphql_config(&self) -> ProcessorResult<GraphQlGatewayConfig> {
        let endpoint = self.graphql_endpoint.clone().ok_or_else(|| {
            ProcessorError::Configuration("GRAPHQL_ENDPOINT is required".to_string())
        })?;
        Ok(GraphQlGatewayConfig {
            endpoint,
            api_key: self.graphql_api_key.clone(),
            timeout: Duration::from_secs(self.graphql_timeout_seconds),
        })
    }

    pub fn agent_assist_timeout(&self) -> Duration {
        Duration::from_secs(self.agent_assist_timeout_seconds)
    }
}
