use serde::Deserialize;
use std::path::PathBuf;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present
/// here override the matching environment variables.
///
/// # Example YAML structure
/// ```yaml
/// aws:
///   region: "us-east-1"
///   access_key_id: "AKIA..."
///   secret_access_key: "secret"
///
/// state:
///   table_name: "CallEventProcessorState"
///   partition_key: "CallEventProcessorState"
///   max_window_seconds: 900
///   ttl_seconds: 86400
///   compression_threshold_bytes: 102400
///   max_inactivity_seconds: 1200
///
/// sentiment:
///   enabled: true
///   scale_range: 5
///   positive_threshold: 0.4
///   negative_threshold: 0.4
///   language_code: "en"
///   cache_capacity: 10000
///   cache_ttl_seconds: 3600
///
/// graphql:
///   endpoint: "https://example.appsync-api.us-east-1.amazonaws.com/graphql"
///   api_key: "da2-..."
///   timeout_seconds: 10
///   max_retries: 3
///   min_sleep_ms: 750
///   max_sleep_ms: 10000
///
/// normalizer:
///   partial_cache_capacity: 10000
///   partial_cache_ttl_seconds: 3600
///   segment_expiration_days: 90
///
/// agent_assist:
///   url: "https://assist.example.com/answer"
///   timeout_seconds: 10
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub aws: Option<AwsYaml>,
    pub state: Option<StateYaml>,
    pub sentiment: Option<SentimentYaml>,
    pub graphql: Option<GraphQlYaml>,
    pub normalizer: Option<NormalizerYaml>,
    pub agent_assist: Option<AgentAssistYaml>,
}

/// AWS credentials and region from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AwsYaml {
    pub region: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
}

/// Durable state settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct StateYaml {
    /// Unset means the in-memory backend.
    pub table_name: Option<String>,
    pub partition_key: Option<String>,
    pub max_window_seconds: Option<u64>,
    pub ttl_seconds: Option<u64>,
    pub compression_threshold_bytes: Option<usize>,
    pub max_inactivity_seconds: Option<u64>,
}

/// Sentiment scoring settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SentimentYaml {
    pub enabled: Option<bool>,
    pub scale_range: Option<f64>,
    pub positive_threshold: Option<f64>,
    pub negative_threshold: Option<f64>,
    pub language_code: Option<String>,
    pub cache_capacity: Option<u64>,
    pub cache_ttl_seconds: Option<u64>,
}

/// Mutation gateway settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct GraphQlYaml {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub max_retries: Option<u32>,
    pub min_sleep_ms: Option<u64>,
    pub max_sleep_ms: Option<u64>,
}

/// Normalizer settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct NormalizerYaml {
    pub partial_cache_capacity: Option<u64>,
    pub partial_cache_ttl_seconds: Option<u64>,
    pub segment_expiration_days: Option<u32>,
}

/// Agent assist webhook settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AgentAssistYaml {
    pub url: Option<String>,
    pub timeout_seconds: Option<u64>,
}

impl YamlConfig {
    /// Load YAML configuration from a file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or the YAML is malformed
    pub fn from_file(path: &PathBuf) -> Result<Self, String> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;

        serde_yaml::from_str(&contents).map_err(|e| format!("Failed to parse YAML config: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_yaml_config_full() {
        let yaml = r#"
aws:
  region: "us-west-2"
  access_key_id: "AKIATEST"
  secret_access_key: "secret"

state:
  table_name: "StateTable"
  partition_key: "Shard-1"
  max_window_seconds: 600
  ttl_seconds: 7200
  compression_threshold_bytes: 2048
  max_inactivity_seconds: 300

sentiment:
  enabled: false
  scale_range: 10
  positive_threshold: 0.5
  negative_threshold: 0.3
  language_code: "es"

graphql:
  endpoint: "https://api.example.com/graphql"
  api_key: "da2-key"
  timeout_seconds: 5
  max_retries: 5
  min_sleep_ms: 100
  max_sleep_ms: 2000

normalizer:
  segment_expiration_days: 30

agent_assist:
  url: "https://assist.example.com/answer"
  timeout_seconds: 3
"#;

        let config: YamlConfig = serde_yaml::from_str(yaml).unwrap();

        let aws = config.aws.as_ref().unwrap();
        assert_eq!(aws.region.as_deref(), Some("us-west-2"));
        assert!(aws.session_token.is_none());

        let state = config.state.as_ref().unwrap();
        assert_eq!(state.table_name.as_deref(), Some("StateTable"));
        assert_eq!(state.max_window_seconds, Some(600));
        assert_eq!(state.compression_threshold_bytes, Some(2048));

        let sentiment = config.sentiment.as_ref().unwrap();
        assert_eq!(sentiment.enabled, Some(false));
        assert_eq!(sentiment.scale_range, Some(10.0));
        assert!(sentiment.cache_capacity.is_none());

        let graphql = config.graphql.as_ref().unwrap();
        assert_eq!(graphql.max_retries, Some(5));
        assert_eq!(graphql.min_sleep_ms, Some(100));

        assert_eq!(
            config.normalizer.as_ref().unwrap().segment_expiration_days,
            Some(30)
        );
        assert_eq!(config.agent_assist.as_ref().unwrap().timeout_seconds, Some(3));
    }

    #[test]
    fn test_yaml_config_partial() {
        let yaml = r#"
graphql:
  endpoint: "https://api.example.com/graphql"
"#;

        let config: YamlConfig = serde_yaml::from_str(yaml).unwrap();

        assert!(config.graphql.as_ref().unwrap().api_key.is_none());
        assert!(config.state.is_none());
        assert!(config.sentiment.is_none());
    }

    #[test]
    fn test_yaml_config_empty() {
        let config: YamlConfig = serde_yaml::from_str("").unwrap();

        assert!(config.aws.is_none());
        assert!(config.state.is_none());
        assert!(config.sentiment.is_none());
        assert!(config.graphql.is_none());
        assert!(config.normalizer.is_none());
        assert!(config.agent_assist.is_none());
    }

    #[test]
    fn test_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        fs::write(
            &config_path,
            "state:\n  table_name: \"StateTable\"\n  ttl_seconds: 60\n",
        )
        .unwrap();

        let config = YamlConfig::from_file(&config_path).unwrap();
        let state = config.state.unwrap();
        assert_eq!(state.table_name.as_deref(), Some("StateTable"));
        assert_eq!(state.ttl_seconds, Some(60));
    }

    #[test]
    fn test_from_file_missing() {
        let err = YamlConfig::from_file(&PathBuf::from("/nonexistent/config.yaml")).unwrap_err();
        assert!(err.contains("Failed to read config file"));
    }

    #[test]
    fn test_from_file_invalid_yaml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(&config_path, "state: [unclosed").unwrap();

        let err = YamlConfig::from_file(&config_path).unwrap_err();
        assert!(err.contains("Failed to parse YAML config"));
    }
}
