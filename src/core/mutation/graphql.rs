//! GraphQL-over-HTTP mutation gateway.
//!
//! Error classification:
//!
//! | Response | Error |
//! |----------|-------|
//! | connect/timeout failure, 429, 5xx | `TransientMutation` (retried) |
//! | GraphQL `errorType` containing `ConditionalCheckFailed` | `IgnorableConflict` |
//! | GraphQL `errorType` containing `Throttl` | `TransientMutation` |
//! | any other GraphQL error or 4xx | `MutationRejected` |

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};
use url::Url;

use super::{Mutation, MutationGateway};
use crate::errors::{ProcessorError, ProcessorResult};
use crate::utils::validate_endpoint_url;

const PROBE_QUERY: &str = "query Probe { __typename }";
const USER_AGENT: &str = concat!("call-event-processor/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct GraphQlGatewayConfig {
    pub endpoint: String,
    /// Sent as `x-api-key` when set.
    pub api_key: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphQlError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    error_type: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GraphQlGateway {
    client: Client,
    endpoint: Url,
    api_key: Option<String>,
}

impl GraphQlGateway {
    /// Build the gateway and verify the endpoint answers a trivial query.
    ///
    /// Fails with `Configuration` when the URL is invalid or the probe fails,
    /// so a misconfigured endpoint is caught before any batch is processed.
    pub async fn connect(config: GraphQlGatewayConfig) -> ProcessorResult<Self> {
        let endpoint = validate_endpoint_url(&config.endpoint)
            .map_err(|e| ProcessorError::Configuration(format!("GRAPHQL_ENDPOINT: {e}")))?;

        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| {
                ProcessorError::Configuration(format!("Failed to build HTTP client: {e}"))
            })?;

        let gateway = Self {
            client,
            endpoint,
            api_key: config.api_key,
        };

        gateway
            .post("probe", PROBE_QUERY, &json!({}))
            .await
            .map_err(|e| {
                ProcessorError::Configuration(format!(
                    "GraphQL endpoint {} failed the startup probe: {e}",
                    gateway.endpoint
                ))
            })?;
        info!(endpoint = %gateway.endpoint, "Connected to GraphQL endpoint");

        Ok(gateway)
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn post(&self, operation: &str, query: &str, variables: &Value) -> ProcessorResult<Value> {
        let mut request = self
            .client
            .post(self.endpoint.clone())
            .json(&json!({ "query": query, "variables": variables }));
        if let Some(api_key) = self.api_key.as_deref() {
            request = request.header("x-api-key", api_key);
        }

        let response = request.send().await.map_err(|e| {
            ProcessorError::TransientMutation(format!("{operation}: request failed: {e}"))
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            ProcessorError::TransientMutation(format!("{operation}: failed to read response: {e}"))
        })?;

        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(ProcessorError::TransientMutation(format!(
                "{operation}: HTTP {status}: {body}"
            )));
        }
        if !status.is_success() {
            return Err(ProcessorError::MutationRejected {
                mutation: operation.to_string(),
                message: format!("HTTP {status}: {body}"),
            });
        }

        let parsed: GraphQlResponse = serde_json::from_str(&body).map_err(|e| {
            ProcessorError::Serialization(format!("{operation}: invalid GraphQL response: {e}"))
        })?;

        if let Some(error) = parsed.errors.first() {
            return Err(classify_error(operation, error, parsed.errors.len()));
        }

        parsed.data.ok_or_else(|| ProcessorError::MutationRejected {
            mutation: operation.to_string(),
            message: "response carried no data".to_string(),
        })
    }
}

fn classify_error(operation: &str, error: &GraphQlError, count: usize) -> ProcessorError {
    let error_type = error.error_type.as_deref().unwrap_or_default();
    let message = if count > 1 {
        format!("{} (+{} more)", error.message, count - 1)
    } else {
        error.message.clone()
    };

    if error_type.contains("ConditionalCheckFailed") {
        ProcessorError::IgnorableConflict(format!("{operation}: {message}"))
    } else if error_type.contains("Throttl") {
        ProcessorError::TransientMutation(format!("{operation}: {error_type}: {message}"))
    } else {
        ProcessorError::MutationRejected {
            mutation: operation.to_string(),
            message: if error_type.is_empty() {
                message
            } else {
                format!("{error_type}: {message}")
            },
        }
    }
}

#[async_trait]
impl MutationGateway for GraphQlGateway {
    async fn execute(&self, mutation: &Mutation) -> ProcessorResult<Value> {
        let operation = mutation.kind.field_name();
        debug!(
            mutation = operation,
            call_id = mutation.call_id().unwrap_or_default(),
            "Executing mutation"
        );
        self.post(operation, mutation.kind.document(), &mutation.variables)
            .await
    }
}
