use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::{Mutation, MutationGateway, MutationKind};
use crate::errors::{ProcessorError, ProcessorResult};

/// Backoff settings for transient mutation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    /// Default: 3
    pub max_retries: u32,
    /// Lower bound of every sleep.
    /// Default: 750ms
    pub min_sleep: Duration,
    /// Upper bound of every sleep.
    /// Default: 10s
    pub max_sleep: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            min_sleep: Duration::from_millis(750),
            max_sleep: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Sleep before retry number `attempt` (zero-based).
    ///
    /// The ceiling doubles each attempt from `min_sleep`, capped at
    /// `max_sleep`; the actual sleep is drawn uniformly between `min_sleep`
    /// and that ceiling.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let min = self.min_sleep.as_millis() as u64;
        let max = (self.max_sleep.as_millis() as u64).max(min);
        let ceiling = min
            .saturating_mul(1u64.checked_shl(attempt).unwrap_or(u64::MAX))
            .clamp(min, max);
        let millis = if ceiling > min {
            rand::rng().random_range(min..=ceiling)
        } else {
            min
        };
        Duration::from_millis(millis)
    }
}

/// Maps a failed mutation to a canned success value.
pub type IgnorePredicate = Arc<dyn Fn(&Mutation, &ProcessorError) -> Option<Value> + Send + Sync>;

/// Treats a duplicate `createCall` as success.
///
/// Returns `{"createCall": {"CallId": ..}}` for `IgnorableConflict` errors and
/// for rejections mentioning an existing record.
pub fn default_conflict_predicate() -> IgnorePredicate {
    Arc::new(|mutation: &Mutation, error: &ProcessorError| {
        if mutation.kind != MutationKind::CreateCall {
            return None;
        }
        let duplicate = match error {
            ProcessorError::IgnorableConflict(_) => true,
            ProcessorError::MutationRejected { message, .. } => {
                message.contains("ConditionalCheckFailed") || message.contains("already exists")
            }
            _ => false,
        };
        duplicate.then(|| {
            json!({ "createCall": { "CallId": mutation.call_id() } })
        })
    })
}

/// Wraps a gateway with bounded, jittered retries and an ignore hook.
pub struct RetryingGateway<G> {
    inner: G,
    policy: RetryPolicy,
    ignore: Option<IgnorePredicate>,
}

impl<G> RetryingGateway<G> {
    pub fn new(inner: G, policy: RetryPolicy) -> Self {
        Self {
            inner,
            policy,
            ignore: None,
        }
    }

    pub fn with_ignore(mut self, predicate: IgnorePredicate) -> Self {
        self.ignore = Some(predicate);
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl<G: MutationGateway> MutationGateway for RetryingGateway<G> {
    async fn execute(&self, mutation: &Mutation) -> ProcessorResult<Value> {
        let mut attempt = 0;
        loop {
            let error = match self.inner.execute(mutation).await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if let Some(canned) = self.ignore.as_ref().and_then(|ignore| ignore(mutation, &error)) {
                debug!(
                    mutation = %mutation.kind,
                    call_id = mutation.call_id().unwrap_or_default(),
                    error = %error,
                    "Ignoring mutation conflict"
                );
                return Ok(canned);
            }

            if !error.is_retryable() || attempt >= self.policy.max_retries {
                return Err(error);
            }

            let delay = self.policy.delay_for(attempt);
            attempt += 1;
            warn!(
                mutation = %mutation.kind,
                attempt,
                max_retries = self.policy.max_retries,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Retrying transient mutation failure"
            );
            tokio::time::sleep(delay).await;
        }
    }
}
