//! Bounded-retry health verification against a freshly started service.
//!
//! Success criterion is exactly HTTP 200. Connection-level failures are
//! treated as "not ready yet" and retried; any other status is logged and
//! retried; the budget is `RetryPolicy::max_attempts` attempts separated by
//! `interval`.

use crate::error::ProvisionError;
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use std::time::Duration;

/// Outcome of a single probe attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// HTTP 200
    Ok,
    /// Reachable but not healthy
    Status(u16),
    /// Connection-level failure; the service is not listening yet
    ConnectionFailed,
}

/// A single synchronous health probe.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn get(&self) -> ProbeOutcome;

    /// Human-readable target for logs and error reports.
    fn target(&self) -> String;
}

/// Plain HTTP GET probe.
pub struct HttpProbe {
    url: String,
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new(url: impl Into<String>) -> Result<Self, ProvisionError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| ProvisionError::Runtime(format!("http client: {e}")))?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn get(&self) -> ProbeOutcome {
        match self.client.get(&self.url).send().await {
            Ok(response) if response.status().as_u16() == 200 => ProbeOutcome::Ok,
            Ok(response) => ProbeOutcome::Status(response.status().as_u16()),
            Err(_) => ProbeOutcome::ConnectionFailed,
        }
    }

    fn target(&self) -> String {
        self.url.clone()
    }
}

/// Bounded-retry loop over a [`Probe`].
pub struct HealthChecker {
    policy: RetryPolicy,
}

impl HealthChecker {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Probe until 200 or the attempt budget is exhausted.
    pub async fn probe(&self, probe: &dyn Probe) -> Result<(), ProvisionError> {
        let target = probe.target();
        for attempt in 1..=self.policy.max_attempts {
            match probe.get().await {
                ProbeOutcome::Ok => {
                    tracing::info!(
                        "[HealthChecker] {} healthy (attempt {}/{})",
                        target,
                        attempt,
                        self.policy.max_attempts
                    );
                    return Ok(());
                }
                ProbeOutcome::Status(code) => {
                    tracing::warn!(
                        "[HealthChecker] {} returned HTTP {} (attempt {}/{})",
                        target,
                        code,
                        attempt,
                        self.policy.max_attempts
                    );
                }
                ProbeOutcome::ConnectionFailed => {
                    tracing::debug!(
                        "[HealthChecker] {} not reachable yet (attempt {}/{})",
                        target,
                        attempt,
                        self.policy.max_attempts
                    );
                }
            }
            if attempt < self.policy.max_attempts {
                tokio::time::sleep(self.policy.interval).await;
            }
        }
        Err(ProvisionError::HealthCheckFailed {
            url: target,
            attempts: self.policy.max_attempts,
        })
    }
}
