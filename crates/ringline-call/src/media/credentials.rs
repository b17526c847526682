//! Session credential service: trait, HTTP adapter, and retry policy.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use ringline_common::{ChannelId, Identity};
use ringline_config::MediaConfig;
use tracing::{debug, warn};

use super::types::{CredentialError, SessionCredential};

/// Issues short-lived media credentials scoped to `(channel, identity)`.
#[async_trait]
pub trait CredentialService: Send + Sync {
    async fn request(
        &self,
        channel_id: &ChannelId,
        identity: &Identity,
    ) -> Result<SessionCredential, CredentialError>;
}

// ---------------------------------------------------------------------------
// HTTP adapter
// ---------------------------------------------------------------------------

/// `GET {url}?channel=..&identity=..` returning `{token, expires_at}`.
pub struct HttpCredentialService {
    http: reqwest::Client,
    url: String,
}

impl HttpCredentialService {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, CredentialError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CredentialError::Terminal(e.to_string()))?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }

    pub fn from_config(config: &MediaConfig) -> Result<Self, CredentialError> {
        Self::new(config.credential_url.clone(), config.request_timeout())
    }
}

#[async_trait]
impl CredentialService for HttpCredentialService {
    async fn request(
        &self,
        channel_id: &ChannelId,
        identity: &Identity,
    ) -> Result<SessionCredential, CredentialError> {
        debug!(channel = %channel_id, identity = %identity, "Requesting session credential");

        let response = self
            .http
            .get(&self.url)
            .query(&[
                ("channel", channel_id.as_str()),
                ("identity", identity.as_str()),
            ])
            .send()
            .await
            .map_err(|e| CredentialError::Transient(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(CredentialError::Transient(format!("HTTP {status}")));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let text = text.chars().take(200).collect::<String>();
            return Err(CredentialError::Terminal(format!("HTTP {status}: {text}")));
        }

        response
            .json::<SessionCredential>()
            .await
            .map_err(|e| CredentialError::Terminal(format!("malformed credential: {e}")))
    }
}

// ---------------------------------------------------------------------------
// Retry
// ---------------------------------------------------------------------------

/// Bounded exponential backoff for credential requests.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 4,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(4),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &MediaConfig) -> Self {
        Self {
            attempts: config.credential_attempts.max(1),
            base_delay: config.base_delay(),
            max_delay: config.max_delay(),
        }
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Request a credential, retrying transient failures per `policy`.
///
/// `on_retry` is called with the upcoming attempt number before each retry.
/// An already-expired credential counts as a transient failure.
pub async fn fetch_with_retry(
    service: &dyn CredentialService,
    channel_id: &ChannelId,
    identity: &Identity,
    policy: RetryPolicy,
    mut on_retry: impl FnMut(u32) + Send,
) -> Result<SessionCredential, CredentialError> {
    let attempts = policy.attempts.max(1);
    let mut last = String::new();

    for attempt in 1..=attempts {
        if attempt > 1 {
            let delay = policy.delay(attempt - 1);
            debug!(attempt, delay_ms = delay.as_millis() as u64, "Retrying credential request");
            on_retry(attempt);
            tokio::time::sleep(delay).await;
        }

        match service.request(channel_id, identity).await {
            Ok(credential) if credential.is_expired(Utc::now()) => {
                warn!(channel = %channel_id, attempt, "Received expired credential");
                last = "credential already expired".into();
            }
            Ok(credential) => return Ok(credential),
            Err(e) if e.is_transient() => {
                warn!(channel = %channel_id, attempt, error = %e, "Credential request failed");
                last = e.to_string();
            }
            Err(e) => return Err(e),
        }
    }

    Err(CredentialError::Exhausted { attempts, last })
}
