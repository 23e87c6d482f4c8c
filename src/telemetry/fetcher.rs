//! Telemetry fetching with timeout and fallback.
//!
//! A timeout, or a provider explicitly reporting that it has no sample,
//! yields the fallback sample so the pipeline always has something to
//! evaluate. Every other provider failure is a hard `FetchFailure`.

use super::normalizer::RawSample;
use crate::error::{AlertError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider request timed out")]
    Timeout,

    /// Provider answered but has no sample for the channel.
    #[error("provider has no data")]
    NoData,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("provider returned HTTP {0}")]
    Status(u16),

    #[error("malformed provider payload: {0}")]
    Malformed(String),
}

/// Pull endpoint for the most recent raw sample of one channel.
#[async_trait]
pub trait TelemetryProvider: Send + Sync {
    async fn latest(&self) -> std::result::Result<RawSample, ProviderError>;

    /// Device identifier used for fallback samples.
    fn device_id(&self) -> &str;
}

/// Fallback cause label for a provider that answered without a sample.
pub const NO_DATA: &str = "no_data";

/// What a fetch produced.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Live(RawSample),
    /// Fallback sample standing in for a provider sample; `cause` is the
    /// label of the failure it recovered from.
    Fallback {
        sample: RawSample,
        cause: &'static str,
    },
}

impl FetchOutcome {
    pub fn sample(&self) -> &RawSample {
        match self {
            FetchOutcome::Live(sample) => sample,
            FetchOutcome::Fallback { sample, .. } => sample,
        }
    }

    pub fn fallback_cause(&self) -> Option<&'static str> {
        match self {
            FetchOutcome::Live(_) => None,
            FetchOutcome::Fallback { cause, .. } => Some(*cause),
        }
    }

    pub fn into_sample(self) -> RawSample {
        match self {
            FetchOutcome::Live(sample) => sample,
            FetchOutcome::Fallback { sample, .. } => sample,
        }
    }
}

pub struct TelemetryFetcher {
    provider: Arc<dyn TelemetryProvider>,
    timeout: Duration,
}

impl TelemetryFetcher {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(provider: Arc<dyn TelemetryProvider>) -> Self {
        Self {
            provider,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn device_id(&self) -> &str {
        self.provider.device_id()
    }

    /// Fetch with the wall clock as the fallback timestamp.
    pub async fn fetch(&self) -> Result<FetchOutcome> {
        self.fetch_at(Utc::now()).await
    }

    /// Fetch the latest sample; a fallback sample is stamped with `now`.
    pub async fn fetch_at(&self, now: DateTime<Utc>) -> Result<FetchOutcome> {
        let outcome = match tokio::time::timeout(self.timeout, self.provider.latest()).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout),
        };

        match outcome {
            Ok(sample) => {
                debug!("[Telemetry] {} sample fetched", self.device_id());
                Ok(FetchOutcome::Live(sample))
            }
            Err(ProviderError::Timeout) => {
                let cause = AlertError::FetchTimeout;
                warn!(
                    "[Telemetry] {}: {} after {:?}; using fallback sample",
                    self.device_id(),
                    cause,
                    self.timeout
                );
                Ok(FetchOutcome::Fallback {
                    sample: RawSample::fallback(self.device_id(), now),
                    cause: cause.kind(),
                })
            }
            Err(ProviderError::NoData) => {
                warn!(
                    "[Telemetry] {}: provider has no data; using fallback sample",
                    self.device_id()
                );
                Ok(FetchOutcome::Fallback {
                    sample: RawSample::fallback(self.device_id(), now),
                    cause: NO_DATA,
                })
            }
            Err(e) => Err(AlertError::FetchFailure(e.to_string())),
        }
    }
}

/// HTTP provider for a ThingSpeak-style `feeds/last.json` endpoint.
pub struct HttpTelemetryProvider {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    device_id: String,
}

impl HttpTelemetryProvider {
    pub fn new(
        base_url: &str,
        channel: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AlertError::Config(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: format!(
                "{}/channels/{}/feeds/last.json",
                base_url.trim_end_matches('/'),
                channel
            ),
            api_key,
            device_id: channel.to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Turns a provider body into a raw sample. ThingSpeak answers `-1` for an
/// empty channel.
pub(crate) fn parse_feed(
    device_id: &str,
    body: &str,
) -> std::result::Result<RawSample, ProviderError> {
    let value: Value = serde_json::from_str(body.trim())
        .map_err(|e| ProviderError::Malformed(e.to_string()))?;

    match value {
        Value::Object(fields) if fields.is_empty() => Err(ProviderError::NoData),
        Value::Object(fields) => Ok(RawSample::new(device_id, fields)),
        Value::Number(n) if n.as_i64() == Some(-1) => Err(ProviderError::NoData),
        other => Err(ProviderError::Malformed(format!(
            "expected JSON object, got {}",
            other
        ))),
    }
}

#[async_trait]
impl TelemetryProvider for HttpTelemetryProvider {
    async fn latest(&self) -> std::result::Result<RawSample, ProviderError> {
        let mut request = self.client.get(&self.url);
        if let Some(key) = &self.api_key {
            request = request.query(&[("api_key", key)]);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout
            } else {
                ProviderError::Transport(e.to_string())
            }
        })?;

        if !response.status().is_success() {
            return Err(ProviderError::Status(response.status().as_u16()));
        }

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout
            } else {
                ProviderError::Transport(e.to_string())
            }
        })?;

        parse_feed(&self.device_id, &body)
    }

    fn device_id(&self) -> &str {
        &self.device_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedProvider;
    use chrono::TimeZone;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_live_sample_passes_through() {
        let sample = parse_feed("station-1", r#"{"created_at":"2024-07-01T12:00:00Z"}"#).unwrap();
        let provider = Arc::new(ScriptedProvider::new("station-1"));
        provider.push(Ok(sample.clone()));

        let fetched = assert_ok!(TelemetryFetcher::new(provider).fetch().await);
        assert_eq!(fetched, FetchOutcome::Live(sample));
        assert_eq!(fetched.fallback_cause(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_yields_fallback() {
        let provider = Arc::new(ScriptedProvider::new("station-1"));
        provider.set_delay(Duration::from_secs(30));

        let fetcher = TelemetryFetcher::new(provider).with_timeout(Duration::from_secs(10));
        let now = Utc.with_ymd_and_hms(2024, 7, 1, 12, 0, 0).unwrap();
        let fetched = assert_ok!(fetcher.fetch_at(now).await);
        assert_eq!(fetched.fallback_cause(), Some("fetch_timeout"));
        assert_eq!(fetched.sample(), &RawSample::fallback("station-1", now));
    }

    #[tokio::test]
    async fn test_no_data_yields_fallback() {
        let provider = Arc::new(ScriptedProvider::new("station-1"));
        provider.push(Err(ProviderError::NoData));

        let fetched = assert_ok!(TelemetryFetcher::new(provider).fetch().await);
        assert_eq!(fetched.fallback_cause(), Some(NO_DATA));
        assert!(fetched.into_sample().is_fallback());
    }

    #[tokio::test]
    async fn test_malformed_is_hard_failure() {
        let provider = Arc::new(ScriptedProvider::new("station-1"));
        provider.push(Err(ProviderError::Malformed("bad".into())));
        provider.push(Err(ProviderError::Status(503)));

        let fetcher = TelemetryFetcher::new(provider);
        let err = assert_err!(fetcher.fetch().await);
        assert!(matches!(err, AlertError::FetchFailure(_)));
        let err = assert_err!(fetcher.fetch().await);
        assert!(err.to_string().contains("503"));
    }

    #[test]
    fn test_parse_feed_shapes() {
        assert!(matches!(parse_feed("c", "-1"), Err(ProviderError::NoData)));
        assert!(matches!(parse_feed("c", "{}"), Err(ProviderError::NoData)));
        assert!(matches!(parse_feed("c", "[1,2]"), Err(ProviderError::Malformed(_))));
        assert!(matches!(parse_feed("c", "<html>"), Err(ProviderError::Malformed(_))));

        let sample = parse_feed("c", r#"{"field1":"21.0"}"#).unwrap();
        assert_eq!(sample.get("field1"), Some(&Value::String("21.0".into())));
    }

    #[test]
    fn test_http_provider_url() {
        let provider = HttpTelemetryProvider::new(
            "https://api.thingspeak.com/",
            "12345",
            None,
            Duration::from_secs(10),
        )
        .unwrap();
        assert_eq!(
            provider.url(),
            "https://api.thingspeak.com/channels/12345/feeds/last.json"
        );
        assert_eq!(provider.device_id(), "12345");
    }
}
