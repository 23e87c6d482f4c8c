//! Adapter around the external risk classification service.
//!
//! The adapter only flattens a reading into the classifier's parameters and
//! forwards failures unchanged. No retry, no caching.

use super::assessment::{RiskAssessment, RiskLevel};
use crate::error::{AlertError, Result};
use crate::telemetry::SensorReading;
use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Flat parameter set sent to the classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationRequest {
    pub temperature: f64,
    pub humidity: f64,
    pub smoke_level: f64,
    pub air_quality: f64,
    pub wind_speed: f64,
    pub wind_direction: f64,
    pub pressure: f64,
    pub uv_index: f64,
    pub soil_moisture: f64,
    pub rainfall: f64,
}

impl From<&SensorReading> for ClassificationRequest {
    fn from(reading: &SensorReading) -> Self {
        let s = reading.secondary();
        Self {
            temperature: reading.temperature(),
            humidity: reading.humidity(),
            smoke_level: reading.smoke_level(),
            air_quality: s.air_quality,
            wind_speed: s.wind_speed,
            wind_direction: s.wind_direction,
            pressure: s.pressure,
            uv_index: s.uv_index,
            soil_moisture: s.soil_moisture,
            rainfall: s.rainfall,
        }
    }
}

/// Wire shape of a classifier answer.
#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierResponse {
    pub risk_level: String,
    pub confidence_score: f64,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

impl TryFrom<ClassifierResponse> for RiskAssessment {
    type Error = AlertError;

    fn try_from(response: ClassifierResponse) -> Result<Self> {
        let level: RiskLevel = response.risk_level.trim().parse().map_err(|_| {
            AlertError::ClassifierFailure(format!("unknown risk level: {}", response.risk_level))
        })?;
        if !(0.0..=1.0).contains(&response.confidence_score) {
            return Err(AlertError::ClassifierFailure(format!(
                "confidence out of range: {}",
                response.confidence_score
            )));
        }
        Ok(RiskAssessment::new(level, response.confidence_score)
            .with_recommendations(response.recommendations))
    }
}

/// External classification capability.
#[async_trait]
pub trait RiskClassifier: Send + Sync {
    async fn classify(&self, request: &ClassificationRequest) -> Result<RiskAssessment>;
}

pub struct ClassifierAdapter {
    classifier: Arc<dyn RiskClassifier>,
    timeout: Duration,
}

impl ClassifierAdapter {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(classifier: Arc<dyn RiskClassifier>) -> Self {
        Self {
            classifier,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn classify(&self, reading: &SensorReading) -> Result<RiskAssessment> {
        let request = ClassificationRequest::from(reading);
        debug!("[Classifier] request for {}: {:?}", reading.device_id(), request);

        match tokio::time::timeout(self.timeout, self.classifier.classify(&request)).await {
            Ok(Ok(assessment)) => Ok(assessment),
            Ok(Err(AlertError::ClassifierFailure(msg))) => Err(AlertError::ClassifierFailure(msg)),
            Ok(Err(other)) => Err(AlertError::ClassifierFailure(other.to_string())),
            Err(_) => Err(AlertError::ClassifierFailure(format!(
                "no answer within {:?}",
                self.timeout
            ))),
        }
    }
}

/// Classifier service reached over HTTP (`POST {base_url}/predict`).
pub struct HttpRiskClassifier {
    client: reqwest::Client,
    url: String,
}

impl HttpRiskClassifier {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AlertError::Config(format!("HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url: format!("{}/predict", base_url.trim_end_matches('/')),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl RiskClassifier for HttpRiskClassifier {
    async fn classify(&self, request: &ClassificationRequest) -> Result<RiskAssessment> {
        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| AlertError::ClassifierFailure(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AlertError::ClassifierFailure(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        let body: ClassifierResponse = response
            .json()
            .await
            .map_err(|e| AlertError::ClassifierFailure(format!("bad response: {}", e)))?;

        RiskAssessment::try_from(body)
    }
}
