//! Scripted collaborators shared by unit tests.

use crate::alert::AlertNotification;
use crate::error::{AlertError, Result};
use crate::notify::{AudioPlayer, NotificationPlatform, PermissionStatus};
use crate::risk::{ClassificationRequest, RiskAssessment, RiskClassifier};
use crate::telemetry::{ProviderError, RawSample, TelemetryProvider};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// Raw sample in the default ThingSpeak layout.
pub fn sample_at(
    device_id: &str,
    ts: DateTime<Utc>,
    temperature: f64,
    humidity: f64,
    smoke: f64,
) -> RawSample {
    let mut fields = Map::new();
    fields.insert("created_at".into(), Value::String(ts.to_rfc3339()));
    fields.insert("field1".into(), Value::String(temperature.to_string()));
    fields.insert("field2".into(), Value::String(humidity.to_string()));
    fields.insert("field3".into(), Value::String(smoke.to_string()));
    RawSample::new(device_id, fields)
}

/// Returns queued results in order, then `NoData`.
pub struct ScriptedProvider {
    device_id: String,
    queue: Mutex<VecDeque<std::result::Result<RawSample, ProviderError>>>,
    delay: Mutex<Option<Duration>>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(device_id: &str) -> Self {
        Self {
            device_id: device_id.to_string(),
            queue: Mutex::new(VecDeque::new()),
            delay: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn push(&self, result: std::result::Result<RawSample, ProviderError>) {
        self.queue.lock().push_back(result);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TelemetryProvider for ScriptedProvider {
    async fn latest(&self) -> std::result::Result<RawSample, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.queue.lock().pop_front().unwrap_or(Err(ProviderError::NoData))
    }

    fn device_id(&self) -> &str {
        &self.device_id
    }
}

/// Returns queued assessments in order, then fails.
#[derive(Default)]
pub struct ScriptedClassifier {
    queue: Mutex<VecDeque<Result<RiskAssessment>>>,
    requests: Mutex<Vec<ClassificationRequest>>,
    delay: Mutex<Option<Duration>>,
}

impl ScriptedClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, result: Result<RiskAssessment>) {
        self.queue.lock().push_back(result);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn requests(&self) -> Vec<ClassificationRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl RiskClassifier for ScriptedClassifier {
    async fn classify(&self, request: &ClassificationRequest) -> Result<RiskAssessment> {
        self.requests.lock().push(request.clone());
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.queue
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(AlertError::ClassifierFailure("script exhausted".into())))
    }
}

pub struct RecordingPlatform {
    status: Mutex<PermissionStatus>,
    grant_on_request: AtomicBool,
    fail_present: AtomicBool,
    requests: AtomicUsize,
    prompt_delay: Mutex<Option<Duration>>,
    presented: Mutex<Vec<AlertNotification>>,
}

impl RecordingPlatform {
    pub fn new(status: PermissionStatus) -> Self {
        Self {
            status: Mutex::new(status),
            grant_on_request: AtomicBool::new(false),
            fail_present: AtomicBool::new(false),
            requests: AtomicUsize::new(0),
            prompt_delay: Mutex::new(None),
            presented: Mutex::new(Vec::new()),
        }
    }

    pub fn grant_on_request(&self, grant: bool) {
        self.grant_on_request.store(grant, Ordering::SeqCst);
    }

    pub fn fail_present(&self, fail: bool) {
        self.fail_present.store(fail, Ordering::SeqCst);
    }

    /// Keep the permission prompt open for `delay` before answering.
    pub fn set_prompt_delay(&self, delay: Duration) {
        *self.prompt_delay.lock() = Some(delay);
    }

    pub fn permission_requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn presented(&self) -> Vec<AlertNotification> {
        self.presented.lock().clone()
    }
}

#[async_trait]
impl NotificationPlatform for RecordingPlatform {
    async fn permission_status(&self) -> PermissionStatus {
        *self.status.lock()
    }

    async fn request_permission(&self) -> PermissionStatus {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let delay = *self.prompt_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.grant_on_request.load(Ordering::SeqCst) {
            *self.status.lock() = PermissionStatus::Granted;
        }
        *self.status.lock()
    }

    async fn present(&self, notification: &AlertNotification) -> Result<()> {
        if self.fail_present.load(Ordering::SeqCst) {
            return Err(AlertError::PresentationFailure("platform refused".into()));
        }
        self.presented.lock().push(notification.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingAudio {
    plays: AtomicUsize,
    stops: AtomicUsize,
    fail_next: AtomicBool,
}

impl RecordingAudio {
    pub fn plays(&self) -> usize {
        self.plays.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn fail_next_play(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

impl AudioPlayer for RecordingAudio {
    fn play(&self) -> Result<()> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(AlertError::Audio("device busy".into()));
        }
        self.plays.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}
