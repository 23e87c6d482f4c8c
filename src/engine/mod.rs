//! Per-device alerting pipeline.
//!
//! One [`AlertEngine`] owns the whole pipeline for a single device/channel:
//! fetch → normalize → deduplicate → classify → gate → dispatch. The engine
//! is driven one tick at a time, either directly through [`AlertEngine::tick_at`]
//! or by the periodic loop started with [`AlertEngine::spawn`].

pub mod handle;
pub mod status;

pub use handle::EngineHandle;
pub use status::{EngineEvent, EngineStatus};

use crate::alert::{AlertGateConfig, AlertGateState, GateDecision, SuppressReason};
use crate::config::{AlertingConfig, InvalidSamplePolicy};
use crate::error::{AlertError, Result};
use crate::notify::{DispatchReceipt, NotificationDispatcher};
use crate::risk::{ClassifierAdapter, RiskLevel};
use crate::telemetry::{Deduplicator, Normalizer, RawSample, SensorReading, TelemetryFetcher};
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Settings the host may change while the engine runs.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub poll_interval: Duration,
    pub gate: AlertGateConfig,
    pub cue_duration: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            gate: AlertGateConfig::default(),
            cue_duration: Duration::from_millis(10_000),
        }
    }
}

impl From<&AlertingConfig> for EngineSettings {
    fn from(config: &AlertingConfig) -> Self {
        Self {
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            gate: AlertGateConfig {
                threshold: config.risk_threshold,
                cooldown: Duration::from_secs(config.cooldown_secs),
                required_consecutive_high: config.required_consecutive_high,
            },
            cue_duration: Duration::from_millis(config.cue_duration_ms),
        }
    }
}

impl EngineSettings {
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(AlertError::Config("poll interval must be non-zero".into()));
        }
        if self.gate.required_consecutive_high == 0 {
            return Err(AlertError::Config(
                "required consecutive high-risk count must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Result of one completed tick.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Sample not newer than the last accepted one.
    Duplicate,
    Suppressed {
        level: RiskLevel,
        reason: SuppressReason,
    },
    Notified {
        level: RiskLevel,
        receipt: DispatchReceipt,
    },
}

const VALIDATION_CAUSE: &str = "validation";

pub struct AlertEngine {
    fetcher: TelemetryFetcher,
    normalizer: Normalizer,
    dedup: Deduplicator,
    classifier: ClassifierAdapter,
    gate: AlertGateState,
    dispatcher: NotificationDispatcher,
    invalid_sample_policy: InvalidSamplePolicy,
    settings: EngineSettings,
    status: Arc<RwLock<EngineStatus>>,
    events: broadcast::Sender<EngineEvent>,
}

impl AlertEngine {
    const EVENT_CAPACITY: usize = 64;

    pub fn new(
        fetcher: TelemetryFetcher,
        classifier: ClassifierAdapter,
        mut dispatcher: NotificationDispatcher,
        settings: EngineSettings,
    ) -> Self {
        dispatcher.set_cue_duration(settings.cue_duration);
        let (events, _) = broadcast::channel(Self::EVENT_CAPACITY);
        let status = Arc::new(RwLock::new(EngineStatus::new(fetcher.device_id())));

        Self {
            fetcher,
            normalizer: Normalizer::default(),
            dedup: Deduplicator::new(),
            classifier,
            gate: AlertGateState::new(settings.gate.clone()),
            dispatcher,
            invalid_sample_policy: InvalidSamplePolicy::default(),
            settings,
            status,
            events,
        }
    }

    pub fn with_normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn with_invalid_sample_policy(mut self, policy: InvalidSamplePolicy) -> Self {
        self.invalid_sample_policy = policy;
        self
    }

    pub fn device_id(&self) -> &str {
        self.fetcher.device_id()
    }

    pub fn gate_state(&self) -> &AlertGateState {
        &self.gate
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn status(&self) -> EngineStatus {
        self.status.read().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Apply new settings. Gate counters and cooldown history are kept.
    /// Returns `true` if the poll interval changed.
    pub fn apply_settings(&mut self, settings: EngineSettings) -> bool {
        let interval_changed = settings.poll_interval != self.settings.poll_interval;
        self.gate.set_config(settings.gate.clone());
        self.dispatcher.set_cue_duration(settings.cue_duration);
        info!(
            "[Engine] {} settings updated: interval={:?} threshold={} cooldown={:?} required={}",
            self.device_id(),
            settings.poll_interval,
            settings.gate.threshold,
            settings.gate.cooldown,
            settings.gate.required_consecutive_high
        );
        self.settings = settings;
        interval_changed
    }

    /// Stop any playing audio cue.
    pub fn stop_cue(&self) {
        self.dispatcher.audio().stop_cue();
    }

    fn emit(&self, event: EngineEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn reading_from(&self, raw: &RawSample, now: DateTime<Utc>) -> Result<SensorReading> {
        match self.normalizer.normalize(raw) {
            Ok(reading) => Ok(reading),
            Err(e) => match self.invalid_sample_policy {
                InvalidSamplePolicy::AbortTick => Err(e.into()),
                InvalidSamplePolicy::SubstituteFallback => {
                    warn!(
                        "[Engine] {} invalid sample ({}); evaluating fallback reading",
                        self.device_id(),
                        e
                    );
                    let fallback = RawSample::fallback(raw.device_id(), now);
                    Ok(self.normalizer.normalize(&fallback)?)
                }
            },
        }
    }

    /// Run one pipeline pass with an explicit clock.
    ///
    /// Fallback readings are always evaluated and never recorded by the
    /// deduplicator.
    pub async fn tick_at(&mut self, now: DateTime<Utc>) -> Result<TickOutcome> {
        let fetched = self.fetcher.fetch_at(now).await?;
        let fetch_cause = fetched.fallback_cause();
        let reading = self.reading_from(&fetched.into_sample(), now)?;

        if reading.is_fallback() {
            // No fetch cause means the fallback replaced an invalid sample
            let cause = fetch_cause.unwrap_or(VALIDATION_CAUSE);
            self.emit(EngineEvent::FallbackUsed {
                device_id: self.device_id().to_string(),
                cause,
            });
        } else if !self.dedup.accept(&reading) {
            debug!(
                "[Engine] {} sample at {} already processed",
                self.device_id(),
                reading.timestamp()
            );
            return Ok(TickOutcome::Duplicate);
        }

        let assessment = self.classifier.classify(&reading).await?;
        let level = assessment.level;
        {
            let mut status = self.status.write();
            status.last_reading = Some(reading);
            status.last_assessment = Some(assessment.clone());
        }

        let decision = self.gate.evaluate(&assessment, self.fetcher.device_id(), now);
        self.status.write().record_gate(&self.gate);

        let notification = match decision {
            GateDecision::Suppress(reason) => {
                debug!("[Engine] {} {} suppressed: {:?}", self.device_id(), level, reason);
                return Ok(TickOutcome::Suppressed { level, reason });
            }
            GateDecision::Notify(notification) => notification,
        };

        match self.dispatcher.dispatch(&notification).await {
            Ok(receipt) => {
                self.status.write().notifications_sent += 1;
                self.emit(EngineEvent::Notified {
                    notification,
                    cue_started: receipt.cue_started,
                });
                Ok(TickOutcome::Notified { level, receipt })
            }
            Err(AlertError::PermissionDenied) => {
                self.emit(EngineEvent::PermissionDenied {
                    device_id: self.device_id().to_string(),
                    level,
                });
                Err(AlertError::PermissionDenied)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn tick(&mut self) -> Result<TickOutcome> {
        self.tick_at(Utc::now()).await
    }

    /// One tick with all errors contained: logged, recorded and published.
    pub async fn poll_once(&mut self) -> Option<TickOutcome> {
        let now = Utc::now();
        let result = self.tick_at(now).await;

        let mut status = self.status.write();
        status.ticks += 1;
        status.last_tick_at = Some(now);

        match result {
            Ok(outcome) => {
                status.last_error = None;
                Some(outcome)
            }
            Err(e) => {
                status.last_error = Some(e.to_string());
                drop(status);
                match &e {
                    AlertError::PermissionDenied => {
                        warn!("[Engine] {} alert not shown: {}", self.device_id(), e)
                    }
                    _ => {
                        error!("[Engine] {} tick aborted: {}", self.device_id(), e);
                        self.emit(EngineEvent::TickFailed {
                            device_id: self.device_id().to_string(),
                            kind: e.kind(),
                            message: e.to_string(),
                        });
                    }
                }
                None
            }
        }
    }
}
