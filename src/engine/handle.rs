//! Periodic driver and host handle for a running engine.
//!
//! Ticks run inside the driver task one after another; a tick that outlasts
//! the interval causes missed ticks to be skipped, never overlapped.

use super::status::{EngineEvent, EngineStatus};
use super::{AlertEngine, EngineSettings};
use crate::error::Result;
use log::{error, info};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

fn poll_interval(period: Duration, immediate: bool) -> Interval {
    let start = if immediate {
        Instant::now()
    } else {
        Instant::now() + period
    };
    let mut interval = tokio::time::interval_at(start, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

pub struct EngineHandle {
    device_id: String,
    settings_tx: watch::Sender<EngineSettings>,
    cancel: CancellationToken,
    status: Arc<RwLock<EngineStatus>>,
    events: broadcast::Sender<EngineEvent>,
    task: JoinHandle<()>,
}

impl AlertEngine {
    /// Start the poll loop on the current tokio runtime. The first tick runs
    /// immediately.
    pub fn spawn(self) -> EngineHandle {
        let (settings_tx, settings_rx) = watch::channel(self.settings.clone());
        let cancel = CancellationToken::new();
        let device_id = self.device_id().to_string();
        let status = self.status.clone();
        let events = self.events.clone();

        let task = tokio::spawn(run(self, settings_rx, cancel.clone()));

        EngineHandle {
            device_id,
            settings_tx,
            cancel,
            status,
            events,
            task,
        }
    }
}

async fn run(
    mut engine: AlertEngine,
    mut settings_rx: watch::Receiver<EngineSettings>,
    cancel: CancellationToken,
) {
    info!(
        "[Engine] {} polling every {:?}",
        engine.device_id(),
        engine.settings().poll_interval
    );
    let mut interval = poll_interval(engine.settings().poll_interval, true);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            changed = settings_rx.changed() => {
                if changed.is_err() {
                    info!("[Engine] {} handle dropped", engine.device_id());
                    break;
                }
                let settings = settings_rx.borrow_and_update().clone();
                if engine.apply_settings(settings) {
                    // Only the timer restarts; gate state is untouched
                    interval = poll_interval(engine.settings().poll_interval, false);
                }
            }
            _ = interval.tick() => {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = engine.poll_once() => {}
                }
            }
        }
    }

    engine.stop_cue();
    info!("[Engine] {} stopped", engine.device_id());
}

impl EngineHandle {
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn settings(&self) -> EngineSettings {
        self.settings_tx.borrow().clone()
    }

    /// Change runtime settings. Rejected settings leave the engine unchanged.
    pub fn update_settings<F>(&self, update: F) -> Result<()>
    where
        F: FnOnce(&mut EngineSettings),
    {
        let mut settings = self.settings();
        update(&mut settings);
        settings.validate()?;
        self.settings_tx.send_replace(settings);
        Ok(())
    }

    pub fn status(&self) -> EngineStatus {
        self.status.read().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop the poll loop, abandoning any in-flight tick, and silence the cue.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            error!("[Engine] {} driver task failed: {}", self.device_id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::AlertGateConfig;
    use crate::error::AlertError;
    use crate::notify::{AudioController, NotificationDispatcher, PermissionStatus};
    use crate::risk::{ClassifierAdapter, RiskAssessment, RiskLevel};
    use crate::telemetry::TelemetryFetcher;
    use crate::testing::{
        RecordingAudio, RecordingPlatform, ScriptedClassifier, ScriptedProvider, sample_at,
    };
    use chrono::{TimeZone, Utc};

    const DEVICE: &str = "station-1";

    struct Rig {
        engine: AlertEngine,
        provider: Arc<ScriptedProvider>,
        classifier: Arc<ScriptedClassifier>,
        platform: Arc<RecordingPlatform>,
        audio: Arc<AudioController>,
        player: Arc<RecordingAudio>,
    }

    fn rig() -> Rig {
        rig_with(PermissionStatus::Granted)
    }

    fn rig_with(permission: PermissionStatus) -> Rig {
        let provider = Arc::new(ScriptedProvider::new(DEVICE));
        let classifier = Arc::new(ScriptedClassifier::new());
        let platform = Arc::new(RecordingPlatform::new(permission));
        let player = Arc::new(RecordingAudio::default());
        let audio = Arc::new(AudioController::new(player.clone()));

        let engine = AlertEngine::new(
            TelemetryFetcher::new(provider.clone()),
            ClassifierAdapter::new(classifier.clone()),
            NotificationDispatcher::new(platform.clone(), audio.clone()),
            EngineSettings::default(),
        );

        Rig {
            engine,
            provider,
            classifier,
            platform,
            audio,
            player,
        }
    }

    fn hot_sample(secs: i64) -> crate::telemetry::RawSample {
        let ts = Utc.with_ymd_and_hms(2024, 7, 1, 12, 0, 0).unwrap()
            + chrono::Duration::seconds(secs);
        sample_at(DEVICE, ts, 44.0, 8.0, 510.0)
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_ticks_on_interval_and_shutdown_stops_cue() {
        let r = rig();
        r.provider.push(Ok(hot_sample(0)));
        r.provider.push(Ok(hot_sample(30)));
        r.classifier.push(Ok(RiskAssessment::new(RiskLevel::Critical, 0.95)));
        r.classifier.push(Ok(RiskAssessment::new(RiskLevel::Critical, 0.95)));

        let handle = r.engine.spawn();
        let mut events = handle.subscribe();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(handle.status().ticks, 1);
        assert_eq!(handle.status().consecutive_high, 1);

        tokio::time::sleep(Duration::from_secs(30)).await;
        let status = handle.status();
        assert_eq!(status.ticks, 2);
        assert_eq!(status.notifications_sent, 1);
        assert!(matches!(
            events.recv().await,
            Ok(EngineEvent::Notified {
                cue_started: true,
                ..
            })
        ));
        assert!(r.audio.is_playing());

        handle.shutdown().await;
        assert!(!r.audio.is_playing());
        assert_eq!(r.player.stops(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_change_restarts_timer_only() {
        let r = rig();
        r.provider.push(Ok(hot_sample(0)));
        r.classifier.push(Ok(RiskAssessment::new(RiskLevel::High, 0.8)));

        let handle = r.engine.spawn();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(handle.status().consecutive_high, 1);

        handle
            .update_settings(|s| s.poll_interval = Duration::from_secs(5))
            .unwrap();
        // Applying the change does not poll immediately
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(handle.status().ticks, 1);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(handle.status().ticks, 2);
        // Gate history survived the restart
        assert_eq!(handle.status().consecutive_high, 1);
        assert_eq!(handle.settings().poll_interval, Duration::from_secs(5));
        assert_eq!(r.provider.calls(), 2);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_classifier_never_overlaps_ticks() {
        let r = rig();
        r.classifier.set_delay(Duration::from_secs(45));
        let classifier = ClassifierAdapter::new(r.classifier.clone())
            .with_timeout(Duration::from_secs(60));
        let mut engine = r.engine;
        engine.classifier = classifier;
        r.provider.push(Ok(hot_sample(0)));
        r.provider.push(Ok(hot_sample(30)));

        let handle = engine.spawn();
        tokio::time::sleep(Duration::from_secs(40)).await;
        // First tick still waiting on the classifier
        assert_eq!(r.provider.calls(), 1);
        assert_eq!(handle.status().ticks, 0);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(handle.status().ticks, 1);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_abandons_pending_permission_prompt() {
        let r = rig_with(PermissionStatus::Undetermined);
        r.platform.grant_on_request(true);
        r.platform.set_prompt_delay(Duration::from_secs(120));
        r.provider.push(Ok(hot_sample(0)));
        r.classifier.push(Ok(RiskAssessment::new(RiskLevel::Critical, 0.95)));

        let mut engine = r.engine;
        engine.apply_settings(EngineSettings {
            gate: AlertGateConfig {
                required_consecutive_high: 1,
                ..AlertGateConfig::default()
            },
            ..EngineSettings::default()
        });

        let handle = engine.spawn();
        tokio::time::sleep(Duration::from_secs(5)).await;
        // Tick is parked on the permission prompt
        assert_eq!(r.platform.permission_requests(), 1);
        assert_eq!(handle.status().ticks, 0);

        handle.shutdown().await;

        // Prompt would have granted; the abandoned tick must not resume
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert!(r.platform.presented().is_empty());
        assert_eq!(r.player.plays(), 0);
        assert!(!r.audio.is_playing());
    }

    #[tokio::test]
    async fn test_invalid_settings_rejected() {
        let r = rig();
        let handle = r.engine.spawn();
        let err = handle
            .update_settings(|s| s.gate.required_consecutive_high = 0)
            .unwrap_err();
        assert!(matches!(err, AlertError::Config(_)));
        assert_eq!(handle.settings().gate.required_consecutive_high, 2);
        assert!(handle.is_running());
        handle.shutdown().await;
    }
}
