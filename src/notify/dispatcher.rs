//! Notification dispatch: permission check, payload presentation and cue.

use super::audio::AudioController;
use crate::alert::{AlertNotification, NotificationId};
use crate::error::{AlertError, Result};
use async_trait::async_trait;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionStatus {
    Granted,
    Denied,
    Undetermined,
}

/// Platform notification and permission layer.
#[async_trait]
pub trait NotificationPlatform: Send + Sync {
    async fn permission_status(&self) -> PermissionStatus;
    async fn request_permission(&self) -> PermissionStatus;
    async fn present(&self, notification: &AlertNotification) -> Result<()>;
}

/// Outcome of a successful dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReceipt {
    pub id: NotificationId,
    pub cue_started: bool,
}

pub struct NotificationDispatcher {
    platform: Arc<dyn NotificationPlatform>,
    audio: Arc<AudioController>,
    cue_duration: Duration,
}

impl NotificationDispatcher {
    pub fn new(platform: Arc<dyn NotificationPlatform>, audio: Arc<AudioController>) -> Self {
        Self {
            platform,
            audio,
            cue_duration: AudioController::DEFAULT_CUE_DURATION,
        }
    }

    pub fn with_cue_duration(mut self, cue_duration: Duration) -> Self {
        self.cue_duration = cue_duration;
        self
    }

    pub fn set_cue_duration(&mut self, cue_duration: Duration) {
        self.cue_duration = cue_duration;
    }

    pub fn audio(&self) -> &Arc<AudioController> {
        &self.audio
    }

    /// Anything other than `Granted`, before or after asking, is a denial.
    async fn ensure_permission(&self) -> Result<()> {
        if self.platform.permission_status().await == PermissionStatus::Granted {
            return Ok(());
        }
        match self.platform.request_permission().await {
            PermissionStatus::Granted => Ok(()),
            status => {
                warn!("[Notify] notification permission not granted ({:?})", status);
                Err(AlertError::PermissionDenied)
            }
        }
    }

    pub async fn dispatch(&self, notification: &AlertNotification) -> Result<DispatchReceipt> {
        self.ensure_permission().await?;

        self.platform.present(notification).await.map_err(|e| match e {
            AlertError::PresentationFailure(msg) => AlertError::PresentationFailure(msg),
            other => AlertError::PresentationFailure(other.to_string()),
        })?;

        info!(
            "[Notify] {} alert {} presented for {}",
            notification.level, notification.id, notification.device_id
        );

        let cue_started = notification.wants_cue() && self.audio.play_cue(self.cue_duration);

        Ok(DispatchReceipt {
            id: notification.id,
            cue_started,
        })
    }
}
