//! Headless platform adapters: alerts go to the log, the cue is a terminal bell.

use super::audio::AudioPlayer;
use super::dispatcher::{NotificationPlatform, PermissionStatus};
use crate::alert::AlertNotification;
use crate::error::Result;
use async_trait::async_trait;
use log::{info, warn};
use std::io::Write;

/// Logs alerts instead of showing them. Permission is always granted.
#[derive(Debug, Default)]
pub struct ConsoleNotifier;

#[async_trait]
impl NotificationPlatform for ConsoleNotifier {
    async fn permission_status(&self) -> PermissionStatus {
        PermissionStatus::Granted
    }

    async fn request_permission(&self) -> PermissionStatus {
        PermissionStatus::Granted
    }

    async fn present(&self, notification: &AlertNotification) -> Result<()> {
        warn!("[ALERT] {}: {}", notification.title(), notification.body());
        for rec in notification.recommendations.iter().skip(1) {
            info!("[ALERT]   - {}", rec);
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct ConsoleAudio;

impl AudioPlayer for ConsoleAudio {
    fn play(&self) -> Result<()> {
        let mut stderr = std::io::stderr();
        stderr.write_all(b"\x07")?;
        stderr.flush()?;
        info!("[Audio] alert tone on");
        Ok(())
    }

    fn stop(&self) {
        info!("[Audio] alert tone off");
    }
}
