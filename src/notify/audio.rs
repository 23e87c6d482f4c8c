//! Timed audio cue accompanying high-band alerts.
//!
//! `Idle -> Playing -> Idle`. At most one cue plays at a time; the stop
//! timer is a spawned task guarded by a [`CancellationToken`] and a cue
//! generation, so a superseded timer can never stop a newer cue.

use crate::error::Result;
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Platform audio output. Only start/stop are used.
pub trait AudioPlayer: Send + Sync {
    fn play(&self) -> Result<()>;
    fn stop(&self);
}

#[derive(Debug, Default)]
struct AudioCueState {
    playing: bool,
    generation: u64,
    /// Cancellation handle of the pending stop timer
    timer: Option<CancellationToken>,
}

pub struct AudioController {
    player: Arc<dyn AudioPlayer>,
    state: Arc<Mutex<AudioCueState>>,
}

impl AudioController {
    pub const DEFAULT_CUE_DURATION: Duration = Duration::from_millis(10_000);

    pub fn new(player: Arc<dyn AudioPlayer>) -> Self {
        Self {
            player,
            state: Arc::new(Mutex::new(AudioCueState::default())),
        }
    }

    pub fn is_playing(&self) -> bool {
        self.state.lock().playing
    }

    /// Start a cue that stops itself after `duration`.
    ///
    /// Returns `false` without side effects if a cue is already playing, or
    /// if the player fails to start. Must be called within a tokio runtime.
    pub fn play_cue(&self, duration: Duration) -> bool {
        let mut state = self.state.lock();
        if state.playing {
            debug!("[Audio] cue already playing, ignoring request");
            return false;
        }

        if let Err(e) = self.player.play() {
            warn!("[Audio] failed to start cue: {}", e);
            return false;
        }

        state.playing = true;
        state.generation += 1;
        let generation = state.generation;
        let token = CancellationToken::new();
        state.timer = Some(token.clone());
        drop(state);

        info!("[Audio] cue started for {:?}", duration);

        let player = self.player.clone();
        let shared = self.state.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(duration) => {
                    let mut state = shared.lock();
                    if state.generation == generation && state.playing {
                        player.stop();
                        state.playing = false;
                        state.timer = None;
                        info!("[Audio] cue finished");
                    }
                }
            }
        });

        true
    }

    /// Stop any playing cue and cancel its timer. Safe to call when idle.
    pub fn stop_cue(&self) {
        let mut state = self.state.lock();
        if let Some(timer) = state.timer.take() {
            timer.cancel();
        }
        if state.playing {
            self.player.stop();
            state.playing = false;
            info!("[Audio] cue stopped");
        }
    }
}

impl Drop for AudioController {
    fn drop(&mut self) {
        self.stop_cue();
    }
}
