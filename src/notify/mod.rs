//! User-facing alert delivery: notifications and the audio cue.

pub mod audio;
pub mod console;
pub mod dispatcher;

pub use audio::{AudioController, AudioPlayer};
pub use console::{ConsoleAudio, ConsoleNotifier};
pub use dispatcher::{
    DispatchReceipt, NotificationDispatcher, NotificationPlatform, PermissionStatus,
};
