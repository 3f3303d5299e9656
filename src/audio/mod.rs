// Module audio - Interface to the sound engine that renders the grid
//
// The engine itself (oscillators, envelopes, output device) lives outside this
// crate. The core only creates voices, triggers them at audio-clock times and
// drives a repeating step callback.

pub mod offline;
pub mod session;

use crate::sequencer::instrument::Timbre;
use crate::sequencer::timeline::Subdivision;

pub use offline::{OfflineEngine, OfflineHandle, TriggerRecord};
pub use session::{AudioSession, SharedVoices};

/// Time on the audio clock, in seconds
pub type ClockTime = f64;

/// Repeating step callback, invoked with the due time of each step
pub type StepCallback = Box<dyn FnMut(ClockTime) + Send>;

/// Errors raised by the audio engine
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AudioError {
    #[error("Failed to create {timbre} voice: {reason}")]
    VoiceCreation { timbre: Timbre, reason: String },

    #[error("Audio clock unavailable: {0}")]
    Clock(String),
}

/// A playable voice bound to one timbre
pub trait Voice: Send {
    /// Fire-and-forget note trigger at an audio-clock time
    fn trigger(&mut self, pitch: &str, duration_secs: f64, at: ClockTime);

    /// Release the voice; further triggers are ignored
    fn dispose(&mut self);
}

/// Transport clock of the audio engine
pub trait AudioClock: Send {
    fn set_tempo(&mut self, bpm: f64);

    /// Install the repeating callback; replaces any previous one
    fn schedule_repeating(
        &mut self,
        callback: StepCallback,
        subdivision: Subdivision,
    ) -> Result<(), AudioError>;

    fn start(&mut self);

    fn stop(&mut self);

    /// Remove the repeating callback
    fn cancel(&mut self);

    /// Current audio-clock time
    fn now(&self) -> ClockTime;
}

/// Audio engine binding, resolved once when the session is built
pub trait AudioEngine: Send {
    fn create_voice(&mut self, timbre: Timbre) -> Result<Box<dyn Voice>, AudioError>;

    fn clock(&mut self) -> &mut dyn AudioClock;
}
