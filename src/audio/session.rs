// Audio session - voices acquired on Start and released on Stop

use super::{AudioEngine, AudioError, Voice};
use crate::sequencer::instrument::InstrumentCatalog;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Voices shared between the transport and the step callback, one per instrument
pub type SharedVoices = Arc<Mutex<Vec<Box<dyn Voice>>>>;

/// Set of voices owned by a running transport
///
/// Voices are disposed when the session is dropped, so every exit path
/// (Stop, failed Start, teardown) releases them.
pub struct AudioSession {
    voices: SharedVoices,
}

impl AudioSession {
    /// Create one voice per instrument of the catalog
    ///
    /// On failure the voices created so far are disposed before the error is
    /// returned.
    pub fn acquire<E: AudioEngine + ?Sized>(
        engine: &mut E,
        catalog: &InstrumentCatalog,
    ) -> Result<Self, AudioError> {
        let mut voices: Vec<Box<dyn Voice>> = Vec::with_capacity(catalog.len());
        for instrument in catalog.iter() {
            match engine.create_voice(instrument.timbre) {
                Ok(voice) => voices.push(voice),
                Err(e) => {
                    warn!(instrument = %instrument.name, "voice acquisition failed: {}", e);
                    for voice in voices.iter_mut() {
                        voice.dispose();
                    }
                    return Err(e);
                }
            }
        }
        debug!(count = voices.len(), "audio voices acquired");
        Ok(Self {
            voices: Arc::new(Mutex::new(voices)),
        })
    }

    /// Handle for the step callback
    pub fn voices(&self) -> SharedVoices {
        Arc::clone(&self.voices)
    }

    pub fn voice_count(&self) -> usize {
        self.voices.lock().map(|v| v.len()).unwrap_or(0)
    }
}

impl Drop for AudioSession {
    fn drop(&mut self) {
        let mut voices = match self.voices.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        for mut voice in voices.drain(..) {
            voice.dispose();
        }
        debug!("audio voices released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::OfflineEngine;

    #[test]
    fn test_acquire_one_voice_per_instrument() {
        let mut engine = OfflineEngine::new();
        let catalog = InstrumentCatalog::chiptune();
        let session = AudioSession::acquire(&mut engine, &catalog).unwrap();
        assert_eq!(session.voice_count(), 3);
        assert_eq!(engine.handle().live_voices(), 3);

        drop(session);
        assert_eq!(engine.handle().live_voices(), 0);
    }

    #[test]
    fn test_partial_failure_disposes_created_voices() {
        let mut engine = OfflineEngine::new();
        engine.handle().fail_voice_after(2);
        let catalog = InstrumentCatalog::chiptune();

        let result = AudioSession::acquire(&mut engine, &catalog);
        assert!(matches!(result, Err(AudioError::VoiceCreation { .. })));
        assert_eq!(engine.handle().live_voices(), 0);
    }
}
