// Transport - Playback control and state management
// Two states: Stopped (current step -1) and Running (step cycling through the grid)

use crate::audio::{AudioEngine, AudioError, AudioSession, ClockTime};
use crate::messaging::channels::{StepEvent, StepEventConsumer, StepEventProducer};
use crate::sequencer::instrument::{InstrumentCatalog, Timbre};
use crate::sequencer::scheduler::{SharedGrid, StepScheduler};
use crate::sequencer::timeline::{Subdivision, Tempo};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Transport state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    #[default]
    Stopped,
    Running,
}

impl TransportState {
    pub fn is_playing(&self) -> bool {
        matches!(self, TransportState::Running)
    }
}

/// Point-in-time copy of the transport state
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportSnapshot {
    pub is_playing: bool,
    /// -1 when stopped
    pub current_step: i64,
    pub tempo_bpm: f64,
}

/// Shared transport state
/// Thread-safe via atomics for communication with the clock callback
#[derive(Debug)]
pub struct SharedTransportState {
    playing: AtomicBool,
    current_step: AtomicI64,
    tempo_bits: AtomicU64,
}

impl SharedTransportState {
    /// Create new shared transport state
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Get current transport state
    pub fn state(&self) -> TransportState {
        if self.playing.load(Ordering::Acquire) {
            TransportState::Running
        } else {
            TransportState::Stopped
        }
    }

    /// Step last played, -1 when stopped
    pub fn current_step(&self) -> i64 {
        self.current_step.load(Ordering::Acquire)
    }

    pub fn set_current_step(&self, step: usize) {
        self.current_step.store(step as i64, Ordering::Release);
    }

    /// Tempo read by the scheduler on every callback
    pub fn tempo(&self) -> Tempo {
        let bpm = f64::from_bits(self.tempo_bits.load(Ordering::Acquire));
        Tempo::clamped(bpm, Tempo::MIN_BPM, Tempo::MAX_BPM)
    }

    pub fn set_tempo(&self, tempo: Tempo) {
        self.tempo_bits
            .store(tempo.bpm().to_bits(), Ordering::Release);
    }

    fn set_running(&self) {
        self.playing.store(true, Ordering::Release);
    }

    fn reset(&self) {
        self.playing.store(false, Ordering::Release);
        self.current_step.store(-1, Ordering::Release);
    }

    pub fn snapshot(&self) -> TransportSnapshot {
        TransportSnapshot {
            is_playing: self.state().is_playing(),
            current_step: self.current_step(),
            tempo_bpm: self.tempo().bpm(),
        }
    }
}

impl Default for SharedTransportState {
    fn default() -> Self {
        Self {
            playing: AtomicBool::new(false),
            current_step: AtomicI64::new(-1),
            tempo_bits: AtomicU64::new(Tempo::default().bpm().to_bits()),
        }
    }
}

/// Transport controller
/// Owns the audio engine binding and the voices of a running session
pub struct Transport<E: AudioEngine> {
    engine: E,
    shared_state: Arc<SharedTransportState>,
    session: Option<AudioSession>,
    step_events: Arc<Mutex<StepEventProducer>>,
}

impl<E: AudioEngine> Transport<E> {
    /// Create new transport
    pub fn new(engine: E, tempo: Tempo, step_events: StepEventProducer) -> Self {
        let shared_state = SharedTransportState::new();
        shared_state.set_tempo(tempo);
        Self {
            engine,
            shared_state,
            session: None,
            step_events: Arc::new(Mutex::new(step_events)),
        }
    }

    /// Get shared state (for the clock callback and UI polling)
    pub fn shared_state(&self) -> Arc<SharedTransportState> {
        Arc::clone(&self.shared_state)
    }

    pub fn state(&self) -> TransportState {
        self.shared_state.state()
    }

    pub fn snapshot(&self) -> TransportSnapshot {
        self.shared_state.snapshot()
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn now(&mut self) -> ClockTime {
        self.engine.clock().now()
    }

    /// Start playback
    ///
    /// Acquires one voice per instrument, installs the step callback and
    /// starts the clock. On failure every partial resource is released and
    /// the transport stays Stopped.
    pub fn start(
        &mut self,
        grid: &SharedGrid,
        catalog: &Arc<InstrumentCatalog>,
    ) -> Result<(), AudioError> {
        if self.state().is_playing() {
            return Ok(());
        }

        if self.session.is_none() {
            match AudioSession::acquire(&mut self.engine, catalog) {
                Ok(session) => self.session = Some(session),
                Err(e) => {
                    self.stop();
                    return Err(e);
                }
            }
        }
        let voices = match &self.session {
            Some(session) => session.voices(),
            None => return Err(AudioError::Clock("audio session missing".to_string())),
        };

        let tempo = self.shared_state.tempo();
        let scheduler = StepScheduler::new(
            Arc::clone(grid),
            Arc::clone(catalog),
            voices,
            self.shared_state(),
            Arc::clone(&self.step_events),
        );

        let clock = self.engine.clock();
        clock.set_tempo(tempo.bpm());
        if let Err(e) = clock.schedule_repeating(scheduler.into_callback(), Subdivision::Sixteenth)
        {
            warn!("failed to install step callback: {}", e);
            self.stop();
            return Err(e);
        }
        clock.start();

        self.shared_state.set_running();
        info!(bpm = tempo.bpm(), "transport started");
        Ok(())
    }

    /// Stop playback
    ///
    /// Safe in any state, including after a partially failed start.
    pub fn stop(&mut self) {
        let was_playing = self.state().is_playing();
        let clock = self.engine.clock();
        clock.cancel();
        clock.stop();
        self.shared_state.reset();
        // Dropping the session disposes its voices
        self.session = None;
        if was_playing {
            info!("transport stopped");
        }
    }

    pub fn tempo(&self) -> Tempo {
        self.shared_state.tempo()
    }

    /// Change tempo; applies to the running clock immediately
    pub fn set_tempo(&mut self, tempo: Tempo) {
        self.shared_state.set_tempo(tempo);
        if self.state().is_playing() {
            self.engine.clock().set_tempo(tempo.bpm());
        }
        debug!(bpm = tempo.bpm(), "tempo changed");
    }

    /// Play a short note for immediate feedback on an edit
    ///
    /// Uses a throwaway voice so it never interferes with playback voices.
    pub fn preview(&mut self, timbre: Timbre, pitch: &str) -> Result<(), AudioError> {
        // Thirty-second note: half a step
        let duration = self.tempo().step_duration_seconds() / 2.0;
        let mut voice = self.engine.create_voice(timbre)?;
        let now = self.engine.clock().now();
        voice.trigger(pitch, duration, now);
        voice.dispose();
        Ok(())
    }
}

impl<E: AudioEngine> Drop for Transport<E> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// UI-side playhead driven by step events
///
/// Events arrive as soon as the callback runs; each one is applied only when
/// the audio clock reaches its due time.
pub struct StepHighlighter {
    events: StepEventConsumer,
    pending: VecDeque<StepEvent>,
    current: Option<usize>,
}

impl StepHighlighter {
    pub fn new(events: StepEventConsumer) -> Self {
        Self {
            events,
            pending: VecDeque::new(),
            current: None,
        }
    }

    /// Apply every event due at or before `now` and return the highlighted step
    pub fn update(&mut self, now: ClockTime) -> Option<usize> {
        while let Some(event) = ringbuf::traits::Consumer::try_pop(&mut self.events) {
            self.pending.push_back(event);
        }
        while let Some(event) = self.pending.front() {
            if event.at > now {
                break;
            }
            self.current = Some(event.step);
            self.pending.pop_front();
        }
        self.current
    }

    pub fn current(&self) -> Option<usize> {
        self.current
    }

    /// Drop pending events and clear the highlight
    pub fn reset(&mut self) {
        while ringbuf::traits::Consumer::try_pop(&mut self.events).is_some() {}
        self.pending.clear();
        self.current = None;
    }
}
