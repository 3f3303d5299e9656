// Step scheduler - reads the grid on every clock callback and triggers voices
//
// The grid is never snapshotted: each callback takes a fresh read so edits
// made while playing are heard on the next pass through their step.

use crate::audio::{ClockTime, SharedVoices, StepCallback};
use crate::messaging::channels::{StepEvent, StepEventProducer};
use crate::sequencer::grid::NoteGrid;
use crate::sequencer::instrument::InstrumentCatalog;
use crate::sequencer::timeline::Tempo;
use crate::sequencer::transport::SharedTransportState;
use std::sync::{Arc, Mutex, RwLock};
use tracing::{trace, warn};

/// Grid shared between the session (writer) and the scheduler (reader)
pub type SharedGrid = Arc<RwLock<NoteGrid>>;

/// Sound trigger for one note head at one step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trigger {
    pub instrument: usize,
    pub pitch: usize,
    /// Sustain in steps after clamping to the end of the sequence
    pub steps: u32,
    pub duration_secs: f64,
}

/// Steps a note heard at `step` may sound for: at least one, never past the end
pub fn sounding_steps(duration: u32, step: usize, step_count: usize) -> u32 {
    let remaining = step_count.saturating_sub(step) as u32;
    duration.min(remaining).max(1)
}

/// Notes starting at `step`, with durations clamped to the sequence end
pub fn triggers_for_step(grid: &NoteGrid, step: usize, tempo: &Tempo) -> Vec<Trigger> {
    grid.heads_at(step)
        .map(|head| {
            let steps = sounding_steps(head.duration, step, grid.step_count());
            Trigger {
                instrument: head.instrument,
                pitch: head.pitch,
                steps,
                duration_secs: tempo.steps_to_seconds(steps as usize),
            }
        })
        .collect()
}

/// State carried by the repeating step callback
pub struct StepScheduler {
    grid: SharedGrid,
    catalog: Arc<InstrumentCatalog>,
    voices: SharedVoices,
    transport: Arc<SharedTransportState>,
    step_events: Arc<Mutex<StepEventProducer>>,
    /// Next step to play; wrapped against the current step count
    cursor: usize,
}

impl StepScheduler {
    pub fn new(
        grid: SharedGrid,
        catalog: Arc<InstrumentCatalog>,
        voices: SharedVoices,
        transport: Arc<SharedTransportState>,
        step_events: Arc<Mutex<StepEventProducer>>,
    ) -> Self {
        Self {
            grid,
            catalog,
            voices,
            transport,
            step_events,
            cursor: 0,
        }
    }

    /// Play one step due at `at`
    ///
    /// Returns the step played, or `None` when the grid could not be read.
    pub fn on_step(&mut self, at: ClockTime) -> Option<usize> {
        let grid = match self.grid.read() {
            Ok(grid) => grid,
            Err(_) => {
                warn!("grid lock poisoned, skipping step");
                return None;
            }
        };

        // The grid may have been resized since the previous callback
        let step_count = grid.step_count();
        let step = self.cursor % step_count;
        self.cursor = (step + 1) % step_count;

        self.transport.set_current_step(step);
        if let Ok(mut events) = self.step_events.lock() {
            if ringbuf::traits::Producer::try_push(&mut *events, StepEvent { step, at }).is_err() {
                trace!(step, "step event channel full");
            }
        }

        let tempo = self.transport.tempo();
        let triggers = triggers_for_step(&grid, step, &tempo);
        drop(grid);

        if triggers.is_empty() {
            return Some(step);
        }

        let mut voices = match self.voices.lock() {
            Ok(voices) => voices,
            Err(_) => {
                warn!("voice lock poisoned, skipping step");
                return Some(step);
            }
        };
        for trigger in triggers {
            let Some(instrument) = self.catalog.get(trigger.instrument) else {
                continue;
            };
            let Some(voice) = voices.get_mut(trigger.instrument) else {
                continue;
            };
            let pitch = instrument.pitch_name(trigger.pitch);
            trace!(step, pitch, duration = trigger.duration_secs, at, "trigger");
            voice.trigger(pitch, trigger.duration_secs, at);
        }

        Some(step)
    }

    /// Box the scheduler as a clock callback
    pub fn into_callback(mut self) -> StepCallback {
        Box::new(move |at| {
            self.on_step(at);
        })
    }
}
