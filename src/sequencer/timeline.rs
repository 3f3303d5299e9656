// Timeline - Musical time for a step grid
// Handles conversion between steps, beats and seconds

use std::fmt;

/// Number of grid steps in one beat (one step = a sixteenth note)
pub const STEPS_PER_BEAT: u32 = 4;

/// Length of one step in beats
pub const BEATS_PER_STEP: f64 = 1.0 / STEPS_PER_BEAT as f64;

/// Tempo in BPM (Beats Per Minute)
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Tempo {
    bpm: f64,
}

impl Tempo {
    /// Lowest accepted tempo
    pub const MIN_BPM: f64 = 20.0;
    /// Highest accepted tempo
    pub const MAX_BPM: f64 = 999.0;

    /// Creates a new tempo
    /// BPM must be in range [20.0, 999.0]
    pub fn new(bpm: f64) -> Self {
        assert!(
            (Self::MIN_BPM..=Self::MAX_BPM).contains(&bpm),
            "BPM must be between 20 and 999"
        );
        Self { bpm }
    }

    /// Creates a tempo from user input, clamping into `[min, max]`
    ///
    /// Non-finite input falls back to `min`.
    pub fn clamped(bpm: f64, min: f64, max: f64) -> Self {
        let min = min.clamp(Self::MIN_BPM, Self::MAX_BPM);
        let max = max.clamp(min, Self::MAX_BPM);
        let bpm = if bpm.is_finite() { bpm.clamp(min, max) } else { min };
        Self { bpm }
    }

    /// Get BPM value
    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    /// Duration of one beat in seconds
    pub fn beat_duration_seconds(&self) -> f64 {
        60.0 / self.bpm
    }

    /// Duration of one grid step (sixteenth note) in seconds
    pub fn step_duration_seconds(&self) -> f64 {
        self.beat_duration_seconds() * BEATS_PER_STEP
    }

    /// Duration of `steps` grid steps in seconds
    pub fn steps_to_seconds(&self, steps: usize) -> f64 {
        self.step_duration_seconds() * steps as f64
    }

    /// Microseconds per quarter note, as written in a MIDI tempo event
    pub fn micros_per_beat(&self) -> u32 {
        (60_000_000.0 / self.bpm).round() as u32
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Self::new(120.0)
    }
}

impl fmt::Display for Tempo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} BPM", self.bpm)
    }
}

/// Position of a step in beats
pub fn step_to_beats(step: usize) -> f64 {
    step as f64 * BEATS_PER_STEP
}

/// Audio clock subdivision at which the step callback fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subdivision {
    /// One callback per sixteenth note, the grid's step size
    Sixteenth,
    Eighth,
    Quarter,
}

impl Subdivision {
    /// Length in beats
    pub fn beats(&self) -> f64 {
        match self {
            Subdivision::Sixteenth => BEATS_PER_STEP,
            Subdivision::Eighth => 0.5,
            Subdivision::Quarter => 1.0,
        }
    }

    /// Period in seconds at a given tempo
    pub fn seconds(&self, tempo: &Tempo) -> f64 {
        self.beats() * tempo.beat_duration_seconds()
    }
}
