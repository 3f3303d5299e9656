// Note grid - heads and sustain lengths indexed by (instrument, pitch, step)
//
// A note is stored only at its head cell together with a duration in steps.
// The steps covered by the sustain stay inactive.

use crate::sequencer::instrument::InstrumentCatalog;

/// Errors raised when rebuilding a grid from external matrices
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    #[error("Grid has no instruments")]
    NoInstruments,

    #[error("Instrument {0} has no pitch rows")]
    NoPitches(usize),

    #[error("Grid has no steps")]
    NoSteps,

    #[error("Row ({instrument}, {pitch}) has {found} steps, expected {expected}")]
    RaggedRow {
        instrument: usize,
        pitch: usize,
        found: usize,
        expected: usize,
    },

    #[error("Duration grid shape does not match the note grid")]
    DurationShapeMismatch,
}

/// Note-on request produced by an edit, used for audio preview
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteOn {
    pub instrument: usize,
    pub pitch: usize,
}

/// Result of toggling a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Activated(NoteOn),
    Deactivated,
}

/// Active note head as seen by readers of the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Head {
    pub instrument: usize,
    pub pitch: usize,
    pub step: usize,
    pub duration: u32,
}

impl Head {
    /// First step after the note's sustain
    pub fn end(&self) -> usize {
        self.step + self.duration as usize
    }
}

/// One (instrument, pitch) row; both vectors always have `step_count` entries
#[derive(Debug, Clone, PartialEq)]
struct NoteRow {
    heads: Vec<bool>,
    durations: Vec<u32>,
}

impl NoteRow {
    fn new(step_count: usize) -> Self {
        Self {
            heads: vec![false; step_count],
            durations: vec![1; step_count],
        }
    }

    fn resize(&mut self, step_count: usize) {
        self.heads.resize(step_count, false);
        self.durations.resize(step_count, 1);
        // Heads near the new end keep their start but lose the tail
        for (step, duration) in self.durations.iter_mut().enumerate() {
            let remaining = (step_count - step) as u32;
            if *duration > remaining {
                *duration = remaining;
            }
        }
    }

    fn clear_cell(&mut self, step: usize) {
        self.heads[step] = false;
        self.durations[step] = 1;
    }
}

/// Multi-instrument step grid
#[derive(Debug, Clone, PartialEq)]
pub struct NoteGrid {
    /// rows[instrument][pitch]
    rows: Vec<Vec<NoteRow>>,
    step_count: usize,
}

impl NoteGrid {
    /// Create an empty grid; `shape[i]` is the pitch count of instrument `i`
    pub fn new(shape: &[usize], step_count: usize) -> Self {
        assert!(step_count > 0, "Grid must have at least one step");
        let rows = shape
            .iter()
            .map(|&pitches| (0..pitches).map(|_| NoteRow::new(step_count)).collect())
            .collect();
        Self { rows, step_count }
    }

    /// Create an empty grid shaped after an instrument catalog
    pub fn for_catalog(catalog: &InstrumentCatalog, step_count: usize) -> Self {
        Self::new(&catalog.shape(), step_count)
    }

    /// Rebuild a grid from plain matrices
    ///
    /// A missing duration matrix defaults every cell to 1. Durations are
    /// clamped to the steps remaining in the row, and heads that fall inside
    /// an earlier note's sustain are dropped, so the result is always
    /// consistent no matter what the matrices contained.
    pub fn from_matrices(
        heads: &[Vec<Vec<bool>>],
        durations: Option<&[Vec<Vec<u32>>]>,
    ) -> Result<Self, GridError> {
        if heads.is_empty() {
            return Err(GridError::NoInstruments);
        }
        let step_count = heads
            .iter()
            .flat_map(|pitches| pitches.first())
            .map(|row| row.len())
            .next()
            .unwrap_or(0);
        if step_count == 0 {
            return Err(GridError::NoSteps);
        }

        if let Some(durations) = durations {
            let same_shape = durations.len() == heads.len()
                && durations.iter().zip(heads).all(|(d_pitches, h_pitches)| {
                    d_pitches.len() == h_pitches.len()
                        && d_pitches
                            .iter()
                            .zip(h_pitches)
                            .all(|(d, h)| d.len() == h.len())
                });
            if !same_shape {
                return Err(GridError::DurationShapeMismatch);
            }
        }

        let mut rows = Vec::with_capacity(heads.len());
        for (instrument, pitches) in heads.iter().enumerate() {
            if pitches.is_empty() {
                return Err(GridError::NoPitches(instrument));
            }
            let mut instrument_rows = Vec::with_capacity(pitches.len());
            for (pitch, cells) in pitches.iter().enumerate() {
                if cells.len() != step_count {
                    return Err(GridError::RaggedRow {
                        instrument,
                        pitch,
                        found: cells.len(),
                        expected: step_count,
                    });
                }

                let mut row = NoteRow::new(step_count);
                let mut covered_until = 0;
                for (step, &active) in cells.iter().enumerate() {
                    if !active || step < covered_until {
                        continue;
                    }
                    let stored = durations.map_or(1, |d| d[instrument][pitch][step]);
                    let duration = stored.clamp(1, (step_count - step) as u32);
                    row.heads[step] = true;
                    row.durations[step] = duration;
                    covered_until = step + duration as usize;
                }
                instrument_rows.push(row);
            }
            rows.push(instrument_rows);
        }

        Ok(Self { rows, step_count })
    }

    /// Export the grid as (heads, durations) matrices
    pub fn to_matrices(&self) -> (Vec<Vec<Vec<bool>>>, Vec<Vec<Vec<u32>>>) {
        let heads = self
            .rows
            .iter()
            .map(|pitches| pitches.iter().map(|row| row.heads.clone()).collect())
            .collect();
        let durations = self
            .rows
            .iter()
            .map(|pitches| pitches.iter().map(|row| row.durations.clone()).collect())
            .collect();
        (heads, durations)
    }

    pub fn step_count(&self) -> usize {
        self.step_count
    }

    pub fn instrument_count(&self) -> usize {
        self.rows.len()
    }

    pub fn pitch_count(&self, instrument: usize) -> usize {
        self.check_instrument(instrument);
        self.rows[instrument].len()
    }

    /// Pitch counts per instrument
    pub fn shape(&self) -> Vec<usize> {
        self.rows.iter().map(|pitches| pitches.len()).collect()
    }

    /// Whether a note head starts at this cell
    pub fn is_active(&self, instrument: usize, pitch: usize, step: usize) -> bool {
        self.check_cell(instrument, pitch, step);
        self.rows[instrument][pitch].heads[step]
    }

    /// Stored duration at this cell (meaningful only on heads)
    pub fn duration(&self, instrument: usize, pitch: usize, step: usize) -> u32 {
        self.check_cell(instrument, pitch, step);
        self.rows[instrument][pitch].durations[step]
    }

    /// Number of active heads in the whole grid
    pub fn note_count(&self) -> usize {
        self.rows
            .iter()
            .flatten()
            .map(|row| row.heads.iter().filter(|&&h| h).count())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.note_count() == 0
    }

    /// Head whose note (head or sustain) covers this cell, if any
    pub fn covering_head(&self, instrument: usize, pitch: usize, step: usize) -> Option<usize> {
        self.check_cell(instrument, pitch, step);
        let row = &self.rows[instrument][pitch];
        (0..=step)
            .rev()
            .find(|&s| row.heads[s])
            .filter(|&s| s + row.durations[s] as usize > step)
    }

    /// First head strictly after `step` in the row
    pub fn next_head_after(&self, instrument: usize, pitch: usize, step: usize) -> Option<usize> {
        self.check_cell(instrument, pitch, step);
        let row = &self.rows[instrument][pitch];
        (step + 1..self.step_count).find(|&s| row.heads[s])
    }

    /// Shorten the note whose sustain reaches `step` so it ends right before it
    fn cut_covering_note(&mut self, instrument: usize, pitch: usize, step: usize) {
        if let Some(head) = self.covering_head(instrument, pitch, step) {
            if head < step {
                self.rows[instrument][pitch].durations[head] = (step - head) as u32;
            }
        }
    }

    /// Toggle a cell
    ///
    /// Activating sets duration 1 and yields a note-on for preview; a note
    /// sustaining over the cell is cut short first. Deactivating resets the
    /// duration to 1.
    pub fn toggle(&mut self, instrument: usize, pitch: usize, step: usize) -> ToggleOutcome {
        self.check_cell(instrument, pitch, step);
        if self.rows[instrument][pitch].heads[step] {
            self.rows[instrument][pitch].clear_cell(step);
            ToggleOutcome::Deactivated
        } else {
            self.cut_covering_note(instrument, pitch, step);
            let row = &mut self.rows[instrument][pitch];
            row.heads[step] = true;
            row.durations[step] = 1;
            ToggleOutcome::Activated(NoteOn { instrument, pitch })
        }
    }

    /// Create a note spanning `start..=end`
    ///
    /// Any head inside `(start, end]` is removed, the head at `start` is set
    /// with duration `end - start + 1`. An earlier note sustaining over
    /// `start` is shortened to end right before it.
    pub fn create_sustained(
        &mut self,
        instrument: usize,
        pitch: usize,
        start: usize,
        end: usize,
    ) -> NoteOn {
        assert!(start <= end, "Sustain start {} is after end {}", start, end);
        self.check_cell(instrument, pitch, end);
        self.cut_covering_note(instrument, pitch, start);
        let row = &mut self.rows[instrument][pitch];
        for step in start + 1..=end {
            row.clear_cell(step);
        }
        row.heads[start] = true;
        row.durations[start] = (end - start + 1) as u32;
        NoteOn { instrument, pitch }
    }

    /// Deactivate a cell and reset its duration
    pub fn delete_at(&mut self, instrument: usize, pitch: usize, step: usize) {
        self.check_cell(instrument, pitch, step);
        self.rows[instrument][pitch].clear_cell(step);
    }

    /// Reset every cell to inactive with duration 1
    pub fn clear(&mut self) {
        for row in self.rows.iter_mut().flatten() {
            row.heads.fill(false);
            row.durations.fill(1);
        }
    }

    /// Write a head with a duration clamped to the remaining steps
    ///
    /// Nothing else in the row is touched; callers are responsible for
    /// collision checks.
    pub(crate) fn write_head(
        &mut self,
        instrument: usize,
        pitch: usize,
        step: usize,
        duration: u32,
    ) -> u32 {
        self.check_cell(instrument, pitch, step);
        let duration = duration.clamp(1, (self.step_count - step) as u32);
        let row = &mut self.rows[instrument][pitch];
        row.heads[step] = true;
        row.durations[step] = duration;
        duration
    }

    /// Change the step count of every row at once
    pub(crate) fn set_step_count(&mut self, step_count: usize) {
        assert!(step_count > 0, "Grid must have at least one step");
        for row in self.rows.iter_mut().flatten() {
            row.resize(step_count);
        }
        self.step_count = step_count;
    }

    /// All heads, instrument-major then pitch then step
    pub fn heads(&self) -> impl Iterator<Item = Head> + '_ {
        self.rows.iter().enumerate().flat_map(|(instrument, pitches)| {
            pitches.iter().enumerate().flat_map(move |(pitch, row)| {
                row.heads
                    .iter()
                    .enumerate()
                    .filter(|&(_, &active)| active)
                    .map(move |(step, _)| Head {
                        instrument,
                        pitch,
                        step,
                        duration: row.durations[step],
                    })
            })
        })
    }

    /// Heads starting at one step, instrument-major then pitch
    pub fn heads_at(&self, step: usize) -> impl Iterator<Item = Head> + '_ {
        assert!(
            step < self.step_count,
            "Step {} out of range ({} steps)",
            step,
            self.step_count
        );
        self.rows.iter().enumerate().flat_map(move |(instrument, pitches)| {
            pitches
                .iter()
                .enumerate()
                .filter(move |(_, row)| row.heads[step])
                .map(move |(pitch, row)| Head {
                    instrument,
                    pitch,
                    step,
                    duration: row.durations[step],
                })
        })
    }

    fn check_instrument(&self, instrument: usize) {
        assert!(
            instrument < self.rows.len(),
            "Instrument index {} out of range ({} instruments)",
            instrument,
            self.rows.len()
        );
    }

    fn check_cell(&self, instrument: usize, pitch: usize, step: usize) {
        self.check_instrument(instrument);
        assert!(
            pitch < self.rows[instrument].len(),
            "Pitch index {} out of range for instrument {} ({} pitches)",
            pitch,
            instrument,
            self.rows[instrument].len()
        );
        assert!(
            step < self.step_count,
            "Step {} out of range ({} steps)",
            step,
            self.step_count
        );
    }
}
