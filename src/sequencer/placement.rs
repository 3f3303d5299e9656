// Note placement - every write into the grid from a gesture or an event list
//
// Manual gestures always win: they may shorten or replace existing notes.
// Bulk placement from events never touches a cell that already holds a note.

use crate::sequencer::grid::{Head, NoteGrid, NoteOn};
use crate::sequencer::instrument::InstrumentCatalog;
use crate::sequencer::note::Event;
use crate::sequencer::pitch::PitchError;
use tracing::debug;

/// Errors raised while resolving an event list against the catalog
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlacementError {
    #[error("Event {index} targets unknown instrument {instrument}")]
    UnknownInstrument { index: usize, instrument: usize },

    #[error("Event {index} has an invalid pitch: {source}")]
    Pitch {
        index: usize,
        #[source]
        source: PitchError,
    },

    #[error("Event {0} has zero length")]
    ZeroLength(usize),
}

/// Outcome of pressing a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Press {
    /// The cell held a head; it has been deleted
    Deleted,
    /// The cell was empty; a drag has begun
    Dragging(DragGesture),
}

/// Drag in progress, anchored to the pitch row where it started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DragGesture {
    pub instrument: usize,
    pub pitch: usize,
    pub anchor: usize,
}

/// Press a cell: delete an existing head, or start a drag on an empty cell
pub fn press(grid: &mut NoteGrid, instrument: usize, pitch: usize, step: usize) -> Press {
    if grid.is_active(instrument, pitch, step) {
        grid.delete_at(instrument, pitch, step);
        Press::Deleted
    } else {
        Press::Dragging(DragGesture {
            instrument,
            pitch,
            anchor: step,
        })
    }
}

impl DragGesture {
    /// Finish the drag on `step` and write the note
    ///
    /// Only the step of the release cell matters; the pitch row is the one the
    /// drag started on.
    pub fn release(self, grid: &mut NoteGrid, step: usize) -> NoteOn {
        let start = self.anchor.min(step);
        let end = self.anchor.max(step);
        grid.create_sustained(self.instrument, self.pitch, start, end)
    }
}

/// How an event's step is mapped into the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StepMode {
    /// `(offset + step) mod step_count`
    Wrap,
    /// `min(offset + step, step_count - 1)`
    #[default]
    Clamp,
}

impl StepMode {
    pub fn resolve(&self, base_offset: usize, step: usize, step_count: usize) -> usize {
        let absolute = base_offset.saturating_add(step);
        match self {
            StepMode::Wrap => absolute % step_count,
            StepMode::Clamp => absolute.min(step_count - 1),
        }
    }
}

/// Result of a bulk placement
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlacementReport {
    /// Heads written, in event order
    pub placed: Vec<Head>,
    /// Events dropped because their cell already held a note
    pub skipped: usize,
}

/// Place a list of events without overwriting existing notes
///
/// Every event is resolved before anything is written, so an invalid event
/// leaves the grid untouched. Pitches snap to the nearest pitch of the target
/// instrument.
pub fn place_events(
    grid: &mut NoteGrid,
    catalog: &InstrumentCatalog,
    events: &[Event],
    base_offset: usize,
    mode: StepMode,
) -> Result<PlacementReport, PlacementError> {
    let mut resolved = Vec::with_capacity(events.len());
    for (index, event) in events.iter().enumerate() {
        let instrument = catalog.get(event.instrument_index).ok_or(
            PlacementError::UnknownInstrument {
                index,
                instrument: event.instrument_index,
            },
        )?;
        if event.length == 0 {
            return Err(PlacementError::ZeroLength(index));
        }
        let pitch = instrument
            .nearest_pitch_index(&event.pitch_name)
            .map_err(|source| PlacementError::Pitch { index, source })?;
        let step = mode.resolve(base_offset, event.step, grid.step_count());
        resolved.push((event.instrument_index, pitch, step, event.length));
    }

    let mut report = PlacementReport::default();
    for (instrument, pitch, step, length) in resolved {
        match place_note(grid, instrument, pitch, step, length) {
            Some(head) => report.placed.push(head),
            None => report.skipped += 1,
        }
    }

    Ok(report)
}

/// Place one note unless its cell already belongs to a note
///
/// The duration is shortened to end before the next head in the row and
/// before the end of the grid.
pub fn place_note(
    grid: &mut NoteGrid,
    instrument: usize,
    pitch: usize,
    step: usize,
    length: u32,
) -> Option<Head> {
    if let Some(head) = grid.covering_head(instrument, pitch, step) {
        debug!(instrument, pitch, step, head, "placement skipped, cell occupied");
        return None;
    }
    let room = grid
        .next_head_after(instrument, pitch, step)
        .map_or(grid.step_count() - step, |next| next - step);
    let duration = grid.write_head(instrument, pitch, step, length.min(room as u32));
    Some(Head {
        instrument,
        pitch,
        step,
        duration,
    })
}
