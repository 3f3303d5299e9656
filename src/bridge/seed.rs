// Seed extraction - grid contents as neutral events

use crate::sequencer::grid::NoteGrid;
use crate::sequencer::instrument::InstrumentCatalog;
use crate::sequencer::note::Event;

/// Every note head as an event
///
/// Scan order is instrument, then pitch, then step. Callers that need
/// chronological order sort by `step` themselves.
pub fn extract_events(grid: &NoteGrid, catalog: &InstrumentCatalog) -> Vec<Event> {
    grid.heads()
        .map(|head| Event {
            step: head.step,
            instrument_index: head.instrument,
            pitch_name: catalog[head.instrument].pitch_name(head.pitch).to_string(),
            length: head.duration,
        })
        .collect()
}

/// First step after every placed note has ended, 0 for an empty grid
pub fn continuation_point(grid: &NoteGrid) -> usize {
    grid.heads().map(|head| head.end()).max().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (NoteGrid, InstrumentCatalog) {
        let catalog = InstrumentCatalog::chiptune();
        (NoteGrid::for_catalog(&catalog, 16), catalog)
    }

    #[test]
    fn test_extract_sustained_note() {
        let (mut grid, catalog) = setup();
        grid.create_sustained(0, 0, 2, 5);

        let events = extract_events(&grid, &catalog);
        assert_eq!(events, vec![Event::new(2, 0, "C4", 4)]);
    }

    #[test]
    fn test_extract_order_is_scan_order() {
        let (mut grid, catalog) = setup();
        grid.toggle(2, 0, 1);
        grid.toggle(0, 4, 9);
        grid.toggle(0, 1, 12);

        let steps: Vec<_> = extract_events(&grid, &catalog)
            .iter()
            .map(|e| (e.instrument_index, e.step))
            .collect();
        assert_eq!(steps, vec![(0, 12), (0, 9), (2, 1)]);
    }

    #[test]
    fn test_continuation_uses_note_end() {
        let (mut grid, _) = setup();
        assert_eq!(continuation_point(&grid), 0);

        grid.toggle(1, 0, 0);
        assert_eq!(continuation_point(&grid), 1);

        grid.create_sustained(0, 3, 10, 13);
        assert_eq!(continuation_point(&grid), 14);

        // A later start with an earlier end does not move the point back
        grid.toggle(2, 0, 12);
        assert_eq!(continuation_point(&grid), 14);
    }
}
