// Sequencer module
// Note grid, editing rules, step scheduling and transport

pub mod grid;
pub mod instrument;
pub mod note;
pub mod pitch;
pub mod placement;
pub mod resize;
pub mod scheduler;
pub mod timeline;
pub mod transport;

pub use grid::{GridError, Head, NoteGrid, NoteOn, ToggleOutcome};
pub use instrument::{Instrument, InstrumentCatalog, Timbre};
pub use note::Event;
pub use pitch::{PitchError, midi_to_note, note_to_midi};
pub use placement::{
    DragGesture, PlacementError, PlacementReport, Press, StepMode, place_events, place_note,
};
pub use resize::ResizePolicy;
pub use scheduler::{SharedGrid, StepScheduler, Trigger, triggers_for_step};
pub use timeline::{Subdivision, Tempo};
pub use transport::{
    SharedTransportState, StepHighlighter, Transport, TransportSnapshot, TransportState,
};
