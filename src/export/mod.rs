// Module export - MIDI file export of the grid

pub mod adapter;
pub mod smf;

pub use adapter::{ExportNote, ExportSong, ExportTrack, build_export};
pub use smf::{MidiEncoder, SmfEncoder, TICKS_PER_BEAT, export_file_name};

/// Errors raised while writing an export
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("MIDI encoding failed: {0}")]
    Encode(String),
}
