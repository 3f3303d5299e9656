// Export adapter - grid notes resolved to beats, pitches and velocities

use crate::sequencer::grid::NoteGrid;
use crate::sequencer::instrument::InstrumentCatalog;
use crate::sequencer::timeline::{BEATS_PER_STEP, Tempo, step_to_beats};

/// One note ready for a MIDI encoder
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExportNote {
    pub pitch_midi: u8,
    pub start_beat: f64,
    pub duration_beats: f64,
    /// 0.0 - 1.0
    pub velocity: f32,
}

/// Notes of one instrument
#[derive(Debug, Clone, PartialEq)]
pub struct ExportTrack {
    pub name: String,
    /// General MIDI program (0-127)
    pub program: u8,
    pub notes: Vec<ExportNote>,
}

/// Complete song handed to an encoder
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSong {
    pub name: String,
    pub tempo: Tempo,
    pub tracks: Vec<ExportTrack>,
}

impl ExportSong {
    pub fn note_count(&self) -> usize {
        self.tracks.iter().map(|t| t.notes.len()).sum()
    }

    /// Beat at which the last note ends
    pub fn length_beats(&self) -> f64 {
        self.tracks
            .iter()
            .flat_map(|t| &t.notes)
            .map(|n| n.start_beat + n.duration_beats)
            .fold(0.0, f64::max)
    }
}

/// Resolve the grid into one track per instrument
///
/// Notes within a track are sorted by start, then by pitch.
pub fn build_export(
    grid: &NoteGrid,
    catalog: &InstrumentCatalog,
    tempo: Tempo,
    name: &str,
    velocity: f32,
) -> ExportSong {
    let velocity = velocity.clamp(0.0, 1.0);
    let mut tracks: Vec<ExportTrack> = catalog
        .iter()
        .map(|instrument| ExportTrack {
            name: instrument.name.clone(),
            program: instrument.timbre.gm_program(),
            notes: Vec::new(),
        })
        .collect();

    for head in grid.heads() {
        let Some(track) = tracks.get_mut(head.instrument) else {
            continue;
        };
        track.notes.push(ExportNote {
            pitch_midi: catalog[head.instrument].pitch_midi(head.pitch),
            start_beat: step_to_beats(head.step),
            duration_beats: head.duration as f64 * BEATS_PER_STEP,
            velocity,
        });
    }

    for track in &mut tracks {
        track.notes.sort_by(|a, b| {
            a.start_beat
                .total_cmp(&b.start_beat)
                .then(a.pitch_midi.cmp(&b.pitch_midi))
        });
    }

    ExportSong {
        name: name.to_string(),
        tempo,
        tracks,
    }
}
