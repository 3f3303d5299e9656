// Standard MIDI File encoder (format 1) built on midly

use super::ExportError;
use super::adapter::{ExportSong, ExportTrack};
use midly::num::{u4, u7, u15, u24, u28};
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Ticks per quarter note written in the header
pub const TICKS_PER_BEAT: u16 = 480;

/// Encoder turning an export song into file bytes
pub trait MidiEncoder {
    fn encode(&self, song: &ExportSong) -> Result<Vec<u8>, ExportError>;
}

/// File name for an exported project: non-alphanumerics become `_`
pub fn export_file_name(project_name: &str) -> String {
    let stem: String = project_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("{}.mid", stem)
}

/// Format-1 SMF writer: a conductor track then one track per instrument
#[derive(Debug, Clone, Copy, Default)]
pub struct SmfEncoder;

impl SmfEncoder {
    pub fn new() -> Self {
        Self
    }

    /// Encode `song` into `dir`, named after the song
    pub fn write_file(&self, song: &ExportSong, dir: &Path) -> Result<PathBuf, ExportError> {
        let bytes = self.encode(song)?;
        fs::create_dir_all(dir)?;
        let path = dir.join(export_file_name(&song.name));
        fs::write(&path, bytes)?;
        info!(path = %path.display(), notes = song.note_count(), "MIDI exported");
        Ok(path)
    }
}

fn beats_to_ticks(beats: f64) -> u32 {
    (beats.max(0.0) * TICKS_PER_BEAT as f64).round() as u32
}

/// Channel for track `index`, skipping the GM percussion channel
fn channel_for(index: usize) -> u4 {
    const CHANNELS: [u8; 15] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 10, 11, 12, 13, 14, 15];
    u4::new(CHANNELS[index % CHANNELS.len()])
}

/// Absolute-tick event; note-offs sort before note-ons on the same tick
struct Timed<'a> {
    tick: u32,
    order: u8,
    kind: TrackEventKind<'a>,
}

fn into_track(mut events: Vec<Timed<'_>>) -> Vec<TrackEvent<'_>> {
    events.sort_by_key(|e| (e.tick, e.order));
    let mut track = Vec::with_capacity(events.len() + 1);
    let mut last = 0;
    for event in events {
        track.push(TrackEvent {
            delta: u28::new(event.tick - last),
            kind: event.kind,
        });
        last = event.tick;
    }
    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });
    track
}

fn instrument_track(index: usize, track: &ExportTrack) -> Vec<TrackEvent<'_>> {
    let channel = channel_for(index);
    let mut events = vec![
        Timed {
            tick: 0,
            order: 0,
            kind: TrackEventKind::Meta(MetaMessage::TrackName(track.name.as_bytes())),
        },
        Timed {
            tick: 0,
            order: 0,
            kind: TrackEventKind::Midi {
                channel,
                message: MidiMessage::ProgramChange {
                    program: u7::new(track.program.min(127)),
                },
            },
        },
    ];

    for note in &track.notes {
        let key = u7::new(note.pitch_midi.min(127));
        let vel = u7::new(((note.velocity.clamp(0.0, 1.0) * 127.0).round() as u8).max(1));
        let start = beats_to_ticks(note.start_beat);
        let end = beats_to_ticks(note.start_beat + note.duration_beats).max(start + 1);
        events.push(Timed {
            tick: start,
            order: 2,
            kind: TrackEventKind::Midi {
                channel,
                message: MidiMessage::NoteOn { key, vel },
            },
        });
        events.push(Timed {
            tick: end,
            order: 1,
            kind: TrackEventKind::Midi {
                channel,
                message: MidiMessage::NoteOff {
                    key,
                    vel: u7::new(0),
                },
            },
        });
    }

    into_track(events)
}

impl MidiEncoder for SmfEncoder {
    fn encode(&self, song: &ExportSong) -> Result<Vec<u8>, ExportError> {
        if song.tracks.len() + 1 > u16::MAX as usize {
            return Err(ExportError::Encode(format!(
                "too many tracks ({})",
                song.tracks.len()
            )));
        }
        let micros = song.tempo.micros_per_beat().min(0x00FF_FFFF);

        let conductor = into_track(vec![
            Timed {
                tick: 0,
                order: 0,
                kind: TrackEventKind::Meta(MetaMessage::TrackName(song.name.as_bytes())),
            },
            Timed {
                tick: 0,
                order: 0,
                kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::new(micros))),
            },
        ]);

        let mut smf = Smf::new(Header::new(
            Format::Parallel,
            Timing::Metrical(u15::new(TICKS_PER_BEAT)),
        ));
        smf.tracks.push(conductor);
        for (index, track) in song.tracks.iter().enumerate() {
            smf.tracks.push(instrument_track(index, track));
        }

        let mut bytes = Vec::new();
        smf.write_std(&mut bytes)
            .map_err(|e| ExportError::Encode(e.to_string()))?;
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::adapter::ExportNote;
    use crate::sequencer::timeline::Tempo;

    fn song() -> ExportSong {
        ExportSong {
            name: "Test Song".to_string(),
            tempo: Tempo::new(120.0),
            tracks: vec![ExportTrack {
                name: "Square".to_string(),
                program: 80,
                notes: vec![
                    ExportNote {
                        pitch_midi: 60,
                        start_beat: 0.0,
                        duration_beats: 1.0,
                        velocity: 0.8,
                    },
                    ExportNote {
                        pitch_midi: 64,
                        start_beat: 1.0,
                        duration_beats: 0.25,
                        velocity: 0.8,
                    },
                ],
            }],
        }
    }

    #[test]
    fn test_export_file_name() {
        assert_eq!(export_file_name("My Song!"), "My_Song_.mid");
        assert_eq!(export_file_name("beat-01"), "beat_01.mid");
    }

    #[test]
    fn test_encode_parses_back() {
        let bytes = SmfEncoder::new().encode(&song()).unwrap();
        let smf = Smf::parse(&bytes).unwrap();

        assert_eq!(smf.header.format, Format::Parallel);
        assert_eq!(smf.header.timing, Timing::Metrical(u15::new(480)));
        assert_eq!(smf.tracks.len(), 2);

        let has_tempo = smf.tracks[0].iter().any(|e| {
            matches!(e.kind, TrackEventKind::Meta(MetaMessage::Tempo(t)) if t.as_int() == 500_000)
        });
        assert!(has_tempo);
    }

    #[test]
    fn test_note_timing_in_ticks() {
        let bytes = SmfEncoder::new().encode(&song()).unwrap();
        let smf = Smf::parse(&bytes).unwrap();

        let mut tick = 0u32;
        let mut notes = Vec::new();
        for event in &smf.tracks[1] {
            tick += event.delta.as_int();
            if let TrackEventKind::Midi { message, .. } = event.kind {
                match message {
                    MidiMessage::NoteOn { key, vel } => {
                        notes.push(("on", key.as_int(), tick, vel.as_int()))
                    }
                    MidiMessage::NoteOff { key, .. } => notes.push(("off", key.as_int(), tick, 0)),
                    MidiMessage::ProgramChange { program } => assert_eq!(program.as_int(), 80),
                    _ => {}
                }
            }
        }
        assert_eq!(
            notes,
            vec![
                ("on", 60, 0, 102),
                ("off", 60, 480, 0),
                ("on", 64, 480, 102),
                ("off", 64, 600, 0),
            ]
        );
    }

    #[test]
    fn test_write_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = SmfEncoder::new().write_file(&song(), dir.path()).unwrap();
        assert_eq!(path.file_name().unwrap(), "Test_Song.mid");
        assert!(fs::read(&path).unwrap().starts_with(b"MThd"));
    }
}
