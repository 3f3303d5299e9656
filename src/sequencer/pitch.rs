// Pitch names - conversion between note names ("C4", "G#3", "Db5") and MIDI numbers

/// Errors raised when a pitch name cannot be interpreted
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PitchError {
    #[error("Invalid pitch name: {0:?}")]
    InvalidName(String),

    #[error("Pitch {0:?} is outside the MIDI range (0-127)")]
    OutOfRange(String),

    #[error("Instrument has no pitches")]
    EmptyInstrument,
}

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Semitone offset of a note letter within its octave
fn letter_semitone(letter: char) -> Option<i32> {
    match letter.to_ascii_uppercase() {
        'C' => Some(0),
        'D' => Some(2),
        'E' => Some(4),
        'F' => Some(5),
        'G' => Some(7),
        'A' => Some(9),
        'B' => Some(11),
        _ => None,
    }
}

/// Parse a note name into a MIDI note number
///
/// Accepts a letter (A-G, either case), an optional `#` or `b`, and an octave
/// that may be negative. MIDI convention: C-1 = 0, C4 = 60, A4 = 69.
pub fn note_to_midi(name: &str) -> Result<u8, PitchError> {
    let trimmed = name.trim();
    let mut chars = trimmed.chars();

    let letter = chars
        .next()
        .ok_or_else(|| PitchError::InvalidName(name.to_string()))?;
    let mut semitone =
        letter_semitone(letter).ok_or_else(|| PitchError::InvalidName(name.to_string()))?;

    let rest = chars.as_str();
    let octave_str = if let Some(stripped) = rest.strip_prefix('#') {
        semitone += 1;
        stripped
    } else if let Some(stripped) = rest.strip_prefix('b') {
        semitone -= 1;
        stripped
    } else {
        rest
    };

    let octave: i32 = octave_str
        .parse()
        .map_err(|_| PitchError::InvalidName(name.to_string()))?;

    octave
        .checked_add(1)
        .and_then(|o| o.checked_mul(12))
        .and_then(|base| base.checked_add(semitone))
        .and_then(|midi| u8::try_from(midi).ok())
        .filter(|&midi| midi <= 127)
        .ok_or_else(|| PitchError::OutOfRange(name.to_string()))
}

/// Format a MIDI note number as a note name, always spelled with sharps
pub fn midi_to_note(midi: u8) -> String {
    let midi = midi.min(127);
    let octave = (midi / 12) as i32 - 1;
    format!("{}{}", NOTE_NAMES[(midi % 12) as usize], octave)
}

/// Semitone distance between two MIDI notes
pub fn semitone_distance(a: u8, b: u8) -> u8 {
    a.abs_diff(b)
}
