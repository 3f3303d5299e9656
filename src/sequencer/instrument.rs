// Instruments - static description of each grid section and its pitch axis

use crate::sequencer::pitch::{PitchError, midi_to_note, note_to_midi, semitone_distance};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Oscillator timbre tag handed to the audio engine when a voice is created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timbre {
    Square,
    Triangle,
    Pulse,
    Sawtooth,
    Sine,
}

impl Timbre {
    /// General MIDI program used when exporting this timbre
    pub fn gm_program(&self) -> u8 {
        match self {
            Timbre::Square => 80,
            Timbre::Triangle => 33,
            Timbre::Pulse | Timbre::Sawtooth => 81,
            Timbre::Sine => 88,
        }
    }
}

impl fmt::Display for Timbre {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Timbre::Square => "square",
            Timbre::Triangle => "triangle",
            Timbre::Pulse => "pulse",
            Timbre::Sawtooth => "sawtooth",
            Timbre::Sine => "sine",
        };
        f.pad(tag)
    }
}

/// One instrument section of the grid
///
/// Pitches are ordered low to high; their count fixes the pitch axis of this
/// instrument's rows for the whole session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "InstrumentDef")]
pub struct Instrument {
    pub name: String,
    pub timbre: Timbre,
    pitches: Vec<String>,
    /// MIDI numbers parallel to `pitches`, derived on construction
    #[serde(skip)]
    midi: Vec<u8>,
}

/// Wire form of an instrument; the MIDI table is rebuilt on load
#[derive(Deserialize)]
struct InstrumentDef {
    name: String,
    timbre: Timbre,
    pitches: Vec<String>,
}

impl TryFrom<InstrumentDef> for Instrument {
    type Error = PitchError;

    fn try_from(def: InstrumentDef) -> Result<Self, Self::Error> {
        Instrument::new(def.name, def.timbre, def.pitches)
    }
}

impl Instrument {
    /// Create an instrument from an explicit pitch table (low to high)
    pub fn new(
        name: impl Into<String>,
        timbre: Timbre,
        pitches: Vec<String>,
    ) -> Result<Self, PitchError> {
        if pitches.is_empty() {
            return Err(PitchError::EmptyInstrument);
        }
        let midi = pitches
            .iter()
            .map(|p| note_to_midi(p))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            name: name.into(),
            timbre,
            pitches,
            midi,
        })
    }

    /// Create an instrument with `count` chromatic pitches starting at `base`
    pub fn chromatic(
        name: impl Into<String>,
        timbre: Timbre,
        base: &str,
        count: usize,
    ) -> Result<Self, PitchError> {
        let base_midi = note_to_midi(base)? as usize;
        if count == 0 {
            return Err(PitchError::EmptyInstrument);
        }
        if base_midi + count - 1 > 127 {
            return Err(PitchError::OutOfRange(base.to_string()));
        }
        let pitches = (base_midi..base_midi + count)
            .map(|m| midi_to_note(m as u8))
            .collect();
        Self::new(name, timbre, pitches)
    }

    pub fn pitch_count(&self) -> usize {
        self.pitches.len()
    }

    pub fn pitches(&self) -> &[String] {
        &self.pitches
    }

    /// Pitch name at `index`
    ///
    /// Panics when `index` is outside the pitch table.
    pub fn pitch_name(&self, index: usize) -> &str {
        assert!(
            index < self.pitches.len(),
            "Pitch index {} out of range for instrument {}",
            index,
            self.name
        );
        &self.pitches[index]
    }

    /// MIDI number of the pitch at `index`
    pub fn pitch_midi(&self, index: usize) -> u8 {
        assert!(
            index < self.midi.len(),
            "Pitch index {} out of range for instrument {}",
            index,
            self.name
        );
        self.midi[index]
    }

    /// Index of the pitch closest to `name` by semitone distance
    ///
    /// Ties resolve to the lower pitch index. Names outside the table are
    /// expected (external sources propose arbitrary pitches).
    pub fn nearest_pitch_index(&self, name: &str) -> Result<usize, PitchError> {
        let target = note_to_midi(name)?;
        Ok(self.nearest_to_midi(target))
    }

    /// Index of the pitch closest to a MIDI number
    pub fn nearest_to_midi(&self, target: u8) -> usize {
        let mut best = 0;
        let mut best_distance = u8::MAX;
        for (index, &midi) in self.midi.iter().enumerate() {
            let distance = semitone_distance(midi, target);
            if distance < best_distance {
                best = index;
                best_distance = distance;
            }
        }
        best
    }
}

/// Ordered set of instruments defining the instrument axis of the grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstrumentCatalog {
    instruments: Vec<Instrument>,
}

impl InstrumentCatalog {
    pub fn new(instruments: Vec<Instrument>) -> Self {
        Self { instruments }
    }

    /// The three-voice chiptune set: square lead, triangle bass, pulse counter
    pub fn chiptune() -> Self {
        let build = |name: &str, timbre: Timbre, base: &str| {
            Instrument::chromatic(name, timbre, base, 12)
                .unwrap_or_else(|e| unreachable!("built-in pitch table is valid: {e}"))
        };
        Self::new(vec![
            build("Square", Timbre::Square, "C4"),
            build("Triangle", Timbre::Triangle, "C2"),
            build("Pulse", Timbre::Pulse, "C5"),
        ])
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Instrument> {
        self.instruments.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Instrument> {
        self.instruments.iter()
    }

    /// Pitch counts per instrument, the shape of the grid's first two axes
    pub fn shape(&self) -> Vec<usize> {
        self.instruments.iter().map(|i| i.pitch_count()).collect()
    }
}

impl std::ops::Index<usize> for InstrumentCatalog {
    type Output = Instrument;

    fn index(&self, index: usize) -> &Instrument {
        assert!(
            index < self.instruments.len(),
            "Instrument index {} out of range ({} instruments)",
            index,
            self.instruments.len()
        );
        &self.instruments[index]
    }
}

impl Default for InstrumentCatalog {
    fn default() -> Self {
        Self::chiptune()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chromatic_instrument() {
        let lead = Instrument::chromatic("Lead", Timbre::Square, "C4", 12).unwrap();
        assert_eq!(lead.pitch_count(), 12);
        assert_eq!(lead.pitch_name(0), "C4");
        assert_eq!(lead.pitch_name(11), "B4");
        assert_eq!(lead.pitch_midi(0), 60);
    }

    #[test]
    fn test_chiptune_catalog_shape() {
        let catalog = InstrumentCatalog::chiptune();
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.shape(), vec![12, 12, 12]);
        assert_eq!(catalog[1].timbre, Timbre::Triangle);
        assert_eq!(catalog[1].pitch_name(0), "C2");
    }

    #[test]
    fn test_nearest_pitch_exact_and_outside_table() {
        let lead = Instrument::chromatic("Lead", Timbre::Square, "C4", 12).unwrap();
        assert_eq!(lead.nearest_pitch_index("E4").unwrap(), 4);
        // Below the table snaps to the lowest pitch, above to the highest
        assert_eq!(lead.nearest_pitch_index("C2").unwrap(), 0);
        assert_eq!(lead.nearest_pitch_index("G6").unwrap(), 11);
        // Enharmonic spelling resolves by pitch, not by string
        assert_eq!(lead.nearest_pitch_index("Db4").unwrap(), 1);
    }

    #[test]
    fn test_nearest_pitch_tie_prefers_lower_index() {
        let sparse = Instrument::new(
            "Sparse",
            Timbre::Pulse,
            vec!["C4".to_string(), "E4".to_string()],
        )
        .unwrap();
        // D4 is two semitones from both
        assert_eq!(sparse.nearest_pitch_index("D4").unwrap(), 0);
    }

    #[test]
    fn test_empty_instrument_rejected() {
        let result = Instrument::new("Empty", Timbre::Sine, Vec::new());
        assert_eq!(result, Err(PitchError::EmptyInstrument));
    }

    #[test]
    fn test_catalog_deserialize_rebuilds_midi_table() {
        let json = r#"[{"name":"Bass","timbre":"triangle","pitches":["C2","D2"]}]"#;
        let catalog: InstrumentCatalog = serde_json::from_str(json).unwrap();
        assert_eq!(catalog[0].pitch_midi(1), 38);
        assert_eq!(catalog[0].nearest_pitch_index("C#2").unwrap(), 0);
    }

    #[test]
    fn test_gm_programs() {
        assert_eq!(Timbre::Square.gm_program(), 80);
        assert_eq!(Timbre::Triangle.gm_program(), 33);
        assert_eq!(Timbre::Pulse.gm_program(), 81);
        assert_eq!(Timbre::Sine.gm_program(), 88);
    }
}
