// Skyline encoding - monophonic token stream for the next-note model
//
// Each step keeps only the highest pitch whose head starts there.

use crate::sequencer::grid::NoteGrid;
use crate::sequencer::instrument::InstrumentCatalog;
use crate::sequencer::pitch::midi_to_note;
use std::fmt;

pub const PAD_ID: u32 = 0;
pub const REST_ID: u32 = 1;
pub const HOLD_ID: u32 = 2;
/// Token id of MIDI note 0
pub const PITCH_BASE: u32 = 3;
/// PAD, REST, HOLD and the 128 MIDI pitches
pub const VOCAB_SIZE: usize = PITCH_BASE as usize + 128;

/// Model token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Token {
    Pad,
    Rest,
    Hold,
    Pitch(u8),
}

impl Token {
    pub fn id(&self) -> u32 {
        match self {
            Token::Pad => PAD_ID,
            Token::Rest => REST_ID,
            Token::Hold => HOLD_ID,
            Token::Pitch(midi) => PITCH_BASE + *midi as u32,
        }
    }

    /// Decode a token id; `None` outside the vocabulary
    pub fn from_id(id: u32) -> Option<Self> {
        match id {
            PAD_ID => Some(Token::Pad),
            REST_ID => Some(Token::Rest),
            HOLD_ID => Some(Token::Hold),
            id if id < VOCAB_SIZE as u32 => Some(Token::Pitch((id - PITCH_BASE) as u8)),
            _ => None,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Pad => f.write_str("PAD"),
            Token::Rest => f.write_str("REST"),
            Token::Hold => f.write_str("HOLD"),
            Token::Pitch(midi) => write!(f, "PITCH({})", midi_to_note(*midi)),
        }
    }
}

/// Encode the whole grid, one token per step
///
/// REST only appears before the first pitch; once a pitch has sounded, empty
/// steps and repeats of the same pitch both encode as HOLD.
pub fn skyline_tokens(grid: &NoteGrid, catalog: &InstrumentCatalog) -> Vec<Token> {
    let mut tokens = Vec::with_capacity(grid.step_count());
    let mut previous: Option<u8> = None;

    for step in 0..grid.step_count() {
        let highest = grid
            .heads_at(step)
            .map(|head| catalog[head.instrument].pitch_midi(head.pitch))
            .max();

        let token = match (highest, previous) {
            (None, None) => Token::Rest,
            (None, Some(_)) => Token::Hold,
            (Some(midi), Some(prev)) if midi == prev => Token::Hold,
            (Some(midi), _) => {
                previous = Some(midi);
                Token::Pitch(midi)
            }
        };
        tokens.push(token);
    }

    tokens
}

/// Token ids of a token stream
pub fn token_ids(tokens: &[Token]) -> Vec<u32> {
    tokens.iter().map(Token::id).collect()
}
