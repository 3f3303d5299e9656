// Note events - neutral exchange form of grid notes
// Used for export, persistence previews and composition services

use serde::{Deserialize, Serialize};

/// A note described independently of the grid's storage
///
/// Derived from the grid; never a source of truth on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Step of the head (absolute, or relative to an anchor when proposed
    /// by an external service)
    pub step: usize,

    /// Index into the instrument catalog
    pub instrument_index: usize,

    /// Pitch name such as "C4" or "G#2"
    pub pitch_name: String,

    /// Sustain in steps (>= 1)
    pub length: u32,
}

impl Event {
    /// Creates a new event
    pub fn new(
        step: usize,
        instrument_index: usize,
        pitch_name: impl Into<String>,
        length: u32,
    ) -> Self {
        assert!(length > 0, "Note length must be > 0");
        Self {
            step,
            instrument_index,
            pitch_name: pitch_name.into(),
            length,
        }
    }

    /// First step after the note ends
    pub fn end(&self) -> usize {
        self.step + self.length as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_end() {
        let event = Event::new(10, 0, "C4", 4);
        assert_eq!(event.end(), 14);
    }

    #[test]
    #[should_panic(expected = "Note length must be > 0")]
    fn test_zero_length_rejected() {
        Event::new(0, 0, "C4", 0);
    }

    #[test]
    fn test_event_json_is_camel_case() {
        let event = Event::new(2, 1, "E2", 3);
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(
            json,
            r#"{"step":2,"instrumentIndex":1,"pitchName":"E2","length":3}"#
        );
    }
}
