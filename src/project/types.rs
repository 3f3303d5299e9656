// Types for project persistence

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::sequencer::grid::NoteGrid;
use crate::sequencer::timeline::Tempo;

/// Plain record handed to a project store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
    /// Note heads, `[instrument][pitch][step]`
    pub grid: Vec<Vec<Vec<bool>>>,
    /// Sustain lengths; absent in records written before durations existed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_grid: Option<Vec<Vec<Vec<u32>>>>,
    pub tempo_bpm: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProjectRecord {
    /// New record holding a copy of `grid`
    pub fn from_grid(user_id: &str, name: &str, grid: &NoteGrid, tempo: Tempo) -> Self {
        let (heads, durations) = grid.to_matrices();
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            name: name.to_string(),
            grid: heads,
            duration_grid: Some(durations),
            tempo_bpm: tempo.bpm(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace the stored content with `grid` and `tempo`
    pub fn set_content(&mut self, grid: &NoteGrid, tempo: Tempo) {
        let (heads, durations) = grid.to_matrices();
        self.grid = heads;
        self.duration_grid = Some(durations);
        self.tempo_bpm = tempo.bpm();
        self.touch();
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Steps per row, taken from the first row
    pub fn step_count(&self) -> usize {
        self.grid
            .iter()
            .flat_map(|pitches| pitches.first())
            .map(|row| row.len())
            .next()
            .unwrap_or(0)
    }

    /// Copy with a fresh id and timestamps, named `"<name> (Copy)"`
    pub fn duplicated(&self) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: format!("{} (Copy)", self.name),
            created_at: now,
            updated_at: now,
            ..self.clone()
        }
    }
}

/// Listing entry for a stored project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub id: Uuid,
    pub name: String,
    pub tempo_bpm: f64,
    pub updated_at: DateTime<Utc>,
}

impl From<&ProjectRecord> for ProjectSummary {
    fn from(record: &ProjectRecord) -> Self {
        Self {
            id: record.id,
            name: record.name.clone(),
            tempo_bpm: record.tempo_bpm,
            updated_at: record.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencer::instrument::InstrumentCatalog;

    #[test]
    fn test_record_from_grid() {
        let catalog = InstrumentCatalog::chiptune();
        let mut grid = NoteGrid::for_catalog(&catalog, 16);
        grid.create_sustained(0, 0, 2, 5);

        let record = ProjectRecord::from_grid("user-1", "Demo", &grid, Tempo::new(140.0));
        assert_eq!(record.grid.len(), 3);
        assert_eq!(record.step_count(), 16);
        assert!(record.grid[0][0][2]);
        assert_eq!(record.duration_grid.as_ref().unwrap()[0][0][2], 4);
        assert_eq!(record.tempo_bpm, 140.0);
        assert_eq!(record.created_at, record.updated_at);
    }

    #[test]
    fn test_duplicated_keeps_content() {
        let catalog = InstrumentCatalog::chiptune();
        let grid = NoteGrid::for_catalog(&catalog, 16);
        let record = ProjectRecord::from_grid("user-1", "Demo", &grid, Tempo::default());

        let copy = record.duplicated();
        assert_ne!(copy.id, record.id);
        assert_eq!(copy.name, "Demo (Copy)");
        assert_eq!(copy.user_id, record.user_id);
        assert_eq!(copy.grid, record.grid);
        assert_eq!(copy.duration_grid, record.duration_grid);
    }

    #[test]
    fn test_record_without_durations_deserializes() {
        let json = r#"{
            "id": "6f1c8a3e-1d2b-4c5d-9e8f-0a1b2c3d4e5f",
            "user_id": "u",
            "name": "Old",
            "grid": [[[true, false]]],
            "tempo_bpm": 100.0,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-02T00:00:00Z"
        }"#;
        let record: ProjectRecord = serde_json::from_str(json).unwrap();
        assert!(record.duration_grid.is_none());
        assert_eq!(record.step_count(), 2);
        assert!(record.updated_at > record.created_at);
    }
}
