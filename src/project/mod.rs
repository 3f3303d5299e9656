// Project persistence - records, stores and validation
// Records are plain data; the grid is rebuilt from them only after validation

pub mod manager;
pub mod migration;
pub mod serialization;
pub mod types;

pub use manager::{FileProjectStore, MemoryProjectStore, ProjectError, ProjectStore};
pub use migration::{MigrationResult, RecordMigrator};
pub use types::{ProjectRecord, ProjectSummary};

use crate::config::SessionConfig;
use crate::sequencer::grid::NoteGrid;
use crate::sequencer::instrument::InstrumentCatalog;
use crate::sequencer::timeline::Tempo;

/// Check a record against the catalog and the session limits
pub fn validate_record(
    record: &ProjectRecord,
    catalog: &InstrumentCatalog,
    config: &SessionConfig,
) -> Result<(), ProjectError> {
    if record.name.trim().is_empty() {
        return Err(ProjectError::InvalidStructure(
            "Project name cannot be empty".to_string(),
        ));
    }

    if record.name.chars().count() > 255 {
        return Err(ProjectError::InvalidStructure(
            "Project name cannot exceed 255 characters".to_string(),
        ));
    }

    if !(config.min_bpm..=config.max_bpm).contains(&record.tempo_bpm) {
        return Err(ProjectError::InvalidStructure(format!(
            "Tempo must be between {} and {} BPM",
            config.min_bpm, config.max_bpm
        )));
    }

    if record.grid.len() != catalog.len() {
        return Err(ProjectError::InvalidStructure(format!(
            "Grid has {} instruments, expected {}",
            record.grid.len(),
            catalog.len()
        )));
    }

    let step_count = record.step_count();
    if step_count < config.min_steps || step_count > config.max_steps {
        return Err(ProjectError::InvalidStructure(format!(
            "Grid length {} must be between {} and {} steps",
            step_count, config.min_steps, config.max_steps
        )));
    }

    for (index, (pitches, instrument)) in record.grid.iter().zip(catalog.iter()).enumerate() {
        if pitches.len() != instrument.pitch_count() {
            return Err(ProjectError::InvalidStructure(format!(
                "Instrument {} ({}) has {} pitch rows, expected {}",
                index,
                instrument.name,
                pitches.len(),
                instrument.pitch_count()
            )));
        }
        if pitches.iter().any(|row| row.len() != step_count) {
            return Err(ProjectError::InvalidStructure(format!(
                "Instrument {} has rows of differing length",
                index
            )));
        }
    }

    if let Some(durations) = &record.duration_grid {
        let same_shape = durations.len() == record.grid.len()
            && durations.iter().zip(&record.grid).all(|(d, h)| {
                d.len() == h.len() && d.iter().zip(h).all(|(dr, hr)| dr.len() == hr.len())
            });
        if !same_shape {
            return Err(ProjectError::InvalidStructure(
                "Duration grid shape does not match the note grid".to_string(),
            ));
        }
        if durations.iter().flatten().flatten().any(|&d| d == 0) {
            return Err(ProjectError::InvalidStructure(
                "Durations must be at least 1 step".to_string(),
            ));
        }
    }

    Ok(())
}

/// Rebuild the grid and tempo stored in `record`
///
/// Nothing is returned unless the whole record is valid.
pub fn record_to_grid(
    record: &ProjectRecord,
    catalog: &InstrumentCatalog,
    config: &SessionConfig,
) -> Result<(NoteGrid, Tempo), ProjectError> {
    validate_record(record, catalog, config)
        .map_err(|e| ProjectError::ValidationFailed(e.to_string()))?;
    let grid = NoteGrid::from_matrices(&record.grid, record.duration_grid.as_deref())?;
    let tempo = Tempo::clamped(record.tempo_bpm, config.min_bpm, config.max_bpm);
    Ok((grid, tempo))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (InstrumentCatalog, SessionConfig, ProjectRecord) {
        let catalog = InstrumentCatalog::chiptune();
        let config = SessionConfig::default();
        let mut grid = NoteGrid::for_catalog(&catalog, 16);
        grid.create_sustained(0, 0, 2, 5);
        let record = ProjectRecord::from_grid("u", "Valid", &grid, Tempo::new(120.0));
        (catalog, config, record)
    }

    #[test]
    fn test_valid_record() {
        let (catalog, config, record) = setup();
        assert!(validate_record(&record, &catalog, &config).is_ok());

        let (grid, tempo) = record_to_grid(&record, &catalog, &config).unwrap();
        assert!(grid.is_active(0, 0, 2));
        assert_eq!(grid.duration(0, 0, 2), 4);
        assert_eq!(tempo.bpm(), 120.0);
    }

    #[test]
    fn test_project_validation() {
        let (catalog, config, record) = setup();

        let mut r = record.clone();
        r.name = "   ".to_string();
        assert!(validate_record(&r, &catalog, &config).is_err());

        let mut r = record.clone();
        r.name = "x".repeat(256);
        assert!(validate_record(&r, &catalog, &config).is_err());

        let mut r = record.clone();
        r.tempo_bpm = 20.0;
        assert!(validate_record(&r, &catalog, &config).is_err());

        let mut r = record.clone();
        r.grid.pop();
        assert!(validate_record(&r, &catalog, &config).is_err());

        let mut r = record.clone();
        r.grid[1].pop();
        assert!(validate_record(&r, &catalog, &config).is_err());

        let mut r = record.clone();
        r.duration_grid.as_mut().unwrap()[0][0][0] = 0;
        assert!(validate_record(&r, &catalog, &config).is_err());

        let mut r = record;
        r.duration_grid.as_mut().unwrap()[2][11].pop();
        assert!(validate_record(&r, &catalog, &config).is_err());
    }

    #[test]
    fn test_step_count_limits() {
        let (catalog, config, _) = setup();
        let grid = NoteGrid::for_catalog(&catalog, 8);
        let record = ProjectRecord::from_grid("u", "Short", &grid, Tempo::default());
        assert!(matches!(
            record_to_grid(&record, &catalog, &config),
            Err(ProjectError::ValidationFailed(_))
        ));
    }

    #[test]
    fn test_stored_durations_are_normalized() {
        let (catalog, config, mut record) = setup();
        // Overlong tail and an active cell inside a sustain
        record.grid[1][0][14] = true;
        record.duration_grid.as_mut().unwrap()[1][0][14] = 9;
        record.grid[0][0][3] = true;

        let (grid, _) = record_to_grid(&record, &catalog, &config).unwrap();
        assert_eq!(grid.duration(1, 0, 14), 2);
        assert!(!grid.is_active(0, 0, 3));
    }

    #[test]
    fn test_legacy_record_defaults_to_unit_durations() {
        let (catalog, config, mut record) = setup();
        record.duration_grid = None;
        let (grid, _) = record_to_grid(&record, &catalog, &config).unwrap();
        assert_eq!(grid.duration(0, 0, 2), 1);
    }
}
