// Record migration - upgrades records written by older schemas
//
// The only schema change so far is the duration grid: records written before
// sustained notes existed carry heads only, and every head lasts one step.

use crate::project::ProjectError;
use crate::project::types::ProjectRecord;

/// Migration result
#[derive(Debug, Clone)]
pub struct MigrationResult {
    pub record: ProjectRecord,
    /// Whether migration was performed
    pub migrated: bool,
    pub messages: Vec<String>,
}

pub struct RecordMigrator;

impl RecordMigrator {
    /// Whether `record` predates the current schema
    pub fn needs_migration(record: &ProjectRecord) -> bool {
        record.duration_grid.is_none()
    }

    /// Bring `record` to the current schema
    pub fn migrate_to_current(mut record: ProjectRecord) -> Result<MigrationResult, ProjectError> {
        if !Self::needs_migration(&record) {
            return Ok(MigrationResult {
                record,
                migrated: false,
                messages: Vec::new(),
            });
        }

        record.duration_grid = Some(Self::unit_durations(&record.grid)?);
        Ok(MigrationResult {
            messages: vec![format!(
                "Project '{}' had no duration grid, every note set to one step",
                record.name
            )],
            record,
            migrated: true,
        })
    }

    fn unit_durations(grid: &[Vec<Vec<bool>>]) -> Result<Vec<Vec<Vec<u32>>>, ProjectError> {
        if grid.is_empty() {
            return Err(ProjectError::MigrationError(
                "Cannot migrate a record without grid rows".to_string(),
            ));
        }
        Ok(grid
            .iter()
            .map(|pitches| pitches.iter().map(|row| vec![1; row.len()]).collect())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencer::grid::NoteGrid;
    use crate::sequencer::instrument::InstrumentCatalog;
    use crate::sequencer::timeline::Tempo;

    #[test]
    fn test_legacy_record_gets_unit_durations() {
        let catalog = InstrumentCatalog::chiptune();
        let mut grid = NoteGrid::for_catalog(&catalog, 16);
        grid.toggle(0, 0, 3);
        let mut record = ProjectRecord::from_grid("u", "Legacy", &grid, Tempo::default());
        record.duration_grid = None;

        let result = RecordMigrator::migrate_to_current(record).unwrap();
        assert!(result.migrated);
        assert_eq!(result.messages.len(), 1);
        let durations = result.record.duration_grid.unwrap();
        assert_eq!(durations.len(), 3);
        assert_eq!(durations[0].len(), 12);
        assert!(durations.iter().flatten().flatten().all(|&d| d == 1));
    }

    #[test]
    fn test_current_record_untouched() {
        let catalog = InstrumentCatalog::chiptune();
        let grid = NoteGrid::for_catalog(&catalog, 16);
        let record = ProjectRecord::from_grid("u", "Current", &grid, Tempo::default());

        let result = RecordMigrator::migrate_to_current(record.clone()).unwrap();
        assert!(!result.migrated);
        assert_eq!(result.record, record);
    }

    #[test]
    fn test_empty_legacy_record_rejected() {
        let catalog = InstrumentCatalog::chiptune();
        let grid = NoteGrid::for_catalog(&catalog, 16);
        let mut record = ProjectRecord::from_grid("u", "Broken", &grid, Tempo::default());
        record.grid.clear();
        record.duration_grid = None;

        assert!(matches!(
            RecordMigrator::migrate_to_current(record),
            Err(ProjectError::MigrationError(_))
        ));
    }
}
