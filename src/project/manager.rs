// Project stores - CRUD over project records

use crate::project::migration::RecordMigrator;
use crate::project::serialization::{deserialize_from_ron, serialize_to_ron};
use crate::project::types::{ProjectRecord, ProjectSummary};
use crate::sequencer::grid::GridError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

/// Project error types
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("File system error: {0}")]
    FileSystemError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid project structure: {0}")]
    InvalidStructure(String),

    #[error("Project validation failed: {0}")]
    ValidationFailed(String),

    #[error("Project {0} not found")]
    NotFound(Uuid),

    #[error("Project {0} already exists")]
    AlreadyExists(Uuid),

    #[error("Invalid grid: {0}")]
    Grid(#[from] GridError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("RON error: {0}")]
    Ron(#[from] ron::Error),

    #[error("Migration error: {0}")]
    MigrationError(String),
}

/// CRUD interface for project records
pub trait ProjectStore {
    /// Store a new record
    fn create(&mut self, record: ProjectRecord) -> Result<ProjectRecord, ProjectError>;

    /// Fetch a record, upgraded to the current schema
    fn read(&self, id: Uuid) -> Result<ProjectRecord, ProjectError>;

    /// Overwrite an existing record; `updated_at` is refreshed
    fn update(&mut self, record: ProjectRecord) -> Result<ProjectRecord, ProjectError>;

    fn delete(&mut self, id: Uuid) -> Result<(), ProjectError>;

    /// Records owned by `user_id`, most recently updated first
    fn list_for_user(&self, user_id: &str) -> Result<Vec<ProjectSummary>, ProjectError>;

    /// Store a copy of `id` named `"<name> (Copy)"`
    fn duplicate(&mut self, id: Uuid) -> Result<ProjectRecord, ProjectError> {
        let source = self.read(id)?;
        self.create(source.duplicated())
    }
}

fn upgrade(record: ProjectRecord) -> Result<ProjectRecord, ProjectError> {
    let result = RecordMigrator::migrate_to_current(record)?;
    if result.migrated {
        for message in &result.messages {
            info!(project = %result.record.id, "Migration: {}", message);
        }
    }
    Ok(result.record)
}

fn newest_first(mut summaries: Vec<ProjectSummary>) -> Vec<ProjectSummary> {
    summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    summaries
}

/// Store keeping records in memory
#[derive(Debug, Default)]
pub struct MemoryProjectStore {
    records: HashMap<Uuid, ProjectRecord>,
}

impl MemoryProjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl ProjectStore for MemoryProjectStore {
    fn create(&mut self, record: ProjectRecord) -> Result<ProjectRecord, ProjectError> {
        if self.records.contains_key(&record.id) {
            return Err(ProjectError::AlreadyExists(record.id));
        }
        self.records.insert(record.id, record.clone());
        Ok(record)
    }

    fn read(&self, id: Uuid) -> Result<ProjectRecord, ProjectError> {
        let record = self
            .records
            .get(&id)
            .cloned()
            .ok_or(ProjectError::NotFound(id))?;
        upgrade(record)
    }

    fn update(&mut self, mut record: ProjectRecord) -> Result<ProjectRecord, ProjectError> {
        let stored = self
            .records
            .get_mut(&record.id)
            .ok_or(ProjectError::NotFound(record.id))?;
        record.touch();
        *stored = record.clone();
        Ok(record)
    }

    fn delete(&mut self, id: Uuid) -> Result<(), ProjectError> {
        self.records
            .remove(&id)
            .map(|_| ())
            .ok_or(ProjectError::NotFound(id))
    }

    fn list_for_user(&self, user_id: &str) -> Result<Vec<ProjectSummary>, ProjectError> {
        Ok(newest_first(
            self.records
                .values()
                .filter(|r| r.user_id == user_id)
                .map(ProjectSummary::from)
                .collect(),
        ))
    }
}

/// Store writing one RON file per project into a directory
#[derive(Debug, Clone)]
pub struct FileProjectStore {
    dir: PathBuf,
}

impl FileProjectStore {
    /// Open (and create if needed) a store rooted at `dir`
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self, ProjectError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).map_err(|e| {
            ProjectError::FileSystemError(format!(
                "Failed to create project directory {}: {}",
                dir.display(),
                e
            ))
        })?;
        Ok(Self { dir })
    }

    /// Store in the user's data directory
    pub fn open_default() -> Result<Self, ProjectError> {
        Self::open(crate::config::default_project_dir())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{}.ron", id))
    }

    fn write(&self, record: &ProjectRecord) -> Result<(), ProjectError> {
        let path = self.path_for(record.id);
        let temp = self.dir.join(format!(".{}.ron.tmp", record.id));
        std::fs::write(&temp, serialize_to_ron(record)?)?;
        // Rename keeps the previous version intact if the write fails
        std::fs::rename(&temp, &path)?;
        info!(project = %record.id, path = %path.display(), "Project saved");
        Ok(())
    }

    fn read_file(path: &Path) -> Result<ProjectRecord, ProjectError> {
        let text = std::fs::read_to_string(path)?;
        deserialize_from_ron(&text)
    }
}

impl ProjectStore for FileProjectStore {
    fn create(&mut self, record: ProjectRecord) -> Result<ProjectRecord, ProjectError> {
        if self.path_for(record.id).exists() {
            return Err(ProjectError::AlreadyExists(record.id));
        }
        self.write(&record)?;
        Ok(record)
    }

    fn read(&self, id: Uuid) -> Result<ProjectRecord, ProjectError> {
        let path = self.path_for(id);
        if !path.exists() {
            return Err(ProjectError::NotFound(id));
        }
        let record = upgrade(Self::read_file(&path)?)?;
        info!(project = %id, "Project loaded");
        Ok(record)
    }

    fn update(&mut self, mut record: ProjectRecord) -> Result<ProjectRecord, ProjectError> {
        if !self.path_for(record.id).exists() {
            return Err(ProjectError::NotFound(record.id));
        }
        record.touch();
        self.write(&record)?;
        Ok(record)
    }

    fn delete(&mut self, id: Uuid) -> Result<(), ProjectError> {
        let path = self.path_for(id);
        if !path.exists() {
            return Err(ProjectError::NotFound(id));
        }
        std::fs::remove_file(&path)?;
        info!(project = %id, "Project deleted");
        Ok(())
    }

    fn list_for_user(&self, user_id: &str) -> Result<Vec<ProjectSummary>, ProjectError> {
        let mut summaries = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().is_none_or(|ext| ext != "ron") {
                continue;
            }
            match Self::read_file(&path) {
                Ok(record) if record.user_id == user_id => {
                    summaries.push(ProjectSummary::from(&record))
                }
                Ok(_) => {}
                Err(e) => warn!(path = %path.display(), "Skipping unreadable project: {}", e),
            }
        }
        Ok(newest_first(summaries))
    }
}
