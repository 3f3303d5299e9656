// Serialization utilities for project persistence

use crate::project::ProjectError;
use crate::project::types::ProjectRecord;
use ron::ser::PrettyConfig;

/// Serialize a record to RON format
pub fn serialize_to_ron(record: &ProjectRecord) -> Result<String, ProjectError> {
    ron::ser::to_string_pretty(record, PrettyConfig::default()).map_err(|e| {
        ProjectError::SerializationError(format!("Failed to serialize to RON: {}", e))
    })
}

/// Deserialize a record from RON format
pub fn deserialize_from_ron(ron_data: &str) -> Result<ProjectRecord, ProjectError> {
    ron::from_str(ron_data).map_err(|e| {
        ProjectError::SerializationError(format!("Failed to deserialize from RON: {}", e))
    })
}

/// Serialize a record to JSON, the shape remote stores exchange
pub fn serialize_to_json(record: &ProjectRecord) -> Result<String, ProjectError> {
    Ok(serde_json::to_string_pretty(record)?)
}

/// Deserialize a record from JSON
pub fn deserialize_from_json(json_data: &str) -> Result<ProjectRecord, ProjectError> {
    Ok(serde_json::from_str(json_data)?)
}
