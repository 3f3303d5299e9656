// Session configuration - grid limits, tempo range and queue sizes
//
// Stored as RON; every field falls back to its default when absent.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Errors raised while loading a configuration file
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration file: {0}")]
    Parse(#[from] ron::error::SpannedError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Smallest grid length, in steps
    pub min_steps: usize,
    /// Largest grid length, in steps
    pub max_steps: usize,
    /// Steps added or removed by one grow/shrink
    pub segment_size: usize,
    pub initial_steps: usize,
    pub default_bpm: f64,
    pub min_bpm: f64,
    pub max_bpm: f64,
    /// How long a suggested note stays highlighted before it is written
    pub suggestion_highlight_ms: u64,
    pub composition_max_events: usize,
    /// Export velocity (0.0 - 1.0)
    pub default_velocity: f32,
    pub notification_capacity: usize,
    pub step_event_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            min_steps: 16,
            max_steps: 128,
            segment_size: 4,
            initial_steps: 16,
            default_bpm: 120.0,
            min_bpm: 40.0,
            max_bpm: 300.0,
            suggestion_highlight_ms: 600,
            composition_max_events: 48,
            default_velocity: 0.8,
            notification_capacity: 256,
            step_event_capacity: 512,
        }
    }
}

impl SessionConfig {
    /// Read a RON config file; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        let config: Self = ron::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_steps == 0 {
            return Err(ConfigError::Invalid(
                "min_steps must be at least 1".to_string(),
            ));
        }
        if self.min_steps > self.max_steps {
            return Err(ConfigError::Invalid(format!(
                "min_steps ({}) exceeds max_steps ({})",
                self.min_steps, self.max_steps
            )));
        }
        if self.segment_size == 0 {
            return Err(ConfigError::Invalid(
                "segment_size must be at least 1".to_string(),
            ));
        }
        if self.initial_steps < self.min_steps || self.initial_steps > self.max_steps {
            return Err(ConfigError::Invalid(format!(
                "initial_steps ({}) must be between {} and {}",
                self.initial_steps, self.min_steps, self.max_steps
            )));
        }
        if !(self.min_bpm > 0.0 && self.min_bpm < self.max_bpm) {
            return Err(ConfigError::Invalid(format!(
                "Tempo range {} - {} BPM is empty or inverted",
                self.min_bpm, self.max_bpm
            )));
        }
        if !(self.min_bpm..=self.max_bpm).contains(&self.default_bpm) {
            return Err(ConfigError::Invalid(format!(
                "default_bpm ({}) is outside {} - {} BPM",
                self.default_bpm, self.min_bpm, self.max_bpm
            )));
        }
        if self.notification_capacity == 0 || self.step_event_capacity == 0 {
            return Err(ConfigError::Invalid(
                "Channel capacities must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn suggestion_highlight(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.suggestion_highlight_ms)
    }

    pub fn resize_policy(&self) -> crate::sequencer::resize::ResizePolicy {
        crate::sequencer::resize::ResizePolicy::new(
            self.min_steps,
            self.max_steps,
            self.segment_size,
        )
    }
}

/// Directory where projects are stored by default
pub fn default_project_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("beatgrid")
        .join("projects")
}
