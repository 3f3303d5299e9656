// Composition service contract - request building and strict response parsing

use super::BridgeError;
use super::seed::{continuation_point, extract_events};
use crate::sequencer::grid::NoteGrid;
use crate::sequencer::instrument::InstrumentCatalog;
use crate::sequencer::note::Event;
use crate::sequencer::pitch::note_to_midi;
use serde::{Deserialize, Serialize};

/// Payload sent to the composition service
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionRequest {
    pub prompt_text: String,
    pub instrument_catalog: InstrumentCatalog,
    /// Existing notes, absolute steps
    pub existing_events: Vec<Event>,
    pub step_count: usize,
    /// Step the returned events are relative to
    pub continuation_point: usize,
    pub max_events_requested: usize,
}

impl CompositionRequest {
    /// Build a request from the current grid
    pub fn from_grid(
        prompt_text: impl Into<String>,
        grid: &NoteGrid,
        catalog: &InstrumentCatalog,
        max_events_requested: usize,
    ) -> Self {
        Self {
            prompt_text: prompt_text.into(),
            instrument_catalog: catalog.clone(),
            existing_events: extract_events(grid, catalog),
            step_count: grid.step_count(),
            continuation_point: continuation_point(grid),
            max_events_requested,
        }
    }

    pub fn to_json(&self) -> Result<String, BridgeError> {
        Ok(serde_json::to_string(self)?)
    }
}

fn default_length() -> i64 {
    1
}

/// Event as sent back by the service; older field names are accepted
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireEvent {
    #[serde(alias = "relStep")]
    relative_step: i64,
    #[serde(alias = "instrumentIdx")]
    instrument_index: i64,
    #[serde(alias = "note")]
    pitch_name: String,
    #[serde(default = "default_length")]
    length: i64,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    events: Vec<WireEvent>,
}

/// Locate the JSON object in a model reply
///
/// Prefers a fenced ```json block, then the outermost braces.
fn extract_json(text: &str) -> Option<&str> {
    let lower = text.to_ascii_lowercase();
    if let Some(fence) = lower.find("```json") {
        let body_start = fence + "```json".len();
        if let Some(len) = text[body_start..].find("```") {
            return Some(text[body_start..body_start + len].trim());
        }
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

/// Parse and validate a composition reply
///
/// Returns events whose `step` is relative to the request's continuation
/// point. Any invalid event rejects the whole reply. At most `max_events`
/// events are kept.
pub fn parse_composition_response(
    text: &str,
    catalog: &InstrumentCatalog,
    max_events: usize,
) -> Result<Vec<Event>, BridgeError> {
    let json = extract_json(text).ok_or(BridgeError::NoJson)?;
    let response: WireResponse = serde_json::from_str(json)?;

    let mut events = Vec::with_capacity(response.events.len().min(max_events));
    for (index, wire) in response.events.into_iter().enumerate() {
        let invalid = |reason: String| BridgeError::InvalidEvent { index, reason };

        if wire.relative_step < 0 {
            return Err(invalid(format!("negative step {}", wire.relative_step)));
        }
        if wire.instrument_index < 0 || wire.instrument_index as usize >= catalog.len() {
            return Err(invalid(format!(
                "instrument {} out of range",
                wire.instrument_index
            )));
        }
        if wire.length < 1 || wire.length > u32::MAX as i64 {
            return Err(invalid(format!("length {} out of range", wire.length)));
        }
        if let Err(e) = note_to_midi(&wire.pitch_name) {
            return Err(invalid(e.to_string()));
        }

        events.push(Event {
            step: wire.relative_step as usize,
            instrument_index: wire.instrument_index as usize,
            pitch_name: wire.pitch_name,
            length: wire.length as u32,
        });
    }

    events.truncate(max_events);
    Ok(events)
}
