// Session - owns the grid, the transport and the UI-facing queues
//
// Every user gesture and every completed service call goes through here.
// External failures are logged, raised once on the notification channel and
// leave the grid as it was.

use crate::audio::{AudioEngine, AudioError};
use crate::bridge::{
    self, BridgeError, CompositionRequest, DEFAULT_TEMPERATURE, DEFAULT_TOP_P, PredictionRequest,
    PredictionResponse, Token,
};
use crate::config::{ConfigError, SessionConfig};
use crate::export::{ExportError, ExportSong, SmfEncoder, build_export};
use crate::messaging::{
    Notification, NotificationCategory, NotificationConsumer, NotificationProducer,
    create_notification_channel, create_step_event_channel,
};
use crate::project::{self, ProjectError, ProjectRecord, ProjectStore};
use crate::sequencer::grid::{NoteGrid, NoteOn, ToggleOutcome};
use crate::sequencer::instrument::InstrumentCatalog;
use crate::sequencer::note::Event;
use crate::sequencer::placement::{
    self, DragGesture, PlacementError, PlacementReport, Press, StepMode,
};
use crate::sequencer::resize::ResizePolicy;
use crate::sequencer::scheduler::SharedGrid;
use crate::sequencer::timeline::Tempo;
use crate::sequencer::transport::{StepHighlighter, Transport, TransportSnapshot};
use crate::suggestion::{PendingSuggestion, SuggestedNote, SuggestionAction, SuggestionQueue};
use rand::Rng;
use ringbuf::traits::Producer;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Errors raised when a composition reply cannot be applied
#[derive(Debug, thiserror::Error)]
pub enum CompositionError {
    #[error("No composition request is outstanding")]
    NotComposing,

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error(transparent)]
    Placement(#[from] PlacementError),
}

pub struct Session<E: AudioEngine> {
    config: SessionConfig,
    catalog: Arc<InstrumentCatalog>,
    grid: SharedGrid,
    resize: ResizePolicy,
    transport: Transport<E>,
    highlighter: StepHighlighter,
    suggestions: SuggestionQueue,
    notifications: NotificationProducer,
    drag: Option<DragGesture>,
    composing: bool,
}

impl<E: AudioEngine> Session<E> {
    /// Build a session; the returned consumer receives user-facing alerts
    pub fn new(
        engine: E,
        catalog: InstrumentCatalog,
        config: SessionConfig,
    ) -> Result<(Self, NotificationConsumer), ConfigError> {
        config.validate()?;
        if catalog.is_empty() || catalog.iter().any(|i| i.pitch_count() == 0) {
            return Err(ConfigError::Invalid(
                "Instrument catalog needs at least one instrument with pitches".to_string(),
            ));
        }

        let (notifications, notification_rx) =
            create_notification_channel(config.notification_capacity);
        let (step_tx, step_rx) = create_step_event_channel(config.step_event_capacity);
        let tempo = Tempo::clamped(config.default_bpm, config.min_bpm, config.max_bpm);
        let grid = NoteGrid::for_catalog(&catalog, config.initial_steps);

        let session = Self {
            resize: config.resize_policy(),
            suggestions: SuggestionQueue::new(config.suggestion_highlight()),
            catalog: Arc::new(catalog),
            grid: Arc::new(RwLock::new(grid)),
            transport: Transport::new(engine, tempo, step_tx),
            highlighter: StepHighlighter::new(step_rx),
            notifications,
            drag: None,
            composing: false,
            config,
        };
        Ok((session, notification_rx))
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn catalog(&self) -> &InstrumentCatalog {
        &self.catalog
    }

    pub fn shared_grid(&self) -> SharedGrid {
        Arc::clone(&self.grid)
    }

    pub fn transport(&self) -> &Transport<E> {
        &self.transport
    }

    /// Read access to the grid
    ///
    /// A poisoned lock still holds a consistent grid: every write completes
    /// before the guard is released.
    pub fn grid(&self) -> RwLockReadGuard<'_, NoteGrid> {
        self.grid.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn grid_mut(&self) -> RwLockWriteGuard<'_, NoteGrid> {
        self.grid.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&mut self, notification: Notification) {
        if self.notifications.try_push(notification).is_err() {
            warn!("Notification queue full, alert dropped");
        }
    }

    fn alert(&mut self, category: NotificationCategory, message: String) {
        self.notify(Notification::error(category, message));
    }

    fn preview(&mut self, note_on: NoteOn) {
        let Some(instrument) = self.catalog.get(note_on.instrument) else {
            return;
        };
        let timbre = instrument.timbre;
        let pitch = instrument.pitch_name(note_on.pitch).to_string();
        if let Err(e) = self.transport.preview(timbre, &pitch) {
            debug!("Preview failed: {}", e);
        }
    }

    // ---- Grid editing ----

    /// Toggle a single-step note; activating previews it
    pub fn toggle(&mut self, instrument: usize, pitch: usize, step: usize) -> ToggleOutcome {
        let outcome = self.grid_mut().toggle(instrument, pitch, step);
        if let ToggleOutcome::Activated(note_on) = outcome {
            self.preview(note_on);
        }
        outcome
    }

    /// Press a cell: deletes the note there or starts a drag
    pub fn press(&mut self, instrument: usize, pitch: usize, step: usize) -> Press {
        let outcome = placement::press(&mut self.grid_mut(), instrument, pitch, step);
        self.drag = match outcome {
            Press::Dragging(gesture) => Some(gesture),
            Press::Deleted => None,
        };
        outcome
    }

    /// Release the drag in progress on `step`
    pub fn release(&mut self, step: usize) -> Option<NoteOn> {
        let gesture = self.drag.take()?;
        let note_on = gesture.release(&mut self.grid_mut(), step);
        self.preview(note_on);
        Some(note_on)
    }

    /// Abandon the drag in progress without writing anything
    pub fn cancel_drag(&mut self) {
        self.drag = None;
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn create_sustained(
        &mut self,
        instrument: usize,
        pitch: usize,
        start: usize,
        end: usize,
    ) -> NoteOn {
        let note_on = self
            .grid_mut()
            .create_sustained(instrument, pitch, start, end);
        self.preview(note_on);
        note_on
    }

    pub fn delete_at(&mut self, instrument: usize, pitch: usize, step: usize) {
        self.grid_mut().delete_at(instrument, pitch, step);
    }

    pub fn clear(&mut self) {
        self.suggestions.cancel();
        self.grid_mut().clear();
    }

    /// Add one segment of steps; `None` at the maximum length
    pub fn grow(&mut self) -> Option<usize> {
        let resize = self.resize;
        resize.grow(&mut self.grid_mut())
    }

    /// Remove one segment of steps; `None` at the minimum length
    pub fn shrink(&mut self) -> Option<usize> {
        let resize = self.resize;
        resize.shrink(&mut self.grid_mut())
    }

    // ---- Transport ----

    /// Start playback; a failure raises one alert and leaves playback stopped
    pub fn start(&mut self) -> Result<(), AudioError> {
        let grid = Arc::clone(&self.grid);
        let catalog = Arc::clone(&self.catalog);
        if let Err(e) = self.transport.start(&grid, &catalog) {
            warn!("Playback failed to start: {}", e);
            self.alert(
                NotificationCategory::Audio,
                format!("Could not start playback: {}", e),
            );
            return Err(e);
        }
        self.highlighter.reset();
        Ok(())
    }

    /// Stop playback and drop any pending suggestion
    pub fn stop(&mut self) {
        self.transport.stop();
        if self.suggestions.cancel() {
            debug!("Pending suggestions cancelled on stop");
        }
        self.highlighter.reset();
    }

    pub fn snapshot(&self) -> TransportSnapshot {
        self.transport.snapshot()
    }

    pub fn tempo(&self) -> Tempo {
        self.transport.tempo()
    }

    /// Set the tempo, clamped to the configured range
    pub fn set_tempo(&mut self, bpm: f64) -> Tempo {
        let tempo = Tempo::clamped(bpm, self.config.min_bpm, self.config.max_bpm);
        self.transport.set_tempo(tempo);
        tempo
    }

    /// Step to highlight now, following the audio clock
    pub fn playhead(&mut self) -> Option<usize> {
        let now = self.transport.now();
        self.highlighter.update(now)
    }

    // ---- Read side ----

    pub fn extract_events(&self) -> Vec<Event> {
        bridge::extract_events(&self.grid(), &self.catalog)
    }

    pub fn continuation_point(&self) -> usize {
        bridge::continuation_point(&self.grid())
    }

    pub fn skyline_tokens(&self) -> Vec<Token> {
        bridge::skyline_tokens(&self.grid(), &self.catalog)
    }

    pub fn export_song(&self, name: &str) -> ExportSong {
        build_export(
            &self.grid(),
            &self.catalog,
            self.tempo(),
            name,
            self.config.default_velocity,
        )
    }

    /// Write the grid as a Standard MIDI File into `dir`
    pub fn export_midi(&mut self, name: &str, dir: &Path) -> Result<PathBuf, ExportError> {
        let song = self.export_song(name);
        SmfEncoder::new().write_file(&song, dir).inspect_err(|e| {
            warn!("MIDI export failed: {}", e);
            self.alert(
                NotificationCategory::Generic,
                format!("Export failed: {}", e),
            );
        })
    }

    // ---- Composition ----

    /// Build the request for the composition service and mark the session busy
    pub fn begin_composition(&mut self, prompt: &str) -> CompositionRequest {
        self.composing = true;
        CompositionRequest::from_grid(
            prompt,
            &self.grid(),
            &self.catalog,
            self.config.composition_max_events,
        )
    }

    pub fn is_composing(&self) -> bool {
        self.composing
    }

    /// Apply the service reply
    ///
    /// Events are anchored at the current continuation point and never
    /// overwrite existing notes. Any failure raises one alert and writes
    /// nothing.
    pub fn finish_composition(
        &mut self,
        reply: Result<String, BridgeError>,
    ) -> Result<PlacementReport, CompositionError> {
        if !std::mem::take(&mut self.composing) {
            return Err(CompositionError::NotComposing);
        }
        let result = self.apply_composition(reply);
        match &result {
            Ok(report) => {
                info!(
                    placed = report.placed.len(),
                    skipped = report.skipped,
                    "Composition applied"
                );
                if report.skipped > 0 {
                    self.notify(Notification::warning(
                        NotificationCategory::Composition,
                        format!(
                            "{} composed notes skipped: their cells already hold notes",
                            report.skipped
                        ),
                    ));
                }
            }
            Err(e) => {
                warn!("Composition rejected: {}", e);
                self.alert(
                    NotificationCategory::Composition,
                    format!("Composition failed: {}", e),
                );
            }
        }
        result
    }

    fn apply_composition(
        &mut self,
        reply: Result<String, BridgeError>,
    ) -> Result<PlacementReport, CompositionError> {
        let events = bridge::parse_composition_response(
            &reply?,
            &self.catalog,
            self.config.composition_max_events,
        )?;
        let mut grid = self.grid_mut();
        let anchor = bridge::continuation_point(&grid);
        Ok(placement::place_events(
            &mut grid,
            &self.catalog,
            &events,
            anchor,
            StepMode::default(),
        )?)
    }

    // ---- Prediction ----

    pub fn prediction_request(&self) -> PredictionRequest {
        PredictionRequest::from_grid(&self.grid(), &self.catalog)
    }

    /// Sample the model reply and queue the proposed note for `instrument`
    ///
    /// Replaces any suggestion still pending. Rest and hold tokens propose
    /// nothing. The returned token reports when the suggestion is dropped
    /// before being committed.
    pub fn suggest_from_prediction<R: Rng + ?Sized>(
        &mut self,
        reply: Result<String, BridgeError>,
        instrument: usize,
        rng: &mut R,
    ) -> Result<Option<PendingSuggestion>, BridgeError> {
        let response = match reply.and_then(|text| PredictionResponse::parse(&text)) {
            Ok(response) => response,
            Err(e) => {
                warn!("Prediction rejected: {}", e);
                self.alert(
                    NotificationCategory::Prediction,
                    format!("Prediction failed: {}", e),
                );
                return Err(e);
            }
        };

        let token = response.sample(DEFAULT_TOP_P, DEFAULT_TEMPERATURE, rng);
        let suggestion =
            bridge::suggestion_from_token(token, &self.grid(), &self.catalog, instrument);
        let Some(note) = suggestion else {
            debug!(%token, "Prediction proposed no note");
            return Ok(None);
        };
        let token = self.suggestions.enqueue([note]);
        debug!(?note, "Suggestion queued");
        Ok(Some(PendingSuggestion { note, token }))
    }

    /// Advance the suggestion queue; elapsed highlights are written to the grid
    pub fn poll_suggestions(&mut self, now: Instant) -> Vec<SuggestionAction> {
        let actions = self.suggestions.poll(now);
        for action in &actions {
            if let SuggestionAction::Commit(note) = action {
                let mut grid = self.grid_mut();
                if note.step < grid.step_count()
                    && note.pitch < grid.pitch_count(note.instrument)
                {
                    placement::place_note(
                        &mut grid,
                        note.instrument,
                        note.pitch,
                        note.step,
                        note.length,
                    );
                }
            }
        }
        actions
    }

    pub fn highlighted_suggestion(&self) -> Option<SuggestedNote> {
        self.suggestions.highlighted()
    }

    pub fn cancel_suggestions(&mut self) -> bool {
        self.suggestions.cancel()
    }

    // ---- Persistence ----

    /// Record holding the current grid and tempo
    pub fn snapshot_record(&self, user_id: &str, name: &str) -> ProjectRecord {
        ProjectRecord::from_grid(user_id, name, &self.grid(), self.tempo())
    }

    /// Replace the grid and tempo with the record's content
    ///
    /// The record is validated first; on failure nothing changes.
    pub fn load_record(&mut self, record: &ProjectRecord) -> Result<(), ProjectError> {
        let (grid, tempo) = project::record_to_grid(record, &self.catalog, &self.config)?;
        self.suggestions.cancel();
        self.drag = None;
        *self.grid_mut() = grid;
        self.transport.set_tempo(tempo);
        info!(project = %record.id, name = %record.name, "Project applied");
        Ok(())
    }

    /// Store the current grid as a new project
    pub fn save_new<S: ProjectStore + ?Sized>(
        &mut self,
        store: &mut S,
        user_id: &str,
        name: &str,
    ) -> Result<ProjectRecord, ProjectError> {
        let record = self.snapshot_record(user_id, name);
        let result = project::validate_record(&record, &self.catalog, &self.config)
            .and_then(|_| store.create(record));
        self.report_save(result)
    }

    /// Overwrite `record` in the store with the current grid
    pub fn save_existing<S: ProjectStore + ?Sized>(
        &mut self,
        store: &mut S,
        mut record: ProjectRecord,
    ) -> Result<ProjectRecord, ProjectError> {
        record.set_content(&self.grid(), self.tempo());
        let result = project::validate_record(&record, &self.catalog, &self.config)
            .and_then(|_| store.update(record));
        self.report_save(result)
    }

    /// Read a project from the store and apply it
    pub fn load_from<S: ProjectStore + ?Sized>(
        &mut self,
        store: &S,
        id: Uuid,
    ) -> Result<ProjectRecord, ProjectError> {
        let result = store
            .read(id)
            .and_then(|record| self.load_record(&record).map(|_| record));
        self.report_persistence(result, "load")
    }

    fn report_save(
        &mut self,
        result: Result<ProjectRecord, ProjectError>,
    ) -> Result<ProjectRecord, ProjectError> {
        let result = self.report_persistence(result, "save");
        if let Ok(record) = &result {
            info!(id = %record.id, "Project saved");
            self.notify(Notification::info(
                NotificationCategory::Persistence,
                format!("Project '{}' saved", record.name),
            ));
        }
        result
    }

    fn report_persistence<T>(
        &mut self,
        result: Result<T, ProjectError>,
        action: &str,
    ) -> Result<T, ProjectError> {
        if let Err(e) = &result {
            warn!("Project {} failed: {}", action, e);
            self.alert(
                NotificationCategory::Persistence,
                format!("Could not {} project: {}", action, e),
            );
        }
        result
    }
}
