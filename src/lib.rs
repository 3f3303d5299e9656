// Beatgrid - step-sequencer core: grid model, transport, placement and bridges

pub mod audio;
pub mod bridge;
pub mod config;
pub mod export;
pub mod messaging;
pub mod project;
pub mod sequencer;
pub mod session;
pub mod suggestion;

// Re-export commonly used types for convenience
pub use audio::{AudioEngine, AudioError, OfflineEngine};
pub use bridge::{BridgeError, CompositionRequest, PredictionRequest, Token};
pub use config::{ConfigError, SessionConfig};
pub use export::{ExportError, SmfEncoder};
pub use messaging::{Notification, NotificationCategory, create_notification_channel};
pub use project::{FileProjectStore, MemoryProjectStore, ProjectError, ProjectRecord, ProjectStore};
pub use sequencer::{
    Event, InstrumentCatalog, NoteGrid, ResizePolicy, Tempo, Timbre, Transport, TransportSnapshot,
    TransportState,
};
pub use session::{CompositionError, Session};
pub use suggestion::{
    CancellationToken, PendingSuggestion, SuggestedNote, SuggestionAction, SuggestionQueue,
};
