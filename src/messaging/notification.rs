// Notifications remontées à l'UI par la session

use chrono::{DateTime, Utc};

/// Sévérité: seules les erreurs sont des alertes bloquantes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NotificationLevel {
    /// Confirmation (projet enregistré, ...)
    Info,
    /// Opération réussie en partie (notes composées ignorées, ...)
    Warning,
    /// Échec d'un appel externe ou de l'audio
    Error,
}

/// Origine de la notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationCategory {
    Audio,
    Persistence,
    Composition,
    Prediction,
    Generic,
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub level: NotificationLevel,
    pub category: NotificationCategory,
    pub message: String,
    pub raised_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        level: NotificationLevel,
        category: NotificationCategory,
        message: impl Into<String>,
    ) -> Self {
        Self {
            level,
            category,
            message: message.into(),
            raised_at: Utc::now(),
        }
    }

    pub fn info(category: NotificationCategory, message: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Info, category, message)
    }

    pub fn warning(category: NotificationCategory, message: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Warning, category, message)
    }

    pub fn error(category: NotificationCategory, message: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Error, category, message)
    }

    /// Alerte bloquante (modale côté UI)
    pub fn is_alert(&self) -> bool {
        self.level == NotificationLevel::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_errors_are_alerts() {
        let before = Utc::now();
        let error = Notification::error(NotificationCategory::Audio, "Voices failed");
        assert_eq!(error.category, NotificationCategory::Audio);
        assert_eq!(error.message, "Voices failed");
        assert!(error.raised_at >= before);
        assert!(error.is_alert());

        let info = Notification::info(NotificationCategory::Persistence, "Saved");
        let warning = Notification::warning(NotificationCategory::Composition, "2 skipped");
        assert!(!info.is_alert());
        assert!(!warning.is_alert());
        assert!(info.level < warning.level && warning.level < error.level);
    }
}
