// Module messaging - canaux lock-free entre le cœur et l'UI

pub mod channels;
pub mod notification;

pub use channels::{
    NotificationConsumer, NotificationProducer, StepEvent, StepEventConsumer, StepEventProducer,
    create_notification_channel, create_step_event_channel,
};
pub use notification::{Notification, NotificationCategory, NotificationLevel};
