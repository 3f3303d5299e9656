// Canaux de communication lock-free

use crate::audio::ClockTime;
use crate::messaging::notification::Notification;
use ringbuf::{HeapRb, traits::Split};

pub type NotificationProducer = ringbuf::HeapProd<Notification>;
pub type NotificationConsumer = ringbuf::HeapCons<Notification>;

pub fn create_notification_channel(
    capacity: usize,
) -> (NotificationProducer, NotificationConsumer) {
    let rb = HeapRb::<Notification>::new(capacity);
    rb.split()
}

/// Pas joué par le scheduler, à surligner à l'instant `at` de l'horloge audio
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepEvent {
    pub step: usize,
    pub at: ClockTime,
}

pub type StepEventProducer = ringbuf::HeapProd<StepEvent>;
pub type StepEventConsumer = ringbuf::HeapCons<StepEvent>;

pub fn create_step_event_channel(capacity: usize) -> (StepEventProducer, StepEventConsumer) {
    let rb = HeapRb::<StepEvent>::new(capacity);
    rb.split()
}
