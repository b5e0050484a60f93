// Notification Port
// The core pushes events; delivery (push, email, in-app) is the receiver's concern.

use crate::domain::{CompletionRecord, RepairTask};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

/// Events emitted by the scheduling core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum GarageEvent {
    /// Repair crossed the midpoint of its expected duration
    RepairHalfway(RepairTask),
    /// Repair reached its expected duration
    RepairCompleted(RepairTask),
    /// Every repair of a car is done and it was queued for payment
    CarReadyForPayment(CompletionRecord),
}

impl GarageEvent {
    /// Get the event type name
    pub fn event_type(&self) -> &'static str {
        match self {
            GarageEvent::RepairHalfway(_) => "repair_halfway",
            GarageEvent::RepairCompleted(_) => "repair_completed",
            GarageEvent::CarReadyForPayment(_) => "car_ready_for_payment",
        }
    }

    pub fn car_id(&self) -> &str {
        match self {
            GarageEvent::RepairHalfway(t) | GarageEvent::RepairCompleted(t) => &t.car_id,
            GarageEvent::CarReadyForPayment(r) => &r.car_id,
        }
    }
}

/// Notification sink (best-effort, fire-and-forget)
///
/// Implementations must not block; the core never retries a failed delivery.
pub trait Notifier: Send + Sync {
    fn notify(&self, event: GarageEvent);
}

/// Notifier that queues events on an unbounded channel
#[derive(Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<GarageEvent>,
}

impl Notifier for ChannelNotifier {
    fn notify(&self, event: GarageEvent) {
        let event_type = event.event_type();
        if self.tx.send(event).is_err() {
            // Receiver gone (shutdown in progress)
            debug!(event_type, "Notification dropped: no receiver");
        }
    }
}

/// Draining side of the notification channel
pub struct NotificationReceiver {
    rx: mpsc::UnboundedReceiver<GarageEvent>,
}

impl NotificationReceiver {
    /// Wait for the next event (None once every notifier is dropped)
    pub async fn recv(&mut self) -> Option<GarageEvent> {
        self.rx.recv().await
    }

    /// Take an already-queued event without waiting
    pub fn try_recv(&mut self) -> Option<GarageEvent> {
        self.rx.try_recv().ok()
    }
}

/// Create a notification channel
pub fn notification_channel() -> (ChannelNotifier, NotificationReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChannelNotifier { tx }, NotificationReceiver { rx })
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    /// Notifier that records every event
    #[derive(Default)]
    pub struct RecordingNotifier {
        events: Mutex<Vec<GarageEvent>>,
    }

    impl RecordingNotifier {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn events(&self) -> Vec<GarageEvent> {
            self.events.lock().unwrap().clone()
        }

        pub fn count_of(&self, event_type: &str) -> usize {
            self.events
                .lock()
                .unwrap()
                .iter()
                .filter(|e| e.event_type() == event_type)
                .count()
        }
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, event: GarageEvent) {
            self.events.lock().unwrap().push(event);
        }
    }
}
