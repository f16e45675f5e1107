//! Event handler trait for relationship transitions.

use async_trait::async_trait;
use bounded_vec_deque::BoundedVecDeque;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, PoisonError};

use crate::lean::RoleLean;

/// Something observable that happened to a partner record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationEvent {
    /// The partner proposed a role to you.
    RequestReceived { partner: String, lean: RoleLean },
    /// A role proposal was accepted; `your_status` is the role you now hold
    /// toward them, `their_status` the role they hold toward you.
    ProposalAccepted {
        partner: String,
        your_status: RoleLean,
        their_status: RoleLean,
    },
    ProposalDeclined { partner: String },
    RelationshipRemoved { partner: String },
    CommitmentEstablished {
        partner: String,
        at: DateTime<Utc>,
    },
    LockEngaged {
        partner: String,
        layer: usize,
        end_time: DateTime<Utc>,
    },
    LockReleased { partner: String, layer: usize },
}

/// Trait for receiving relation notifications.
///
/// Implementations receive one human-readable line per completed transition
/// plus the structured event describing it.
#[async_trait]
pub trait RelationEventHandler: Send + Sync {
    /// Called with the local notification line for a completed transition.
    async fn on_notification(&self, text: &str);

    /// Called when a partner record changed.
    async fn on_relation_changed(&self, event: &RelationEvent);
}

/// Ordered fan-out to registered handlers.
///
/// Delivery is sequential and in registration order: every handler has
/// finished with an event before the next handler sees it, and before the
/// next event is published.
#[derive(Clone, Default)]
pub struct EventBus {
    handlers: Vec<Arc<dyn RelationEventHandler>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, handler: Arc<dyn RelationEventHandler>) {
        self.handlers.push(handler);
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub async fn notify(&self, text: &str) {
        for handler in &self.handlers {
            handler.on_notification(text).await;
        }
    }

    pub async fn publish(&self, event: &RelationEvent) {
        for handler in &self.handlers {
            handler.on_relation_changed(event).await;
        }
    }
}

/// Keeps the most recent notification lines, oldest first.
pub struct NotificationLog {
    lines: Mutex<BoundedVecDeque<String>>,
}

impl NotificationLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: Mutex::new(BoundedVecDeque::new(capacity.max(1))),
        }
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}

#[async_trait]
impl RelationEventHandler for NotificationLog {
    async fn on_notification(&self, text: &str) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(text.to_string());
    }

    async fn on_relation_changed(&self, _event: &RelationEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recorder {
        id: usize,
        seen: Arc<Mutex<Vec<(usize, String)>>>,
    }

    #[async_trait]
    impl RelationEventHandler for Recorder {
        async fn on_notification(&self, text: &str) {
            self.seen.lock().unwrap().push((self.id, text.to_string()));
        }

        async fn on_relation_changed(&self, event: &RelationEvent) {
            self.seen.lock().unwrap().push((self.id, format!("{event:?}")));
        }
    }

    #[tokio::test]
    async fn test_delivery_in_registration_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut bus = EventBus::new();
        for id in 0..3 {
            bus.subscribe(Arc::new(Recorder {
                id,
                seen: seen.clone(),
            }));
        }

        bus.notify("first").await;
        bus.notify("second").await;

        let seen = seen.lock().unwrap().clone();
        let expected: Vec<(usize, String)> = ["first", "second"]
            .iter()
            .flat_map(|text| (0..3).map(move |id| (id, text.to_string())))
            .collect();
        assert_eq!(seen, expected);
    }

    #[tokio::test]
    async fn test_notification_log_is_bounded() {
        let log = NotificationLog::new(2);
        log.on_notification("one").await;
        log.on_notification("two").await;
        log.on_notification("three").await;
        assert_eq!(log.lines(), vec!["two".to_string(), "three".to_string()]);
    }
}
