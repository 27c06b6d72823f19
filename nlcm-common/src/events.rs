//! Event types for the NLCM event system
//!
//! Provides the shared lifecycle event definitions and an EventBus for
//! broadcasting them to in-process subscribers (SSE streams, tests).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Classifier lifecycle events
///
/// Emitted by the reconciliation loop and the corpus API. Serialized with a
/// `type` tag for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum LifecycleEvent {
    /// A registry snapshot was obtained from the classifier service
    SnapshotFetched {
        /// Records in the snapshot after family filtering
        classifier_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// The classifier service could not be listed this cycle
    SnapshotFetchFailed {
        error: String,
        timestamp: DateTime<Utc>,
    },

    /// The active classifier switched
    ActiveClassifierChanged {
        /// Previous selection (None on first selection)
        old_classifier_id: Option<String>,
        new_classifier_id: String,
        timestamp: DateTime<Utc>,
    },

    /// A training job was submitted because the corpus changed
    TrainingSubmitted {
        family_name: String,
        timestamp: DateTime<Utc>,
    },

    /// A training submission completed (either way)
    TrainingCompleted {
        /// Id of the new classifier when the submission succeeded
        classifier_id: Option<String>,
        /// Failure description when it did not
        error: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// A superseded classifier was deleted
    ClassifierDeleted {
        classifier_id: String,
        timestamp: DateTime<Utc>,
    },

    /// Deleting a superseded classifier failed (retried next cycle)
    ClassifierDeleteFailed {
        classifier_id: String,
        error: String,
        timestamp: DateTime<Utc>,
    },

    /// A labeled example was appended to the training corpus
    CorpusExampleAppended {
        label: String,
        timestamp: DateTime<Utc>,
    },
}

impl LifecycleEvent {
    /// Event name used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            LifecycleEvent::SnapshotFetched { .. } => "SnapshotFetched",
            LifecycleEvent::SnapshotFetchFailed { .. } => "SnapshotFetchFailed",
            LifecycleEvent::ActiveClassifierChanged { .. } => "ActiveClassifierChanged",
            LifecycleEvent::TrainingSubmitted { .. } => "TrainingSubmitted",
            LifecycleEvent::TrainingCompleted { .. } => "TrainingCompleted",
            LifecycleEvent::ClassifierDeleted { .. } => "ClassifierDeleted",
            LifecycleEvent::ClassifierDeleteFailed { .. } => "ClassifierDeleteFailed",
            LifecycleEvent::CorpusExampleAppended { .. } => "CorpusExampleAppended",
        }
    }
}

/// Broadcast bus for lifecycle events
///
/// Cloning is cheap; all clones share the same channel.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<LifecycleEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// Slow subscribers lose the oldest events once `capacity` is exceeded.
    ///
    /// # Examples
    ///
    /// ```
    /// use nlcm_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// assert_eq!(event_bus.capacity(), 100);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: LifecycleEvent,
    ) -> Result<usize, broadcast::error::SendError<LifecycleEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: LifecycleEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = LifecycleEvent::ActiveClassifierChanged {
            old_classifier_id: Some("a".to_string()),
            new_classifier_id: "b".to_string(),
            timestamp: Utc::now(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "ActiveClassifierChanged");
        assert_eq!(json["old_classifier_id"], "a");
        assert_eq!(json["new_classifier_id"], "b");
        assert_eq!(event.event_type(), "ActiveClassifierChanged");
    }

    #[test]
    fn test_emit_without_subscribers_is_err_but_lossy_is_fine() {
        let bus = EventBus::new(10);
        let event = LifecycleEvent::SnapshotFetched {
            classifier_count: 0,
            timestamp: Utc::now(),
        };

        assert!(bus.emit(event.clone()).is_err());
        bus.emit_lossy(event);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_subscriber_receives_events_in_order() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();

        bus.emit_lossy(LifecycleEvent::TrainingSubmitted {
            family_name: "self_nlc.csv".to_string(),
            timestamp: Utc::now(),
        });
        bus.emit_lossy(LifecycleEvent::TrainingCompleted {
            classifier_id: Some("c1".to_string()),
            error: None,
            timestamp: Utc::now(),
        });

        assert_eq!(rx.recv().await.unwrap().event_type(), "TrainingSubmitted");
        match rx.recv().await.unwrap() {
            LifecycleEvent::TrainingCompleted { classifier_id, .. } => {
                assert_eq!(classifier_id.as_deref(), Some("c1"));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
