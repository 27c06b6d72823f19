//! Reconciliation state machine
//!
//! Owns all lifecycle state and decides, per event, which remote operations to
//! issue. It never performs I/O itself: the driver in [`super`] executes the
//! returned [`Action`]s and feeds their completions back in.

use crate::policy::{creation_times_unknown, purge_candidates, select_active, should_train};
use crate::registry::{ClassifierRecord, RegistrySnapshot};
use crate::service::ServiceError;
use chrono::{DateTime, Utc};
use nlcm_common::events::{EventBus, LifecycleEvent};
use nlcm_common::time::{self, EpochSeconds};
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, error, info, warn};

/// Loop phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    /// Waiting for the next tick
    Idle,
    /// A snapshot fetch is in flight
    Reconciling,
}

/// Remote operation the driver must start
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    FetchSnapshot { cycle: u64 },
    SubmitTraining { request_id: u64 },
    DeleteClassifier { classifier_id: String },
}

/// State observed and decided by the loop
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconciliationState {
    /// Most recent successfully fetched snapshot
    pub last_snapshot: Option<RegistrySnapshot>,
    /// Classifier currently treated as authoritative
    pub active_selection: Option<String>,
    /// Request id of the training submission in flight, if any
    pub pending_train: Option<u64>,
    /// Set after the first successful cycle; purge waits for it
    pub has_polled_once: bool,
}

impl ReconciliationState {
    pub fn pending_train_submitted(&self) -> bool {
        self.pending_train.is_some()
    }
}

/// Published view of the loop for status endpoints
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconcilerStatus {
    pub running: bool,
    pub phase: Phase,
    pub family_name: String,
    pub active_classifier_id: Option<String>,
    pub training_in_flight: bool,
    pub deletions_in_flight: usize,
    pub classifier_count: Option<usize>,
    pub last_snapshot_at: Option<DateTime<Utc>>,
    pub has_polled_once: bool,
    pub cycles_completed: u64,
    pub last_error: Option<String>,
}

/// Classifier lifecycle state machine
pub struct ReconcilerCore {
    family_name: String,
    grace_window_secs: i64,
    state: ReconciliationState,
    phase: Phase,
    active: bool,
    cycles_started: u64,
    cycles_completed: u64,
    next_request_id: u64,
    deletes_in_flight: BTreeSet<String>,
    /// Classifier returned by the last successful training, with the cycle
    /// counter at completion time, until a later listing includes it
    trained_not_yet_listed: Option<(ClassifierRecord, u64)>,
    last_error: Option<String>,
    event_bus: EventBus,
}

impl ReconcilerCore {
    pub fn new(
        family_name: impl Into<String>,
        grace_window_secs: i64,
        initial_selection: Option<String>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            family_name: family_name.into(),
            grace_window_secs,
            state: ReconciliationState {
                active_selection: initial_selection,
                ..Default::default()
            },
            phase: Phase::Idle,
            active: true,
            cycles_started: 0,
            cycles_completed: 0,
            next_request_id: 1,
            deletes_in_flight: BTreeSet::new(),
            trained_not_yet_listed: None,
            last_error: None,
            event_bus,
        }
    }

    pub fn state(&self) -> &ReconciliationState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn family_name(&self) -> &str {
        &self.family_name
    }

    /// Stop reacting to events; later completions are ignored
    pub fn shutdown(&mut self) {
        self.active = false;
        self.phase = Phase::Idle;
    }

    /// Timer tick: start a cycle unless one is already running
    pub fn on_tick(&mut self) -> Option<Action> {
        if !self.active {
            return None;
        }
        if self.phase == Phase::Reconciling {
            debug!("Reconciliation cycle still in progress; tick coalesced");
            return None;
        }

        self.phase = Phase::Reconciling;
        self.cycles_started += 1;
        Some(Action::FetchSnapshot {
            cycle: self.cycles_started,
        })
    }

    /// Snapshot fetch finished: evaluate selection, training, purge in order
    ///
    /// `corpus_modified_at` is `None` when there is no corpus to train from.
    /// On fetch failure nothing but the error report changes.
    pub fn on_snapshot(
        &mut self,
        cycle: u64,
        result: Result<RegistrySnapshot, ServiceError>,
        corpus_modified_at: Option<EpochSeconds>,
    ) -> Vec<Action> {
        if !self.active {
            return Vec::new();
        }
        self.phase = Phase::Idle;

        let snapshot = match result {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Failed to get classifiers for {}: {}", self.family_name, e);
                self.last_error = Some(e.to_string());
                self.event_bus.emit_lossy(LifecycleEvent::SnapshotFetchFailed {
                    error: e.to_string(),
                    timestamp: time::now(),
                });
                return Vec::new();
            }
        };

        self.event_bus.emit_lossy(LifecycleEvent::SnapshotFetched {
            classifier_count: snapshot.len(),
            timestamp: time::now(),
        });

        let view = self.evaluation_view(cycle, &snapshot);
        let mut actions = Vec::new();

        self.apply_selection(&view);

        if let Some(action) = self.evaluate_training(&view, corpus_modified_at) {
            actions.push(action);
        }

        if self.state.has_polled_once {
            actions.extend(self.evaluate_purge(&view));
        } else {
            debug!("First snapshot for {}; purge deferred", self.family_name);
        }

        self.state.last_snapshot = Some(snapshot);
        self.state.has_polled_once = true;
        self.cycles_completed += 1;
        self.last_error = None;
        actions
    }

    /// Training submission finished (success or failure)
    ///
    /// Only the completion for the request that set the latch clears it.
    pub fn on_training_complete(
        &mut self,
        request_id: u64,
        result: Result<ClassifierRecord, ServiceError>,
    ) {
        if !self.active {
            return;
        }
        if self.state.pending_train != Some(request_id) {
            debug!("Ignoring completion of stale training request {}", request_id);
            return;
        }
        self.state.pending_train = None;

        match result {
            Ok(record) => {
                info!("New classifier trained: {}", record.id);
                self.event_bus.emit_lossy(LifecycleEvent::TrainingCompleted {
                    classifier_id: Some(record.id.clone()),
                    error: None,
                    timestamp: time::now(),
                });
                self.trained_not_yet_listed = Some((record, self.cycles_started));
            }
            Err(e) => {
                error!("Failed to train classifier {}: {}", self.family_name, e);
                self.last_error = Some(e.to_string());
                self.event_bus.emit_lossy(LifecycleEvent::TrainingCompleted {
                    classifier_id: None,
                    error: Some(e.to_string()),
                    timestamp: time::now(),
                });
            }
        }
    }

    /// Delete request finished; failures are picked up again by the next purge
    pub fn on_delete_complete(&mut self, classifier_id: &str, result: Result<(), ServiceError>) {
        if !self.active {
            return;
        }
        self.deletes_in_flight.remove(classifier_id);

        match result {
            Ok(()) => {
                info!("Classifier deleted: {}", classifier_id);
                self.event_bus.emit_lossy(LifecycleEvent::ClassifierDeleted {
                    classifier_id: classifier_id.to_string(),
                    timestamp: time::now(),
                });
            }
            Err(e) => {
                warn!("Failed to delete classifier {}: {}", classifier_id, e);
                self.event_bus.emit_lossy(LifecycleEvent::ClassifierDeleteFailed {
                    classifier_id: classifier_id.to_string(),
                    error: e.to_string(),
                    timestamp: time::now(),
                });
            }
        }
    }

    pub fn status(&self) -> ReconcilerStatus {
        ReconcilerStatus {
            running: self.active,
            phase: self.phase,
            family_name: self.family_name.clone(),
            active_classifier_id: self.state.active_selection.clone(),
            training_in_flight: self.state.pending_train_submitted(),
            deletions_in_flight: self.deletes_in_flight.len(),
            classifier_count: self.state.last_snapshot.as_ref().map(|s| s.len()),
            last_snapshot_at: self.state.last_snapshot.as_ref().map(|s| s.fetched_at()),
            has_polled_once: self.state.has_polled_once,
            cycles_completed: self.cycles_completed,
            last_error: self.last_error.clone(),
        }
    }

    /// Snapshot as policies should see it
    ///
    /// A listing requested before our last training completed may not show
    /// the new classifier yet; evaluate as if it did, so the training trigger
    /// does not fire twice for the same corpus change.
    fn evaluation_view(&mut self, cycle: u64, snapshot: &RegistrySnapshot) -> RegistrySnapshot {
        match self.trained_not_yet_listed.take() {
            Some((record, _)) if snapshot.contains(&record.id) => snapshot.clone(),
            Some((record, completed_at_cycle)) if cycle <= completed_at_cycle => {
                debug!("Listing predates training of {}; including it", record.id);
                let view = snapshot.with_record(record.clone());
                self.trained_not_yet_listed = Some((record, completed_at_cycle));
                view
            }
            Some((record, _)) => {
                warn!("Trained classifier {} missing from listing", record.id);
                snapshot.clone()
            }
            None => snapshot.clone(),
        }
    }

    fn apply_selection(&mut self, view: &RegistrySnapshot) {
        let Some(selected) = select_active(view) else {
            return;
        };
        if self.state.active_selection.as_deref() == Some(selected.id.as_str()) {
            return;
        }

        let old = self.state.active_selection.replace(selected.id.clone());
        match &old {
            Some(old_id) => info!("Switching classifier {} -> {}", old_id, selected.id),
            None => info!("Selected classifier {}", selected.id),
        }
        self.event_bus.emit_lossy(LifecycleEvent::ActiveClassifierChanged {
            old_classifier_id: old,
            new_classifier_id: selected.id.clone(),
            timestamp: time::now(),
        });
    }

    fn evaluate_training(
        &mut self,
        view: &RegistrySnapshot,
        corpus_modified_at: Option<EpochSeconds>,
    ) -> Option<Action> {
        let Some(modified_at) = corpus_modified_at else {
            debug!("No training corpus for {}; training trigger skipped", self.family_name);
            return None;
        };
        if creation_times_unknown(view) {
            warn!(
                "No {} classifier has a readable creation time; training trigger skipped",
                self.family_name
            );
            return None;
        }
        if !should_train(view, modified_at) {
            return None;
        }
        if let Some(request_id) = self.state.pending_train {
            debug!("Training request {} already in flight", request_id);
            return None;
        }

        let request_id = self.next_request_id;
        self.next_request_id += 1;
        self.state.pending_train = Some(request_id);

        info!("Training new classifier {} (corpus changed)", self.family_name);
        self.event_bus.emit_lossy(LifecycleEvent::TrainingSubmitted {
            family_name: self.family_name.clone(),
            timestamp: time::now(),
        });
        Some(Action::SubmitTraining { request_id })
    }

    fn evaluate_purge(&mut self, view: &RegistrySnapshot) -> Vec<Action> {
        let candidates = purge_candidates(
            view,
            self.state.active_selection.as_deref(),
            self.grace_window_secs,
        );

        let mut actions = Vec::new();
        for classifier_id in candidates {
            if !self.deletes_in_flight.insert(classifier_id.clone()) {
                debug!("Delete of {} already in flight", classifier_id);
                continue;
            }
            info!("Deleting classifier {}", classifier_id);
            actions.push(Action::DeleteClassifier { classifier_id });
        }
        actions
    }
}
