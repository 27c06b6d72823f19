//! Classifier reconciliation loop
//!
//! Runs as a single tokio task that owns the [`ReconcilerCore`]. Each remote
//! call is spawned as its own task and reports back over a channel, so the
//! loop never waits on the classifier service and all state changes happen on
//! the loop task.

mod machine;

pub use machine::{Action, Phase, ReconcilerCore, ReconcilerStatus, ReconciliationState};

use crate::corpus::TrainingCorpus;
use crate::registry::{ClassifierRecord, RegistrySnapshot};
use crate::service::{ClassifierService, ServiceError, TrainingRequest};
use nlcm_common::events::EventBus;
use nlcm_common::time::EpochSeconds;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Default poll period (also the default purge grace window)
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(300);

/// Reconciler configuration
#[derive(Debug, Clone)]
pub struct ReconcilerSettings {
    /// Classifier family (corpus name) managed by this loop
    pub family_name: String,
    /// Tick period
    pub poll_interval: Duration,
    /// Minimum age gap before a superseded classifier is deleted
    pub grace_window: Duration,
    /// Selection to start from (e.g. persisted from a previous run)
    pub initial_selection: Option<String>,
}

impl ReconcilerSettings {
    /// Settings with the grace window coupled to the poll period
    pub fn new(family_name: impl Into<String>, poll_interval: Duration) -> Self {
        Self {
            family_name: family_name.into(),
            poll_interval,
            grace_window: poll_interval,
            initial_selection: None,
        }
    }
}

/// Completion messages from spawned remote calls
#[derive(Debug)]
enum Completion {
    Snapshot {
        cycle: u64,
        result: Result<RegistrySnapshot, ServiceError>,
    },
    Training {
        request_id: u64,
        result: Result<ClassifierRecord, ServiceError>,
    },
    Deletion {
        classifier_id: String,
        result: Result<(), ServiceError>,
    },
}

/// Handle to a running reconciler task
pub struct ReconcilerHandle {
    status_rx: watch::Receiver<ReconcilerStatus>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ReconcilerHandle {
    /// Latest published status
    pub fn status(&self) -> ReconcilerStatus {
        self.status_rx.borrow().clone()
    }

    /// Receiver that observes every status update
    pub fn subscribe_status(&self) -> watch::Receiver<ReconcilerStatus> {
        self.status_rx.clone()
    }

    /// Token that stops the loop when cancelled
    ///
    /// Lets a signal handler stop reconciliation without owning the handle.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop the timer and wait for the loop to exit
    ///
    /// Remote calls still in flight are not cancelled; their completions are
    /// dropped.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!("Reconciler task ended abnormally: {}", e);
        }
    }
}

/// Start the reconciliation loop on the current tokio runtime
///
/// The first cycle starts immediately, later ones every `poll_interval`.
pub fn spawn_reconciler<S>(
    service: Arc<S>,
    corpus: Arc<TrainingCorpus>,
    settings: ReconcilerSettings,
    event_bus: EventBus,
) -> ReconcilerHandle
where
    S: ClassifierService + ?Sized + 'static,
{
    let grace_window_secs = i64::try_from(settings.grace_window.as_secs()).unwrap_or(i64::MAX);
    let core = ReconcilerCore::new(
        settings.family_name.clone(),
        grace_window_secs,
        settings.initial_selection.clone(),
        event_bus,
    );
    let (status_tx, status_rx) = watch::channel(core.status());
    let (completion_tx, completion_rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();

    let reconciler = Reconciler {
        core,
        service,
        corpus,
        poll_interval: settings.poll_interval,
        completion_tx,
        completion_rx,
        status_tx,
        cancel: cancel.clone(),
    };
    let task = tokio::spawn(reconciler.run());

    ReconcilerHandle {
        status_rx,
        cancel,
        task,
    }
}

struct Reconciler<S: ?Sized> {
    core: ReconcilerCore,
    service: Arc<S>,
    corpus: Arc<TrainingCorpus>,
    poll_interval: Duration,
    completion_tx: mpsc::UnboundedSender<Completion>,
    completion_rx: mpsc::UnboundedReceiver<Completion>,
    status_tx: watch::Sender<ReconcilerStatus>,
    cancel: CancellationToken,
}

impl<S> Reconciler<S>
where
    S: ClassifierService + ?Sized + 'static,
{
    async fn run(mut self) {
        let mut timer = interval(self.poll_interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            "Reconciler started for {} (interval: {}s, corpus: {})",
            self.core.family_name(),
            self.poll_interval.as_secs(),
            self.corpus.path().display()
        );

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => break,

                Some(completion) = self.completion_rx.recv() => {
                    self.handle_completion(completion);
                }

                _ = timer.tick() => {
                    if let Some(action) = self.core.on_tick() {
                        self.dispatch(action);
                    }
                }
            }
            self.publish_status();
        }

        self.core.shutdown();
        self.publish_status();
        info!("Reconciler stopped for {}", self.core.family_name());
    }

    fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Snapshot { cycle, result } => {
                let corpus_modified_at = self.corpus_modified_at();
                for action in self.core.on_snapshot(cycle, result, corpus_modified_at) {
                    self.dispatch(action);
                }
            }
            Completion::Training { request_id, result } => {
                self.core.on_training_complete(request_id, result);
            }
            Completion::Deletion {
                classifier_id,
                result,
            } => {
                self.core.on_delete_complete(&classifier_id, result);
            }
        }
    }

    fn corpus_modified_at(&self) -> Option<EpochSeconds> {
        match self.corpus.last_modified() {
            Ok(modified) => modified,
            Err(e) => {
                warn!(
                    "Cannot read training corpus {}: {}",
                    self.corpus.path().display(),
                    e
                );
                None
            }
        }
    }

    fn dispatch(&self, action: Action) {
        let service = Arc::clone(&self.service);
        let tx = self.completion_tx.clone();

        match action {
            Action::FetchSnapshot { cycle } => {
                let family_name = self.core.family_name().to_string();
                tokio::spawn(async move {
                    let result = match service.list_classifiers(&family_name).await {
                        Ok(records) => Ok(RegistrySnapshot::new(family_name, records)),
                        Err(e) => Err(e),
                    };
                    let _ = tx.send(Completion::Snapshot { cycle, result });
                });
            }
            Action::SubmitTraining { request_id } => {
                let request = TrainingRequest {
                    family_name: self.core.family_name().to_string(),
                    language: self.corpus.language().to_string(),
                    corpus_path: self.corpus.path().to_path_buf(),
                };
                tokio::spawn(async move {
                    let result = service.submit_training(&request).await;
                    let _ = tx.send(Completion::Training { request_id, result });
                });
            }
            Action::DeleteClassifier { classifier_id } => {
                tokio::spawn(async move {
                    let result = service.delete_classifier(&classifier_id).await;
                    let _ = tx.send(Completion::Deletion {
                        classifier_id,
                        result,
                    });
                });
            }
        }
    }

    fn publish_status(&self) {
        self.status_tx.send_replace(self.core.status());
    }
}
