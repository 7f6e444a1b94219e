use crate::application::ports::{
    ConnectivityEvent, ConnectivitySignal, PhotoUploader, RemoteError, RemoteSubmissionApi,
    SubmissionStore,
};
use crate::application::services::retry_policy::RetryPolicy;
use crate::domain::entities::{RejectedItem, Submission, SyncProgress, SyncSummary};
use crate::domain::value_objects::{FailureKind, PhotoRef, SyncStatus};
use crate::infrastructure::offline::metrics::{SyncMetrics, SyncMetricsSnapshot};
use crate::shared::error::AppError;
use chrono::{DateTime, Utc};
use futures::{FutureExt, Stream};
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch, Mutex, RwLock};
use tokio::task::JoinHandle;

const PROGRESS_CHANNEL_CAPACITY: usize = 64;

type PassResult = Result<SyncSummary, AppError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Idle,
    Running,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncServiceStatus {
    pub is_syncing: bool,
    pub pending_count: u32,
    pub last_summary: Option<SyncSummary>,
    pub last_sync: Option<i64>,
    pub sync_errors: u32,
}

#[derive(Default)]
struct StatusState {
    last_summary: Option<SyncSummary>,
    last_sync: Option<i64>,
    sync_errors: u32,
}

enum SyncPhase {
    Idle,
    /// Joiners wait on the receiver for the running pass's result.
    Running(watch::Receiver<Option<PassResult>>),
}

enum PushOutcome {
    Synced,
    Failed { kind: FailureKind, reason: String },
    /// Edited locally while in flight; the next pass pushes the new content.
    Superseded,
}

impl PushOutcome {
    fn from_remote(err: RemoteError) -> Self {
        match AppError::from(err) {
            AppError::RemoteRejected { reason, .. } => PushOutcome::Failed {
                kind: FailureKind::Rejected,
                reason,
            },
            other => PushOutcome::Failed {
                kind: FailureKind::Transient,
                reason: other.to_string(),
            },
        }
    }
}

/// Replicates `local` submissions to the remote API, one pass at a time.
pub struct SyncService {
    store: Arc<dyn SubmissionStore>,
    remote: Arc<dyn RemoteSubmissionApi>,
    connectivity: Arc<dyn ConnectivitySignal>,
    uploader: Option<Arc<dyn PhotoUploader>>,
    policy: RetryPolicy,
    retain_synced: Option<chrono::Duration>,
    phase: Mutex<SyncPhase>,
    status: RwLock<StatusState>,
    progress_tx: broadcast::Sender<SyncProgress>,
    metrics: SyncMetrics,
}

impl SyncService {
    pub fn new(
        store: Arc<dyn SubmissionStore>,
        remote: Arc<dyn RemoteSubmissionApi>,
        connectivity: Arc<dyn ConnectivitySignal>,
    ) -> Self {
        let (progress_tx, _) = broadcast::channel(PROGRESS_CHANNEL_CAPACITY);
        Self {
            store,
            remote,
            connectivity,
            uploader: None,
            policy: RetryPolicy::default(),
            retain_synced: None,
            phase: Mutex::new(SyncPhase::Idle),
            status: RwLock::new(StatusState::default()),
            progress_tx,
            metrics: SyncMetrics::new(),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_photo_uploader(mut self, uploader: Arc<dyn PhotoUploader>) -> Self {
        self.uploader = Some(uploader);
        self
    }

    /// Purge synced rows older than `retain` at the end of every pass.
    pub fn with_retention(mut self, retain: chrono::Duration) -> Self {
        self.retain_synced = Some(retain);
        self
    }

    pub async fn pending_count(&self) -> Result<u32, AppError> {
        self.store.count_by_status(SyncStatus::Local).await
    }

    pub async fn state(&self) -> SyncState {
        match &*self.phase.lock().await {
            SyncPhase::Idle => SyncState::Idle,
            SyncPhase::Running(_) => SyncState::Running,
        }
    }

    pub async fn get_status(&self) -> Result<SyncServiceStatus, AppError> {
        let is_syncing = self.state().await == SyncState::Running;
        let pending_count = self.pending_count().await?;
        let status = self.status.read().await;
        Ok(SyncServiceStatus {
            is_syncing,
            pending_count,
            last_summary: status.last_summary.clone(),
            last_sync: status.last_sync,
            sync_errors: status.sync_errors,
        })
    }

    pub fn metrics(&self) -> SyncMetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn subscribe_progress(&self) -> broadcast::Receiver<SyncProgress> {
        self.progress_tx.subscribe()
    }

    /// Progress of running passes as a stream; lagging consumers skip ahead.
    pub fn progress_stream(&self) -> impl Stream<Item = SyncProgress> + Send + 'static {
        futures::stream::unfold(self.subscribe_progress(), |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(progress) => return Some((progress, rx)),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })
    }

    /// Starts a pass when idle. While a pass is running, resolves to that pass's
    /// result instead of starting a second one.
    pub async fn trigger_sync(self: &Arc<Self>) -> Result<SyncSummary, AppError> {
        let mut rx = {
            let mut phase = self.phase.lock().await;
            match &*phase {
                SyncPhase::Running(rx) => {
                    tracing::debug!(
                        target: "sync::orchestrator",
                        "sync pass already running; joining it"
                    );
                    rx.clone()
                }
                SyncPhase::Idle => {
                    let (tx, rx) = watch::channel(None);
                    *phase = SyncPhase::Running(rx.clone());
                    let service = Arc::clone(self);
                    tokio::spawn(async move {
                        let result = AssertUnwindSafe(service.run_pass())
                            .catch_unwind()
                            .await
                            .unwrap_or_else(|_| {
                                Err(AppError::Internal("sync pass panicked".to_string()))
                            });
                        service.finish_pass(&result).await;
                        *service.phase.lock().await = SyncPhase::Idle;
                        let _ = tx.send(Some(result));
                    });
                    rx
                }
            }
        };

        let result = match rx.wait_for(Option::is_some).await {
            Ok(value) => (*value).clone(),
            Err(_) => None,
        };
        result.unwrap_or_else(|| {
            Err(AppError::Internal(
                "sync pass ended without reporting a result".to_string(),
            ))
        })
    }

    async fn run_pass(&self) -> PassResult {
        let started_at = Utc::now();

        if !self.connectivity.is_online() {
            return Err(AppError::NetworkUnavailable(
                "device is offline; pending submissions stay queued".to_string(),
            ));
        }

        let snapshot = self.store.get_all_by_status(SyncStatus::Local).await?;
        let total = snapshot.len() as u32;
        tracing::info!(target: "sync::orchestrator", total, "sync pass started");
        self.emit_progress(0, total);

        let mut succeeded = 0u32;
        let mut failed = 0u32;
        let mut processed = 0u32;
        let mut rejected = Vec::new();
        let mut aborted_offline = false;

        for queued in snapshot {
            if !self.connectivity.is_online() {
                aborted_offline = true;
                tracing::warn!(
                    target: "sync::orchestrator",
                    remaining = total - processed,
                    "connectivity lost mid-pass; deferring remaining submissions"
                );
                break;
            }

            let id = queued.id;
            // The snapshot may be stale by the time this item's turn comes.
            let submission = match self.store.get(&id).await {
                Ok(current) if current.is_pending() => current,
                Ok(_) | Err(AppError::NotFound(_)) => {
                    tracing::debug!(
                        target: "sync::orchestrator",
                        submission_id = %id,
                        "submission left the queue before its turn; skipping"
                    );
                    processed += 1;
                    self.emit_progress(processed, total);
                    continue;
                }
                Err(err) => return Err(err),
            };

            if self.policy.is_deferred(&submission.attempt, Utc::now()) {
                tracing::debug!(
                    target: "sync::orchestrator",
                    submission_id = %id,
                    attempts = submission.attempt.attempt_count,
                    "submission still in rejection backoff; skipping"
                );
                processed += 1;
                self.emit_progress(processed, total);
                continue;
            }

            match self.push_one(submission).await? {
                PushOutcome::Synced => {
                    succeeded += 1;
                    tracing::debug!(
                        target: "sync::orchestrator",
                        submission_id = %id,
                        "submission synced"
                    );
                }
                PushOutcome::Superseded => {
                    tracing::info!(
                        target: "sync::orchestrator",
                        submission_id = %id,
                        "submission edited during push; it stays local for the next pass"
                    );
                }
                PushOutcome::Failed { kind, reason } => {
                    failed += 1;
                    tracing::warn!(
                        target: "sync::orchestrator",
                        submission_id = %id,
                        kind = %kind,
                        reason = %reason,
                        "submission push failed; it stays local"
                    );
                    self.record_failure(&id, kind, &reason).await?;
                    if kind == FailureKind::Rejected {
                        rejected.push(RejectedItem {
                            item_id: id,
                            reason,
                        });
                    }
                }
            }

            processed += 1;
            self.emit_progress(processed, total);
        }

        Ok(SyncSummary {
            succeeded,
            failed,
            total,
            rejected,
            aborted_offline,
            started_at,
            finished_at: Utc::now(),
        })
    }

    async fn push_one(&self, mut submission: Submission) -> Result<PushOutcome, AppError> {
        if submission.has_local_photos() {
            let Some(uploader) = self.uploader.clone() else {
                return Ok(PushOutcome::Failed {
                    kind: FailureKind::Transient,
                    reason: "photos are queued locally but no photo uploader is configured"
                        .to_string(),
                });
            };
            if let Some(outcome) = self
                .upload_photos(uploader.as_ref(), &mut submission)
                .await?
            {
                return Ok(outcome);
            }
        }

        let ack = match self.remote.create_or_update_submission(&submission).await {
            Ok(ack) => ack,
            Err(err) => return Ok(PushOutcome::from_remote(err)),
        };
        if ack.id != submission.id {
            return Ok(PushOutcome::Failed {
                kind: FailureKind::Transient,
                reason: format!("remote acknowledged unexpected id {}", ack.id),
            });
        }

        match self.store.mark_synced_if_unchanged(&submission).await {
            Ok(true) => Ok(PushOutcome::Synced),
            Ok(false) => Ok(PushOutcome::Superseded),
            Err(AppError::NotFound(_)) => {
                tracing::warn!(
                    target: "sync::orchestrator",
                    submission_id = %submission.id,
                    "submission removed locally while it was being pushed"
                );
                Ok(PushOutcome::Synced)
            }
            Err(err) => Err(err),
        }
    }

    /// Uploads queued photo blobs and persists the resolved URLs so a retry does
    /// not upload them again. Returns the outcome that stops this submission.
    async fn upload_photos(
        &self,
        uploader: &dyn PhotoUploader,
        submission: &mut Submission,
    ) -> Result<Option<PushOutcome>, AppError> {
        let queued_photos = submission.photo_proof.clone();
        let pending: Vec<_> = submission.local_images().cloned().collect();

        for image_id in pending {
            let blob = match self.store.get_image(&image_id).await {
                Ok(blob) => blob,
                Err(AppError::NotFound(_)) => {
                    return Ok(Some(PushOutcome::Failed {
                        kind: FailureKind::Rejected,
                        reason: format!("photo {image_id} is missing from local storage"),
                    }));
                }
                Err(err) => return Err(err),
            };

            match uploader.upload(&image_id, &blob).await {
                Ok(url) => {
                    submission.replace_photo(&PhotoRef::Local(image_id), PhotoRef::Remote(url));
                }
                Err(err) => {
                    let outcome = match PushOutcome::from_remote(err) {
                        PushOutcome::Failed {
                            kind: FailureKind::Rejected,
                            reason,
                        } => PushOutcome::Failed {
                            kind: FailureKind::Rejected,
                            reason: format!("photo upload rejected: {reason}"),
                        },
                        other => other,
                    };
                    return Ok(Some(outcome));
                }
            }
        }

        let replaced = self
            .store
            .replace_photo_proof(&submission.id, &queued_photos, &submission.photo_proof)
            .await?;
        if !replaced {
            return Ok(Some(PushOutcome::Superseded));
        }
        Ok(None)
    }

    async fn record_failure(
        &self,
        id: &crate::domain::value_objects::SubmissionId,
        kind: FailureKind,
        reason: &str,
    ) -> Result<(), AppError> {
        match self.store.record_attempt_failure(id, kind, reason).await {
            Ok(()) | Err(AppError::NotFound(_)) => Ok(()),
            Err(err) => Err(err),
        }
    }

    async fn finish_pass(&self, result: &PassResult) {
        match result {
            Ok(summary) => {
                self.metrics.record_pass(summary);
                tracing::info!(
                    target: "sync::orchestrator",
                    succeeded = summary.succeeded,
                    failed = summary.failed,
                    total = summary.total,
                    not_attempted = summary.not_attempted(),
                    duration_ms = summary.duration_ms(),
                    "sync pass completed"
                );
                {
                    let mut status = self.status.write().await;
                    status.last_summary = Some(summary.clone());
                    status.last_sync = Some(summary.finished_at.timestamp());
                }
                self.purge_expired(summary.finished_at).await;
            }
            Err(err) => {
                self.metrics.record_error(&err.to_string());
                let mut status = self.status.write().await;
                status.sync_errors += 1;
                tracing::warn!(
                    target: "sync::orchestrator",
                    error = %err,
                    "sync pass did not complete"
                );
            }
        }
    }

    async fn purge_expired(&self, now: DateTime<Utc>) {
        let Some(retain) = self.retain_synced else {
            return;
        };
        match self.store.purge_synced(now - retain).await {
            Ok(0) => {}
            Ok(removed) => {
                tracing::debug!(target: "sync::orchestrator", removed, "purged synced submissions")
            }
            Err(err) => tracing::warn!(
                target: "sync::orchestrator",
                error = %err,
                "failed to purge synced submissions"
            ),
        }
    }

    fn emit_progress(&self, processed: u32, total: u32) {
        // No subscribers is fine.
        let _ = self.progress_tx.send(SyncProgress { processed, total });
    }

    /// Runs a pass on every offline -> online transition.
    pub fn spawn_auto_sync(self: &Arc<Self>) -> JoinHandle<()> {
        let service = Arc::clone(self);
        let mut events = self.connectivity.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(ConnectivityEvent::Online) => service.run_triggered("reconnect").await,
                    Ok(ConnectivityEvent::Offline) => {
                        tracing::debug!(target: "sync::orchestrator", "went offline");
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => {
                        if service.connectivity.is_online() {
                            service.run_triggered("reconnect").await;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            tracing::debug!(target: "sync::orchestrator", "auto-sync listener stopped");
        })
    }

    /// Runs a pass every `interval` while online.
    pub fn schedule_sync(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                ticker.tick().await;
                if service.connectivity.is_online() {
                    service.run_triggered("schedule").await;
                }
            }
        })
    }

    async fn run_triggered(self: &Arc<Self>, trigger: &'static str) {
        match self.trigger_sync().await {
            Ok(summary) => tracing::info!(
                target: "sync::orchestrator",
                trigger,
                succeeded = summary.succeeded,
                failed = summary.failed,
                total = summary.total,
                "triggered sync finished"
            ),
            Err(err) => tracing::error!(
                target: "sync::orchestrator",
                trigger,
                error = %err,
                "triggered sync failed"
            ),
        }
    }
}
