#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use field_sync::application::ports::{RemoteAck, RemoteError, RemoteSubmissionApi};
use field_sync::application::services::{RetryPolicy, SyncService};
use field_sync::domain::entities::{Submission, SubmissionDraft};
use field_sync::domain::value_objects::{SubmissionId, SubmissionStatus, UserId};
use field_sync::infrastructure::connectivity::ConnectivityMonitor;
use field_sync::infrastructure::offline::SqliteSubmissionStore;
use futures::future::BoxFuture;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

/// Called after the n-th push (1-based) has been recorded, before it is answered.
pub type PushHook = Arc<dyn Fn(usize) -> BoxFuture<'static, ()> + Send + Sync>;

/// In-memory stand-in for the backend's upsert endpoint.
#[derive(Default)]
pub struct MockRemoteApi {
    records: Mutex<HashMap<String, Submission>>,
    pushes: Mutex<Vec<String>>,
    rejected: Mutex<HashMap<String, String>>,
    transient: Mutex<HashSet<String>>,
    hook: Mutex<Option<PushHook>>,
    gate: Mutex<Option<watch::Receiver<bool>>>,
    entered: AtomicUsize,
}

impl MockRemoteApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reject(&self, id: &SubmissionId, reason: &str) {
        self.rejected
            .lock()
            .unwrap()
            .insert(id.to_string(), reason.to_string());
    }

    pub fn fail_transiently(&self, id: &SubmissionId) {
        self.transient.lock().unwrap().insert(id.to_string());
    }

    pub fn recover(&self, id: &SubmissionId) {
        self.transient.lock().unwrap().remove(id.as_str());
        self.rejected.lock().unwrap().remove(id.as_str());
    }

    pub fn on_push(&self, hook: PushHook) {
        *self.hook.lock().unwrap() = Some(hook);
    }

    /// Holds every push until the returned sender publishes `true`.
    pub fn hold_pushes(&self) -> watch::Sender<bool> {
        let (tx, rx) = watch::channel(false);
        *self.gate.lock().unwrap() = Some(rx);
        tx
    }

    pub fn entered(&self) -> usize {
        self.entered.load(Ordering::SeqCst)
    }

    pub fn pushes(&self) -> Vec<String> {
        self.pushes.lock().unwrap().clone()
    }

    pub fn record_count(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn record(&self, id: &SubmissionId) -> Option<Submission> {
        self.records.lock().unwrap().get(id.as_str()).cloned()
    }
}

#[async_trait]
impl RemoteSubmissionApi for MockRemoteApi {
    async fn create_or_update_submission(
        &self,
        submission: &Submission,
    ) -> Result<RemoteAck, RemoteError> {
        self.entered.fetch_add(1, Ordering::SeqCst);
        let gate = self.gate.lock().unwrap().clone();
        if let Some(mut gate) = gate {
            let _ = gate.wait_for(|open| *open).await;
        }

        let id = submission.id.to_string();
        let count = {
            let mut pushes = self.pushes.lock().unwrap();
            pushes.push(id.clone());
            pushes.len()
        };
        let hook = self.hook.lock().unwrap().clone();
        if let Some(hook) = hook {
            hook(count).await;
        }

        if let Some(reason) = self.rejected.lock().unwrap().get(&id).cloned() {
            return Err(RemoteError::Rejected { item_id: id, reason });
        }
        if self.transient.lock().unwrap().contains(&id) {
            return Err(RemoteError::Transient("connection reset".into()));
        }

        self.records
            .lock()
            .unwrap()
            .insert(id, submission.clone());
        Ok(RemoteAck {
            id: submission.id.clone(),
            status: submission.status,
        })
    }
}

pub fn draft(user: &str, issues: &str) -> SubmissionDraft {
    SubmissionDraft {
        campaign_id: Some("campaign-2026".into()),
        location_id: Some("village-12".into()),
        community_group_id: None,
        community_group_type: "youth".into(),
        participant_count: 18,
        key_issues: issues.into(),
        photo_proof: vec![],
        status: SubmissionStatus::Submitted,
        submitted_by: UserId::new(user.into()).expect("user id"),
    }
}

pub fn submission(issues: &str) -> Submission {
    Submission::from_draft(draft("promoter-1", issues), Utc::now())
}

pub struct Harness {
    pub store: Arc<SqliteSubmissionStore>,
    pub remote: Arc<MockRemoteApi>,
    pub connectivity: Arc<ConnectivityMonitor>,
    pub service: Arc<SyncService>,
}

impl Harness {
    pub async fn new(online: bool) -> Self {
        Self::with_policy(online, RetryPolicy::immediate()).await
    }

    pub async fn with_policy(online: bool, policy: RetryPolicy) -> Self {
        let store = Arc::new(
            SqliteSubmissionStore::open_in_memory(1_000)
                .await
                .expect("store"),
        );
        let remote = MockRemoteApi::new();
        let connectivity = Arc::new(ConnectivityMonitor::new(online));
        let service = Arc::new(
            SyncService::new(store.clone(), remote.clone(), connectivity.clone())
                .with_retry_policy(policy),
        );
        Self {
            store,
            remote,
            connectivity,
            service,
        }
    }
}
