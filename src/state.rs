use crate::application::ports::{ConnectivityProbe, ConnectivitySignal, SubmissionStore};
use crate::application::services::{RetryPolicy, SubmissionService, SyncService};
use crate::infrastructure::connectivity::{ConnectivityMonitor, HttpHealthProbe};
use crate::infrastructure::offline::SqliteSubmissionStore;
use crate::infrastructure::remote::{RestPhotoUploader, RestSubmissionClient};
use crate::shared::config::AppConfig;
use crate::shared::error::AppError;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Wires the queue, connectivity and sync services from one configuration.
pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<SqliteSubmissionStore>,
    pub connectivity: Arc<ConnectivityMonitor>,
    pub probe: Arc<HttpHealthProbe>,
    pub submission_service: Arc<SubmissionService>,
    pub sync_service: Arc<SyncService>,
}

impl AppState {
    pub async fn new(config: AppConfig) -> Result<Self, AppError> {
        config.validate().map_err(AppError::ConfigurationError)?;

        let store = Arc::new(
            SqliteSubmissionStore::open(&config.database, config.sync.max_pending).await?,
        );

        let probe_url = config
            .connectivity
            .probe_url
            .clone()
            .unwrap_or_else(|| format!("{}/rest/v1/", config.remote.base_url));
        let probe = Arc::new(HttpHealthProbe::new(
            probe_url,
            Duration::from_secs(config.connectivity.probe_timeout),
        )?);
        let connectivity = Arc::new(ConnectivityMonitor::from_probe(probe.as_ref()).await);

        let remote = Arc::new(RestSubmissionClient::new(&config.remote)?);
        let mut sync_service = SyncService::new(store.clone(), remote, connectivity.clone())
            .with_retry_policy(RetryPolicy::new(
                config.sync.retry_base(),
                config.sync.retry_max(),
            ));
        if let Some(bucket) = &config.remote.photo_bucket {
            sync_service = sync_service
                .with_photo_uploader(Arc::new(RestPhotoUploader::new(&config.remote, bucket)?));
        } else {
            tracing::warn!(
                target: "sync::orchestrator",
                "no photo bucket configured; submissions with queued photos will stay local"
            );
        }
        if let Some(hours) = config.sync.retain_synced_hours {
            sync_service = sync_service.with_retention(chrono::Duration::hours(hours as i64));
        }

        let submission_service = Arc::new(SubmissionService::new(store.clone()));

        tracing::info!(
            target: "sync::orchestrator",
            online = connectivity.is_online(),
            remote = %config.remote.base_url,
            "field sync state initialized"
        );

        Ok(Self {
            config,
            store,
            connectivity,
            probe,
            submission_service,
            sync_service: Arc::new(sync_service),
        })
    }

    /// Starts connectivity polling and the configured automatic sync triggers.
    pub fn start_background_tasks(&self) -> Vec<JoinHandle<()>> {
        let probe: Arc<dyn ConnectivityProbe> = self.probe.clone();
        let mut handles = vec![self.connectivity.spawn_polling(
            probe,
            Duration::from_secs(self.config.connectivity.poll_interval),
        )];

        if self.config.sync.sync_on_reconnect {
            handles.push(self.sync_service.spawn_auto_sync());
        }
        if self.config.sync.auto_sync {
            handles.push(
                self.sync_service
                    .schedule_sync(Duration::from_secs(self.config.sync.sync_interval)),
            );
        }
        handles
    }

    pub async fn shutdown(&self, handles: Vec<JoinHandle<()>>) {
        for handle in handles {
            handle.abort();
        }
        self.store.close().await;
    }
}
