use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub sync: SyncConfig,
    pub remote: RemoteConfig,
    pub connectivity: ConnectivityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Run a pass automatically on every offline -> online transition.
    pub sync_on_reconnect: bool,
    pub auto_sync: bool,
    /// Seconds between scheduled passes when `auto_sync` is on.
    pub sync_interval: u64,
    pub max_pending: u32,
    pub retry_base_secs: u64,
    pub retry_max_secs: u64,
    /// Synced rows older than this are purged after each pass. `None` keeps them.
    #[serde(default)]
    pub retain_synced_hours: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub base_url: String,
    pub table: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub photo_bucket: Option<String>,
    pub request_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectivityConfig {
    /// Health endpoint polled when the platform gives no push notifications.
    #[serde(default)]
    pub probe_url: Option<String>,
    pub poll_interval: u64,
    pub probe_timeout: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: default_database_url(),
                max_connections: 5,
                connection_timeout: 30,
            },
            sync: SyncConfig {
                sync_on_reconnect: true,
                auto_sync: false,
                sync_interval: 300, // 5 minutes
                max_pending: 5_000,
                retry_base_secs: 30,
                retry_max_secs: 3_600,
                retain_synced_hours: None,
            },
            remote: RemoteConfig {
                base_url: "http://localhost:54321".to_string(),
                table: "submissions".to_string(),
                api_key: None,
                access_token: None,
                photo_bucket: None,
                request_timeout: 30,
            },
            connectivity: ConnectivityConfig {
                probe_url: None,
                poll_interval: 15,
                probe_timeout: 5,
            },
        }
    }
}

impl SyncConfig {
    pub fn retry_base(&self) -> Duration {
        Duration::from_secs(self.retry_base_secs)
    }

    pub fn retry_max(&self) -> Duration {
        Duration::from_secs(self.retry_max_secs)
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("FIELD_SYNC_DATABASE_URL") {
            if !v.trim().is_empty() {
                cfg.database.url = v.trim().to_string();
            }
        }
        if let Some(value) = env_u64("FIELD_SYNC_DATABASE_MAX_CONNECTIONS") {
            cfg.database.max_connections = value as u32;
        }

        if let Ok(v) = std::env::var("FIELD_SYNC_SYNC_ON_RECONNECT") {
            cfg.sync.sync_on_reconnect = parse_bool(&v, cfg.sync.sync_on_reconnect);
        }
        if let Ok(v) = std::env::var("FIELD_SYNC_AUTO_SYNC") {
            cfg.sync.auto_sync = parse_bool(&v, cfg.sync.auto_sync);
        }
        if let Some(value) = env_u64("FIELD_SYNC_SYNC_INTERVAL_SECS") {
            cfg.sync.sync_interval = value.max(1);
        }
        if let Some(value) = env_u64("FIELD_SYNC_MAX_PENDING") {
            cfg.sync.max_pending = value.min(u32::MAX as u64) as u32;
        }
        if let Some(value) = env_u64("FIELD_SYNC_RETRY_BASE_SECS") {
            cfg.sync.retry_base_secs = value;
        }
        if let Some(value) = env_u64("FIELD_SYNC_RETRY_MAX_SECS") {
            cfg.sync.retry_max_secs = value;
        }
        if let Some(value) = env_u64("FIELD_SYNC_RETAIN_SYNCED_HOURS") {
            cfg.sync.retain_synced_hours = Some(value);
        }

        if let Ok(v) = std::env::var("FIELD_SYNC_REMOTE_URL") {
            if !v.trim().is_empty() {
                cfg.remote.base_url = v.trim().trim_end_matches('/').to_string();
            }
        }
        if let Ok(v) = std::env::var("FIELD_SYNC_REMOTE_TABLE") {
            if !v.trim().is_empty() {
                cfg.remote.table = v.trim().to_string();
            }
        }
        cfg.remote.api_key = env_non_empty("FIELD_SYNC_API_KEY");
        cfg.remote.access_token = env_non_empty("FIELD_SYNC_ACCESS_TOKEN");
        cfg.remote.photo_bucket = env_non_empty("FIELD_SYNC_PHOTO_BUCKET");
        if let Some(value) = env_u64("FIELD_SYNC_REQUEST_TIMEOUT_SECS") {
            cfg.remote.request_timeout = value.max(1);
        }

        cfg.connectivity.probe_url = env_non_empty("FIELD_SYNC_PROBE_URL");
        if let Some(value) = env_u64("FIELD_SYNC_POLL_INTERVAL_SECS") {
            cfg.connectivity.poll_interval = value.max(1);
        }
        if let Some(value) = env_u64("FIELD_SYNC_PROBE_TIMEOUT_SECS") {
            cfg.connectivity.probe_timeout = value.max(1);
        }

        cfg
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.database.max_connections == 0 {
            return Err("Database max_connections must be greater than 0".to_string());
        }
        if self.sync.max_pending == 0 {
            return Err("Sync max_pending must be greater than 0".to_string());
        }
        if self.sync.auto_sync && self.sync.sync_interval == 0 {
            return Err("Sync sync_interval must be greater than 0".to_string());
        }
        if self.sync.retry_max_secs < self.sync.retry_base_secs {
            return Err("Sync retry_max_secs must not be below retry_base_secs".to_string());
        }
        if !(self.remote.base_url.starts_with("http://")
            || self.remote.base_url.starts_with("https://"))
        {
            return Err(format!(
                "Remote base_url must be an http(s) URL: {}",
                self.remote.base_url
            ));
        }
        if self.remote.table.trim().is_empty() {
            return Err("Remote table must not be empty".to_string());
        }
        if self.connectivity.poll_interval == 0 {
            return Err("Connectivity poll_interval must be greater than 0".to_string());
        }
        Ok(())
    }
}

fn default_database_url() -> String {
    let dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("./data"))
        .join("field-sync");
    format!("sqlite://{}?mode=rwc", dir.join("queue.db").display())
}

fn parse_bool(s: &str, default: bool) -> bool {
    match s.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

fn parse_u64(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok()
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| parse_u64(&v))
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
