use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectivityEvent {
    Online,
    Offline,
}

impl ConnectivityEvent {
    pub fn from_online(online: bool) -> Self {
        if online {
            ConnectivityEvent::Online
        } else {
            ConnectivityEvent::Offline
        }
    }
}

/// Observable "is the network reachable" signal.
///
/// Subscribers get exactly one event per state change. Implementations never fail;
/// at worst they report a stale state until the next native event or poll tick.
pub trait ConnectivitySignal: Send + Sync {
    fn is_online(&self) -> bool;
    fn subscribe(&self) -> broadcast::Receiver<ConnectivityEvent>;
}

/// Active reachability check used when the platform has no push notifications.
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    async fn probe(&self) -> bool;
}
