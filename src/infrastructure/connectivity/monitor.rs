use crate::application::ports::{ConnectivityEvent, ConnectivityProbe, ConnectivitySignal};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Online/offline state fed either by platform callbacks (`report`) or by a
/// polled probe. Subscribers see one event per actual transition.
pub struct ConnectivityMonitor {
    online: AtomicBool,
    transition: Mutex<()>,
    events: broadcast::Sender<ConnectivityEvent>,
}

impl ConnectivityMonitor {
    pub fn new(initially_online: bool) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            online: AtomicBool::new(initially_online),
            transition: Mutex::new(()),
            events,
        }
    }

    /// Samples the initial state from `probe` once.
    pub async fn from_probe(probe: &dyn ConnectivityProbe) -> Self {
        Self::new(probe.probe().await)
    }

    /// Records the platform's view of the network. Returns true on a transition.
    pub fn report(&self, online: bool) -> bool {
        // Serializes swap + send so events are observed in transition order.
        let _guard = match self.transition.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let previous = self.online.swap(online, Ordering::SeqCst);
        if previous == online {
            return false;
        }

        tracing::info!(
            target: "sync::connectivity",
            online,
            "connectivity changed"
        );
        // Nobody listening is fine.
        let _ = self.events.send(ConnectivityEvent::from_online(online));
        true
    }

    /// Polls `probe` every `interval` and reports the result.
    pub fn spawn_polling(
        self: &Arc<Self>,
        probe: Arc<dyn ConnectivityProbe>,
        interval: Duration,
    ) -> JoinHandle<()> {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let online = probe.probe().await;
                monitor.report(online);
            }
        })
    }
}

impl ConnectivitySignal for ConnectivityMonitor {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    fn subscribe(&self) -> broadcast::Receiver<ConnectivityEvent> {
        self.events.subscribe()
    }
}
