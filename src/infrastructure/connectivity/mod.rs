pub mod http_probe;
pub mod monitor;

pub use http_probe::HttpHealthProbe;
pub use monitor::ConnectivityMonitor;
