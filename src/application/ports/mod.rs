pub mod connectivity;
pub mod remote_api;
pub mod submission_store;

pub use connectivity::{ConnectivityEvent, ConnectivityProbe, ConnectivitySignal};
pub use remote_api::{PhotoUploader, RemoteAck, RemoteError, RemoteSubmissionApi};
pub use submission_store::SubmissionStore;
