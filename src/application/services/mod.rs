pub mod retry_policy;
pub mod submission_service;
pub mod sync_service;

pub use retry_policy::RetryPolicy;
pub use submission_service::{SubmissionService, SubmissionServiceTrait};
pub use sync_service::{SyncService, SyncServiceStatus, SyncState};
