pub mod entities;
pub mod value_objects;

pub use entities::{ImageBlob, Submission, SubmissionDraft, SyncProgress, SyncSummary};
pub use value_objects::{SubmissionId, SyncStatus};
