pub mod image_blob;
pub mod submission;
pub mod sync_summary;

pub use image_blob::ImageBlob;
pub use submission::{Submission, SubmissionDraft, SyncAttempt};
pub use sync_summary::{RejectedItem, SyncProgress, SyncSummary};
