pub mod failure_kind;
pub mod image_id;
pub mod photo_ref;
pub mod submission_id;
pub mod submission_status;
pub mod sync_status;
pub mod user_id;

pub use failure_kind::FailureKind;
pub use image_id::ImageId;
pub use photo_ref::PhotoRef;
pub use submission_id::SubmissionId;
pub use submission_status::SubmissionStatus;
pub use sync_status::SyncStatus;
pub use user_id::UserId;
