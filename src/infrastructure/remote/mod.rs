mod http;
pub mod photo_uploader;
pub mod rest_client;

pub use photo_uploader::RestPhotoUploader;
pub use rest_client::RestSubmissionClient;
