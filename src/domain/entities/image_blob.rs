use crate::domain::value_objects::ImageId;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// Photo bytes queued offline before any upload happens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBlob {
    pub id: ImageId,
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub sha256: String,
    pub created_at: DateTime<Utc>,
}

impl ImageBlob {
    pub fn new(id: ImageId, bytes: Vec<u8>, content_type: impl Into<String>) -> Self {
        let sha256 = sha256_hex(&bytes);
        Self {
            id,
            bytes,
            content_type: content_type.into(),
            sha256,
            created_at: Utc::now(),
        }
    }

    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}
