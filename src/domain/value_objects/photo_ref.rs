use super::ImageId;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr};

const LOCAL_PREFIX: &str = "local:";

/// One entry of a submission's photo proof: an uploaded URL or a local blob handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PhotoRef {
    Remote(String),
    Local(ImageId),
}

impl PhotoRef {
    pub fn is_local(&self) -> bool {
        matches!(self, PhotoRef::Local(_))
    }

    pub fn local_image(&self) -> Option<&ImageId> {
        match self {
            PhotoRef::Local(id) => Some(id),
            PhotoRef::Remote(_) => None,
        }
    }
}

impl fmt::Display for PhotoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhotoRef::Remote(url) => write!(f, "{url}"),
            PhotoRef::Local(id) => write!(f, "{LOCAL_PREFIX}{id}"),
        }
    }
}

impl FromStr for PhotoRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(rest) = s.strip_prefix(LOCAL_PREFIX) {
            return ImageId::new(rest.to_string()).map(PhotoRef::Local);
        }
        if s.trim().is_empty() {
            return Err("Photo reference cannot be empty".to_string());
        }
        Ok(PhotoRef::Remote(s.to_string()))
    }
}

impl Serialize for PhotoRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PhotoRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
