// Device domain model
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(pub i64);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A registered field station. Owned by the device directory; ingestion only reads it.
#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    pub id: DeviceId,
    pub name: String,
    pub description: Option<String>,
    pub user_id: Option<i64>,
    pub registered_at: DateTime<Utc>,
}

impl Device {
    #[cfg(test)]
    pub fn new(id: DeviceId, name: String) -> Self {
        Self {
            id,
            name,
            description: None,
            user_id: None,
            registered_at: Utc::now(),
        }
    }
}
