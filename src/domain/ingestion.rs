// Ingestion outcome and acknowledgment models
use super::device::DeviceId;
use super::error::ChannelError;
use super::telemetry::ChannelKind;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use uuid::Uuid;

/// Returned to the station as soon as a report is queued. Informational only.
#[derive(Debug, Clone, Serialize)]
pub struct AcceptanceToken {
    pub token: Uuid,
    pub accepted_at: DateTime<Utc>,
}

impl AcceptanceToken {
    pub fn issue() -> Self {
        Self {
            token: Uuid::new_v4(),
            accepted_at: Utc::now(),
        }
    }
}

/// What happened to a single channel while ingesting one report.
#[derive(Debug, Clone, Default)]
pub struct ChannelOutcome {
    pub written: usize,
    pub errors: Vec<ChannelError>,
}

#[derive(Debug, Clone)]
pub struct IngestionResult {
    pub device_id: DeviceId,
    pub per_channel_counts: BTreeMap<ChannelKind, usize>,
    pub per_channel_errors: BTreeMap<ChannelKind, Vec<ChannelError>>,
    pub elapsed: Duration,
}

impl IngestionResult {
    pub fn from_outcomes(
        device_id: DeviceId,
        outcomes: impl IntoIterator<Item = (ChannelKind, ChannelOutcome)>,
        elapsed: Duration,
    ) -> Self {
        let mut per_channel_counts = BTreeMap::new();
        let mut per_channel_errors = BTreeMap::new();

        for (kind, outcome) in outcomes {
            per_channel_counts.insert(kind, outcome.written);
            if !outcome.errors.is_empty() {
                per_channel_errors.insert(kind, outcome.errors);
            }
        }

        Self {
            device_id,
            per_channel_counts,
            per_channel_errors,
            elapsed,
        }
    }

    #[cfg(test)]
    pub fn written(&self, kind: ChannelKind) -> usize {
        self.per_channel_counts.get(&kind).copied().unwrap_or(0)
    }

    #[cfg(test)]
    pub fn errors(&self, kind: ChannelKind) -> &[ChannelError] {
        self.per_channel_errors
            .get(&kind)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn total_written(&self) -> usize {
        self.per_channel_counts.values().sum()
    }

    pub fn error_count(&self) -> usize {
        self.per_channel_errors.values().map(Vec::len).sum()
    }

    pub fn is_clean(&self) -> bool {
        self.per_channel_errors.is_empty()
    }
}
