// In-memory sample store, one append-only vector per channel kind
use crate::application::channel_writer::{ensure_payload_shape, ChannelWriter};
use crate::domain::device::{Device, DeviceId};
use crate::domain::telemetry::{ChannelKind, Sample};
use anyhow::anyhow;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub struct StoredSample {
    pub id: u64,
    pub device_id: DeviceId,
    pub sample: Sample,
}

#[derive(Debug, Default)]
pub struct InMemorySampleStore {
    channels: Mutex<HashMap<ChannelKind, Vec<StoredSample>>>,
    next_id: AtomicU64,
}

impl InMemorySampleStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn samples(&self, kind: ChannelKind) -> Vec<StoredSample> {
        self.channels
            .lock()
            .map(|channels| channels.get(&kind).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    #[cfg(test)]
    pub fn count(&self, kind: ChannelKind) -> usize {
        self.channels
            .lock()
            .map(|channels| channels.get(&kind).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    #[cfg(test)]
    pub fn total(&self) -> usize {
        self.channels
            .lock()
            .map(|channels| channels.values().map(Vec::len).sum())
            .unwrap_or(0)
    }
}

#[async_trait]
impl ChannelWriter for InMemorySampleStore {
    async fn append(
        &self,
        device: &Device,
        kind: ChannelKind,
        samples: &[Sample],
    ) -> anyhow::Result<usize> {
        ensure_payload_shape(kind, samples)?;

        let rows: Vec<StoredSample> = samples
            .iter()
            .map(|sample| StoredSample {
                id: self.next_id.fetch_add(1, Ordering::Relaxed),
                device_id: device.id,
                sample: sample.clone(),
            })
            .collect();

        let mut channels = self
            .channels
            .lock()
            .map_err(|_| anyhow!("sample store lock poisoned"))?;
        channels.entry(kind).or_default().extend(rows);

        Ok(samples.len())
    }
}
