// Channel writer trait - Append-only sample persistence
use crate::domain::device::Device;
use crate::domain::telemetry::{ChannelKind, Sample};
use async_trait::async_trait;

/// Persists samples of one channel for one device.
///
/// Every channel kind is an independent destination: a failed append leaves other
/// channels untouched, and samples are stored in the order given.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChannelWriter: Send + Sync {
    /// Append samples and return how many were written.
    async fn append(
        &self,
        device: &Device,
        kind: ChannelKind,
        samples: &[Sample],
    ) -> anyhow::Result<usize>;
}

/// Reject payloads that do not match the channel's stored shape.
pub fn ensure_payload_shape(kind: ChannelKind, samples: &[Sample]) -> anyhow::Result<()> {
    if let Some(position) = samples.iter().position(|s| !kind.accepts(&s.payload)) {
        anyhow::bail!(
            "sample {} has payload {:?}, which does not fit channel {}",
            position,
            samples[position].payload,
            kind
        );
    }
    Ok(())
}
