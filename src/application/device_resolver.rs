// Device resolver trait - Read-only access to the device directory
use crate::domain::device::{Device, DeviceId};
use async_trait::async_trait;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeviceResolver: Send + Sync {
    /// Look up a device. `Ok(None)` means the directory has no such device.
    async fn resolve(&self, device_id: DeviceId) -> anyhow::Result<Option<Device>>;
}
