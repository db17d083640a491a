// Read-only device directory backed by configuration
use crate::application::device_resolver::DeviceResolver;
use crate::domain::device::{Device, DeviceId};
use crate::infrastructure::config::DevicesConfig;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct ConfigDeviceDirectory {
    devices: HashMap<DeviceId, Device>,
}

impl ConfigDeviceDirectory {
    pub fn from_config(config: &DevicesConfig) -> Self {
        let devices = config
            .devices
            .iter()
            .map(|entry| {
                let id = DeviceId(entry.id);
                let device = Device {
                    id,
                    name: entry.name.clone(),
                    description: entry.description.clone(),
                    user_id: entry.user_id,
                    registered_at: entry.registered_at.unwrap_or_else(Utc::now),
                };
                (id, device)
            })
            .collect();
        Self { devices }
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }
}

#[async_trait]
impl DeviceResolver for ConfigDeviceDirectory {
    async fn resolve(&self, device_id: DeviceId) -> anyhow::Result<Option<Device>> {
        Ok(self.devices.get(&device_id).cloned())
    }
}
