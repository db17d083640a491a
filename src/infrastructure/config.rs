use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct InfluxConfig {
    pub influx: InfluxSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InfluxSettings {
    pub host: String,
    pub token: String,
    pub database: String,
    pub retention_policy: String,
    /// Upper bound for one write request, connect included.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct IngestConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub scheduler: SchedulerSettings,
    #[serde(default)]
    pub ingest: IngestSettings,
    #[serde(default)]
    pub storage: StorageSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SchedulerSettings {
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct IngestSettings {
    /// Offset of station clocks from UTC. Station timestamps carry no zone.
    #[serde(default)]
    pub station_utc_offset_minutes: i32,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Influx,
    Memory,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StorageSettings {
    #[serde(default)]
    pub backend: StorageBackend,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DevicesConfig {
    #[serde(default)]
    pub devices: Vec<DeviceEntry>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DeviceEntry {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub user_id: Option<i64>,
    pub registered_at: Option<DateTime<Utc>>,
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_bind_addr() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_workers() -> usize {
    4
}

fn default_queue_capacity() -> usize {
    1024
}

pub fn load_influx_config() -> anyhow::Result<InfluxConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/influx"))
        .build()?;

    Ok(settings.try_deserialize()?)
}

/// Service settings from `config/ingest` (optional), overridable with
/// `INGEST__<SECTION>__<KEY>` environment variables.
pub fn load_ingest_config() -> anyhow::Result<IngestConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/ingest").required(false))
        .add_source(
            config::Environment::with_prefix("INGEST")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}

pub fn load_devices_config() -> anyhow::Result<DevicesConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/devices"))
        .build()?;

    Ok(settings.try_deserialize()?)
}
