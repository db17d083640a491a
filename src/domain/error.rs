use super::device::DeviceId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TimestampError {
    #[error("Malformed timestamp: {0:?}")]
    Malformed(String),

    #[error("Invalid station UTC offset: {0} minutes")]
    InvalidOffset(i32),
}

/// A problem confined to one channel of one report. Recorded, never propagated.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChannelError {
    #[error("Shape mismatch: {timestamps} timestamps, {values} {field}; ingested {ingested}")]
    ShapeMismatch {
        field: &'static str,
        timestamps: usize,
        values: usize,
        ingested: usize,
    },

    #[error("Malformed {path}: {reason}")]
    Decode { path: &'static str, reason: String },

    #[error("Missing {field} value at index {index}")]
    MissingValue { field: &'static str, index: usize },

    #[error("Malformed timestamp at index {index}: {raw:?}")]
    MalformedTimestamp { index: usize, raw: String },

    #[error("Write failure: {0}")]
    WriteFailure(String),
}

/// Errors that abort ingestion of a whole report.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Unknown device: {0}")]
    UnknownDevice(DeviceId),

    #[error("Device lookup failed for {device_id}: {source}")]
    DeviceLookup {
        device_id: DeviceId,
        #[source]
        source: anyhow::Error,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("Ingestion queue is full ({capacity} reports pending)")]
    QueueFull { capacity: usize },

    #[error("Ingestion scheduler is shut down")]
    Closed,
}

pub type IngestResult<T> = Result<T, IngestError>;
