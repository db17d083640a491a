// Telemetry channel and sample domain models
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// The fixed set of channels a station can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    WindDirection,
    WindSpeed,
    TempAir,
    TempSoil,
    HumAir,
    HumSoil,
    Rainfall,
    Gps,
    BatteryVoltage,
    Error,
}

impl ChannelKind {
    pub const ALL: [ChannelKind; 10] = [
        ChannelKind::WindDirection,
        ChannelKind::WindSpeed,
        ChannelKind::TempAir,
        ChannelKind::TempSoil,
        ChannelKind::HumAir,
        ChannelKind::HumSoil,
        ChannelKind::Rainfall,
        ChannelKind::Gps,
        ChannelKind::BatteryVoltage,
        ChannelKind::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::WindDirection => "wind_direction",
            ChannelKind::WindSpeed => "wind_speed",
            ChannelKind::TempAir => "temp_air",
            ChannelKind::TempSoil => "temp_soil",
            ChannelKind::HumAir => "hum_air",
            ChannelKind::HumSoil => "hum_soil",
            ChannelKind::Rainfall => "rainfall",
            ChannelKind::Gps => "gps",
            ChannelKind::BatteryVoltage => "battery_voltage",
            ChannelKind::Error => "error",
        }
    }

    /// Whether a payload has the shape this channel stores.
    pub fn accepts(&self, payload: &SamplePayload) -> bool {
        match self {
            ChannelKind::Gps => matches!(payload, SamplePayload::Position { .. }),
            ChannelKind::Error => matches!(payload, SamplePayload::Message(_)),
            _ => matches!(payload, SamplePayload::Scalar(_)),
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SamplePayload {
    Scalar(f64),
    Position { latitude: f64, longitude: f64 },
    Message(String),
}

/// One timestamped observation, ready to be appended to its channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub recorded_at: DateTime<Utc>,
    pub payload: SamplePayload,
}

impl Sample {
    pub fn new(recorded_at: DateTime<Utc>, payload: SamplePayload) -> Self {
        Self {
            recorded_at,
            payload,
        }
    }
}
