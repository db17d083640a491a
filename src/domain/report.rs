// Report envelope submitted by a station
use super::device::DeviceId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};

#[derive(Debug, Clone, Deserialize)]
pub struct Report {
    pub device_id: DeviceId,
    #[serde(default)]
    pub data: Option<Leaf<ReportData>>,
}

/// A payload section that either decoded into `T` or was malformed.
///
/// Sections are decoded independently so a type error in one channel does not reject
/// the rest of the report. The serde message is kept as the reason.
#[derive(Debug, Clone, PartialEq)]
pub enum Leaf<T> {
    Present(T),
    Malformed(String),
}

impl<T> Leaf<T> {
    pub fn as_result(&self) -> Result<&T, &str> {
        match self {
            Leaf::Present(value) => Ok(value),
            Leaf::Malformed(reason) => Err(reason.as_str()),
        }
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Leaf<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(match serde_json::from_value(value) {
            Ok(parsed) => Leaf::Present(parsed),
            Err(e) => Leaf::Malformed(e.to_string()),
        })
    }
}

/// Channel groups of one report. A group or leaf missing from the payload (or `null`)
/// is `None`, which the decoder treats as "station has no such sensor".
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportData {
    pub air: Option<Leaf<AirGroup>>,
    pub soil: Option<Leaf<SoilGroup>>,
    pub gps: Option<Leaf<GpsSeries>>,
    pub rainfall: Option<Leaf<Series<f64>>>,
    pub battery_voltage: Option<Leaf<Series<f64>>>,
    pub errors: Option<Leaf<Series<String>>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AirGroup {
    pub temperature: Option<Leaf<Series<f64>>>,
    pub humidity: Option<Leaf<Series<f64>>>,
    pub wind_speed: Option<Leaf<Series<f64>>>,
    pub wind_direction: Option<Leaf<Series<f64>>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SoilGroup {
    pub temperature: Option<Leaf<Series<f64>>>,
    pub humidity: Option<Leaf<Series<f64>>>,
}

/// Parallel timestamp and value arrays. Lengths are not guaranteed to match and
/// stations send `null` for readings they could not take.
#[derive(Debug, Clone, Deserialize)]
pub struct Series<T> {
    #[serde(default)]
    pub date_time: Vec<String>,
    #[serde(default = "Vec::new")]
    pub data: Vec<Option<T>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GpsSeries {
    #[serde(default)]
    pub date_time: Vec<String>,
    #[serde(default)]
    pub latitude: Vec<Option<f64>>,
    #[serde(default)]
    pub longitude: Vec<Option<f64>>,
}
