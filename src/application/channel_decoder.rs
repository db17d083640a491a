// Channel decoder - Extracts one channel's entries from a report
use crate::domain::error::ChannelError;
use crate::domain::report::{GpsSeries, Leaf, ReportData, Series};
use crate::domain::telemetry::{ChannelKind, SamplePayload};

/// One paired reading, not yet timestamp-checked. `index` is its position in the
/// report arrays.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEntry {
    pub index: usize,
    pub timestamp: String,
    pub payload: SamplePayload,
}

/// Raw entries of one channel plus the problems found while pairing them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedChannel {
    pub entries: Vec<RawEntry>,
    pub errors: Vec<ChannelError>,
}

impl DecodedChannel {
    pub fn failed(error: ChannelError) -> Self {
        Self {
            entries: Vec::new(),
            errors: vec![error],
        }
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.errors.is_empty()
    }
}

pub type DecodeFn = fn(&ReportData) -> DecodedChannel;

/// Decode function for each channel kind.
pub fn decoder_for(kind: ChannelKind) -> DecodeFn {
    match kind {
        ChannelKind::WindDirection => wind_direction,
        ChannelKind::WindSpeed => wind_speed,
        ChannelKind::TempAir => temp_air,
        ChannelKind::TempSoil => temp_soil,
        ChannelKind::HumAir => hum_air,
        ChannelKind::HumSoil => hum_soil,
        ChannelKind::Rainfall => rainfall,
        ChannelKind::Gps => gps,
        ChannelKind::BatteryVoltage => battery_voltage,
        ChannelKind::Error => errors,
    }
}

#[cfg(test)]
pub fn decode(data: &ReportData, kind: ChannelKind) -> DecodedChannel {
    decoder_for(kind)(data)
}

fn wind_direction(data: &ReportData) -> DecodedChannel {
    scalar(nested(&data.air, "air.wind_direction", |air| &air.wind_direction))
}

fn wind_speed(data: &ReportData) -> DecodedChannel {
    scalar(nested(&data.air, "air.wind_speed", |air| &air.wind_speed))
}

fn temp_air(data: &ReportData) -> DecodedChannel {
    scalar(nested(&data.air, "air.temperature", |air| &air.temperature))
}

fn temp_soil(data: &ReportData) -> DecodedChannel {
    scalar(nested(&data.soil, "soil.temperature", |soil| &soil.temperature))
}

fn hum_air(data: &ReportData) -> DecodedChannel {
    scalar(nested(&data.air, "air.humidity", |air| &air.humidity))
}

fn hum_soil(data: &ReportData) -> DecodedChannel {
    scalar(nested(&data.soil, "soil.humidity", |soil| &soil.humidity))
}

fn rainfall(data: &ReportData) -> DecodedChannel {
    scalar(leaf("rainfall", &data.rainfall))
}

fn gps(data: &ReportData) -> DecodedChannel {
    position(leaf("gps", &data.gps))
}

fn battery_voltage(data: &ReportData) -> DecodedChannel {
    scalar(leaf("battery_voltage", &data.battery_voltage))
}

fn errors(data: &ReportData) -> DecodedChannel {
    message(leaf("errors", &data.errors))
}

/// A present section, an absent one, or the reason it could not be decoded.
type Lookup<'a, T> = Result<Option<&'a T>, ChannelError>;

fn leaf<'a, T>(path: &'static str, section: &'a Option<Leaf<T>>) -> Lookup<'a, T> {
    match section {
        None => Ok(None),
        Some(section) => section
            .as_result()
            .map(Some)
            .map_err(|reason| ChannelError::Decode {
                path,
                reason: reason.to_string(),
            }),
    }
}

/// Leaf inside a group. A malformed group is reported under the leaf's path.
fn nested<'a, G, T>(
    group: &'a Option<Leaf<G>>,
    path: &'static str,
    pick: impl FnOnce(&'a G) -> &'a Option<Leaf<T>>,
) -> Lookup<'a, T> {
    match leaf(path, group)? {
        Some(group) => leaf(path, pick(group)),
        None => Ok(None),
    }
}

fn scalar(lookup: Lookup<'_, Series<f64>>) -> DecodedChannel {
    series(lookup, |value| SamplePayload::Scalar(*value))
}

fn message(lookup: Lookup<'_, Series<String>>) -> DecodedChannel {
    series(lookup, |text| SamplePayload::Message(text.clone()))
}

fn series<T>(
    lookup: Lookup<'_, Series<T>>,
    payload: impl Fn(&T) -> SamplePayload,
) -> DecodedChannel {
    let series = match lookup {
        Ok(Some(series)) => series,
        Ok(None) => return DecodedChannel::default(),
        Err(error) => return DecodedChannel::failed(error),
    };

    let mut decoded = DecodedChannel::default();
    let len = prefix_len(&series.date_time, &[("data", series.data.len())], &mut decoded);
    for (index, (timestamp, value)) in series.date_time[..len].iter().zip(&series.data).enumerate()
    {
        match value {
            Some(value) => decoded.entries.push(RawEntry {
                index,
                timestamp: timestamp.clone(),
                payload: payload(value),
            }),
            None => decoded
                .errors
                .push(ChannelError::MissingValue { field: "data", index }),
        }
    }
    decoded
}

fn position(lookup: Lookup<'_, GpsSeries>) -> DecodedChannel {
    let series = match lookup {
        Ok(Some(series)) => series,
        Ok(None) => return DecodedChannel::default(),
        Err(error) => return DecodedChannel::failed(error),
    };

    let mut decoded = DecodedChannel::default();
    let len = prefix_len(
        &series.date_time,
        &[
            ("latitude", series.latitude.len()),
            ("longitude", series.longitude.len()),
        ],
        &mut decoded,
    );
    for index in 0..len {
        match (series.latitude[index], series.longitude[index]) {
            (Some(latitude), Some(longitude)) => decoded.entries.push(RawEntry {
                index,
                timestamp: series.date_time[index].clone(),
                payload: SamplePayload::Position {
                    latitude,
                    longitude,
                },
            }),
            (latitude, longitude) => {
                for (field, value) in [("latitude", latitude), ("longitude", longitude)] {
                    if value.is_none() {
                        decoded
                            .errors
                            .push(ChannelError::MissingValue { field, index });
                    }
                }
            }
        }
    }
    decoded
}

/// Length of the prefix shared by the timestamp array and every value array.
/// Each value array whose length differs from the timestamps is recorded as a mismatch.
fn prefix_len(
    timestamps: &[String],
    value_arrays: &[(&'static str, usize)],
    decoded: &mut DecodedChannel,
) -> usize {
    let ingested = value_arrays
        .iter()
        .map(|(_, len)| *len)
        .fold(timestamps.len(), usize::min);

    for &(field, values) in value_arrays {
        if values != timestamps.len() {
            decoded.errors.push(ChannelError::ShapeMismatch {
                field,
                timestamps: timestamps.len(),
                values,
                ingested,
            });
        }
    }

    ingested
}
