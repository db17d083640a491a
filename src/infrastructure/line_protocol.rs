// InfluxDB line protocol encoding for channel samples
//
// measurement,tag1=val1,tag2=val2 field1=val1,field2=val2 timestamp_ns
use crate::domain::device::Device;
use crate::domain::telemetry::{ChannelKind, Sample, SamplePayload};
use anyhow::Context;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Float(f64),
    String(String),
}

impl FieldValue {
    fn encode(&self) -> String {
        match self {
            FieldValue::Float(v) => format!("{}", v),
            FieldValue::String(v) => {
                let escaped = v.replace('\\', "\\\\").replace('"', "\\\"");
                format!("\"{}\"", escaped)
            }
        }
    }
}

/// One line protocol point.
#[derive(Debug, Clone, PartialEq)]
pub struct LinePoint {
    pub measurement: String,
    pub tags: Vec<(&'static str, String)>,
    pub fields: Vec<(&'static str, FieldValue)>,
    pub timestamp_ns: i64,
}

impl LinePoint {
    pub fn to_line(&self) -> String {
        let mut line = escape_key(&self.measurement, false);

        for (key, value) in &self.tags {
            line.push(',');
            line.push_str(&escape_key(key, true));
            line.push('=');
            line.push_str(&escape_key(value, true));
        }

        line.push(' ');
        let fields: Vec<String> = self
            .fields
            .iter()
            .map(|(key, value)| format!("{}={}", escape_key(key, true), value.encode()))
            .collect();
        line.push_str(&fields.join(","));

        line.push(' ');
        line.push_str(&self.timestamp_ns.to_string());
        line
    }
}

pub fn measurement_name(kind: ChannelKind) -> String {
    format!("snapshot_{}", kind.as_str())
}

/// Build the point for one sample. Every point gets a fresh `sample_id` tag so that
/// repeated samples with equal timestamps stay distinct rows.
pub fn sample_point(
    device: &Device,
    kind: ChannelKind,
    sample: &Sample,
) -> anyhow::Result<LinePoint> {
    let timestamp_ns = sample
        .recorded_at
        .timestamp_nanos_opt()
        .with_context(|| format!("timestamp {} out of range", sample.recorded_at))?;

    let fields = match &sample.payload {
        SamplePayload::Scalar(value) => vec![("value", finite(*value)?)],
        SamplePayload::Position {
            latitude,
            longitude,
        } => vec![
            ("latitude", finite(*latitude)?),
            ("longitude", finite(*longitude)?),
        ],
        SamplePayload::Message(message) => vec![("message", FieldValue::String(message.clone()))],
    };

    Ok(LinePoint {
        measurement: measurement_name(kind),
        tags: vec![
            ("device_id", device.id.to_string()),
            ("sample_id", Uuid::new_v4().to_string()),
        ],
        fields,
        timestamp_ns,
    })
}

fn finite(value: f64) -> anyhow::Result<FieldValue> {
    if !value.is_finite() {
        anyhow::bail!("non-finite value {} cannot be stored", value);
    }
    Ok(FieldValue::Float(value))
}

/// Commas and spaces are escaped everywhere; equals signs only in tag keys/values and field keys.
fn escape_key(s: &str, escape_equals: bool) -> String {
    let escaped = s.replace(',', "\\,").replace(' ', "\\ ");
    if escape_equals {
        escaped.replace('=', "\\=")
    } else {
        escaped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::device::DeviceId;
    use chrono::TimeZone;
    use chrono::Utc;

    fn device() -> Device {
        Device::new(DeviceId(7), "meadow".to_string())
    }

    fn at_epoch_second(secs: i64) -> chrono::DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_scalar_point() {
        let sample = Sample::new(at_epoch_second(1_704_103_200), SamplePayload::Scalar(21.5));
        let point = sample_point(&device(), ChannelKind::TempAir, &sample).unwrap();

        assert_eq!(point.measurement, "snapshot_temp_air");
        assert_eq!(point.tags[0], ("device_id", "7".to_string()));
        assert_eq!(point.fields, vec![("value", FieldValue::Float(21.5))]);

        let line = point.to_line();
        assert!(line.starts_with("snapshot_temp_air,device_id=7,sample_id="));
        assert!(line.ends_with(" value=21.5 1704103200000000000"));
    }

    #[test]
    fn test_gps_point_has_both_coordinates() {
        let sample = Sample::new(
            at_epoch_second(0),
            SamplePayload::Position {
                latitude: 55.1,
                longitude: 37.1,
            },
        );
        let line = sample_point(&device(), ChannelKind::Gps, &sample)
            .unwrap()
            .to_line();
        assert!(line.contains(" latitude=55.1,longitude=37.1 0"));
    }

    #[test]
    fn test_message_is_quoted_and_escaped() {
        let sample = Sample::new(
            at_epoch_second(0),
            SamplePayload::Message(r#"sensor "B" \ offline"#.to_string()),
        );
        let line = sample_point(&device(), ChannelKind::Error, &sample)
            .unwrap()
            .to_line();
        assert!(line.contains(r#"message="sensor \"B\" \\ offline""#));
    }

    #[test]
    fn test_sample_ids_differ() {
        let sample = Sample::new(at_epoch_second(0), SamplePayload::Scalar(1.0));
        let a = sample_point(&device(), ChannelKind::Rainfall, &sample).unwrap();
        let b = sample_point(&device(), ChannelKind::Rainfall, &sample).unwrap();
        assert_ne!(a.tags[1], b.tags[1]);
    }

    #[test]
    fn test_non_finite_values_rejected() {
        let sample = Sample::new(at_epoch_second(0), SamplePayload::Scalar(f64::NAN));
        assert!(sample_point(&device(), ChannelKind::WindSpeed, &sample).is_err());
    }

    #[test]
    fn test_tag_escaping() {
        let point = LinePoint {
            measurement: "snapshot rain".to_string(),
            tags: vec![("site", "north field,a=b".to_string())],
            fields: vec![("value", FieldValue::Float(1.0))],
            timestamp_ns: 5,
        };
        assert_eq!(
            point.to_line(),
            r"snapshot\ rain,site=north\ field\,a\=b value=1 5"
        );
    }
}
