// Fan-out dispatcher - Splits one report into independent channel writes
use crate::application::channel_decoder::{decoder_for, DecodeFn, DecodedChannel};
use crate::application::channel_writer::ChannelWriter;
use crate::application::device_resolver::DeviceResolver;
use crate::domain::device::Device;
use crate::domain::error::{ChannelError, IngestError, IngestResult};
use crate::domain::ingestion::{ChannelOutcome, IngestionResult};
use crate::domain::report::{Report, ReportData};
use crate::domain::telemetry::{ChannelKind, Sample};
use crate::domain::timestamp::TimestampNormalizer;
use futures::future::join_all;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, instrument, warn};

/// How one channel kind is decoded and where its samples go.
#[derive(Clone)]
pub struct ChannelRoute {
    pub kind: ChannelKind,
    pub decode: DecodeFn,
    pub writer: Arc<dyn ChannelWriter>,
}

impl ChannelRoute {
    pub fn new(kind: ChannelKind, writer: Arc<dyn ChannelWriter>) -> Self {
        Self {
            kind,
            decode: decoder_for(kind),
            writer,
        }
    }
}

#[derive(Clone)]
pub struct FanOutDispatcher {
    resolver: Arc<dyn DeviceResolver>,
    routes: Vec<ChannelRoute>,
    normalizer: TimestampNormalizer,
}

impl FanOutDispatcher {
    /// Route every channel kind to the same storage backend.
    pub fn new(
        resolver: Arc<dyn DeviceResolver>,
        writer: Arc<dyn ChannelWriter>,
        normalizer: TimestampNormalizer,
    ) -> Self {
        let routes = ChannelKind::ALL
            .into_iter()
            .map(|kind| ChannelRoute::new(kind, writer.clone()))
            .collect();
        Self {
            resolver,
            routes,
            normalizer,
        }
    }

    /// Send one channel kind to a dedicated writer.
    #[cfg(test)]
    pub fn with_writer(mut self, kind: ChannelKind, writer: Arc<dyn ChannelWriter>) -> Self {
        for route in self.routes.iter_mut().filter(|r| r.kind == kind) {
            route.writer = writer.clone();
        }
        self
    }

    /// Ingest one report.
    ///
    /// Only a failed device lookup is returned as an error. Decode, timestamp and write
    /// problems are confined to their channel and reported in the result, including a
    /// writer that panics.
    #[instrument(skip(self, report), fields(device_id = %report.device_id))]
    pub async fn ingest(&self, report: &Report) -> IngestResult<IngestionResult> {
        let started = Instant::now();

        let device = match self.resolver.resolve(report.device_id).await {
            Ok(Some(device)) => device,
            Ok(None) => return Err(IngestError::UnknownDevice(report.device_id)),
            Err(source) => {
                return Err(IngestError::DeviceLookup {
                    device_id: report.device_id,
                    source,
                })
            }
        };

        let empty = ReportData::default();
        let data = match &report.data {
            Some(data) => data.as_result(),
            None => Ok(&empty),
        };

        let device = &device;
        let channels = self.routes.iter().map(|route| async move {
            let outcome = AssertUnwindSafe(self.ingest_channel(device, route, data))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    let reason = panic_reason(&*panic);
                    error!(channel = %route.kind, %reason, "channel ingestion panicked");
                    ChannelOutcome {
                        written: 0,
                        errors: vec![ChannelError::WriteFailure(format!("panicked: {reason}"))],
                    }
                });
            (route.kind, outcome)
        });
        let outcomes = join_all(channels).await;

        Ok(IngestionResult::from_outcomes(
            device.id,
            outcomes,
            started.elapsed(),
        ))
    }

    async fn ingest_channel(
        &self,
        device: &Device,
        route: &ChannelRoute,
        data: Result<&ReportData, &str>,
    ) -> ChannelOutcome {
        let decoded = match data {
            Ok(data) => (route.decode)(data),
            Err(reason) => DecodedChannel::failed(ChannelError::Decode {
                path: "data",
                reason: reason.to_string(),
            }),
        };
        let mut outcome = ChannelOutcome {
            written: 0,
            errors: decoded.errors,
        };

        let mut samples = Vec::with_capacity(decoded.entries.len());
        for entry in decoded.entries {
            match self.normalizer.normalize(&entry.timestamp) {
                Ok(recorded_at) => samples.push(Sample::new(recorded_at, entry.payload)),
                Err(_) => outcome.errors.push(ChannelError::MalformedTimestamp {
                    index: entry.index,
                    raw: entry.timestamp,
                }),
            }
        }

        if samples.is_empty() {
            return outcome;
        }

        match route.writer.append(device, route.kind, &samples).await {
            Ok(written) => {
                debug!(channel = %route.kind, written, "channel written");
                outcome.written = written;
            }
            Err(e) => {
                warn!(channel = %route.kind, error = %e, "channel write failed");
                outcome.errors.push(ChannelError::WriteFailure(format!("{:#}", e)));
            }
        }

        outcome
    }
}

fn panic_reason(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::channel_writer::MockChannelWriter;
    use crate::application::device_resolver::MockDeviceResolver;
    use crate::domain::device::DeviceId;
    use crate::domain::telemetry::SamplePayload;
    use crate::infrastructure::memory_repository::InMemorySampleStore;
    use serde_json::json;

    fn known_devices() -> Arc<MockDeviceResolver> {
        let mut resolver = MockDeviceResolver::new();
        resolver
            .expect_resolve()
            .returning(|id| Ok(Some(Device::new(id, format!("station-{}", id)))));
        Arc::new(resolver)
    }

    fn report(value: serde_json::Value) -> Report {
        serde_json::from_value(value).unwrap()
    }

    fn dispatcher(store: Arc<InMemorySampleStore>) -> FanOutDispatcher {
        FanOutDispatcher::new(known_devices(), store, TimestampNormalizer::utc())
    }

    #[tokio::test]
    async fn test_gps_scenario() {
        let store = Arc::new(InMemorySampleStore::new());
        let dispatcher = dispatcher(store.clone());

        let result = dispatcher
            .ingest(&report(json!({
                "device_id": 7,
                "data": {
                    "gps": {
                        "date_time": ["01.01.2024,10:00:00", "01.01.2024,10:05:00"],
                        "latitude": [55.1, 55.2],
                        "longitude": [37.1, 37.2]
                    },
                    "rainfall": { "date_time": [], "data": [] }
                }
            })))
            .await
            .unwrap();

        assert_eq!(result.device_id, DeviceId(7));
        assert_eq!(result.written(ChannelKind::Gps), 2);
        assert_eq!(result.written(ChannelKind::Rainfall), 0);
        assert_eq!(result.per_channel_counts.len(), 10);
        assert!(result.is_clean());

        let gps = store.samples(ChannelKind::Gps);
        assert_eq!(gps.len(), 2);
        assert!(gps.iter().all(|s| s.device_id == DeviceId(7)));
        assert_eq!(store.count(ChannelKind::Rainfall), 0);
    }

    #[tokio::test]
    async fn test_unknown_device_writes_nothing() {
        let mut resolver = MockDeviceResolver::new();
        resolver.expect_resolve().times(1).returning(|_| Ok(None));
        let mut writer = MockChannelWriter::new();
        writer.expect_append().times(0);

        let dispatcher = FanOutDispatcher::new(
            Arc::new(resolver),
            Arc::new(writer),
            TimestampNormalizer::utc(),
        );

        let result = dispatcher
            .ingest(&report(json!({
                "device_id": 404,
                "data": {
                    "rainfall": { "date_time": ["01.01.2024,10:00:00"], "data": [1.0] }
                }
            })))
            .await;

        assert!(matches!(result, Err(IngestError::UnknownDevice(DeviceId(404)))));
    }

    #[tokio::test]
    async fn test_device_lookup_failure_aborts() {
        let mut resolver = MockDeviceResolver::new();
        resolver
            .expect_resolve()
            .returning(|_| Err(anyhow::anyhow!("directory unavailable")));
        let store = Arc::new(InMemorySampleStore::new());

        let dispatcher =
            FanOutDispatcher::new(Arc::new(resolver), store.clone(), TimestampNormalizer::utc());
        let result = dispatcher
            .ingest(&report(json!({
                "device_id": 1,
                "data": {
                    "battery_voltage": { "date_time": ["01.01.2024,10:00:00"], "data": [3.7] }
                }
            })))
            .await;

        assert!(matches!(result, Err(IngestError::DeviceLookup { .. })));
        assert_eq!(store.total(), 0);
    }

    #[tokio::test]
    async fn test_shape_mismatch_ingests_prefix() {
        let store = Arc::new(InMemorySampleStore::new());
        let dispatcher = dispatcher(store.clone());

        let result = dispatcher
            .ingest(&report(json!({
                "device_id": 2,
                "data": {
                    "air": {
                        "wind_speed": {
                            "date_time": [
                                "01.01.2024,10:00:00", "01.01.2024,10:01:00", "01.01.2024,10:02:00",
                                "01.01.2024,10:03:00", "01.01.2024,10:04:00"
                            ],
                            "data": [1.0, 2.0, 3.0]
                        }
                    }
                }
            })))
            .await
            .unwrap();

        assert_eq!(result.written(ChannelKind::WindSpeed), 3);
        assert_eq!(store.count(ChannelKind::WindSpeed), 3);
        assert!(matches!(
            result.errors(ChannelKind::WindSpeed),
            [ChannelError::ShapeMismatch {
                timestamps: 5,
                values: 3,
                ingested: 3,
                ..
            }]
        ));
        assert_eq!(result.error_count(), 1);
    }

    #[tokio::test]
    async fn test_malformed_timestamps_skip_single_entries() {
        let store = Arc::new(InMemorySampleStore::new());
        let dispatcher = dispatcher(store.clone());

        let result = dispatcher
            .ingest(&report(json!({
                "device_id": 3,
                "data": {
                    "soil": {
                        "humidity": {
                            "date_time": [
                                "01.01.2024,10:00:00", "not a date", "31.02.2024,10:00:00",
                                "01.01.2024,10:03:00"
                            ],
                            "data": [40.0, 41.0, 42.0, 43.0]
                        }
                    }
                }
            })))
            .await
            .unwrap();

        assert_eq!(result.written(ChannelKind::HumSoil), 2);
        assert_eq!(
            result.errors(ChannelKind::HumSoil),
            &[
                ChannelError::MalformedTimestamp {
                    index: 1,
                    raw: "not a date".to_string()
                },
                ChannelError::MalformedTimestamp {
                    index: 2,
                    raw: "31.02.2024,10:00:00".to_string()
                },
            ]
        );

        let values: Vec<SamplePayload> = store
            .samples(ChannelKind::HumSoil)
            .into_iter()
            .map(|s| s.sample.payload)
            .collect();
        assert_eq!(
            values,
            vec![SamplePayload::Scalar(40.0), SamplePayload::Scalar(43.0)]
        );
    }

    #[tokio::test]
    async fn test_channel_with_only_bad_timestamps_skips_writer() {
        let mut writer = MockChannelWriter::new();
        writer.expect_append().times(0);

        let dispatcher = FanOutDispatcher::new(
            known_devices(),
            Arc::new(writer),
            TimestampNormalizer::utc(),
        );

        let result = dispatcher
            .ingest(&report(json!({
                "device_id": 3,
                "data": {
                    "errors": { "date_time": ["yesterday"], "data": ["rtc reset"] }
                }
            })))
            .await
            .unwrap();

        assert_eq!(result.total_written(), 0);
        assert_eq!(result.errors(ChannelKind::Error).len(), 1);
    }

    #[tokio::test]
    async fn test_write_failure_is_isolated() {
        let store = Arc::new(InMemorySampleStore::new());
        let mut failing = MockChannelWriter::new();
        failing
            .expect_append()
            .withf(|_, kind, samples| *kind == ChannelKind::Rainfall && samples.len() == 1)
            .times(1)
            .returning(|_, _, _| Err(anyhow::anyhow!("disk full")));

        let dispatcher =
            dispatcher(store.clone()).with_writer(ChannelKind::Rainfall, Arc::new(failing));

        let result = dispatcher
            .ingest(&report(json!({
                "device_id": 5,
                "data": {
                    "rainfall": { "date_time": ["01.01.2024,10:00:00"], "data": [0.4] },
                    "battery_voltage": { "date_time": ["01.01.2024,10:00:00"], "data": [3.9] },
                    "air": {
                        "temperature": { "date_time": ["01.01.2024,10:00:00"], "data": [18.0] }
                    }
                }
            })))
            .await
            .unwrap();

        assert_eq!(result.written(ChannelKind::Rainfall), 0);
        assert!(matches!(
            result.errors(ChannelKind::Rainfall),
            [ChannelError::WriteFailure(msg)] if msg.contains("disk full")
        ));
        assert_eq!(result.written(ChannelKind::BatteryVoltage), 1);
        assert_eq!(result.written(ChannelKind::TempAir), 1);
        assert_eq!(store.count(ChannelKind::Rainfall), 0);
        assert_eq!(store.total(), 2);
    }

    #[tokio::test]
    async fn test_resubmission_duplicates_samples() {
        let store = Arc::new(InMemorySampleStore::new());
        let dispatcher = dispatcher(store.clone());
        let report = report(json!({
            "device_id": 9,
            "data": {
                "air": {
                    "humidity": {
                        "date_time": ["01.01.2024,10:00:00", "01.01.2024,10:10:00"],
                        "data": [60.0, 61.0]
                    }
                }
            }
        }));

        dispatcher.ingest(&report).await.unwrap();
        dispatcher.ingest(&report).await.unwrap();

        // No deduplication: identical reports produce distinct rows.
        let rows = store.samples(ChannelKind::HumAir);
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].sample, rows[2].sample);
        assert_ne!(rows[0].id, rows[2].id);
    }

    #[tokio::test]
    async fn test_samples_keep_input_order() {
        let store = Arc::new(InMemorySampleStore::new());
        let dispatcher = dispatcher(store.clone());

        dispatcher
            .ingest(&report(json!({
                "device_id": 4,
                "data": {
                    "air": {
                        "wind_direction": {
                            "date_time": [
                                "01.01.2024,10:20:00", "01.01.2024,10:00:00", "01.01.2024,10:10:00"
                            ],
                            "data": [270.0, 90.0, 180.0]
                        }
                    }
                }
            })))
            .await
            .unwrap();

        let stored: Vec<SamplePayload> = store
            .samples(ChannelKind::WindDirection)
            .into_iter()
            .map(|s| s.sample.payload)
            .collect();
        assert_eq!(
            stored,
            vec![
                SamplePayload::Scalar(270.0),
                SamplePayload::Scalar(90.0),
                SamplePayload::Scalar(180.0)
            ]
        );
    }

    #[tokio::test]
    async fn test_malformed_leaf_does_not_block_other_channels() {
        let store = Arc::new(InMemorySampleStore::new());
        let dispatcher = dispatcher(store.clone());

        let result = dispatcher
            .ingest(&report(json!({
                "device_id": 7,
                "data": {
                    "gps": {
                        "date_time": ["01.01.2024,10:00:00", "01.01.2024,10:05:00"],
                        "latitude": [55.1, 55.2],
                        "longitude": [37.1, 37.2]
                    },
                    "rainfall": { "date_time": ["01.01.2024,10:00:00"], "data": "lots" },
                    "battery_voltage": {
                        "date_time": ["01.01.2024,10:00:00", "01.01.2024,10:05:00"],
                        "data": [null, 3.8]
                    }
                }
            })))
            .await
            .unwrap();

        assert_eq!(result.written(ChannelKind::Gps), 2);
        assert_eq!(store.count(ChannelKind::Gps), 2);
        assert!(result.errors(ChannelKind::Gps).is_empty());

        assert_eq!(result.written(ChannelKind::Rainfall), 0);
        assert!(matches!(
            result.errors(ChannelKind::Rainfall),
            [ChannelError::Decode { path: "rainfall", .. }]
        ));

        assert_eq!(result.written(ChannelKind::BatteryVoltage), 1);
        assert_eq!(
            result.errors(ChannelKind::BatteryVoltage),
            &[ChannelError::MissingValue {
                field: "data",
                index: 0
            }]
        );
        assert_eq!(result.per_channel_errors.len(), 2);
    }

    #[tokio::test]
    async fn test_malformed_data_envelope_is_reported_per_channel() {
        let mut writer = MockChannelWriter::new();
        writer.expect_append().times(0);
        let dispatcher =
            FanOutDispatcher::new(known_devices(), Arc::new(writer), TimestampNormalizer::utc());

        let result = dispatcher
            .ingest(&report(json!({ "device_id": 7, "data": 5 })))
            .await
            .unwrap();

        assert_eq!(result.total_written(), 0);
        assert_eq!(result.per_channel_errors.len(), ChannelKind::ALL.len());
        assert!(matches!(
            result.errors(ChannelKind::Gps),
            [ChannelError::Decode { path: "data", .. }]
        ));
    }

    /// Writer whose storage driver crashes mid-write.
    struct CrashingWriter;

    #[async_trait::async_trait]
    impl ChannelWriter for CrashingWriter {
        async fn append(
            &self,
            _device: &Device,
            _kind: ChannelKind,
            _samples: &[Sample],
        ) -> anyhow::Result<usize> {
            panic!("rainfall driver crashed");
        }
    }

    #[tokio::test]
    async fn test_panicking_writer_is_confined_to_its_channel() {
        let store = Arc::new(InMemorySampleStore::new());
        let dispatcher =
            dispatcher(store.clone()).with_writer(ChannelKind::Rainfall, Arc::new(CrashingWriter));

        let result = dispatcher
            .ingest(&report(json!({
                "device_id": 5,
                "data": {
                    "rainfall": { "date_time": ["01.01.2024,10:00:00"], "data": [0.4] },
                    "battery_voltage": { "date_time": ["01.01.2024,10:00:00"], "data": [3.9] }
                }
            })))
            .await
            .unwrap();

        assert!(matches!(
            result.errors(ChannelKind::Rainfall),
            [ChannelError::WriteFailure(msg)] if msg.contains("rainfall driver crashed")
        ));
        assert_eq!(result.written(ChannelKind::BatteryVoltage), 1);
        assert_eq!(store.count(ChannelKind::BatteryVoltage), 1);
        assert_eq!(store.count(ChannelKind::Rainfall), 0);
    }
}
