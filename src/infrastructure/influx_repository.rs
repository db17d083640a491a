// InfluxDB repository implementation
use crate::application::channel_writer::{ensure_payload_shape, ChannelWriter};
use crate::domain::device::Device;
use crate::domain::telemetry::{ChannelKind, Sample};
use crate::infrastructure::line_protocol::sample_point;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;

/// Writes each channel kind to its own measurement through the v1-compatible write API.
#[derive(Debug, Clone)]
pub struct InfluxRepository {
    client: reqwest::Client,
    host: String,
    token: String,
    database: String,
    retention_policy: String,
}

impl InfluxRepository {
    pub fn new(
        host: String,
        token: String,
        database: String,
        retention_policy: String,
        request_timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .context("Failed to build InfluxDB HTTP client")?;

        Ok(Self {
            client,
            host: host.trim_end_matches('/').to_string(),
            token,
            database,
            retention_policy,
        })
    }

    fn build_write_url(&self) -> String {
        format!(
            "{}/write?db={}&rp={}&precision=ns",
            self.host,
            urlencoding::encode(&self.database),
            urlencoding::encode(&self.retention_policy)
        )
    }

    async fn execute_write(&self, body: String) -> Result<()> {
        let response = self
            .client
            .post(self.build_write_url())
            .header("Authorization", format!("Token {}", self.token))
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(body)
            .send()
            .await
            .context("Failed to send write request to InfluxDB")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("InfluxDB write failed with status {}: {}", status, body);
        }

        Ok(())
    }
}

#[async_trait]
impl ChannelWriter for InfluxRepository {
    async fn append(
        &self,
        device: &Device,
        kind: ChannelKind,
        samples: &[Sample],
    ) -> Result<usize> {
        ensure_payload_shape(kind, samples)?;
        if samples.is_empty() {
            return Ok(0);
        }

        let lines = samples
            .iter()
            .map(|sample| sample_point(device, kind, sample).map(|point| point.to_line()))
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(
            channel = %kind,
            device_id = %device.id,
            points = lines.len(),
            "writing points to InfluxDB"
        );

        self.execute_write(lines.join("\n"))
            .await
            .with_context(|| format!("writing {} {} samples", samples.len(), kind))?;

        Ok(samples.len())
    }
}
