use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::detector::types::{AlertRecord, Finding};
use crate::error::SinkError;

/// Destination for delivered alert batches.
#[async_trait]
pub trait AlertSink: Send {
    async fn deliver(&mut self, alerts: &[AlertRecord]) -> Result<(), SinkError>;

    fn sink_type(&self) -> &'static str;
}

/// Emits every alert as a structured `warn` event.
pub struct LogSink;

#[async_trait]
impl AlertSink for LogSink {
    async fn deliver(&mut self, alerts: &[AlertRecord]) -> Result<(), SinkError> {
        for alert in alerts {
            tracing::warn!(
                alert_id = alert.category.alert_id(),
                from = %alert.from_address,
                to = %alert.to_address,
                tx = %alert.transaction_hash,
                relay_block = alert.block_number,
                addresses = alert.involved_addresses.len(),
                anomaly_score = %alert.anomaly_score,
                "RELAYED CONTRACT INTERACTION"
            );
        }
        Ok(())
    }

    fn sink_type(&self) -> &'static str {
        "log"
    }
}

#[derive(Serialize)]
struct JsonlEntry<'a> {
    emitted_at: DateTime<Utc>,
    #[serde(flatten)]
    finding: &'a Finding,
}

/// Appends one JSON object per alert to a file. Flushed after every batch.
pub struct JsonlSink {
    writer: BufWriter<std::fs::File>,
}

impl JsonlSink {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;

        tracing::info!(path = %path.as_ref().display(), "Writing alerts as JSON lines");
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }
}

#[async_trait]
impl AlertSink for JsonlSink {
    async fn deliver(&mut self, alerts: &[AlertRecord]) -> Result<(), SinkError> {
        let emitted_at = Utc::now();
        for alert in alerts {
            let finding = alert.to_finding();
            let line = serde_json::to_string(&JsonlEntry {
                emitted_at,
                finding: &finding,
            })?;
            writeln!(self.writer, "{}", line)?;
        }
        self.writer.flush()?;
        Ok(())
    }

    fn sink_type(&self) -> &'static str {
        "jsonl"
    }
}

/// Delivers each batch to every inner sink. One failing sink does not stop the others.
pub struct FanoutSink {
    sinks: Vec<Box<dyn AlertSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Box<dyn AlertSink>>) -> Self {
        Self { sinks }
    }
}

#[async_trait]
impl AlertSink for FanoutSink {
    async fn deliver(&mut self, alerts: &[AlertRecord]) -> Result<(), SinkError> {
        let mut first_error = None;
        for sink in &mut self.sinks {
            if let Err(e) = sink.deliver(alerts).await {
                tracing::error!(sink = sink.sink_type(), error = %e, "Alert delivery failed");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn sink_type(&self) -> &'static str {
        "fanout"
    }
}
