//! The batch sink seam.
//!
//! A [`BatchSink`] accepts an [`EventBatch`] in a single call and either takes
//! all of it or none of it. Connection handling, partitioning and any retry
//! policy live behind this trait.

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::TransportError;
use crate::model::TelemetryReading;

/// Encoded events submitted together.
#[derive(Debug, Clone, PartialEq)]
pub struct EventBatch {
    /// Correlates log lines for one send; not part of the wire payload.
    pub batch_id: Uuid,
    events: Vec<String>,
}

impl EventBatch {
    pub fn new(events: Vec<String>) -> Self {
        Self {
            batch_id: Uuid::new_v4(),
            events,
        }
    }

    /// Encode every reading as compact JSON, preserving order.
    pub fn from_readings(readings: &[TelemetryReading]) -> Result<Self, TransportError> {
        let events = readings
            .iter()
            .map(TelemetryReading::to_json)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(events))
    }

    pub fn events(&self) -> &[String] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Total size of the event bodies in bytes.
    pub fn payload_bytes(&self) -> usize {
        self.events.iter().map(String::len).sum()
    }
}

#[async_trait]
pub trait BatchSink: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Submit the whole batch. Either every event is accepted or an error is
    /// returned and none are.
    async fn send_batch(&self, batch: &EventBatch) -> Result<(), TransportError>;

    /// Release the underlying connection.
    fn close(&mut self);
}
