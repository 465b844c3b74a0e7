//! The batch publisher.
//!
//! A [`Publisher`] owns exactly one sink. `publish` serializes readings and
//! hands them over in a single batch; `close` consumes the publisher and
//! releases the sink. If the publisher is dropped while still open (an early
//! return, a failed publish propagated with `?`), `Drop` releases the sink
//! instead, so the sink is closed exactly once on every path.

use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::PublisherConfig;
use crate::errors::{ConfigurationError, TransportError};
use crate::eventhub::EventHubSink;
use crate::metrics::{BATCHES_TOTAL, EVENTS_TOTAL, FAILURES_TOTAL, LAST_BATCH_SIZE, SEND_LATENCY_SECONDS};
use crate::model::TelemetryReading;
use crate::sink::{BatchSink, EventBatch};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Open,
    Closed,
}

pub struct Publisher<S: BatchSink = EventHubSink> {
    sink: S,
    state: State,
}

impl Publisher<EventHubSink> {
    /// Open a publisher against `eventhub_name` using a namespace connection string.
    pub fn open(
        connection_string: &str,
        eventhub_name: &str,
    ) -> Result<Self, ConfigurationError> {
        Self::from_config(PublisherConfig::new(connection_string, eventhub_name)?)
    }

    /// Open a publisher configured from `EVENTHUB_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_config(PublisherConfig::from_env()?)
    }

    pub fn from_config(config: PublisherConfig) -> Result<Self, ConfigurationError> {
        let sink = EventHubSink::new(&config)?;
        info!(eventhub = %config.eventhub_name, "Publisher opened");
        Ok(Self::with_sink(sink))
    }
}

impl<S: BatchSink> Publisher<S> {
    /// Wrap an already-open sink.
    pub fn with_sink(sink: S) -> Self {
        Self {
            sink,
            state: State::Open,
        }
    }

    /// The sink batches are sent through, e.g. to read its endpoint.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Send `readings` as one batch and return how many were submitted.
    ///
    /// An empty slice returns `0` without touching the sink. Sink errors are
    /// returned as-is: there is no retry and no splitting of large batches.
    pub async fn publish(&mut self, readings: &[TelemetryReading]) -> Result<usize, TransportError> {
        if readings.is_empty() {
            debug!("Nothing to publish");
            return Ok(0);
        }

        let batch = EventBatch::from_readings(readings)?;
        let count = batch.len();
        LAST_BATCH_SIZE.set(count as f64);

        let start = Instant::now();
        let result = self.sink.send_batch(&batch).await;
        SEND_LATENCY_SECONDS.observe(start.elapsed().as_secs_f64());

        match result {
            Ok(()) => {
                EVENTS_TOTAL.inc_by(count as f64);
                BATCHES_TOTAL.inc();
                debug!(
                    sink = self.sink.name(),
                    batch_id = %batch.batch_id,
                    events = count,
                    "Batch published"
                );
                Ok(count)
            }
            Err(e) => {
                FAILURES_TOTAL.inc();
                error!(
                    sink = self.sink.name(),
                    batch_id = %batch.batch_id,
                    events = count,
                    error = %e,
                    "Batch publish failed"
                );
                Err(e)
            }
        }
    }

    /// Release the sink. Consumes the publisher, so it runs at most once.
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.state == State::Open {
            self.state = State::Closed;
            self.sink.close();
            info!(sink = self.sink.name(), "Publisher closed");
        }
    }
}

impl<S: BatchSink> Drop for Publisher<S> {
    fn drop(&mut self) {
        if self.state == State::Open {
            warn!(sink = self.sink.name(), "Publisher dropped without close, releasing sink");
            self.release();
        }
    }
}
