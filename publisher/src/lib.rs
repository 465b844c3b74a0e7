//! Synthetic telemetry publishing for Event Hubs.
//!
//! - **generator**: random readings with optional overrides and an injectable clock
//! - **publisher**: serializes readings and submits them to a sink as one batch
//! - **sink**: the `BatchSink` seam and the `EventBatch` it accepts
//! - **eventhub**: `BatchSink` over the Event Hubs HTTPS batch-send endpoint
//! - **config**: environment-driven configuration and connection-string parsing
//! - **metrics**: Prometheus counters for published batches
//!
//! ```no_run
//! use publisher::{Publisher, ReadingGenerator};
//!
//! #[tokio::main]
//! async fn main() -> publisher::Result<()> {
//!     let mut publisher = Publisher::from_env()?;
//!     let mut generator = ReadingGenerator::new();
//!     let ids = publisher::device_ids("device", 5)?;
//!
//!     let readings = generator.generate_batch(&ids, 10);
//!     publisher.publish(&readings).await?;
//!     publisher.close();
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod errors;
pub mod eventhub;
pub mod generator;
pub mod metrics;
pub mod model;
pub mod publisher;
pub mod sink;

pub use config::{ConnectionString, PublisherConfig};
pub use errors::{ConfigurationError, Error, Result, TransportError};
pub use eventhub::EventHubSink;
pub use generator::{device_ids, Clock, FixedClock, Overrides, ReadingGenerator, SystemClock};
pub use model::{DeviceId, TelemetryReading};
pub use publisher::Publisher;
pub use sink::{BatchSink, EventBatch};
