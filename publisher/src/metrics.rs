use lazy_static::lazy_static;
use prometheus::{Counter, Encoder, Gauge, Histogram, HistogramOpts, Opts, Registry, TextEncoder};
use std::sync::Once;
use tracing::warn;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref EVENTS_TOTAL: Counter = Counter::with_opts(Opts::new(
        "publisher_events_total",
        "Total readings accepted by the sink"
    ))
    .unwrap();
    pub static ref BATCHES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "publisher_batches_total",
        "Total batches accepted by the sink"
    ))
    .unwrap();
    pub static ref FAILURES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "publisher_failures_total",
        "Total batches rejected by the sink"
    ))
    .unwrap();
    pub static ref SEND_LATENCY_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "publisher_send_latency_seconds",
            "Time taken by one batch send"
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0
        ])
    )
    .unwrap();
    pub static ref LAST_BATCH_SIZE: Gauge = Gauge::with_opts(Opts::new(
        "publisher_last_batch_size",
        "Number of readings in the most recent batch"
    ))
    .unwrap();
}

static INIT: Once = Once::new();

/// Register every collector with [`REGISTRY`]. Safe to call more than once.
pub fn init_metrics() {
    INIT.call_once(|| {
        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(EVENTS_TOTAL.clone()),
            Box::new(BATCHES_TOTAL.clone()),
            Box::new(FAILURES_TOTAL.clone()),
            Box::new(SEND_LATENCY_SECONDS.clone()),
            Box::new(LAST_BATCH_SIZE.clone()),
        ];
        for collector in collectors {
            if let Err(e) = REGISTRY.register(collector) {
                warn!("Failed to register metric: {}", e);
            }
        }
    });
}

/// Prometheus text exposition of everything in [`REGISTRY`].
pub fn gather_metrics() -> String {
    init_metrics();
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
