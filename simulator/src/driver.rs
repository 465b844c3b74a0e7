use publisher::{BatchSink, Clock, DeviceId, Publisher, ReadingGenerator, TransportError};
use std::future::Future;
use std::io::Write;
use std::time::Duration;
use tracing::{debug, info, warn};

/// What the loop does, already validated.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub device_ids: Vec<DeviceId>,
    pub batch_size: usize,
    pub interval: Duration,
    pub iterations: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub iterations: u64,
    pub published: usize,
}

/// Generate and publish `settings.iterations` batches, writing one progress
/// line per iteration to `out`.
///
/// Stops early when `shutdown` resolves during the wait between batches. A
/// transport error ends the run and is returned unchanged.
pub async fn run<S, C, W, F>(
    publisher: &mut Publisher<S>,
    generator: &mut ReadingGenerator<C>,
    settings: &RunSettings,
    out: &mut W,
    shutdown: F,
) -> Result<RunSummary, TransportError>
where
    S: BatchSink,
    C: Clock,
    W: Write,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut summary = RunSummary::default();

    info!(
        devices = settings.device_ids.len(),
        batch_size = settings.batch_size,
        interval_secs = settings.interval.as_secs_f64(),
        iterations = settings.iterations,
        "Starting publish loop"
    );

    for iteration in 1..=settings.iterations {
        let readings = generator.generate_batch(&settings.device_ids, settings.batch_size);
        let count = publisher.publish(&readings).await?;

        summary.iterations = iteration;
        summary.published += count;

        if let Err(e) = writeln!(out, "[info] iteration={} published={}", iteration, count) {
            warn!("Failed to write progress: {}", e);
        }

        if iteration == settings.iterations {
            break;
        }

        debug!(iteration, "Waiting {:?} before next batch", settings.interval);
        tokio::select! {
            _ = tokio::time::sleep(settings.interval) => {}
            _ = &mut shutdown => {
                info!(iteration, "Shutdown signal received, stopping");
                break;
            }
        }
    }

    Ok(summary)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use publisher::{device_ids, EventBatch, FixedClock};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Default, Clone)]
    pub(crate) struct MockSink {
        pub(crate) sizes: Arc<Mutex<Vec<usize>>>,
        pub(crate) closes: Arc<AtomicUsize>,
        pub(crate) fail: bool,
    }

    #[async_trait]
    impl BatchSink for MockSink {
        fn name(&self) -> &'static str {
            "mock"
        }

        async fn send_batch(&self, batch: &EventBatch) -> Result<(), TransportError> {
            if self.fail {
                return Err(TransportError::Rejected {
                    status: 413,
                    message: "MessageSizeExceeded".to_string(),
                });
            }
            self.sizes.lock().unwrap().push(batch.len());
            Ok(())
        }

        fn close(&mut self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn settings(device_count: usize, batch_size: usize, iterations: u64) -> RunSettings {
        RunSettings {
            device_ids: device_ids("device", device_count).unwrap(),
            batch_size,
            interval: Duration::ZERO,
            iterations,
        }
    }

    #[tokio::test]
    async fn test_run_publishes_every_iteration() {
        let sink = MockSink::default();
        let mut publisher = Publisher::with_sink(sink.clone());
        let mut generator = ReadingGenerator::with_clock(FixedClock(0.0));
        let mut out = Vec::new();

        let summary = run(
            &mut publisher,
            &mut generator,
            &settings(2, 4, 3),
            &mut out,
            std::future::pending::<()>(),
        )
        .await
        .unwrap();

        assert_eq!(summary, RunSummary { iterations: 3, published: 12 });
        assert_eq!(*sink.sizes.lock().unwrap(), vec![4, 4, 4]);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "[info] iteration=1 published=4\n\
             [info] iteration=2 published=4\n\
             [info] iteration=3 published=4\n"
        );

        publisher.close();
        assert_eq!(sink.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_run_with_zero_devices_is_a_no_op() {
        let sink = MockSink::default();
        let mut publisher = Publisher::with_sink(sink.clone());
        let mut generator = ReadingGenerator::with_clock(FixedClock(0.0));
        let mut out = Vec::new();

        let summary = run(
            &mut publisher,
            &mut generator,
            &settings(0, 10, 2),
            &mut out,
            std::future::pending::<()>(),
        )
        .await
        .unwrap();

        assert_eq!(summary.published, 0);
        assert!(sink.sizes.lock().unwrap().is_empty());
        assert!(String::from_utf8(out).unwrap().contains("iteration=2 published=0"));
    }

    #[tokio::test]
    async fn test_run_stops_on_transport_error() {
        let sink = MockSink {
            fail: true,
            ..MockSink::default()
        };
        let closes = sink.closes.clone();
        let mut publisher = Publisher::with_sink(sink);
        let mut generator = ReadingGenerator::with_clock(FixedClock(0.0));
        let mut out = Vec::new();

        let err = run(
            &mut publisher,
            &mut generator,
            &settings(1, 1, 5),
            &mut out,
            std::future::pending::<()>(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, TransportError::Rejected { status: 413, .. }));
        assert!(out.is_empty());

        drop(publisher);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let sink = MockSink::default();
        let mut publisher = Publisher::with_sink(sink.clone());
        let mut generator = ReadingGenerator::with_clock(FixedClock(0.0));
        let mut out = Vec::new();

        let mut long_wait = settings(1, 1, 5);
        long_wait.interval = Duration::from_secs(3600);

        let summary = run(
            &mut publisher,
            &mut generator,
            &long_wait,
            &mut out,
            std::future::ready(()),
        )
        .await
        .unwrap();

        assert_eq!(summary.iterations, 1);
        assert_eq!(sink.sizes.lock().unwrap().len(), 1);
    }
}
