//! Emits synthetic telemetry batches into an Event Hub.
//!
//! Connection settings come from `EVENTHUB_CONNECTION_STRING` and
//! `EVENTHUB_NAME`; loop settings from the flags below. Progress lines go to
//! stdout, logs (filtered by `RUST_LOG`, default `info`) to stderr.

mod driver;

use clap::Parser;
use publisher::{
    device_ids, metrics, BatchSink, Clock, ConfigurationError, Publisher, ReadingGenerator,
};
use std::fmt::Display;
use std::future::Future;
use std::io::Write;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use driver::RunSettings;

#[derive(Debug, Parser)]
#[command(
    name = "simulator",
    about = "Emit demo telemetry into an Event Hub-compatible endpoint"
)]
struct Args {
    /// Prefix used when generating device identifiers
    #[arg(long, env = "SIM_DEVICE_PREFIX", default_value = "device")]
    device_prefix: String,

    /// Number of synthetic devices to simulate
    #[arg(long, env = "SIM_DEVICE_COUNT", default_value_t = 5)]
    device_count: usize,

    /// Number of readings to emit per batch
    #[arg(long, env = "SIM_BATCH_SIZE", default_value_t = 10)]
    batch_size: usize,

    /// Seconds to wait between batches
    #[arg(long, env = "SIM_INTERVAL_SECS", default_value = "2", value_parser = parse_interval)]
    interval: Duration,

    /// Number of batches to send before exiting
    #[arg(long, env = "SIM_ITERATIONS", default_value_t = 5)]
    iterations: u64,

    /// Print Prometheus metrics to stdout before exiting
    #[arg(long)]
    print_metrics: bool,
}

impl Args {
    fn settings(&self) -> Result<RunSettings, ConfigurationError> {
        Ok(RunSettings {
            device_ids: device_ids(&self.device_prefix, self.device_count)?,
            batch_size: self.batch_size,
            interval: self.interval,
            iterations: self.iterations,
        })
    }
}

fn parse_interval(value: &str) -> Result<Duration, String> {
    let secs: f64 = value
        .parse()
        .map_err(|_| format!("'{}' is not a number of seconds", value))?;
    Duration::try_from_secs_f64(secs)
        .map_err(|_| format!("interval must be a non-negative number of seconds, got {}", value))
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    };

    execute(
        &args,
        Publisher::from_env,
        ReadingGenerator::new(),
        &mut std::io::stdout(),
        &mut std::io::stderr(),
        shutdown,
    )
    .await
}

/// Open the publisher, run the loop and map the outcome to an exit status.
///
/// Configuration and transport errors are reported as `[error] <message>` on
/// `stderr`. The publisher is closed on every path once opened.
async fn execute<S, C, O, W, E, F>(
    args: &Args,
    open: O,
    mut generator: ReadingGenerator<C>,
    stdout: &mut W,
    stderr: &mut E,
    shutdown: F,
) -> ExitCode
where
    S: BatchSink,
    C: Clock,
    O: FnOnce() -> Result<Publisher<S>, ConfigurationError>,
    W: Write,
    E: Write,
    F: Future<Output = ()>,
{
    let settings = match args.settings() {
        Ok(settings) => settings,
        Err(e) => {
            report(stderr, &e);
            return ExitCode::FAILURE;
        }
    };

    let mut publisher = match open() {
        Ok(publisher) => publisher,
        Err(e) => {
            error!(error = %e, "Failed to open publisher");
            report(stderr, &e);
            return ExitCode::FAILURE;
        }
    };
    metrics::init_metrics();

    let result = driver::run(&mut publisher, &mut generator, &settings, stdout, shutdown).await;
    publisher.close();

    match result {
        Ok(summary) => {
            info!(
                iterations = summary.iterations,
                published = summary.published,
                "Simulator finished"
            );
            if args.print_metrics {
                if let Err(e) = write!(stdout, "{}", metrics::gather_metrics()) {
                    warn!("Failed to write metrics: {}", e);
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Publishing stopped");
            report(stderr, &e);
            ExitCode::FAILURE
        }
    }
}

fn report<E: Write>(stderr: &mut E, message: &dyn Display) {
    if let Err(e) = writeln!(stderr, "[error] {}", message) {
        warn!("Failed to write error report: {}", e);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .compact()
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::tests::MockSink;
    use publisher::{FixedClock, PublisherConfig};
    use std::sync::atomic::Ordering;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["simulator"]).unwrap();
        assert_eq!(args.device_prefix, "device");
        assert_eq!(args.device_count, 5);
        assert_eq!(args.batch_size, 10);
        assert_eq!(args.interval, Duration::from_secs(2));
        assert_eq!(args.iterations, 5);
        assert!(!args.print_metrics);
    }

    #[test]
    fn test_flags_build_settings() {
        let args = Args::try_parse_from([
            "simulator",
            "--device-prefix",
            "sensor",
            "--device-count",
            "2",
            "--batch-size",
            "3",
            "--interval",
            "0.5",
            "--iterations",
            "7",
        ])
        .unwrap();

        let settings = args.settings().unwrap();
        let ids: Vec<&str> = settings.device_ids.iter().map(|id| id.as_str()).collect();
        assert_eq!(ids, vec!["sensor-001", "sensor-002"]);
        assert_eq!(settings.batch_size, 3);
        assert_eq!(settings.interval, Duration::from_millis(500));
        assert_eq!(settings.iterations, 7);
    }

    #[test]
    fn test_interval_validation() {
        assert!(Args::try_parse_from(["simulator", "--interval", "-1"]).is_err());
        assert!(Args::try_parse_from(["simulator", "--interval", "soon"]).is_err());
        assert!(Args::try_parse_from(["simulator", "--interval", "1e20"]).is_err());
        assert!(Args::try_parse_from(["simulator", "--interval", "inf"]).is_err());
        assert!(Args::try_parse_from(["simulator", "--interval", "0"]).is_ok());
    }

    #[test]
    fn test_empty_prefix_is_configuration_error() {
        let args = Args::try_parse_from(["simulator", "--device-prefix", ""]).unwrap();
        assert!(matches!(args.settings(), Err(ConfigurationError::Empty(_))));
    }

    fn quick_args() -> Args {
        Args::try_parse_from([
            "simulator",
            "--device-count",
            "2",
            "--batch-size",
            "3",
            "--interval",
            "0",
            "--iterations",
            "2",
        ])
        .unwrap()
    }

    fn generator() -> ReadingGenerator<FixedClock> {
        ReadingGenerator::with_clock(FixedClock(1_700_000_000.0))
    }

    #[tokio::test]
    async fn test_execute_missing_configuration_fails() {
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();

        let code = execute(
            &quick_args(),
            || PublisherConfig::from_lookup(|_: &str| None).and_then(Publisher::from_config),
            generator(),
            &mut stdout,
            &mut stderr,
            std::future::pending::<()>(),
        )
        .await;

        assert_eq!(code, ExitCode::FAILURE);
        assert!(stdout.is_empty());
        assert_eq!(
            String::from_utf8(stderr).unwrap(),
            "[error] Missing required environment variables: \
             EVENTHUB_CONNECTION_STRING, EVENTHUB_NAME\n"
        );
    }

    #[tokio::test]
    async fn test_execute_transport_error_fails_and_closes() {
        let sink = MockSink {
            fail: true,
            ..MockSink::default()
        };
        let closes = sink.closes.clone();
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();

        let code = execute(
            &quick_args(),
            || Ok(Publisher::with_sink(sink)),
            generator(),
            &mut stdout,
            &mut stderr,
            std::future::pending::<()>(),
        )
        .await;

        assert_eq!(code, ExitCode::FAILURE);
        assert!(stdout.is_empty());
        let stderr = String::from_utf8(stderr).unwrap();
        assert!(stderr.starts_with("[error] "));
        assert!(stderr.contains("413"));
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_execute_success() {
        let sink = MockSink::default();
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();

        let code = execute(
            &quick_args(),
            || Ok(Publisher::with_sink(sink.clone())),
            generator(),
            &mut stdout,
            &mut stderr,
            std::future::pending::<()>(),
        )
        .await;

        assert_eq!(code, ExitCode::SUCCESS);
        assert!(stderr.is_empty());
        assert_eq!(
            String::from_utf8(stdout).unwrap(),
            "[info] iteration=1 published=3\n\
             [info] iteration=2 published=3\n"
        );
        assert_eq!(*sink.sizes.lock().unwrap(), vec![3, 3]);
        assert_eq!(sink.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_execute_invalid_settings_never_opens() {
        let args = Args::try_parse_from(["simulator", "--device-prefix", ""]).unwrap();
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();

        let code = execute(
            &args,
            || -> Result<Publisher<MockSink>, ConfigurationError> {
                panic!("publisher must not be opened")
            },
            generator(),
            &mut stdout,
            &mut stderr,
            std::future::pending::<()>(),
        )
        .await;

        assert_eq!(code, ExitCode::FAILURE);
        assert_eq!(
            String::from_utf8(stderr).unwrap(),
            "[error] device prefix must not be empty\n"
        );
    }
}
