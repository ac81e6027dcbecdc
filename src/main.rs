//! # FBus Link
//!
//! Runs the FBus receiver link and logs decoded commands.
//!
//! ```bash
//! fbus-link [config.toml]
//! ```

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration};
use tracing::{debug, info, trace, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use fbus_link::config::{Config, LoggingConfig};
use fbus_link::link::machine::LinkSettings;
use fbus_link::link::runner::DEFAULT_POLL_INTERVAL;
use fbus_link::link::{LinkRunner, LinkStateMachine, MonotonicCounter, NoServos, SharedChannelBlock};
use fbus_link::receiver::simulated::SimulatedSampler;
use fbus_link::receiver::{ChannelSource, LinkEvent, Receiver};
use fbus_link::serial::FbusSerial;

/// Interval between JSON status lines
const STATUS_INTERVAL_MS: u64 = 200;

/// Log file name prefix inside `logging.dir`
const LOG_FILE_PREFIX: &str = "fbus-link.log";

/// Main entry point for FBus Link
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Load configuration (defaults when no path is given)
///    - Set up logging
///    - Open the serial link and start the link thread, or set up the
///      simulated sampler
///
/// 2. **Main Loop**
///    - Log decoded events
///    - Log a JSON status line every 200 ms
///    - Handle Ctrl+C for graceful shutdown
///
/// 3. **Graceful Shutdown**
///    - Disable the receiver (powers the link down)
///    - Stop the link thread
///
/// # Errors
///
/// Returns error if:
/// - The configuration file cannot be loaded
/// - The serial device cannot be opened
#[tokio::main]
async fn main() -> Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(&path).with_context(|| format!("loading {}", path))?,
        None => Config::default(),
    };

    let _log_guard = init_logging(&config.logging);

    info!("FBus Link v{} starting...", env!("CARGO_PKG_VERSION"));

    let (receiver, mut runner) = if config.link.simulated {
        info!("Using simulated link");
        let sim = SimulatedSampler::new();
        let power = sim.inputs();
        (Receiver::new(&config, ChannelSource::Simulated(sim), power), None)
    } else {
        let serial = FbusSerial::open(config.link.device.as_deref(), config.link.baud_rate)?;
        info!("FBus link opened at: {}", serial.device_path());

        let block = Arc::new(SharedChannelBlock::new());
        let (link, mailbox) = mpsc::unbounded_channel();
        let settings = LinkSettings::new(
            config.link.device_id,
            config.link.turnaround_min_us,
            config.link.turnaround_max_us,
        );
        let machine = LinkStateMachine::new(
            serial,
            MonotonicCounter::new(),
            NoServos,
            Arc::clone(&block),
            mailbox,
            settings,
        );

        let runner = LinkRunner::spawn(machine, DEFAULT_POLL_INTERVAL)?;
        let power = Arc::new(runner.power());
        let source = ChannelSource::Shared { block, link };
        (Receiver::new(&config, source, power), Some(runner))
    };

    receiver.set_enabled(true)?;
    let mut events = receiver.subscribe();
    let mut status_interval = interval(Duration::from_millis(STATUS_INTERVAL_MS));

    info!("Press Ctrl+C to exit");

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(LinkEvent::Data(snapshot)) => {
                    trace!("Data gen {} quality {}", snapshot.generation, snapshot.quality);
                }
                Ok(event @ LinkEvent::Steer { .. }) => debug!("{:?}", event),
                Ok(event) => info!("{:?}", event),
                Err(RecvError::Lagged(skipped)) => warn!("Event log lagging, skipped {}", skipped),
                Err(RecvError::Closed) => break,
            },

            _ = status_interval.tick() => {
                info!("{}", receiver.status().to_json());
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    receiver.set_enabled(false)?;
    if let Some(runner) = runner.as_mut() {
        runner.stop();
    }

    Ok(())
}

/// Install the tracing subscriber
///
/// `RUST_LOG` overrides the configured level. With `logging.dir` set, output
/// is also written to a daily rolling file; the returned guard must be kept
/// alive for the file writer to flush.
fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match &config.dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);

            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(writer))
                .init();

            Some(guard)
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            None
        }
    }
}
