//! # Receiver Module
//!
//! Host-side facade over the link. A periodic task samples the channel
//! source, runs the command decoder on every new snapshot and broadcasts the
//! resulting [`LinkEvent`]s.
//!
//! ## Lifecycle
//!
//! - `set_enabled(true)` powers the link and starts the tick task on the
//!   current tokio runtime.
//! - `set_enabled(false)` cancels the task, powers the link down and closes
//!   every existing subscription. A tick already running completes first.
//!
//! Ticks are scheduled from the previous deadline, not from "now", so
//! processing time does not accumulate into drift.

pub mod events;
pub mod sampler;
pub mod simulated;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::command::CommandDecoder;
use crate::config::Config;
use crate::error::{FbusError, Result};
use crate::fbus::protocol::{Flags, TelemetryItem};
use crate::link::machine::{LinkCommand, ServoMap};
use crate::link::shared::SharedChannelBlock;
use crate::status::LinkStatus;
use crate::telemetry::{TelemetryEncoder, TelemetryEvent};
pub use events::LinkEvent;
use sampler::ChannelSampler;
use simulated::SimulatedSampler;

/// Events buffered per subscriber before the slowest one starts lagging
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Powers the link hardware up and down
#[cfg_attr(test, mockall::automock)]
pub trait LinkPower: Send + Sync {
    fn set_power(&self, on: bool);
}

/// Where snapshots come from
pub enum ChannelSource {
    /// A real link: the block it publishes into and its command mailbox
    Shared {
        block: Arc<SharedChannelBlock>,
        link: mpsc::UnboundedSender<LinkCommand>,
    },

    /// Software-driven stand-in
    Simulated(SimulatedSampler),
}

impl ChannelSource {
    pub fn is_simulated(&self) -> bool {
        matches!(self, ChannelSource::Simulated(_))
    }
}

struct Pipeline {
    source: ChannelSource,
    sampler: ChannelSampler,
    decoder: CommandDecoder,
}

impl Pipeline {
    fn tick(&mut self) -> Vec<LinkEvent> {
        let snapshot = match &mut self.source {
            ChannelSource::Shared { block, .. } => block.read(),
            ChannelSource::Simulated(sim) => Some(sim.tick()),
        };

        // A torn read is retried on the next tick
        let Some(snapshot) = snapshot else {
            trace!("Shared block busy, skipping tick");
            return Vec::new();
        };

        let Some(sample) = self.sampler.sample(snapshot) else {
            return Vec::new();
        };

        let mut events = sample.events;
        events.extend(self.decoder.decode(&sample.snapshot));
        events
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Host-side receiver facade
pub struct Receiver {
    pipeline: Arc<Mutex<Pipeline>>,
    power: Arc<dyn LinkPower>,
    period: Duration,
    encoder: TelemetryEncoder,
    events: Mutex<broadcast::Sender<LinkEvent>>,
    task: Mutex<Option<CancellationToken>>,
}

impl std::fmt::Debug for Receiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Receiver")
            .field("period", &self.period)
            .field("enabled", &self.is_enabled())
            .finish_non_exhaustive()
    }
}

impl Receiver {
    /// Create a disabled receiver
    ///
    /// # Arguments
    ///
    /// * `config` - Sampling period, quality filter and channel mapping
    /// * `source` - Shared block of a running link, or the simulated sampler
    /// * `power` - Link power switch
    pub fn new(config: &Config, source: ChannelSource, power: Arc<dyn LinkPower>) -> Self {
        let period_ms = if source.is_simulated() {
            config.sampler.simulated_period_ms
        } else {
            config.sampler.period_ms
        };

        let pipeline = Pipeline {
            source,
            sampler: ChannelSampler::new(
                config.sampler.quality_window,
                config.sampler.quality_reset_threshold,
            ),
            decoder: CommandDecoder::new(config.mapping.clone()),
        };

        Self {
            pipeline: Arc::new(Mutex::new(pipeline)),
            power,
            period: Duration::from_millis(period_ms),
            encoder: TelemetryEncoder::new(),
            events: Mutex::new(broadcast::channel(EVENT_CHANNEL_CAPACITY).0),
            task: Mutex::new(None),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_enabled(&self) -> bool {
        lock(&self.task).is_some()
    }

    /// Subscribe to link events
    ///
    /// The subscription ends (`RecvError::Closed`) when the receiver is
    /// disabled; subscribe again after re-enabling.
    pub fn subscribe(&self) -> broadcast::Receiver<LinkEvent> {
        lock(&self.events).subscribe()
    }

    /// Enable or disable the link; repeated calls with the same value do nothing
    ///
    /// # Errors
    ///
    /// Returns `Runtime` when enabling outside a tokio runtime
    pub fn set_enabled(&self, enabled: bool) -> Result<()> {
        let mut task = lock(&self.task);
        if enabled == task.is_some() {
            return Ok(());
        }

        if enabled {
            let runtime = tokio::runtime::Handle::try_current()
                .map_err(|e| FbusError::Runtime(format!("Cannot start receiver: {}", e)))?;

            let token = CancellationToken::new();
            runtime.spawn(run_ticks(
                Arc::clone(&self.pipeline),
                lock(&self.events).clone(),
                self.period,
                token.clone(),
            ));
            *task = Some(token);

            self.power.set_power(true);
            info!("Receiver enabled ({:?} period)", self.period);
        } else if let Some(token) = task.take() {
            token.cancel();
            self.power.set_power(false);
            *lock(&self.events) = broadcast::channel(EVENT_CHANNEL_CAPACITY).0;
            info!("Receiver disabled");
        }

        Ok(())
    }

    /// Queue one telemetry item for the next uplink slot
    ///
    /// Does nothing while disabled or while the link reports frame-lost.
    /// Returns whether the item was handed to the link.
    pub fn send_telemetry(&self, app_id: u16, data: u32) -> bool {
        if !self.is_enabled() {
            debug!("Telemetry 0x{:04X} dropped: receiver disabled", app_id);
            return false;
        }

        let pipeline = lock(&self.pipeline);
        if pipeline.sampler.last_flags().map_or(true, Flags::frame_lost) {
            debug!("Telemetry 0x{:04X} dropped: no link", app_id);
            return false;
        }

        Self::forward(&pipeline, LinkCommand::Telemetry(TelemetryItem::new(app_id, data)))
    }

    /// Answer downlinks for `device_id` from now on
    ///
    /// Applies whether or not the receiver is enabled. Returns false for the
    /// simulated source or once the link has shut down.
    pub fn set_device_id(&self, device_id: u8) -> bool {
        info!("Requesting FBus device id 0x{:02X}", device_id);
        Self::forward(&lock(&self.pipeline), LinkCommand::DeviceId(device_id))
    }

    /// Route channels straight to servo outputs on the link side
    ///
    /// `map[channel]` is the output for that channel, or
    /// [`SERVO_UNMAPPED`](crate::link::port::SERVO_UNMAPPED).
    pub fn set_servo_map(&self, map: ServoMap) -> bool {
        Self::forward(&lock(&self.pipeline), LinkCommand::ServoMap(map))
    }

    fn forward(pipeline: &Pipeline, command: LinkCommand) -> bool {
        match &pipeline.source {
            ChannelSource::Shared { link, .. } => link.send(command).is_ok(),
            ChannelSource::Simulated(_) => {
                trace!("{:?} ignored by simulated link", command);
                false
            }
        }
    }

    /// Encode a collaborator's telemetry event and queue every resulting item
    ///
    /// Returns how many items were queued.
    pub fn on_telemetry_event(&self, event: &TelemetryEvent) -> usize {
        self.encoder
            .encode(event)
            .into_iter()
            .filter(|item| self.send_telemetry(item.app_id, item.data))
            .count()
    }

    /// Current status snapshot
    pub fn status(&self) -> LinkStatus {
        let enabled = self.is_enabled();
        let pipeline = lock(&self.pipeline);
        let flags = pipeline.sampler.last_flags();

        LinkStatus {
            enabled,
            connected: flags.is_some_and(|f| !f.frame_lost()),
            quality: pipeline.sampler.last_quality().unwrap_or(0),
            flags: flags.unwrap_or(Flags::INITIAL).bits(),
            generation: pipeline.sampler.last_generation().unwrap_or(0),
            arm_state: pipeline.decoder.arm_state(),
            timestamp: Utc::now(),
        }
    }
}

impl Drop for Receiver {
    fn drop(&mut self) {
        if let Some(token) = lock(&self.task).take() {
            token.cancel();
            self.power.set_power(false);
        }
    }
}

async fn run_ticks(
    pipeline: Arc<Mutex<Pipeline>>,
    events: broadcast::Sender<LinkEvent>,
    period: Duration,
    token: CancellationToken,
) {
    let mut deadline = Instant::now() + period;

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = sleep_until(deadline) => {}
        }

        let batch = lock(&pipeline).tick();
        for event in batch {
            // No subscribers is fine
            let _ = events.send(event);
        }

        if token.is_cancelled() {
            break;
        }
        deadline += period;
    }

    debug!("Receiver tick task stopped");
}
