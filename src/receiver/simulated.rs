//! # Simulated Sampler
//!
//! Stands in for the shared block when no receiver is wired up. Inputs are
//! set from software through [`SimulatedInputs`]; every tick produces a new
//! snapshot so the regular sampler and decoder rules apply unchanged.
//!
//! While connected, quality is drawn from N(50, 10). After
//! [`MISSED_TICKS_FRAME_LOST`] ticks without a connection the frame-lost
//! flag is raised and quality drops to 0.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use tracing::debug;

use super::LinkPower;
use crate::fbus::protocol::{ChannelValues, Flags, FBUS_MAX_CHANNELS, PULSE_CENTER, PULSE_MAX, PULSE_MIN};
use crate::link::shared::{ChannelSnapshot, INITIAL_CHANNEL_COUNT};

/// Consecutive disconnected ticks before frame-lost is reported
pub const MISSED_TICKS_FRAME_LOST: u32 = 4;

const QUALITY_MEAN: f64 = 50.0;
const QUALITY_STDDEV: f64 = 10.0;

/// Software-controlled inputs shared with the sampler
#[derive(Debug)]
pub struct SimulatedInputs {
    connected: AtomicBool,
    channel_count: AtomicU8,
    channels: [AtomicU32; FBUS_MAX_CHANNELS],
}

impl Default for SimulatedInputs {
    fn default() -> Self {
        Self {
            connected: AtomicBool::new(false),
            channel_count: AtomicU8::new(INITIAL_CHANNEL_COUNT),
            channels: std::array::from_fn(|_| AtomicU32::new(PULSE_CENTER)),
        }
    }
}

impl SimulatedInputs {
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Relaxed);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Set one channel; out-of-range indices are ignored
    pub fn set_channel(&self, index: usize, value: u32) {
        if let Some(slot) = self.channels.get(index) {
            slot.store(value.clamp(PULSE_MIN, PULSE_MAX), Ordering::Relaxed);
        }
    }

    pub fn set_channel_count(&self, count: u8) {
        self.channel_count
            .store(count.min(FBUS_MAX_CHANNELS as u8), Ordering::Relaxed);
    }

    fn channels(&self) -> ChannelValues {
        std::array::from_fn(|i| self.channels[i].load(Ordering::Relaxed))
    }
}

/// Powering the simulated link connects it
impl LinkPower for SimulatedInputs {
    fn set_power(&self, on: bool) {
        self.set_connected(on);
    }
}

/// Snapshot generator driven by the receiver's tick
#[derive(Debug)]
pub struct SimulatedSampler {
    inputs: Arc<SimulatedInputs>,
    rng: StdRng,
    generation: u32,
    missed: u32,
    flags: Flags,
    quality: u8,
}

impl Default for SimulatedSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedSampler {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Deterministic sampler for reproducible runs
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            inputs: Arc::new(SimulatedInputs::default()),
            rng,
            generation: 0,
            missed: 0,
            flags: Flags::INITIAL,
            quality: 0,
        }
    }

    /// Handle for setting inputs from elsewhere
    pub fn inputs(&self) -> Arc<SimulatedInputs> {
        Arc::clone(&self.inputs)
    }

    /// Advance one period and return the resulting snapshot
    pub fn tick(&mut self) -> ChannelSnapshot {
        if self.inputs.is_connected() {
            self.missed = 0;
            self.flags = Flags::default();
            self.quality = self.gaussian_quality();
        } else {
            self.missed = self.missed.saturating_add(1);
            if self.missed >= MISSED_TICKS_FRAME_LOST && !self.flags.frame_lost() {
                debug!("Simulated link lost after {} missed ticks", self.missed);
                self.flags = Flags(Flags::FRAME_LOST);
                self.quality = 0;
            }
        }

        self.generation = self.generation.wrapping_add(1);

        ChannelSnapshot {
            generation: self.generation,
            flags: self.flags,
            quality: self.quality,
            channel_count: self.inputs.channel_count.load(Ordering::Relaxed),
            channels: self.inputs.channels(),
        }
    }

    fn gaussian_quality(&mut self) -> u8 {
        let z: f64 = self.rng.sample(StandardNormal);
        (QUALITY_MEAN + QUALITY_STDDEV * z).round().clamp(0.0, 100.0) as u8
    }
}
