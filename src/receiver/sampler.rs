//! # Channel Sampler
//!
//! Turns successive snapshots into host events. A snapshot whose generation
//! was already seen is ignored. For a new one:
//!
//! - quality goes through a moving-average filter that is re-seeded when the
//!   raw value jumps by more than a threshold;
//! - `Data` is always emitted;
//! - `FlagsChanged` and `QualityChanged` only when the value differs from the
//!   previous sample.

use std::collections::VecDeque;

use tracing::{debug, trace};

use super::events::LinkEvent;
use crate::fbus::protocol::Flags;
use crate::link::shared::ChannelSnapshot;

/// Default number of samples averaged
pub const DEFAULT_QUALITY_WINDOW: usize = 10;

/// Default jump that re-seeds the filter
pub const DEFAULT_QUALITY_RESET_THRESHOLD: u8 = 15;

/// Moving average with fast re-seed on large jumps
#[derive(Debug, Clone)]
pub struct QualityFilter {
    window: usize,
    reset_threshold: u8,
    samples: VecDeque<u8>,
}

impl Default for QualityFilter {
    fn default() -> Self {
        Self::new(DEFAULT_QUALITY_WINDOW, DEFAULT_QUALITY_RESET_THRESHOLD)
    }
}

impl QualityFilter {
    pub fn new(window: usize, reset_threshold: u8) -> Self {
        let window = window.max(1);
        Self {
            window,
            reset_threshold,
            samples: VecDeque::with_capacity(window),
        }
    }

    /// Current filtered value, `None` before the first sample
    pub fn value(&self) -> Option<u8> {
        if self.samples.is_empty() {
            return None;
        }

        let sum: u32 = self.samples.iter().map(|&s| s as u32).sum();
        let len = self.samples.len() as u32;
        Some(((sum + len / 2) / len) as u8)
    }

    /// Feed one raw sample and return the filtered value
    pub fn update(&mut self, raw: u8) -> u8 {
        match self.value() {
            Some(current) if raw.abs_diff(current) <= self.reset_threshold => {
                if self.samples.len() == self.window {
                    self.samples.pop_front();
                }
                self.samples.push_back(raw);
            }
            previous => {
                if previous.is_some() {
                    trace!("Quality jump to {}, re-seeding filter", raw);
                }
                self.samples.clear();
                self.samples.extend(std::iter::repeat(raw).take(self.window));
            }
        }

        self.value().unwrap_or(raw)
    }
}

/// Result of sampling a new generation
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Snapshot with its quality replaced by the filtered value
    pub snapshot: ChannelSnapshot,
    pub events: Vec<LinkEvent>,
}

/// Generation-gated sampler with edge-triggered status events
#[derive(Debug, Clone, Default)]
pub struct ChannelSampler {
    filter: QualityFilter,
    last_generation: Option<u32>,
    last_flags: Option<Flags>,
    last_quality: Option<u8>,
}

impl ChannelSampler {
    pub fn new(quality_window: usize, quality_reset_threshold: u8) -> Self {
        Self {
            filter: QualityFilter::new(quality_window, quality_reset_threshold),
            ..Self::default()
        }
    }

    /// Flags of the most recent sample
    pub fn last_flags(&self) -> Option<Flags> {
        self.last_flags
    }

    /// Filtered quality of the most recent sample
    pub fn last_quality(&self) -> Option<u8> {
        self.last_quality
    }

    pub fn last_generation(&self) -> Option<u32> {
        self.last_generation
    }

    /// Process a snapshot; `None` when its generation was already seen
    pub fn sample(&mut self, mut snapshot: ChannelSnapshot) -> Option<Sample> {
        if self.last_generation == Some(snapshot.generation) {
            return None;
        }
        self.last_generation = Some(snapshot.generation);

        let raw_quality = snapshot.quality;
        snapshot.quality = self.filter.update(raw_quality);

        let mut events = Vec::with_capacity(3);

        if self.last_flags != Some(snapshot.flags) {
            debug!("Link flags changed: {:?}", snapshot.flags);
            self.last_flags = Some(snapshot.flags);
            events.push(LinkEvent::FlagsChanged(snapshot.flags));
        }

        if self.last_quality != Some(snapshot.quality) {
            trace!("Link quality {} (raw {})", snapshot.quality, raw_quality);
            self.last_quality = Some(snapshot.quality);
            events.push(LinkEvent::QualityChanged(snapshot.quality));
        }

        events.push(LinkEvent::Data(snapshot.clone()));

        Some(Sample { snapshot, events })
    }
}
