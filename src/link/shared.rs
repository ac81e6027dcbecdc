//! # Shared Channel Block
//!
//! The memory contract between the link state machine (single writer) and the
//! host sampler (single reader). No lock is taken on either side; consistency
//! comes from a sequence counter:
//!
//! - the writer makes the counter odd, writes every field, then makes it even
//!   again with release ordering;
//! - the reader loads the counter with acquire ordering, copies the fields,
//!   and re-checks the counter. An odd or changed counter means the copy is
//!   torn and is dropped; the reader tries again on its next poll.
//!
//! The public generation is the sequence counter divided by two, so it
//! advances by exactly one per published frame.
//!
//! Layout is `#[repr(C)]` and matches the wire-independent contract
//! `generation:u32, flags:u8, quality:u8, channel_count:u8, reserved:u8,
//! channels:[u32;24]`. The block may live at an offset inside a larger
//! segment shared with other regions, so it never assumes ownership of
//! anything past its own 104 bytes.

use std::sync::atomic::{fence, AtomicU32, AtomicU8, Ordering};

use crate::fbus::channels::clamp_pulse;
use crate::fbus::protocol::{ChannelValues, Flags, CHANNEL_UNSET, FBUS_MAX_CHANNELS};

/// Channel count reported before the first control frame arrives
pub const INITIAL_CHANNEL_COUNT: u8 = 16;

/// Shared block handed from the link to the host
#[repr(C)]
#[derive(Debug)]
pub struct SharedChannelBlock {
    sequence: AtomicU32,
    flags: AtomicU8,
    quality: AtomicU8,
    channel_count: AtomicU8,
    _reserved: u8,
    channels: [AtomicU32; FBUS_MAX_CHANNELS],
}

const _: () = assert!(std::mem::size_of::<SharedChannelBlock>() == 104);

/// Consistent copy of the block taken by the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSnapshot {
    /// Generation the copy was taken at
    pub generation: u32,
    pub flags: Flags,
    pub quality: u8,
    pub channel_count: u8,
    pub channels: ChannelValues,
}

/// Values the link publishes for one accepted control frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelUpdate<'a> {
    pub flags: Flags,
    pub quality: u8,
    pub channel_count: u8,
    pub channels: &'a [u32],
}

impl Default for SharedChannelBlock {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedChannelBlock {
    /// Create a block in its link-initialization state
    ///
    /// Generation 0, frame-lost flag set, quality 0, 16 channels, all UNSET.
    pub fn new() -> Self {
        Self {
            sequence: AtomicU32::new(0),
            flags: AtomicU8::new(Flags::INITIAL.bits()),
            quality: AtomicU8::new(0),
            channel_count: AtomicU8::new(INITIAL_CHANNEL_COUNT),
            _reserved: 0,
            channels: std::array::from_fn(|_| AtomicU32::new(CHANNEL_UNSET)),
        }
    }

    /// Current generation (number of published updates, wrapping)
    pub fn generation(&self) -> u32 {
        self.sequence.load(Ordering::Acquire) >> 1
    }

    /// Publish one update. Must only be called from the single writer.
    ///
    /// Channel values are clamped to `[500, 2500]` (UNSET is kept); channels
    /// past `update.channels.len()` are set to UNSET. The generation advances
    /// after every field is written.
    pub fn publish(&self, update: &ChannelUpdate<'_>) {
        let seq = self.sequence.load(Ordering::Relaxed);
        self.sequence.store(seq.wrapping_add(1), Ordering::Relaxed);
        fence(Ordering::Release);

        self.flags.store(update.flags.bits(), Ordering::Relaxed);
        self.quality.store(update.quality, Ordering::Relaxed);
        self.channel_count
            .store(update.channel_count, Ordering::Relaxed);

        for (index, slot) in self.channels.iter().enumerate() {
            let value = update
                .channels
                .get(index)
                .map_or(CHANNEL_UNSET, |&v| clamp_pulse(v));
            slot.store(value, Ordering::Relaxed);
        }

        self.sequence.store(seq.wrapping_add(2), Ordering::Release);
    }

    /// Try to take a consistent snapshot
    ///
    /// Returns `None` when a write is in progress or completed during the
    /// copy. Never blocks or spins.
    pub fn read(&self) -> Option<ChannelSnapshot> {
        let before = self.sequence.load(Ordering::Acquire);
        if before & 1 == 1 {
            return None;
        }

        let flags = Flags(self.flags.load(Ordering::Relaxed));
        let quality = self.quality.load(Ordering::Relaxed);
        let channel_count = self.channel_count.load(Ordering::Relaxed);
        let mut channels = [CHANNEL_UNSET; FBUS_MAX_CHANNELS];
        for (value, slot) in channels.iter_mut().zip(self.channels.iter()) {
            *value = slot.load(Ordering::Relaxed);
        }

        fence(Ordering::Acquire);
        let after = self.sequence.load(Ordering::Relaxed);
        if before != after {
            return None;
        }

        Some(ChannelSnapshot {
            generation: before >> 1,
            flags,
            quality,
            channel_count,
            channels,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_initial_state() {
        let block = SharedChannelBlock::new();
        let snapshot = block.read().unwrap();

        assert_eq!(snapshot.generation, 0);
        assert!(snapshot.flags.frame_lost());
        assert_eq!(snapshot.quality, 0);
        assert_eq!(snapshot.channel_count, INITIAL_CHANNEL_COUNT);
        assert!(snapshot.channels.iter().all(|&c| c == CHANNEL_UNSET));
    }

    #[test]
    fn test_publish_advances_generation_by_one() {
        let block = SharedChannelBlock::new();
        let channels = [1500u32; 8];

        block.publish(&ChannelUpdate {
            flags: Flags::default(),
            quality: 90,
            channel_count: 8,
            channels: &channels,
        });

        let snapshot = block.read().unwrap();
        assert_eq!(snapshot.generation, 1);
        assert_eq!(block.generation(), 1);
        assert_eq!(snapshot.quality, 90);
        assert_eq!(snapshot.channel_count, 8);
        assert_eq!(&snapshot.channels[..8], &channels);
        assert_eq!(snapshot.channels[8], CHANNEL_UNSET);
    }

    #[test]
    fn test_publish_clamps_channels() {
        let block = SharedChannelBlock::new();
        block.publish(&ChannelUpdate {
            flags: Flags::default(),
            quality: 0,
            channel_count: 3,
            channels: &[100, CHANNEL_UNSET, 9000],
        });

        let snapshot = block.read().unwrap();
        assert_eq!(&snapshot.channels[..3], &[500, CHANNEL_UNSET, 2500]);
    }

    #[test]
    fn test_read_rejects_write_in_progress() {
        let block = SharedChannelBlock::new();
        block.sequence.store(3, Ordering::Release);
        assert!(block.read().is_none());
    }

    #[test]
    fn test_concurrent_reads_are_never_torn() {
        let block = Arc::new(SharedChannelBlock::new());
        let writer_block = Arc::clone(&block);

        let writer = thread::spawn(move || {
            for i in 0..20_000u32 {
                // Every field of one update carries the same value
                let value = 500 + (i % 2000);
                let channels = [value; FBUS_MAX_CHANNELS];
                writer_block.publish(&ChannelUpdate {
                    flags: Flags::default(),
                    quality: (value % 256) as u8,
                    channel_count: 24,
                    channels: &channels,
                });
            }
        });

        let mut consistent = 0;
        while !writer.is_finished() {
            if let Some(snapshot) = block.read() {
                let first = snapshot.channels[0];
                assert!(snapshot.channels.iter().all(|&c| c == first || first == CHANNEL_UNSET));
                if first != CHANNEL_UNSET {
                    assert_eq!(snapshot.quality, (first % 256) as u8);
                }
                consistent += 1;
            }
        }
        writer.join().unwrap();

        assert!(consistent > 0);
        assert_eq!(block.generation(), 20_000);
    }
}
