//! # Telemetry Outbox
//!
//! Fixed-capacity ring of pending uplink telemetry. Push never fails: when
//! the ring is full the oldest unsent item is dropped to make room.
//!
//! Capacity must be a power of two so indices wrap with a mask.

use crate::fbus::protocol::TelemetryItem;

/// Default outbox capacity
pub const OUTBOX_CAPACITY: usize = 8;

/// Ring buffer of telemetry items waiting for an uplink slot
///
/// `head` and `tail` run freely and are only masked on slot access, so their
/// difference is the fill level and all `N` slots are usable.
#[derive(Debug, Clone)]
pub struct TelemetryOutbox<const N: usize = OUTBOX_CAPACITY> {
    slots: [TelemetryItem; N],
    head: usize,
    tail: usize,
    dropped: u64,
}

impl<const N: usize> Default for TelemetryOutbox<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> TelemetryOutbox<N> {
    const MASK: usize = {
        assert!(N.is_power_of_two(), "outbox capacity must be a power of two");
        N - 1
    };

    pub fn new() -> Self {
        let _ = Self::MASK;
        Self {
            slots: [TelemetryItem::default(); N],
            head: 0,
            tail: 0,
            dropped: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        N
    }

    /// Number of pending items
    pub fn len(&self) -> usize {
        self.head.wrapping_sub(self.tail)
    }

    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    /// Items discarded because the ring was full
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Queue an item, discarding the oldest one if the ring is full
    pub fn push(&mut self, item: TelemetryItem) {
        if self.len() == N {
            self.tail = self.tail.wrapping_add(1);
            self.dropped += 1;
        }

        self.slots[self.head & Self::MASK] = item;
        self.head = self.head.wrapping_add(1);
    }

    /// Take the oldest pending item
    pub fn pop(&mut self) -> Option<TelemetryItem> {
        if self.is_empty() {
            return None;
        }

        let item = self.slots[self.tail & Self::MASK];
        self.tail = self.tail.wrapping_add(1);
        Some(item)
    }
}
