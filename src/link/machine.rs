//! # Link State Machine
//!
//! Non-blocking driver for one end of the half-duplex FBus wire. Each call to
//! [`LinkStateMachine::poll`] performs at most one step and returns; nothing in
//! here sleeps or spins.
//!
//! ```text
//! Syncing -> ReadControl -> ReadDownlink -+-> WaitWriteUplink -> WriteUplink -+
//!               ^                         |                                   |
//!               |                         +-> ReadUplink <--------------------+
//!               +------------------------------------+
//! ```
//!
//! Accepted control frames are published into the [`SharedChannelBlock`] and
//! routed to any mapped servo outputs. Downlinks addressed to this node are
//! answered with one item from the [`TelemetryOutbox`], or a zero item when
//! nothing is pending.
//!
//! The host talks to the machine only through a [`LinkCommand`] mailbox,
//! drained at the start of every poll.

use std::sync::Arc;

use bytes::{Buf, BufMut, BytesMut};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use super::outbox::TelemetryOutbox;
use super::port::{micros_to_cycles, CycleCounter, LinkPort, ServoOutput, SERVO_UNMAPPED, TX_FIFO_SIZE};
use super::shared::{ChannelUpdate, SharedChannelBlock};
use crate::error::Result;
use crate::fbus::decoder::{control_pulses, decode_control_frame, decode_control_header, decode_link_frame};
use crate::fbus::encoder::encode_link_frame;
use crate::fbus::protocol::{
    LinkFrame, TelemetryItem, FBUS_CONTROL_24CH_SIZE, FBUS_CONTROL_HDR_SIZE,
    FBUS_DEFAULT_DEVICE_ID, FBUS_LINK_FRAME_LEN, FBUS_LINK_FRAME_SIZE, FBUS_MAX_CHANNELS,
};

/// Bytes dropped from the front of the buffer per failed sync attempt
const SYNC_DROP: usize = 2;

/// Default minimum delay between downlink and uplink (µs)
pub const DEFAULT_TURNAROUND_MIN_US: u32 = 500;

/// Default latest point at which the uplink may start (µs)
pub const DEFAULT_TURNAROUND_MAX_US: u32 = 2000;

/// Protocol phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Syncing,
    ReadControl,
    ReadDownlink,
    WaitWriteUplink,
    WriteUplink,
    ReadUplink,
}

/// Output assigned to each channel
pub type ServoMap = [u8; FBUS_MAX_CHANNELS];

/// Message from the host to the link
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LinkCommand {
    /// Queue one item for the next uplink slot
    Telemetry(TelemetryItem),

    /// Replace the channel to servo routing; [`SERVO_UNMAPPED`] entries drive nothing
    ServoMap(ServoMap),

    /// Answer downlinks for a different device id from now on
    DeviceId(u8),
}

/// Link parameters; the device id can be changed at runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkSettings {
    /// Device id this node answers downlinks for
    pub device_id: u8,

    /// Minimum turnaround in counter cycles
    pub turnaround_min: u32,

    /// Maximum turnaround in counter cycles
    pub turnaround_max: u32,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            device_id: FBUS_DEFAULT_DEVICE_ID,
            turnaround_min: micros_to_cycles(DEFAULT_TURNAROUND_MIN_US),
            turnaround_max: micros_to_cycles(DEFAULT_TURNAROUND_MAX_US),
        }
    }
}

impl LinkSettings {
    pub fn new(device_id: u8, min_us: u32, max_us: u32) -> Self {
        Self {
            device_id,
            turnaround_min: micros_to_cycles(min_us),
            turnaround_max: micros_to_cycles(max_us),
        }
    }
}

/// Running counters, mostly for logging
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub control_frames: u64,
    pub sync_drops: u64,
    pub resyncs: u64,
    pub uplinks_sent: u64,
    pub missed_windows: u64,
}

/// Companion-side FBus protocol driver
pub struct LinkStateMachine<P, C, S> {
    port: P,
    clock: C,
    servo: S,
    servo_map: ServoMap,
    shared: Arc<SharedChannelBlock>,
    outbox: TelemetryOutbox,
    mailbox: mpsc::UnboundedReceiver<LinkCommand>,
    settings: LinkSettings,
    state: LinkState,
    rx: BytesMut,
    need: usize,
    window_start: u32,
    tx: [u8; FBUS_LINK_FRAME_LEN],
    tx_pos: usize,
    stats: LinkStats,
}

impl<P: LinkPort, C: CycleCounter, S: ServoOutput> LinkStateMachine<P, C, S> {
    /// Create a state machine in `Syncing` with every channel unmapped
    ///
    /// # Arguments
    ///
    /// * `port` - Serial line to poll
    /// * `clock` - Cycle counter for the turnaround window
    /// * `servo` - Outputs fed from mapped channels
    /// * `shared` - Block accepted control frames are published to
    /// * `mailbox` - Telemetry and configuration from the host
    /// * `settings` - Device id and turnaround window
    pub fn new(
        port: P,
        clock: C,
        servo: S,
        shared: Arc<SharedChannelBlock>,
        mailbox: mpsc::UnboundedReceiver<LinkCommand>,
        settings: LinkSettings,
    ) -> Self {
        Self {
            port,
            clock,
            servo,
            servo_map: [SERVO_UNMAPPED; FBUS_MAX_CHANNELS],
            shared,
            outbox: TelemetryOutbox::new(),
            mailbox,
            settings,
            state: LinkState::Syncing,
            rx: BytesMut::with_capacity(FBUS_CONTROL_HDR_SIZE + FBUS_CONTROL_24CH_SIZE as usize + 1),
            need: FBUS_CONTROL_HDR_SIZE,
            window_start: 0,
            tx: [0u8; FBUS_LINK_FRAME_LEN],
            tx_pos: 0,
            stats: LinkStats::default(),
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn stats(&self) -> LinkStats {
        self.stats
    }

    /// Device id downlinks are currently answered for
    pub fn device_id(&self) -> u8 {
        self.settings.device_id
    }

    pub fn servo_map(&self) -> &ServoMap {
        &self.servo_map
    }

    /// Telemetry items waiting for an uplink slot
    pub fn pending_telemetry(&self) -> usize {
        self.outbox.len()
    }

    /// Run one step of the protocol
    ///
    /// # Errors
    ///
    /// Returns error only when the port itself fails. Malformed frames are
    /// handled internally by resynchronizing.
    pub fn poll(&mut self) -> Result<()> {
        self.drain_mailbox();

        match self.state {
            LinkState::Syncing => self.read_control(true),
            LinkState::ReadControl => self.read_control(false),
            LinkState::ReadDownlink => self.read_downlink(),
            LinkState::WaitWriteUplink => {
                self.wait_write_uplink();
                Ok(())
            }
            LinkState::WriteUplink => self.write_uplink(),
            LinkState::ReadUplink => self.read_uplink(),
        }
    }

    fn drain_mailbox(&mut self) {
        while let Ok(command) = self.mailbox.try_recv() {
            match command {
                LinkCommand::Telemetry(item) => self.outbox.push(item),
                LinkCommand::ServoMap(map) => {
                    debug!("Servo map updated: {:?}", map);
                    self.servo_map = map;
                }
                LinkCommand::DeviceId(id) => {
                    info!("FBus device id 0x{:02X} -> 0x{:02X}", self.settings.device_id, id);
                    self.settings.device_id = id;
                }
            }
        }
    }

    fn enter(&mut self, state: LinkState, need: usize) {
        trace!("Link state {:?} -> {:?}", self.state, state);
        self.state = state;
        self.need = need;
    }

    /// Keep whatever is buffered and let `Syncing` re-examine it
    fn resync(&mut self) {
        self.stats.resyncs += 1;
        self.enter(LinkState::Syncing, FBUS_CONTROL_HDR_SIZE);
    }

    /// Read from the port until `need` bytes are buffered or the port runs dry
    fn fill(&mut self) -> Result<bool> {
        while self.rx.len() < self.need {
            match self.port.read_byte()? {
                Some(byte) => self.rx.put_u8(byte),
                None => return Ok(false),
            }
        }
        Ok(true)
    }

    /// `Syncing` and `ReadControl` share validation; they differ on failure
    fn read_control(&mut self, syncing: bool) -> Result<()> {
        self.need = FBUS_CONTROL_HDR_SIZE;
        if !self.fill()? {
            return Ok(());
        }

        let shape = match decode_control_header(&self.rx) {
            Ok(shape) => shape,
            Err(e) => {
                self.control_failed(syncing, &e.to_string());
                return Ok(());
            }
        };

        self.need = shape.frame_len();
        if !self.fill()? {
            return Ok(());
        }

        match decode_control_frame(&self.rx[..self.need]) {
            Ok(frame) => {
                let pulses = control_pulses(&frame);
                let count = frame.shape.channel_count();
                self.shared.publish(&ChannelUpdate {
                    flags: frame.flags,
                    quality: frame.quality,
                    channel_count: count as u8,
                    channels: &pulses[..count],
                });

                self.drive_servos(&pulses[..count]);

                self.stats.control_frames += 1;
                debug!(
                    "Control frame: {} channels, quality {}, {:?}",
                    count, frame.quality, frame.flags
                );

                self.rx.advance(self.need);
                self.enter(LinkState::ReadDownlink, FBUS_LINK_FRAME_LEN);
            }
            Err(e) => self.control_failed(syncing, &e.to_string()),
        }

        Ok(())
    }

    fn drive_servos(&mut self, pulses: &[u32]) {
        for (&output, &pulse) in self.servo_map.iter().zip(pulses) {
            if output != SERVO_UNMAPPED {
                self.servo.pulse(output, pulse);
            }
        }
    }

    fn control_failed(&mut self, syncing: bool, reason: &str) {
        if syncing {
            let drop = SYNC_DROP.min(self.rx.len());
            self.rx.advance(drop);
            self.stats.sync_drops += 1;
            self.need = FBUS_CONTROL_HDR_SIZE;
            trace!("Sync: {}", reason);
        } else {
            warn!("Lost control frame sync: {}", reason);
            self.resync();
        }
    }

    fn read_downlink(&mut self) -> Result<()> {
        if !self.fill()? {
            return Ok(());
        }

        match decode_link_frame(&self.rx[..FBUS_LINK_FRAME_LEN]) {
            Ok(frame) => {
                self.rx.advance(FBUS_LINK_FRAME_LEN);
                if frame.device_id == self.settings.device_id {
                    self.window_start = self.clock.cycles();
                    self.enter(LinkState::WaitWriteUplink, 0);
                } else {
                    self.enter(LinkState::ReadUplink, 1);
                }
            }
            Err(e) => {
                warn!("Bad downlink frame: {}", e);
                self.resync();
            }
        }

        Ok(())
    }

    fn wait_write_uplink(&mut self) {
        let elapsed = self.clock.cycles().wrapping_sub(self.window_start);

        if elapsed < self.settings.turnaround_min {
            return;
        }

        if elapsed > self.settings.turnaround_max {
            self.stats.missed_windows += 1;
            warn!("Missed uplink window ({} cycles)", elapsed);
            self.enter(LinkState::ReadControl, FBUS_CONTROL_HDR_SIZE);
            return;
        }

        let item = self.outbox.pop().unwrap_or_default();
        self.tx = encode_link_frame(&LinkFrame::uplink(self.settings.device_id, item));
        self.tx_pos = 0;
        self.enter(LinkState::WriteUplink, 0);
    }

    fn write_uplink(&mut self) -> Result<()> {
        if !self.port.tx_idle()? {
            return Ok(());
        }

        if self.tx_pos < self.tx.len() {
            let end = (self.tx_pos + TX_FIFO_SIZE).min(self.tx.len());
            self.tx_pos += self.port.write(&self.tx[self.tx_pos..end])?;
            return Ok(());
        }

        self.stats.uplinks_sent += 1;
        debug!("Uplink sent");
        self.enter(LinkState::ReadUplink, 1);
        Ok(())
    }

    fn read_uplink(&mut self) -> Result<()> {
        self.need = 1;
        if !self.fill()? {
            return Ok(());
        }

        if self.rx[0] != FBUS_LINK_FRAME_SIZE {
            // No uplink on the wire; this byte starts the next control frame
            self.enter(LinkState::ReadControl, FBUS_CONTROL_HDR_SIZE);
            return Ok(());
        }

        self.need = FBUS_LINK_FRAME_LEN;
        if !self.fill()? {
            return Ok(());
        }

        match decode_link_frame(&self.rx[..FBUS_LINK_FRAME_LEN]) {
            Ok(_) => {
                self.rx.advance(FBUS_LINK_FRAME_LEN);
                self.enter(LinkState::ReadControl, FBUS_CONTROL_HDR_SIZE);
            }
            Err(e) => {
                warn!("Bad uplink frame: {}", e);
                self.resync();
            }
        }

        Ok(())
    }
}
