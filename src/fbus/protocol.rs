//! # FBus Protocol Constants and Types
//!
//! Core protocol definitions for the half-duplex FBus link.
//!
//! ```text
//! Control:  [size][0xFF][packed channels][flags][quality][checksum]
//! Downlink: [0x08][device id][primitive][app id LE][data LE][checksum]
//! Uplink:   same shape as downlink
//! ```

use std::fmt;

use crate::error::{FbusError, Result};

/// Control frame header byte (second byte on the wire)
pub const FBUS_CONTROL_HDR: u8 = 0xFF;

/// Control frame size byte for 8 channels (11 channel bytes + flags + quality)
pub const FBUS_CONTROL_8CH_SIZE: u8 = 0x0D;

/// Control frame size byte for 16 channels
pub const FBUS_CONTROL_16CH_SIZE: u8 = 0x18;

/// Control frame size byte for 24 channels
pub const FBUS_CONTROL_24CH_SIZE: u8 = 0x23;

/// Size byte + header byte preceding the control payload
pub const FBUS_CONTROL_HDR_SIZE: usize = 2;

/// Size byte of downlink and uplink frames
pub const FBUS_LINK_FRAME_SIZE: u8 = 0x08;

/// Total downlink/uplink frame length: size(1) + payload(8) + checksum(1)
pub const FBUS_LINK_FRAME_LEN: usize = 1 + FBUS_LINK_FRAME_SIZE as usize + 1;

/// Primitive id written into every uplink frame
pub const FBUS_UPLINK_PRIMITIVE: u8 = 0x10;

/// Device id this node answers to unless configured otherwise
pub const FBUS_DEFAULT_DEVICE_ID: u8 = 0x67;

/// Channels per packed group
pub const FBUS_GROUP_CHANNELS: usize = 8;

/// Bytes per packed group (8 × 11 bits)
pub const FBUS_GROUP_BYTES: usize = 11;

/// Maximum channel count carried by a control frame
pub const FBUS_MAX_CHANNELS: usize = 24;

/// Raw 11-bit channel limits reported by the receiver
pub const FBUS_RAW_MIN: u16 = 8;
pub const FBUS_RAW_MAX: u16 = 1976;
pub const FBUS_RAW_CENTER: u16 = 992;

/// Servo pulse limits in microseconds
pub const PULSE_MIN: u32 = 500;
pub const PULSE_MAX: u32 = 2500;
pub const PULSE_CENTER: u32 = (PULSE_MIN + PULSE_MAX) / 2;
pub const PULSE_RANGE: u32 = PULSE_MAX - PULSE_MIN;

/// Channel value meaning "never received"
pub const CHANNEL_UNSET: u32 = 0;

/// Pulse-domain channel values as stored in the shared block
pub type ChannelValues = [u32; FBUS_MAX_CHANNELS];

/// Control frame layouts (8/16/24 channels)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlShape {
    Channels8,
    Channels16,
    Channels24,
}

impl ControlShape {
    /// Shape for a size byte, if it is one of the three valid sizes
    pub fn from_size(size: u8) -> Option<Self> {
        match size {
            FBUS_CONTROL_8CH_SIZE => Some(Self::Channels8),
            FBUS_CONTROL_16CH_SIZE => Some(Self::Channels16),
            FBUS_CONTROL_24CH_SIZE => Some(Self::Channels24),
            _ => None,
        }
    }

    /// Shape carrying exactly `count` channels
    pub fn from_channel_count(count: usize) -> Option<Self> {
        match count {
            8 => Some(Self::Channels8),
            16 => Some(Self::Channels16),
            24 => Some(Self::Channels24),
            _ => None,
        }
    }

    pub fn size_byte(self) -> u8 {
        match self {
            Self::Channels8 => FBUS_CONTROL_8CH_SIZE,
            Self::Channels16 => FBUS_CONTROL_16CH_SIZE,
            Self::Channels24 => FBUS_CONTROL_24CH_SIZE,
        }
    }

    pub fn channel_count(self) -> usize {
        match self {
            Self::Channels8 => 8,
            Self::Channels16 => 16,
            Self::Channels24 => 24,
        }
    }

    /// Number of packed 8-channel groups
    pub fn groups(self) -> usize {
        self.channel_count() / FBUS_GROUP_CHANNELS
    }

    /// Complete frame length on the wire: size + header + payload + checksum
    pub fn frame_len(self) -> usize {
        FBUS_CONTROL_HDR_SIZE + self.size_byte() as usize + 1
    }
}

/// Link status flags reported in every control frame
///
/// ```text
/// bit0 = ch17 (digital channel)
/// bit1 = ch18 (digital channel)
/// bit2 = frame lost
/// bit3 = failsafe active
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Flags(pub u8);

impl Flags {
    pub const CH17: u8 = 1 << 0;
    pub const CH18: u8 = 1 << 1;
    pub const FRAME_LOST: u8 = 1 << 2;
    pub const FAILSAFE: u8 = 1 << 3;

    /// Value the shared block starts with: no frame seen yet
    pub const INITIAL: Flags = Flags(Self::FRAME_LOST);

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn ch17(self) -> bool {
        self.0 & Self::CH17 != 0
    }

    pub fn ch18(self) -> bool {
        self.0 & Self::CH18 != 0
    }

    pub fn frame_lost(self) -> bool {
        self.0 & Self::FRAME_LOST != 0
    }

    pub fn failsafe(self) -> bool {
        self.0 & Self::FAILSAFE != 0
    }
}

impl From<u8> for Flags {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

impl fmt::Debug for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Flags")
            .field("raw", &format_args!("0x{:02X}", self.0))
            .field("frame_lost", &self.frame_lost())
            .field("failsafe", &self.failsafe())
            .finish()
    }
}

/// One pending outbound telemetry value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TelemetryItem {
    /// Application id (sensor type)
    pub app_id: u16,

    /// 32-bit payload word
    pub data: u32,
}

impl TelemetryItem {
    pub fn new(app_id: u16, data: u32) -> Self {
        Self { app_id, data }
    }
}

/// Decoded control frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlFrame {
    /// Frame layout
    pub shape: ControlShape,

    /// Raw 11-bit channel values (only the first `shape.channel_count()` are meaningful)
    pub raw_channels: [u16; FBUS_MAX_CHANNELS],

    /// Status flags
    pub flags: Flags,

    /// Signal quality (RSSI) byte
    pub quality: u8,
}

impl ControlFrame {
    /// Create a control frame from raw channel values
    ///
    /// # Errors
    ///
    /// Returns error if the channel count is not 8, 16 or 24
    pub fn new(raw: &[u16], flags: Flags, quality: u8) -> Result<Self> {
        let shape = ControlShape::from_channel_count(raw.len()).ok_or_else(|| {
            FbusError::Protocol(format!("Unsupported channel count {}", raw.len()))
        })?;

        let mut raw_channels = [0u16; FBUS_MAX_CHANNELS];
        raw_channels[..raw.len()].copy_from_slice(raw);

        Ok(Self {
            shape,
            raw_channels,
            flags,
            quality,
        })
    }

    pub fn channels(&self) -> &[u16] {
        &self.raw_channels[..self.shape.channel_count()]
    }
}

/// Downlink or uplink frame (identical 10-byte shape)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkFrame {
    /// Addressed device
    pub device_id: u8,

    /// Primitive (frame kind)
    pub primitive: u8,

    /// Telemetry application id
    pub app_id: u16,

    /// Telemetry data word
    pub data: u32,
}

impl LinkFrame {
    /// Uplink answer carrying one telemetry item
    pub fn uplink(device_id: u8, item: TelemetryItem) -> Self {
        Self {
            device_id,
            primitive: FBUS_UPLINK_PRIMITIVE,
            app_id: item.app_id,
            data: item.data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_sizes() {
        assert_eq!(ControlShape::Channels8.frame_len(), 16);
        assert_eq!(ControlShape::Channels16.frame_len(), 27);
        assert_eq!(ControlShape::Channels24.frame_len(), 38);
    }

    #[test]
    fn test_size_byte_matches_payload() {
        // size = packed channel bytes + flags + quality
        for shape in [ControlShape::Channels8, ControlShape::Channels16, ControlShape::Channels24] {
            assert_eq!(
                shape.size_byte() as usize,
                shape.groups() * FBUS_GROUP_BYTES + 2
            );
        }
    }

    #[test]
    fn test_from_size_rejects_unknown() {
        assert_eq!(ControlShape::from_size(0x18), Some(ControlShape::Channels16));
        assert_eq!(ControlShape::from_size(0x00), None);
        assert_eq!(ControlShape::from_size(0x19), None);
    }

    #[test]
    fn test_link_frame_len() {
        assert_eq!(FBUS_LINK_FRAME_LEN, 10);
    }

    #[test]
    fn test_flags() {
        let flags = Flags(Flags::FRAME_LOST | Flags::CH18);
        assert!(flags.frame_lost());
        assert!(flags.ch18());
        assert!(!flags.ch17());
        assert!(!flags.failsafe());
        assert!(Flags::INITIAL.frame_lost());
    }

    #[test]
    fn test_control_frame_rejects_odd_count() {
        assert!(ControlFrame::new(&[FBUS_RAW_CENTER; 12], Flags::default(), 0).is_err());
        let frame = ControlFrame::new(&[FBUS_RAW_CENTER; 8], Flags::default(), 90).unwrap();
        assert_eq!(frame.channels().len(), 8);
    }

    #[test]
    fn test_pulse_constants() {
        assert_eq!(PULSE_CENTER, 1500);
        assert_eq!(PULSE_RANGE, 2000);
    }
}
