//! # FBus Frame Decoder
//!
//! Validates and decodes control and downlink/uplink frames.

use super::channels::{raw_to_pulse, unpack_group, PackedGroup};
use super::checksum::checksum;
use super::protocol::*;
use crate::error::{FbusError, Result};

/// Validate the first two bytes of a control frame
///
/// # Arguments
///
/// * `head` - At least the size and header bytes
///
/// # Returns
///
/// * `Result<ControlShape>` - Frame shape announced by the size byte
///
/// # Errors
///
/// Returns error if fewer than 2 bytes are given, the header byte is not
/// `0xFF`, or the size byte is not one of the three control sizes
pub fn decode_control_header(head: &[u8]) -> Result<ControlShape> {
    if head.len() < FBUS_CONTROL_HDR_SIZE {
        return Err(FbusError::Protocol("Control header too short".to_string()));
    }

    if head[1] != FBUS_CONTROL_HDR {
        return Err(FbusError::Protocol(format!(
            "Invalid control header: 0x{:02X}",
            head[1]
        )));
    }

    ControlShape::from_size(head[0]).ok_or_else(|| {
        FbusError::Protocol(format!("Invalid control size: 0x{:02X}", head[0]))
    })
}

/// Decode a complete control frame
///
/// # Errors
///
/// Returns error if:
/// - Header or size byte is invalid
/// - Frame is shorter than its size byte announces
/// - Checksum does not match
pub fn decode_control_frame(frame: &[u8]) -> Result<ControlFrame> {
    let shape = decode_control_header(frame)?;
    let len = shape.frame_len();

    if frame.len() < len {
        return Err(FbusError::Protocol(format!(
            "Control frame too short: expected {} bytes, got {}",
            len,
            frame.len()
        )));
    }

    let payload = &frame[FBUS_CONTROL_HDR_SIZE..len - 1];
    let received = frame[len - 1];
    let calculated = checksum(payload);
    if calculated != received {
        return Err(FbusError::Protocol(format!(
            "Control checksum mismatch: expected 0x{:02X}, got 0x{:02X}",
            calculated, received
        )));
    }

    let mut raw_channels = [0u16; FBUS_MAX_CHANNELS];
    for group in 0..shape.groups() {
        let start = group * FBUS_GROUP_BYTES;
        let mut packed: PackedGroup = [0u8; FBUS_GROUP_BYTES];
        packed.copy_from_slice(&payload[start..start + FBUS_GROUP_BYTES]);

        let offset = group * FBUS_GROUP_CHANNELS;
        raw_channels[offset..offset + FBUS_GROUP_CHANNELS].copy_from_slice(&unpack_group(&packed));
    }

    let status = shape.groups() * FBUS_GROUP_BYTES;

    Ok(ControlFrame {
        shape,
        raw_channels,
        flags: Flags(payload[status]),
        quality: payload[status + 1],
    })
}

/// Decode a downlink or uplink frame
///
/// # Errors
///
/// Returns error if the frame is shorter than 10 bytes, the size byte is not
/// `0x08`, or the checksum does not match
pub fn decode_link_frame(frame: &[u8]) -> Result<LinkFrame> {
    if frame.len() < FBUS_LINK_FRAME_LEN {
        return Err(FbusError::Protocol(format!(
            "Link frame too short: {} bytes",
            frame.len()
        )));
    }

    if frame[0] != FBUS_LINK_FRAME_SIZE {
        return Err(FbusError::Protocol(format!(
            "Invalid link frame size: 0x{:02X}",
            frame[0]
        )));
    }

    let calculated = checksum(&frame[1..9]);
    if calculated != frame[9] {
        return Err(FbusError::Protocol(format!(
            "Link checksum mismatch: expected 0x{:02X}, got 0x{:02X}",
            calculated, frame[9]
        )));
    }

    Ok(LinkFrame {
        device_id: frame[1],
        primitive: frame[2],
        app_id: u16::from_le_bytes([frame[3], frame[4]]),
        data: u32::from_le_bytes([frame[5], frame[6], frame[7], frame[8]]),
    })
}

/// Convert a decoded frame's channels into pulse values
///
/// Channels beyond the frame's count are left UNSET.
pub fn control_pulses(frame: &ControlFrame) -> ChannelValues {
    let mut pulses = [CHANNEL_UNSET; FBUS_MAX_CHANNELS];
    for (pulse, &raw) in pulses.iter_mut().zip(frame.channels()) {
        *pulse = raw_to_pulse(raw);
    }
    pulses
}
