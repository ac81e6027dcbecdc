//! # FBus Frame Encoder
//!
//! Builds complete control and downlink/uplink frames. The link state machine
//! only ever encodes uplinks; control and downlink encoding is what the
//! receiver side of the wire does and is used by the simulator and tests.

use bytes::{BufMut, Bytes, BytesMut};

use super::channels::pack_group;
use super::checksum::checksum;
use super::protocol::*;

/// Encode a control frame
///
/// # Returns
///
/// * `Bytes` - Complete frame: size + header + packed channels + flags + quality + checksum
///
/// # Examples
///
/// ```
/// use fbus_link::fbus::encoder::encode_control_frame;
/// use fbus_link::fbus::protocol::{ControlFrame, Flags, FBUS_RAW_CENTER};
///
/// let frame = ControlFrame::new(&[FBUS_RAW_CENTER; 16], Flags::default(), 100).unwrap();
/// let bytes = encode_control_frame(&frame);
/// assert_eq!(bytes.len(), 27);
/// assert_eq!(bytes[1], 0xFF);
/// ```
pub fn encode_control_frame(frame: &ControlFrame) -> Bytes {
    let shape = frame.shape;
    let mut buf = BytesMut::with_capacity(shape.frame_len());

    buf.put_u8(shape.size_byte());
    buf.put_u8(FBUS_CONTROL_HDR);

    for group in frame.channels().chunks_exact(FBUS_GROUP_CHANNELS) {
        let mut raw = [0u16; FBUS_GROUP_CHANNELS];
        raw.copy_from_slice(group);
        buf.put_slice(&pack_group(&raw));
    }

    buf.put_u8(frame.flags.bits());
    buf.put_u8(frame.quality);

    let crc = checksum(&buf[FBUS_CONTROL_HDR_SIZE..]);
    buf.put_u8(crc);

    buf.freeze()
}

/// Encode a downlink/uplink frame into its fixed 10-byte wire form
///
/// Multi-byte fields are little-endian.
pub fn encode_link_frame(frame: &LinkFrame) -> [u8; FBUS_LINK_FRAME_LEN] {
    let mut out = [0u8; FBUS_LINK_FRAME_LEN];

    out[0] = FBUS_LINK_FRAME_SIZE;
    out[1] = frame.device_id;
    out[2] = frame.primitive;
    out[3..5].copy_from_slice(&frame.app_id.to_le_bytes());
    out[5..9].copy_from_slice(&frame.data.to_le_bytes());
    out[9] = checksum(&out[1..9]);

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fbus::channels::unpack_group;

    #[test]
    fn test_control_frame_structure() {
        let frame = ControlFrame::new(&[FBUS_RAW_CENTER; 8], Flags(Flags::CH17), 77).unwrap();
        let bytes = encode_control_frame(&frame);

        assert_eq!(bytes.len(), 16);
        assert_eq!(bytes[0], FBUS_CONTROL_8CH_SIZE);
        assert_eq!(bytes[1], FBUS_CONTROL_HDR);
        assert_eq!(bytes[13], Flags::CH17);
        assert_eq!(bytes[14], 77);
        assert_eq!(bytes[15], checksum(&bytes[2..15]));
    }

    #[test]
    fn test_control_frame_groups_in_order() {
        let mut raw = [FBUS_RAW_MIN; 24];
        raw[8] = 1000;
        raw[23] = 1900;
        let frame = ControlFrame::new(&raw, Flags::default(), 0).unwrap();
        let bytes = encode_control_frame(&frame);

        assert_eq!(bytes.len(), 38);
        let mut second = [0u8; 11];
        second.copy_from_slice(&bytes[13..24]);
        assert_eq!(unpack_group(&second)[0], 1000);
        let mut third = [0u8; 11];
        third.copy_from_slice(&bytes[24..35]);
        assert_eq!(unpack_group(&third)[7], 1900);
    }

    #[test]
    fn test_link_frame_layout() {
        let frame = LinkFrame::uplink(0x67, TelemetryItem::new(0x0300, 0x8348_0220));
        let bytes = encode_link_frame(&frame);

        assert_eq!(bytes[0], 0x08);
        assert_eq!(bytes[1], 0x67);
        assert_eq!(bytes[2], FBUS_UPLINK_PRIMITIVE);
        assert_eq!(&bytes[3..5], &[0x00, 0x03]);
        assert_eq!(&bytes[5..9], &[0x20, 0x02, 0x48, 0x83]);
        assert_eq!(bytes[9], checksum(&bytes[1..9]));
    }

    #[test]
    fn test_different_quality_different_checksum() {
        let a = ControlFrame::new(&[FBUS_RAW_CENTER; 8], Flags::default(), 10).unwrap();
        let b = ControlFrame::new(&[FBUS_RAW_CENTER; 8], Flags::default(), 11).unwrap();

        assert_ne!(encode_control_frame(&a)[15], encode_control_frame(&b)[15]);
    }
}
