//! # 11-bit Channel Packing
//!
//! Every group of 8 channels occupies 11 bytes. Channel `i` of a group is the
//! little-endian bit field `[11*i, 11*i + 11)` of the group's byte run:
//!
//! ```text
//! Byte 0: Ch1[0:7]
//! Byte 1: Ch1[8:10] | Ch2[0:4]
//! Byte 2: Ch2[5:10] | Ch3[0:1]
//! ...
//! ```
//!
//! Raw values reported by the receiver span `[8, 1976]` and are scaled
//! linearly onto servo pulses `[500, 2500]` µs.

use super::protocol::*;

const CHANNEL_BITS: usize = 11;
const CHANNEL_MASK: u16 = 0x07FF;

/// One packed group of 8 channels
pub type PackedGroup = [u8; FBUS_GROUP_BYTES];

/// Pack 8 raw channel values (11-bit, larger values are clamped) into 11 bytes
pub fn pack_group(channels: &[u16; FBUS_GROUP_CHANNELS]) -> PackedGroup {
    let mut packed = [0u8; FBUS_GROUP_BYTES];
    let mut bit_index = 0;

    for &channel in channels.iter() {
        let value = channel.min(CHANNEL_MASK);

        for bit in 0..CHANNEL_BITS {
            if (value >> bit) & 1 == 1 {
                packed[bit_index / 8] |= 1 << (bit_index % 8);
            }
            bit_index += 1;
        }
    }

    packed
}

/// Unpack 11 bytes into 8 raw 11-bit channel values
///
/// # Examples
///
/// ```
/// use fbus_link::fbus::channels::{pack_group, unpack_group};
///
/// let raw = [8, 992, 1976, 100, 200, 300, 400, 500];
/// assert_eq!(unpack_group(&pack_group(&raw)), raw);
/// ```
pub fn unpack_group(data: &PackedGroup) -> [u16; FBUS_GROUP_CHANNELS] {
    let mut channels = [0u16; FBUS_GROUP_CHANNELS];

    for (index, channel) in channels.iter_mut().enumerate() {
        let first_bit = index * CHANNEL_BITS;
        let byte = first_bit / 8;
        let shift = first_bit % 8;

        // An 11-bit field spans at most three bytes
        let mut window = u32::from(data[byte]);
        if byte + 1 < data.len() {
            window |= u32::from(data[byte + 1]) << 8;
        }
        if byte + 2 < data.len() {
            window |= u32::from(data[byte + 2]) << 16;
        }

        *channel = ((window >> shift) as u16) & CHANNEL_MASK;
    }

    channels
}

/// Scale a raw receiver value to a servo pulse in microseconds
///
/// Integer arithmetic, monotonic non-decreasing in `raw`. Values outside
/// `[8, 1976]` are clamped first so the result always lies in `[500, 2500]`.
pub fn raw_to_pulse(raw: u16) -> u32 {
    let raw = raw.clamp(FBUS_RAW_MIN, FBUS_RAW_MAX);
    let span = u32::from(FBUS_RAW_MAX - FBUS_RAW_MIN);

    PULSE_MIN + (u32::from(raw - FBUS_RAW_MIN) * PULSE_RANGE) / span
}

/// Inverse of [`raw_to_pulse`], rounding to the nearest raw step
///
/// Used when building frames from pulse values (simulation, tests).
pub fn pulse_to_raw(pulse: u32) -> u16 {
    let pulse = pulse.clamp(PULSE_MIN, PULSE_MAX);
    let span = u32::from(FBUS_RAW_MAX - FBUS_RAW_MIN);
    let raw = ((pulse - PULSE_MIN) * span + PULSE_RANGE / 2) / PULSE_RANGE;

    FBUS_RAW_MIN + raw as u16
}

/// Clamp a pulse value to the valid range, preserving UNSET
pub fn clamp_pulse(value: u32) -> u32 {
    if value == CHANNEL_UNSET {
        CHANNEL_UNSET
    } else {
        value.clamp(PULSE_MIN, PULSE_MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_all_zero() {
        assert_eq!(pack_group(&[0; 8]), [0u8; 11]);
    }

    #[test]
    fn test_pack_all_max() {
        // 8 × 11 bits = 88 bits = 11 bytes of ones
        assert_eq!(pack_group(&[0x7FF; 8]), [0xFFu8; 11]);
    }

    #[test]
    fn test_pack_first_channel_bits() {
        let mut channels = [0u16; 8];
        channels[0] = 0x7FF;

        let packed = pack_group(&channels);
        assert_eq!(packed[0], 0xFF);
        assert_eq!(packed[1], 0x07);
        assert_eq!(packed[2], 0x00);
    }

    #[test]
    fn test_pack_clamps_overflow() {
        let mut channels = [0u16; 8];
        channels[7] = 5000;
        let unpacked = unpack_group(&pack_group(&channels));
        assert_eq!(unpacked[7], 0x7FF);
    }

    #[test]
    fn test_unpack_matches_bytewise_layout() {
        // Byte layout for channel 2: bits 22..33 -> byte 2 bits 6-7, byte 3, byte 4 bit 0
        let mut data = [0u8; 11];
        data[2] = 0xC0;
        data[3] = 0xFF;
        data[4] = 0x01;

        let channels = unpack_group(&data);
        assert_eq!(channels[2], 0x7FF);
        assert_eq!(channels[1], 0);
        assert_eq!(channels[3], 0);
    }

    #[test]
    fn test_unpack_last_channel() {
        // Channel 7 occupies bits 77..88: byte 9 bits 5-7 and byte 10
        let mut data = [0u8; 11];
        data[9] = 0xE0;
        data[10] = 0xFF;

        let channels = unpack_group(&data);
        assert_eq!(channels[7], 0x7FF);
        assert_eq!(channels[6], 0);
    }

    #[test]
    fn test_independent_channels() {
        for index in 0..8 {
            let mut channels = [FBUS_RAW_MIN; 8];
            channels[index] = 1234;
            assert_eq!(unpack_group(&pack_group(&channels)), channels);
        }
    }

    #[test]
    fn test_raw_to_pulse_endpoints() {
        assert_eq!(raw_to_pulse(FBUS_RAW_MIN), PULSE_MIN);
        assert_eq!(raw_to_pulse(FBUS_RAW_MAX), PULSE_MAX);
        assert_eq!(raw_to_pulse(FBUS_RAW_CENTER), PULSE_CENTER);
    }

    #[test]
    fn test_raw_to_pulse_clamps() {
        assert_eq!(raw_to_pulse(0), PULSE_MIN);
        assert_eq!(raw_to_pulse(2047), PULSE_MAX);
    }

    #[test]
    fn test_raw_to_pulse_monotonic() {
        let mut previous = raw_to_pulse(FBUS_RAW_MIN);
        for raw in FBUS_RAW_MIN..=FBUS_RAW_MAX {
            let pulse = raw_to_pulse(raw);
            assert!(pulse >= previous, "pulse decreased at raw {}", raw);
            previous = pulse;
        }
    }

    #[test]
    fn test_pulse_round_trip_within_one_step() {
        for raw in FBUS_RAW_MIN..=FBUS_RAW_MAX {
            let back = pulse_to_raw(raw_to_pulse(raw));
            assert!(
                (i32::from(back) - i32::from(raw)).abs() <= 1,
                "raw {} came back as {}",
                raw,
                back
            );
        }
    }

    #[test]
    fn test_clamp_pulse() {
        assert_eq!(clamp_pulse(CHANNEL_UNSET), CHANNEL_UNSET);
        assert_eq!(clamp_pulse(100), PULSE_MIN);
        assert_eq!(clamp_pulse(1500), 1500);
        assert_eq!(clamp_pulse(3000), PULSE_MAX);
    }
}
