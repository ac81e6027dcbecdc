//! # FBus Checksum
//!
//! One's-complement style byte checksum used by every FBus frame.
//!
//! **Algorithm**: sum the bytes into a 16-bit accumulator, fold the carry back
//! into the low byte until it fits in 8 bits, then subtract from `0xFF`.

/// Calculate the FBus checksum of a payload
///
/// # Arguments
///
/// * `data` - Payload bytes (never the size, header or checksum byte)
///
/// # Examples
///
/// ```
/// use fbus_link::fbus::checksum::checksum;
///
/// assert_eq!(checksum(&[]), 0xFF);
/// assert_eq!(checksum(&[0x01, 0x02]), 0xFC);
/// ```
pub fn checksum(data: &[u8]) -> u8 {
    let mut sum: u32 = 0;

    for &byte in data {
        sum += u32::from(byte);
        // Fold eagerly so long payloads never outgrow the accumulator
        if sum > 0xFFFF {
            sum = (sum & 0xFFFF) + (sum >> 16);
        }
    }

    while sum > 0xFF {
        sum = (sum & 0xFF) + (sum >> 8);
    }

    0xFF - sum as u8
}

/// Check a received checksum byte against its payload
pub fn verify(data: &[u8], received: u8) -> bool {
    checksum(data) == received
}
