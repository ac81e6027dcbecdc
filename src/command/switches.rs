//! Channel value normalization
//!
//! Pulse values span `[500, 2500]` µs with 1500 at centre. An UNSET channel
//! reads as the minimum pulse so an absent switch behaves like one in its
//! first position.

use crate::fbus::protocol::{CHANNEL_UNSET, PULSE_CENTER, PULSE_MAX, PULSE_MIN, PULSE_RANGE};

fn effective(value: u32) -> u32 {
    if value == CHANNEL_UNSET {
        PULSE_MIN
    } else {
        value.clamp(PULSE_MIN, PULSE_MAX)
    }
}

/// Stick position in `[-1.0, 1.0]`, 0 at centre
pub fn as_float(value: u32) -> f32 {
    2.0 * (effective(value) as f32 - PULSE_CENTER as f32) / PULSE_RANGE as f32
}

/// Dial position in `[0.0, 1.0]`
pub fn as_percent(value: u32) -> f32 {
    (effective(value) - PULSE_MIN) as f32 / PULSE_RANGE as f32
}

/// Position of an `positions`-way switch, `0..positions`
///
/// The pulse range is split into equal bins whose centres sit on the nominal
/// switch positions, so a 3-way switch reads 0 / 1 / 2 at 500 / 1500 / 2500.
///
/// # Examples
///
/// ```
/// use fbus_link::command::switches::as_button;
///
/// assert_eq!(as_button(500, 3), 0);
/// assert_eq!(as_button(1480, 3), 1);
/// assert_eq!(as_button(2500, 4), 3);
/// ```
pub fn as_button(value: u32, positions: u32) -> u32 {
    if positions < 2 {
        return 0;
    }

    let range = PULSE_RANGE / (positions - 1);
    let index = (effective(value) - PULSE_MIN + range / 2) / range;
    index.min(positions - 1)
}

/// Two-position switch
pub fn as_toggle(value: u32) -> bool {
    as_button(value, 2) == 1
}
