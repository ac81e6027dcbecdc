//! Host-facing link events

use crate::command::tables::{AnimationMode, DriveMode, IndicatorMode, Orientation};
use crate::fbus::protocol::Flags;
use crate::link::shared::ChannelSnapshot;

/// Everything the receiver publishes to subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    /// Status flags differ from the previous sample
    FlagsChanged(Flags),

    /// Filtered signal quality differs from the previous sample
    QualityChanged(u8),

    /// New channel data; `quality` carries the filtered value
    Data(ChannelSnapshot),

    /// Motion command, only while armed
    Steer {
        direction: f32,
        throttle: f32,
        aux_x: f32,
        aux_y: f32,
    },

    DriveMode(DriveMode),
    Orientation(Orientation),
    AnimationMode(AnimationMode),
    IndicatorMode(IndicatorMode),

    /// LED brightness in `[0.0, 1.0]`, in 1/255 steps
    Brightness(f32),

    Armed(bool),
}

impl LinkEvent {
    /// Steer command with every axis at rest
    pub fn steer_zero() -> Self {
        LinkEvent::Steer {
            direction: 0.0,
            throttle: 0.0,
            aux_x: 0.0,
            aux_y: 0.0,
        }
    }
}
