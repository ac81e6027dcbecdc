//! # Link Module
//!
//! Companion side of the FBus link: the protocol state machine, the block it
//! publishes channel data into, and the outbox it answers downlinks from.

pub mod machine;
pub mod outbox;
pub mod port;
pub mod runner;
pub mod shared;

pub use machine::{LinkCommand, LinkSettings, LinkState, LinkStateMachine, ServoMap};
pub use port::{NoServos, ServoOutput, SERVO_UNMAPPED};
pub use outbox::TelemetryOutbox;
pub use runner::{LinkRunner, MonotonicCounter};
pub use shared::{ChannelSnapshot, SharedChannelBlock};
