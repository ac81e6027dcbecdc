//! Arming gate
//!
//! ```text
//! CannotArm --safety off--> CanArm --safety on--> Armed
//!                             ^                     |
//!                             +----safety off-------+
//! frame lost (any state) --> CannotArm
//! ```
//!
//! Starting in `CannotArm` means a safety switch already "on" at startup
//! does not arm until it has been seen "off".

use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ArmState {
    #[default]
    DisarmedCannotArm,
    DisarmedCanArm,
    Armed,
}

impl ArmState {
    pub fn is_armed(self) -> bool {
        self == ArmState::Armed
    }

    /// Next state for one snapshot
    pub fn next(self, frame_lost: bool, safety_on: bool) -> ArmState {
        if frame_lost {
            return ArmState::DisarmedCannotArm;
        }

        match (self, safety_on) {
            (ArmState::DisarmedCannotArm, false) => ArmState::DisarmedCanArm,
            (ArmState::DisarmedCanArm, true) => ArmState::Armed,
            (ArmState::Armed, false) => ArmState::DisarmedCanArm,
            (state, _) => state,
        }
    }
}

/// Tracks the arm state across snapshots
#[derive(Debug, Default)]
pub struct Arming {
    state: ArmState,
}

/// Change of armed-ness caused by an update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmTransition {
    Armed,
    Disarmed,
}

impl Arming {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ArmState {
        self.state
    }

    pub fn update(&mut self, frame_lost: bool, safety_on: bool) -> Option<ArmTransition> {
        let before = self.state;
        self.state = before.next(frame_lost, safety_on);

        match (before.is_armed(), self.state.is_armed()) {
            (false, true) => {
                info!("Armed");
                Some(ArmTransition::Armed)
            }
            (true, false) => {
                info!("Disarmed ({:?})", self.state);
                Some(ArmTransition::Disarmed)
            }
            _ => None,
        }
    }
}
