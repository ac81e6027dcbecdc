//! Serializable link status snapshot

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::command::arming::ArmState;

/// Point-in-time view of the receiver, suitable for JSON output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkStatus {
    pub enabled: bool,

    /// False until a sample without the frame-lost flag is seen
    pub connected: bool,

    /// Filtered signal quality
    pub quality: u8,

    /// Raw status flag bits
    pub flags: u8,

    pub generation: u32,
    pub arm_state: ArmState,
    pub timestamp: DateTime<Utc>,
}

impl LinkStatus {
    /// Render as a single JSON line
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| format!("{{\"error\":\"{}\"}}", e))
    }
}
