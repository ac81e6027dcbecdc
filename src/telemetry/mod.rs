//! # Telemetry Module
//!
//! Encodes host sensor readings into uplink telemetry items.
//!
//! ## Battery cells
//!
//! Cells are sent two per item:
//!
//! ```text
//! bits 31..20  cell[i]   in 2 mV units (12 bits)
//! bits 19..8   cell[i+1] in 2 mV units (12 bits, 0 if absent)
//! bits  7..4   total cell count
//! bits  3..0   battery id
//! ```
//!
//! The application id is `0x0300 + pair index`.

use serde::{Deserialize, Serialize};

use crate::fbus::protocol::TelemetryItem;

/// Application id of the first cell pair
pub const APP_ID_CELLS: u16 = 0x0300;

/// Cell voltage resolution: 1 / 500 V
const CELL_SCALE: f32 = 500.0;

const CELL_MASK: u32 = 0xFFF;

/// Sensor readings published by host collaborators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TelemetryEvent {
    /// Per-cell voltages of one battery pack
    Battery { battery_id: u8, cells: Vec<f32> },
}

/// Stateless telemetry encoder
#[derive(Debug, Default, Clone, Copy)]
pub struct TelemetryEncoder;

impl TelemetryEncoder {
    pub fn new() -> Self {
        Self
    }

    /// Items to enqueue for one event
    pub fn encode(&self, event: &TelemetryEvent) -> Vec<TelemetryItem> {
        match event {
            TelemetryEvent::Battery { battery_id, cells } => encode_cells(*battery_id, cells),
        }
    }
}

/// Encode cell voltages into one item per pair
///
/// # Arguments
///
/// * `battery_id` - Pack id, low 4 bits are sent
/// * `cells` - Cell voltages in volts
///
/// # Returns
///
/// * `Vec<TelemetryItem>` - `ceil(cells.len() / 2)` items
///
/// # Examples
///
/// ```
/// use fbus_link::telemetry::encode_cells;
///
/// let items = encode_cells(0, &[4.2, 4.1]);
/// assert_eq!(items.len(), 1);
/// assert_eq!(items[0].app_id, 0x0300);
/// assert_eq!(items[0].data, 0x8348_0220);
/// ```
pub fn encode_cells(battery_id: u8, cells: &[f32]) -> Vec<TelemetryItem> {
    let n_cells = (cells.len() as u32) & 0xF;

    cells
        .chunks(2)
        .enumerate()
        .map(|(pair, chunk)| {
            let cv1 = cell_value(chunk[0]);
            let cv2 = chunk.get(1).map_or(0, |&v| cell_value(v));
            let word = (cv1 << 20) | (cv2 << 8) | (n_cells << 4) | (battery_id as u32 & 0xF);
            TelemetryItem::new(APP_ID_CELLS.wrapping_add(pair as u16), word)
        })
        .collect()
}

fn cell_value(volts: f32) -> u32 {
    ((volts.max(0.0) * CELL_SCALE).round() as u32).min(CELL_MASK)
}
