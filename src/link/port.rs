//! Byte-stream and timing abstractions polled by the link state machine
//!
//! Both traits are non-blocking: every call returns immediately with whatever
//! the hardware can give at that moment.

use std::io;

/// Transmit FIFO depth; a single poll never writes more than this
pub const TX_FIFO_SIZE: usize = 16;

/// Cycle counter rate the turnaround window is expressed in
pub const CYCLES_PER_MICROSECOND: u32 = 200;

/// Half-duplex serial line
pub trait LinkPort: Send {
    /// Read one byte if one is waiting
    fn read_byte(&mut self) -> io::Result<Option<u8>>;

    /// Queue bytes for transmission, returning how many were accepted
    fn write(&mut self, data: &[u8]) -> io::Result<usize>;

    /// True once everything queued has left the transmitter
    fn tx_idle(&mut self) -> io::Result<bool>;
}

/// Free-running 32-bit cycle counter
///
/// Only differences between readings are meaningful; the counter wraps.
pub trait CycleCounter: Send {
    fn cycles(&self) -> u32;
}

/// Servo map entry for a channel that drives no output
pub const SERVO_UNMAPPED: u8 = 0xFF;

/// Pulse outputs fed straight from accepted control frames
pub trait ServoOutput: Send {
    /// Set `output` to a pulse width in microseconds
    fn pulse(&mut self, output: u8, micros: u32);
}

/// For hosts with no servo outputs wired to the link
#[derive(Debug, Clone, Copy, Default)]
pub struct NoServos;

impl ServoOutput for NoServos {
    fn pulse(&mut self, _output: u8, _micros: u32) {}
}

/// Convert microseconds to counter cycles
pub fn micros_to_cycles(micros: u32) -> u32 {
    micros.saturating_mul(CYCLES_PER_MICROSECOND)
}


#[cfg(test)]
mod tests {
    use super::mocks::*;
    use super::*;

    #[test]
    fn test_micros_to_cycles() {
        assert_eq!(micros_to_cycles(500), 100_000);
        assert_eq!(micros_to_cycles(2000), 400_000);
        assert_eq!(micros_to_cycles(u32::MAX), u32::MAX);
    }

    #[test]
    fn test_mock_port_echoes_writes() {
        let mut port = MockLinkPort::new();
        assert_eq!(port.write(&[1, 2, 3]).unwrap(), 3);
        assert_eq!(port.get_written_data(), vec![1, 2, 3]);
        assert_eq!(port.read_byte().unwrap(), Some(1));
        assert_eq!(port.pending(), 2);
    }

    #[test]
    fn test_mock_port_write_limited_to_fifo() {
        let mut port = MockLinkPort::new();
        assert_eq!(port.write(&[0u8; 40]).unwrap(), TX_FIFO_SIZE);
    }

    #[test]
    fn test_recording_servos() {
        let mut servos = RecordingServos::default();
        servos.pulse(2, 1500);
        NoServos.pulse(2, 1500);
        assert_eq!(servos.take(), vec![(2, 1500)]);
        assert!(servos.take().is_empty());
    }

    #[test]
    fn test_manual_counter_wraps() {
        let counter = ManualCounter::new(u32::MAX - 10);
        let start = counter.cycles();
        counter.advance_micros(1);
        assert_eq!(counter.cycles().wrapping_sub(start), 200);
    }
}
