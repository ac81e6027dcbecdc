//! # Serial Communication Module
//!
//! Opens the UART the FBus receiver is wired to and adapts it to the
//! non-blocking [`LinkPort`] the link state machine polls.
//!
//! The port is opened 8N1 without flow control. The link runs on its own
//! thread, so the synchronous `serialport` handle re-exported by
//! `tokio-serial` is used rather than the async stream.

use std::io::{self, Read, Write};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{FbusError, Result};
use crate::link::port::{LinkPort, TX_FIFO_SIZE};

/// FBus line rate
pub const FBUS_BAUD_RATE: u32 = 460_800;

/// Device paths tried when none is configured (in order of preference)
pub const DEFAULT_DEVICE_PATHS: &[&str] = &[
    "/dev/ttyS4",   // On-board UART wired to the receiver
    "/dev/ttyUSB0", // USB-to-serial adapters
];

/// FBus serial line
pub struct FbusSerial {
    port: Box<dyn tokio_serial::SerialPort>,
    device_path: String,
}

impl std::fmt::Debug for FbusSerial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FbusSerial")
            .field("device_path", &self.device_path)
            .finish_non_exhaustive()
    }
}

impl FbusSerial {
    /// Open the first device that can be opened
    ///
    /// # Arguments
    ///
    /// * `paths` - Device paths to try (e.g., &["/dev/ttyS4"])
    /// * `baud_rate` - Line rate
    ///
    /// # Returns
    ///
    /// * `Result<FbusSerial>` - Opened serial line or error
    ///
    /// # Errors
    ///
    /// Returns `DeviceNotFound` listing every path tried if none opens
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use fbus_link::serial::{FbusSerial, FBUS_BAUD_RATE};
    ///
    /// let serial = FbusSerial::open_with_paths(&["/dev/ttyS4"], FBUS_BAUD_RATE)?;
    /// println!("Link on {}", serial.device_path());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open_with_paths(paths: &[&str], baud_rate: u32) -> Result<Self> {
        for path in paths {
            debug!("Trying to open serial port: {}", path);

            match Self::open_port(path, baud_rate) {
                Ok(port) => {
                    info!("Opened FBus link at {} ({} baud)", path, baud_rate);
                    return Ok(Self {
                        port,
                        device_path: path.to_string(),
                    });
                }
                Err(e) => {
                    warn!("Failed to open {}: {}", path, e);
                    continue;
                }
            }
        }

        Err(FbusError::DeviceNotFound(paths.join(", ")))
    }

    /// Open the configured device, or fall back to the default paths
    pub fn open(device: Option<&str>, baud_rate: u32) -> Result<Self> {
        match device {
            Some(path) => Self::open_with_paths(&[path], baud_rate),
            None => Self::open_with_paths(DEFAULT_DEVICE_PATHS, baud_rate),
        }
    }

    fn open_port(path: &str, baud_rate: u32) -> Result<Box<dyn tokio_serial::SerialPort>> {
        let port = tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .timeout(Duration::from_millis(1))
            .open()
            .map_err(|e| FbusError::Serial(format!("Failed to open {}: {}", path, e)))?;

        Ok(port)
    }

    pub fn device_path(&self) -> &str {
        &self.device_path
    }
}

impl LinkPort for FbusSerial {
    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        if self.port.bytes_to_read()? == 0 {
            return Ok(None);
        }

        let mut byte = [0u8; 1];
        match self.port.read(&mut byte) {
            Ok(1) => Ok(Some(byte[0])),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let n = data.len().min(TX_FIFO_SIZE);
        self.port.write(&data[..n])
    }

    fn tx_idle(&mut self) -> io::Result<bool> {
        Ok(self.port.bytes_to_write()? == 0)
    }
}
