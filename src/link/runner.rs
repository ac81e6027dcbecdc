//! Dedicated thread that keeps a [`LinkStateMachine`] polled
//!
//! The state machine never blocks, so the thread just polls it in a loop and
//! parks briefly between steps. A port error is logged and the loop carries on.
//! The thread starts powered down; [`LinkRunner::power`] hands out the switch.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::machine::LinkStateMachine;
use super::port::{CycleCounter, LinkPort, ServoOutput, CYCLES_PER_MICROSECOND};
use crate::error::{FbusError, Result};
use crate::receiver::LinkPower;

/// Pause between polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_micros(50);

/// Pause while powered down
const IDLE_INTERVAL: Duration = Duration::from_millis(10);

/// Cycle counter derived from the host monotonic clock
#[derive(Debug, Clone, Copy)]
pub struct MonotonicCounter {
    origin: Instant,
}

impl Default for MonotonicCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicCounter {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl CycleCounter for MonotonicCounter {
    fn cycles(&self) -> u32 {
        let nanos = self.origin.elapsed().as_nanos();
        // 1000 / CYCLES_PER_MICROSECOND nanoseconds per cycle; truncation wraps
        (nanos * CYCLES_PER_MICROSECOND as u128 / 1000) as u32
    }
}

/// Power switch for a [`LinkRunner`]; polling only happens while on
#[derive(Debug, Clone)]
pub struct RunnerPower {
    active: Arc<AtomicBool>,
}

impl LinkPower for RunnerPower {
    fn set_power(&self, on: bool) {
        info!("FBus link power {}", if on { "on" } else { "off" });
        self.active.store(on, Ordering::Relaxed);
    }
}

/// Handle to the running link thread
#[derive(Debug)]
pub struct LinkRunner {
    stop: Arc<AtomicBool>,
    active: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl LinkRunner {
    /// Move the state machine onto its own thread; polling starts at power on
    ///
    /// # Errors
    ///
    /// Returns `Runtime` if the thread cannot be spawned
    pub fn spawn<P, C, S>(mut machine: LinkStateMachine<P, C, S>, poll_interval: Duration) -> Result<Self>
    where
        P: LinkPort + 'static,
        C: CycleCounter + 'static,
        S: ServoOutput + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let active = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let powered = Arc::clone(&active);

        let handle = thread::Builder::new()
            .name("fbus-link".to_string())
            .spawn(move || {
                info!("FBus link thread started");
                while !flag.load(Ordering::Relaxed) {
                    if !powered.load(Ordering::Relaxed) {
                        thread::sleep(IDLE_INTERVAL);
                        continue;
                    }
                    if let Err(e) = machine.poll() {
                        warn!("Link poll failed: {}", e);
                    }
                    thread::sleep(poll_interval);
                }
                debug!("Link stats at shutdown: {:?}", machine.stats());
                info!("FBus link thread stopped");
            })
            .map_err(|e| FbusError::Runtime(format!("Failed to spawn link thread: {}", e)))?;

        Ok(Self {
            stop,
            active,
            handle: Some(handle),
        })
    }

    /// Switch that starts and pauses polling
    pub fn power(&self) -> RunnerPower {
        RunnerPower {
            active: Arc::clone(&self.active),
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Signal the thread to stop and wait for it
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Link thread panicked");
            }
        }
    }
}

impl Drop for LinkRunner {
    fn drop(&mut self) {
        self.stop();
    }
}
