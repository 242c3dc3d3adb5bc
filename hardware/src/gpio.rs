//! GPIO primitives and hardware fault types.
//!
//! The actuator and laser drivers depend only on the traits defined here,
//! never on a particular kernel binding. Real bindings live in the `rpi`
//! module; mocks live in [`crate::mock`].

use std::time::Duration;

use thiserror::Error;

/// Errors raised by hardware resources.
///
/// Acquisition failures are fatal by policy: there is no degraded mode where
/// the gimbal runs with part of its I/O missing.
#[derive(Error, Debug)]
pub enum HardwareError {
    /// A required line, PWM channel or edge input could not be claimed at
    /// construction time.
    #[error("failed to acquire {resource}: {source}")]
    Acquisition {
        /// Human-readable name of the resource (chip, line set, channel).
        resource: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// An I/O operation on an already-claimed resource failed.
    #[error("hardware I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A driver was constructed with inconsistent parameters.
    #[error("invalid hardware configuration: {0}")]
    InvalidConfig(String),

    /// A moving axis stopped confirming steps; raised by the supervisor's
    /// stall watchdog, fatal like an acquisition failure.
    #[error("axis {axis} stalled: no step confirmation for {waited_ms} ms")]
    Stalled {
        /// Axis label for the faulted motor.
        axis: String,
        /// How long the watchdog waited without counter progress.
        waited_ms: u64,
    },
}

/// A bank of digital output lines set as a batch.
///
/// Used for stepper phase sequencing (four lines), the direction line and
/// the laser switch (one line each).
pub trait OutputBank: Send {
    /// Number of lines in the bank.
    fn line_count(&self) -> usize;

    /// Drive all lines to the given levels. `levels.len()` must equal
    /// [`line_count`](Self::line_count).
    fn set_levels(&mut self, levels: &[bool]) -> Result<(), HardwareError>;
}

/// A hardware pulse source emitting a continuous square wave.
///
/// One pulse per motor step; the frequency is the step rate.
pub trait PulseGenerator: Send {
    /// Set the output frequency. Takes effect on the next [`start`](Self::start)
    /// or immediately if already running.
    fn set_frequency(&mut self, frequency_hz: u32) -> Result<(), HardwareError>;

    /// Begin emitting pulses.
    fn start(&mut self) -> Result<(), HardwareError>;

    /// Stop emitting pulses. Idempotent.
    fn stop(&mut self) -> Result<(), HardwareError>;
}

/// A rising-edge-triggered input line.
pub trait EdgeInput: Send {
    /// Block until a rising edge arrives or `timeout` elapses.
    ///
    /// Returns `Ok(true)` on an edge and `Ok(false)` on timeout. The bounded
    /// wait is what lets the watcher thread observe shutdown instead of
    /// blocking forever.
    fn wait_rising(&mut self, timeout: Duration) -> Result<bool, HardwareError>;
}
