//! Injectable timing for phase sequencing.
//!
//! Bit-banged stepping needs a delay between coil phases. Isolating the
//! delay behind a trait lets tests run the full sequencing path without
//! real sleeps.

use std::time::Duration;

/// Source of inter-phase delays.
pub trait PulseClock: Send + Sync {
    /// Pause the calling thread for `duration`.
    fn pause(&self, duration: Duration);
}

/// Wall-clock implementation used on real hardware.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealClock;

impl PulseClock for RealClock {
    fn pause(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
