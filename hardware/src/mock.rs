//! In-memory hardware for tests and the mock demo binary.
//!
//! Every primitive in [`crate::gpio`] and [`crate::clock`] has a counterpart
//! here. Mocks are cheaply cloneable handles over shared interior state so a
//! test can keep inspecting a resource after handing it to an actuator.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::clock::PulseClock;
use crate::gpio::{EdgeInput, HardwareError, OutputBank, PulseGenerator};

/// Output bank that records every batch write.
#[derive(Clone)]
pub struct MockBank {
    line_count: usize,
    writes: Arc<Mutex<Vec<Vec<bool>>>>,
}

impl MockBank {
    /// Bank with `line_count` lines, all initially low.
    pub fn new(line_count: usize) -> Self {
        Self {
            line_count,
            writes: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every write in issue order.
    pub fn writes(&self) -> Vec<Vec<bool>> {
        self.writes.lock().unwrap().clone()
    }

    /// The most recent write, or all-low if nothing was written.
    pub fn levels(&self) -> Vec<bool> {
        self.writes
            .lock()
            .unwrap()
            .last()
            .cloned()
            .unwrap_or_else(|| vec![false; self.line_count])
    }
}

impl OutputBank for MockBank {
    fn line_count(&self) -> usize {
        self.line_count
    }

    fn set_levels(&mut self, levels: &[bool]) -> Result<(), HardwareError> {
        if levels.len() != self.line_count {
            return Err(HardwareError::InvalidConfig(format!(
                "bank has {} lines, write had {}",
                self.line_count,
                levels.len()
            )));
        }
        self.writes.lock().unwrap().push(levels.to_vec());
        Ok(())
    }
}

struct PulseState {
    frequency_hz: u32,
    running: bool,
}

/// Pulse generator that tracks its commanded state without emitting anything.
#[derive(Clone)]
pub struct MockPulses {
    state: Arc<Mutex<PulseState>>,
}

impl MockPulses {
    /// Stopped generator at 0 Hz.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(PulseState {
                frequency_hz: 0,
                running: false,
            })),
        }
    }

    /// Whether the train is currently running.
    pub fn is_running(&self) -> bool {
        self.state.lock().unwrap().running
    }

    /// Last commanded frequency.
    pub fn frequency_hz(&self) -> u32 {
        self.state.lock().unwrap().frequency_hz
    }
}

impl Default for MockPulses {
    fn default() -> Self {
        Self::new()
    }
}

impl PulseGenerator for MockPulses {
    fn set_frequency(&mut self, frequency_hz: u32) -> Result<(), HardwareError> {
        self.state.lock().unwrap().frequency_hz = frequency_hz;
        Ok(())
    }

    fn start(&mut self) -> Result<(), HardwareError> {
        self.state.lock().unwrap().running = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), HardwareError> {
        self.state.lock().unwrap().running = false;
        Ok(())
    }
}

enum EdgeScript {
    /// An edge on every wait.
    FreeRunning,
    /// Never an edge; every wait times out.
    Silent,
    /// An edge whenever the paired pulse generator is running.
    DrivenBy(MockPulses),
}

/// Edge input following a fixed script.
pub struct ScriptedEdges {
    script: EdgeScript,
}

impl ScriptedEdges {
    /// Edges arrive continuously, regardless of motor state.
    pub fn free_running() -> Self {
        Self {
            script: EdgeScript::FreeRunning,
        }
    }

    /// No edges ever arrive; waits always time out.
    pub fn silent() -> Self {
        Self {
            script: EdgeScript::Silent,
        }
    }

    /// Edges arrive while (and only while) the given pulse generator runs,
    /// mimicking a counting input wired to the pulse output.
    pub fn driven_by(pulses: &MockPulses) -> Self {
        Self {
            script: EdgeScript::DrivenBy(pulses.clone()),
        }
    }
}

impl EdgeInput for ScriptedEdges {
    fn wait_rising(&mut self, timeout: Duration) -> Result<bool, HardwareError> {
        // Keep the watcher loop from spinning hot in tests.
        let pacing = Duration::from_micros(200);
        match &self.script {
            EdgeScript::FreeRunning => {
                std::thread::sleep(pacing);
                Ok(true)
            }
            EdgeScript::Silent => {
                std::thread::sleep(timeout.min(Duration::from_millis(5)));
                Ok(false)
            }
            EdgeScript::DrivenBy(pulses) => {
                if pulses.is_running() {
                    std::thread::sleep(pacing);
                    Ok(true)
                } else {
                    std::thread::sleep(timeout.min(Duration::from_millis(1)));
                    Ok(false)
                }
            }
        }
    }
}

/// Clock that records pauses without sleeping.
#[derive(Default)]
pub struct FakeClock {
    pauses: AtomicU64,
}

impl FakeClock {
    /// Number of pauses requested so far.
    pub fn pause_count(&self) -> u64 {
        self.pauses.load(Ordering::Relaxed)
    }
}

impl PulseClock for FakeClock {
    fn pause(&self, _duration: Duration) {
        self.pauses.fetch_add(1, Ordering::Relaxed);
    }
}
