//! Single-axis stepper actuation with asynchronous step confirmation.
//!
//! A [`StepActuator`] accepts at most one motion command at a time and
//! reports progress through a confirmed-step counter. Two drive strategies
//! sit behind the same contract:
//!
//! - **Phase sequencing**: four output lines bit-banged through the full-step
//!   coil pattern on a worker thread, one phase per quarter step period.
//!   Confirmation is synchronous with sequencing; the counter advances as
//!   each four-phase cycle completes.
//! - **Pulse train + edge counter**: a hardware pulse generator free-runs at
//!   the step rate while a watcher thread counts rising edges on an
//!   independent input. The watcher stops the pulse train itself once the
//!   counter reaches the target (auto-stop).
//!
//! Motor state and the step counter for an axis live under a single mutex so
//! the watcher's check-then-stop cannot race command issue. Each axis owns
//! its own lock; two axes never serialize against each other.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::clock::PulseClock;
use crate::gpio::{EdgeInput, HardwareError, OutputBank, PulseGenerator};

/// Rotation direction for one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Positive pixel-error correction.
    Forward,
    /// Negative pixel-error correction.
    Backward,
}

/// One motion request: how far, which way, how fast. Immutable once issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotionCommand {
    /// Rotation direction.
    pub direction: Direction,
    /// Full steps to deliver. Zero-step commands are rejected at `prepare`.
    pub step_count: u32,
    /// Step rate in Hz.
    pub step_rate_hz: u32,
}

/// Result of [`StepActuator::prepare`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrepareOutcome {
    /// Command staged; the next [`StepActuator::start`] will run it.
    Accepted,
    /// The axis is still moving. The command was dropped; retry next cycle.
    Busy,
    /// The command asked for zero steps and was dropped.
    ZeroSteps,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MotorState {
    Idle,
    Moving,
}

/// State shared between the control loop and the confirmation path.
///
/// Invariant: `target > 0` only while `state == Moving`; `steps_confirmed`
/// resets to zero exactly when a command transitions the motor to `Moving`.
struct MotorCore {
    state: MotorState,
    steps_confirmed: u32,
    target: u32,
    pending: Option<MotionCommand>,
    /// Tells an in-flight phase worker to wind down early.
    abort: bool,
}

impl MotorCore {
    fn new() -> Self {
        Self {
            state: MotorState::Idle,
            steps_confirmed: 0,
            target: 0,
            pending: None,
            abort: false,
        }
    }
}

/// Coil energization pattern for one full step, four phases of four lines.
/// Backward motion walks the same table in reverse.
const PHASE_TABLE: [[bool; 4]; 4] = [
    [true, false, true, false],
    [false, true, true, false],
    [false, true, false, true],
    [true, false, false, true],
];

const ALL_OFF: [bool; 4] = [false; 4];

/// How long the edge watcher blocks per wait so it can notice shutdown.
const EDGE_WAIT: Duration = Duration::from_millis(50);

enum Drive {
    Phase {
        bank: Arc<Mutex<Box<dyn OutputBank>>>,
        clock: Arc<dyn PulseClock>,
        worker: Option<JoinHandle<()>>,
    },
    Pulse {
        pulses: Arc<Mutex<Box<dyn PulseGenerator>>>,
        direction_line: Box<dyn OutputBank>,
        watcher: Option<JoinHandle<()>>,
        shutdown: Arc<AtomicBool>,
    },
}

/// Drives one stepper motor and tracks confirmed steps.
///
/// All entry points are safe to call from the control loop; confirmation
/// arrives from a background path depending on the drive strategy. Call
/// [`shutdown`](Self::shutdown) when done; `Drop` performs the same release
/// as a backstop for abnormal exits.
pub struct StepActuator {
    label: String,
    core: Arc<Mutex<MotorCore>>,
    drive: Drive,
}

impl StepActuator {
    /// Build a phase-sequencing actuator over a four-line output bank.
    ///
    /// Fails if the bank does not expose exactly four lines.
    pub fn phase_sequenced(
        label: impl Into<String>,
        bank: Box<dyn OutputBank>,
        clock: Arc<dyn PulseClock>,
    ) -> Result<Self, HardwareError> {
        if bank.line_count() != 4 {
            return Err(HardwareError::InvalidConfig(format!(
                "phase drive needs 4 lines, bank has {}",
                bank.line_count()
            )));
        }
        let label = label.into();
        info!(axis = %label, "stepper ready (phase sequencing)");
        Ok(Self {
            label,
            core: Arc::new(Mutex::new(MotorCore::new())),
            drive: Drive::Phase {
                bank: Arc::new(Mutex::new(bank)),
                clock,
                worker: None,
            },
        })
    }

    /// Build a pulse-train actuator: pulse generator, one direction line and
    /// an independent rising-edge counting input.
    ///
    /// The edge watcher thread starts immediately and lives until
    /// [`shutdown`](Self::shutdown); it holds only a weak reference to the
    /// motor state, so a leaked handle cannot keep the axis alive.
    pub fn pulse_counted(
        label: impl Into<String>,
        pulses: Box<dyn PulseGenerator>,
        direction_line: Box<dyn OutputBank>,
        edges: Box<dyn EdgeInput>,
    ) -> Result<Self, HardwareError> {
        if direction_line.line_count() != 1 {
            return Err(HardwareError::InvalidConfig(format!(
                "direction bank needs 1 line, has {}",
                direction_line.line_count()
            )));
        }

        let label = label.into();
        let core = Arc::new(Mutex::new(MotorCore::new()));
        let pulses = Arc::new(Mutex::new(pulses));
        let shutdown = Arc::new(AtomicBool::new(false));

        let watcher = {
            let core = Arc::downgrade(&core);
            let pulses = Arc::clone(&pulses);
            let shutdown = Arc::clone(&shutdown);
            let axis = label.clone();
            thread::spawn(move || watch_edges(axis, edges, core, pulses, shutdown))
        };

        info!(axis = %label, "stepper ready (pulse train + edge counter)");
        Ok(Self {
            label,
            core,
            drive: Drive::Pulse {
                pulses,
                direction_line,
                watcher: Some(watcher),
                shutdown,
            },
        })
    }

    /// Stage a motion command for the next [`start`](Self::start).
    ///
    /// Rejected while the axis is moving (`Busy`) and for zero-step commands
    /// (`ZeroSteps`); neither rejection touches the counter or the in-flight
    /// target.
    pub fn prepare(&self, command: MotionCommand) -> PrepareOutcome {
        if command.step_count == 0 {
            return PrepareOutcome::ZeroSteps;
        }
        let mut core = self.core.lock().unwrap();
        if core.state == MotorState::Moving {
            return PrepareOutcome::Busy;
        }
        core.pending = Some(command);
        PrepareOutcome::Accepted
    }

    /// Execute the staged command, if any.
    ///
    /// A no-op when nothing was prepared or the axis is already moving. On
    /// acceptance the motor transitions to `Moving`, the step counter resets
    /// to zero and pulse emission (or phase sequencing) begins at the
    /// commanded rate.
    pub fn start(&mut self) -> Result<(), HardwareError> {
        let command = {
            let mut core = self.core.lock().unwrap();
            if core.state == MotorState::Moving {
                return Ok(());
            }
            let Some(command) = core.pending.take() else {
                return Ok(());
            };
            core.state = MotorState::Moving;
            core.steps_confirmed = 0;
            core.target = command.step_count;
            core.abort = false;
            command
        };

        debug!(
            axis = %self.label,
            steps = command.step_count,
            rate_hz = command.step_rate_hz,
            direction = ?command.direction,
            "motion start"
        );

        if let Err(error) = self.engage(command) {
            let mut core = self.core.lock().unwrap();
            core.state = MotorState::Idle;
            core.target = 0;
            return Err(error);
        }
        Ok(())
    }

    fn engage(&mut self, command: MotionCommand) -> Result<(), HardwareError> {
        match &mut self.drive {
            Drive::Phase { bank, clock, worker } => {
                // A previous worker has already gone Idle; reap it.
                if let Some(handle) = worker.take() {
                    let _ = handle.join();
                }
                let core = Arc::clone(&self.core);
                let bank = Arc::clone(bank);
                let clock = Arc::clone(clock);
                let axis = self.label.clone();
                *worker =
                    Some(thread::spawn(move || {
                        run_phase_sequence(axis, command, core, bank, clock)
                    }));
                Ok(())
            }
            Drive::Pulse {
                pulses,
                direction_line,
                ..
            } => {
                direction_line.set_levels(&[command.direction == Direction::Forward])?;
                let mut pulses = pulses.lock().unwrap();
                pulses.set_frequency(command.step_rate_hz)?;
                pulses.start()
            }
        }
    }

    /// Halt motion and return the axis to `Idle`. Idempotent.
    pub fn stop(&mut self) -> Result<(), HardwareError> {
        match &mut self.drive {
            Drive::Phase { bank, worker, .. } => {
                self.core.lock().unwrap().abort = true;
                // The worker parks the coils and marks Idle on its way out;
                // it exits within one phase interval of the abort flag.
                if let Some(handle) = worker.take() {
                    let _ = handle.join();
                }
                // Covers the case where no worker ever ran.
                let mut core = self.core.lock().unwrap();
                if core.state == MotorState::Moving {
                    bank.lock().unwrap().set_levels(&ALL_OFF)?;
                    core.state = MotorState::Idle;
                    core.target = 0;
                }
                Ok(())
            }
            Drive::Pulse { pulses, .. } => {
                let mut core = self.core.lock().unwrap();
                pulses.lock().unwrap().stop()?;
                core.state = MotorState::Idle;
                core.target = 0;
                Ok(())
            }
        }
    }

    /// Whether a command is currently executing.
    pub fn is_moving(&self) -> bool {
        self.core.lock().unwrap().state == MotorState::Moving
    }

    /// Confirmed pulses since the last accepted command.
    pub fn steps_confirmed(&self) -> u32 {
        self.core.lock().unwrap().steps_confirmed
    }

    /// Axis label used in logs.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Release the axis: stop motion, park output lines and retire the
    /// background thread. Safe to call more than once.
    pub fn shutdown(&mut self) -> Result<(), HardwareError> {
        let result = self.stop();
        match &mut self.drive {
            Drive::Phase { bank, .. } => {
                bank.lock().unwrap().set_levels(&ALL_OFF)?;
            }
            Drive::Pulse {
                watcher, shutdown, ..
            } => {
                shutdown.store(true, Ordering::Relaxed);
                if let Some(handle) = watcher.take() {
                    let _ = handle.join();
                }
            }
        }
        info!(axis = %self.label, "stepper released");
        result
    }
}

impl Drop for StepActuator {
    fn drop(&mut self) {
        if let Err(error) = self.shutdown() {
            warn!(axis = %self.label, %error, "release on drop failed");
        }
    }
}

/// Phase worker: bit-bang `command.step_count` full steps, then park.
///
/// Owns no state beyond its arguments; the abort flag in `MotorCore` is the
/// only external control. The worker performs the `Moving -> Idle`
/// transition itself so the counter and state change under one lock.
fn run_phase_sequence(
    axis: String,
    command: MotionCommand,
    core: Arc<Mutex<MotorCore>>,
    bank: Arc<Mutex<Box<dyn OutputBank>>>,
    clock: Arc<dyn PulseClock>,
) {
    let phase_interval = Duration::from_secs_f64(1.0 / (4.0 * command.step_rate_hz as f64));
    let phases: Vec<[bool; 4]> = match command.direction {
        Direction::Forward => PHASE_TABLE.to_vec(),
        Direction::Backward => PHASE_TABLE.iter().rev().copied().collect(),
    };

    'steps: for _ in 0..command.step_count {
        for phase in &phases {
            if core.lock().unwrap().abort {
                break 'steps;
            }
            if let Err(error) = bank.lock().unwrap().set_levels(phase) {
                warn!(axis = %axis, %error, "phase write failed, aborting motion");
                break 'steps;
            }
            clock.pause(phase_interval);
        }

        let mut core = core.lock().unwrap();
        core.steps_confirmed += 1;
        if core.steps_confirmed >= core.target {
            break;
        }
    }

    if let Err(error) = bank.lock().unwrap().set_levels(&ALL_OFF) {
        warn!(axis = %axis, %error, "failed to park coils");
    }

    let mut core = core.lock().unwrap();
    let delivered = core.steps_confirmed;
    core.state = MotorState::Idle;
    core.target = 0;
    debug!(axis = %axis, steps = delivered, "motion complete");
}

/// Edge watcher: count rising edges and auto-stop at the target.
///
/// Runs for the lifetime of the actuator. Holds the motor state weakly; once
/// the actuator is gone (or the shutdown flag is set) the thread exits on
/// its next bounded wait.
fn watch_edges(
    axis: String,
    mut edges: Box<dyn EdgeInput>,
    core: Weak<Mutex<MotorCore>>,
    pulses: Arc<Mutex<Box<dyn PulseGenerator>>>,
    shutdown: Arc<AtomicBool>,
) {
    loop {
        if shutdown.load(Ordering::Relaxed) {
            return;
        }
        let Some(core) = core.upgrade() else {
            return;
        };

        match edges.wait_rising(EDGE_WAIT) {
            Ok(true) => {
                // The state check and the stop decision happen under the
                // same lock that guards prepare/start, so a new command
                // cannot interleave with the auto-stop.
                let mut core = core.lock().unwrap();
                if core.state != MotorState::Moving {
                    continue;
                }
                core.steps_confirmed += 1;
                if core.steps_confirmed >= core.target {
                    if let Err(error) = pulses.lock().unwrap().stop() {
                        warn!(axis = %axis, %error, "auto-stop failed to halt pulses");
                    }
                    let delivered = core.steps_confirmed;
                    core.state = MotorState::Idle;
                    core.target = 0;
                    debug!(axis = %axis, steps = delivered, "auto-stop at target");
                }
            }
            Ok(false) => {} // timeout: loop to observe shutdown
            Err(error) => {
                warn!(axis = %axis, %error, "edge wait failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{FakeClock, MockBank, MockPulses, ScriptedEdges};

    fn phase_actuator() -> (StepActuator, MockBank) {
        let bank = MockBank::new(4);
        let actuator = StepActuator::phase_sequenced(
            "x",
            Box::new(bank.clone()),
            Arc::new(FakeClock::default()),
        )
        .unwrap();
        (actuator, bank)
    }

    fn command(steps: u32) -> MotionCommand {
        MotionCommand {
            direction: Direction::Forward,
            step_count: steps,
            step_rate_hz: 500,
        }
    }

    #[test]
    fn phase_drive_rejects_wrong_bank_width() {
        let bank = MockBank::new(3);
        let result = StepActuator::phase_sequenced(
            "x",
            Box::new(bank),
            Arc::new(FakeClock::default()),
        );
        assert!(matches!(result, Err(HardwareError::InvalidConfig(_))));
    }

    #[test]
    fn start_without_prepare_is_a_noop() {
        let (mut actuator, _bank) = phase_actuator();
        actuator.start().unwrap();
        assert!(!actuator.is_moving());
        assert_eq!(actuator.steps_confirmed(), 0);
    }

    #[test]
    fn zero_step_command_is_rejected() {
        let (actuator, _bank) = phase_actuator();
        assert_eq!(actuator.prepare(command(0)), PrepareOutcome::ZeroSteps);
    }

    #[test]
    fn phase_drive_delivers_commanded_steps_and_parks() {
        let (mut actuator, bank) = phase_actuator();
        assert_eq!(actuator.prepare(command(7)), PrepareOutcome::Accepted);
        actuator.start().unwrap();

        wait_until_idle(&actuator);
        assert_eq!(actuator.steps_confirmed(), 7);

        // 7 steps x 4 phases plus the final all-off write.
        let writes = bank.writes();
        assert_eq!(writes.len(), 7 * 4 + 1);
        assert_eq!(writes.last().unwrap(), &vec![false; 4]);
    }

    #[test]
    fn backward_walks_the_phase_table_in_reverse() {
        let (mut actuator, bank) = phase_actuator();
        actuator.prepare(MotionCommand {
            direction: Direction::Backward,
            step_count: 1,
            step_rate_hz: 500,
        });
        actuator.start().unwrap();
        wait_until_idle(&actuator);

        let writes = bank.writes();
        assert_eq!(writes[0], vec![true, false, false, true]);
        assert_eq!(writes[3], vec![true, false, true, false]);
    }

    #[test]
    fn prepare_while_moving_is_busy_and_preserves_flight_state() {
        // A long command on a clock we control: use real clock with a slow
        // rate so the motor stays Moving long enough to observe.
        let bank = MockBank::new(4);
        let mut actuator = StepActuator::phase_sequenced(
            "x",
            Box::new(bank.clone()),
            Arc::new(crate::clock::RealClock),
        )
        .unwrap();

        actuator.prepare(MotionCommand {
            direction: Direction::Forward,
            step_count: 1000,
            step_rate_hz: 200,
        });
        actuator.start().unwrap();
        assert!(actuator.is_moving());

        let observed = actuator.steps_confirmed();
        assert_eq!(actuator.prepare(command(5)), PrepareOutcome::Busy);
        assert!(actuator.steps_confirmed() >= observed);
        assert!(actuator.is_moving());

        actuator.stop().unwrap();
        assert!(!actuator.is_moving());
    }

    #[test]
    fn stop_is_idempotent() {
        let (mut actuator, _bank) = phase_actuator();
        actuator.stop().unwrap();
        actuator.stop().unwrap();
        assert!(!actuator.is_moving());
    }

    #[test]
    fn pulse_drive_auto_stops_at_target() {
        let pulses = MockPulses::new();
        // Edges arrive only while the pulse train runs, as on real hardware.
        let edges = ScriptedEdges::driven_by(&pulses);
        let mut actuator = StepActuator::pulse_counted(
            "x",
            Box::new(pulses.clone()),
            Box::new(MockBank::new(1)),
            Box::new(edges),
        )
        .unwrap();

        actuator.prepare(command(200));
        actuator.start().unwrap();

        wait_until_idle(&actuator);
        assert_eq!(actuator.steps_confirmed(), 200);
        assert!(!pulses.is_running());
    }

    #[test]
    fn edges_while_idle_do_not_count() {
        let pulses = MockPulses::new();
        // Edges arrive continuously, including before start and after
        // auto-stop; only edges observed while Moving may count.
        let edges = ScriptedEdges::free_running();
        let mut actuator = StepActuator::pulse_counted(
            "y",
            Box::new(pulses),
            Box::new(MockBank::new(1)),
            Box::new(edges),
        )
        .unwrap();

        actuator.prepare(command(10));
        actuator.start().unwrap();
        wait_until_idle(&actuator);

        // Stray edges after auto-stop leave the counter at the target.
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(actuator.steps_confirmed(), 10);
    }

    #[test]
    fn pulse_drive_sets_direction_line() {
        let pulses = MockPulses::new();
        let dir = MockBank::new(1);
        let mut actuator = StepActuator::pulse_counted(
            "x",
            Box::new(pulses.clone()),
            Box::new(dir.clone()),
            Box::new(ScriptedEdges::driven_by(&pulses)),
        )
        .unwrap();

        actuator.prepare(MotionCommand {
            direction: Direction::Backward,
            step_count: 1,
            step_rate_hz: 100,
        });
        actuator.start().unwrap();
        assert_eq!(dir.writes()[0], vec![false]);
        wait_until_idle(&actuator);
    }

    #[test]
    fn shutdown_retires_the_watcher() {
        let pulses = MockPulses::new();
        let mut actuator = StepActuator::pulse_counted(
            "x",
            Box::new(pulses.clone()),
            Box::new(MockBank::new(1)),
            Box::new(ScriptedEdges::silent()),
        )
        .unwrap();
        actuator.shutdown().unwrap();
        assert!(!pulses.is_running());
        // Second shutdown (and the implicit one in Drop) must be harmless.
        actuator.shutdown().unwrap();
    }

    fn wait_until_idle(actuator: &StepActuator) {
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while actuator.is_moving() {
            assert!(
                std::time::Instant::now() < deadline,
                "actuator never went idle"
            );
            std::thread::sleep(Duration::from_millis(1));
        }
    }
}
