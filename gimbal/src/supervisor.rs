//! Two-axis motion supervision.
//!
//! The supervisor owns both PID controllers and both actuators. Once per
//! frame it turns a detection into at most one motion command per axis,
//! never issuing onto a still-moving axis. The axes are fully decoupled:
//! one axis being busy does not block correction of the other.

use std::time::{Duration, Instant};

use hardware::{Direction, HardwareError, MotionCommand, PrepareOutcome, StepActuator};
use tracing::{debug, info, warn};
use vision::DotDetection;

use crate::config::AxisConfig;
use crate::error::ControlError;
use crate::pid::AxisPid;

/// What the supervisor did for one axis in one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisAction {
    /// No detection this frame: hold the current motor state.
    Coast,
    /// Correction was below the deadband and was suppressed.
    Deadband,
    /// The axis was still executing a previous command; this one was dropped.
    Busy,
    /// A new command was issued.
    Issued(MotionCommand),
}

/// Per-cycle summary across both axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleOutcome {
    /// Horizontal axis action.
    pub x: AxisAction,
    /// Vertical axis action.
    pub y: AxisAction,
}

/// Watches an in-flight command for counter progress.
struct ProgressWatch {
    last_count: u32,
    last_change: Instant,
    inflight_rate_hz: u32,
}

struct AxisChannel {
    pid: AxisPid,
    actuator: StepActuator,
    config: AxisConfig,
    progress: Option<ProgressWatch>,
    busy_drops: u64,
}

impl AxisChannel {
    /// Stall watchdog: a moving axis whose counter has not advanced within
    /// `timeout_intervals` expected inter-step intervals is force-stopped
    /// and surfaced as a fatal hardware fault.
    fn check_stall(&mut self, now: Instant, timeout_intervals: u32) -> Result<(), ControlError> {
        if !self.actuator.is_moving() {
            self.progress = None;
            return Ok(());
        }
        let Some(watch) = self.progress.as_mut() else {
            return Ok(());
        };

        let count = self.actuator.steps_confirmed();
        if count != watch.last_count {
            watch.last_count = count;
            watch.last_change = now;
            return Ok(());
        }

        let step_interval = Duration::from_secs_f64(1.0 / watch.inflight_rate_hz.max(1) as f64);
        let allowance = step_interval * timeout_intervals;
        let waited = now.saturating_duration_since(watch.last_change);
        if waited > allowance {
            warn!(
                axis = self.actuator.label(),
                waited_ms = waited.as_millis() as u64,
                "no step confirmation, forcing stop"
            );
            self.actuator.stop()?;
            return Err(HardwareError::Stalled {
                axis: self.actuator.label().to_string(),
                waited_ms: waited.as_millis() as u64,
            }
            .into());
        }
        Ok(())
    }

    /// Run the PID for this axis and issue a command if warranted.
    fn correct(&mut self, current_value: f64, now: Instant) -> Result<AxisAction, ControlError> {
        // The PID always samples, even when the command ends up dropped;
        // controller time advances with every cycle.
        let output = self.pid.compute(current_value, now);

        let steps = (output.abs() * self.config.steps_per_unit).round() as u32;
        if steps < self.config.deadband_steps {
            return Ok(AxisAction::Deadband);
        }

        let command = MotionCommand {
            direction: if output >= 0.0 {
                Direction::Forward
            } else {
                Direction::Backward
            },
            step_count: steps,
            step_rate_hz: self.config.max_speed_hz,
        };

        match self.actuator.prepare(command) {
            PrepareOutcome::Accepted => {
                self.actuator.start()?;
                self.progress = Some(ProgressWatch {
                    last_count: 0,
                    last_change: now,
                    inflight_rate_hz: command.step_rate_hz,
                });
                debug!(
                    axis = self.actuator.label(),
                    steps = command.step_count,
                    direction = ?command.direction,
                    "command issued"
                );
                Ok(AxisAction::Issued(command))
            }
            PrepareOutcome::Busy => {
                self.busy_drops += 1;
                debug!(axis = self.actuator.label(), "axis busy, command dropped");
                Ok(AxisAction::Busy)
            }
            // Zero steps only occurs with a zero deadband; treat like it.
            PrepareOutcome::ZeroSteps => Ok(AxisAction::Deadband),
        }
    }
}

/// Orchestrates two independent axes from per-frame detections.
pub struct GimbalSupervisor {
    x: AxisChannel,
    y: AxisChannel,
    stall_timeout_intervals: u32,
}

impl GimbalSupervisor {
    /// Assemble the supervisor from its two axes.
    ///
    /// `setpoint` is the target pixel coordinate, typically the frame
    /// center.
    pub fn new(
        x_actuator: StepActuator,
        y_actuator: StepActuator,
        x_config: AxisConfig,
        y_config: AxisConfig,
        setpoint: (f64, f64),
        stall_timeout_intervals: u32,
    ) -> Self {
        info!(
            setpoint_x = setpoint.0,
            setpoint_y = setpoint.1,
            "supervisor ready"
        );
        Self {
            x: AxisChannel {
                pid: AxisPid::new(x_config.gains, setpoint.0),
                actuator: x_actuator,
                config: x_config,
                progress: None,
                busy_drops: 0,
            },
            y: AxisChannel {
                pid: AxisPid::new(y_config.gains, setpoint.1),
                actuator: y_actuator,
                config: y_config,
                progress: None,
                busy_drops: 0,
            },
            stall_timeout_intervals,
        }
    }

    /// Run one control cycle against the latest detection.
    ///
    /// `None` means the target was not seen this frame; the gimbal coasts
    /// rather than correcting on garbage. Only stall faults and hardware
    /// errors propagate; a busy axis simply drops its command for the cycle.
    pub fn process(
        &mut self,
        detection: Option<DotDetection>,
        now: Instant,
    ) -> Result<CycleOutcome, ControlError> {
        self.x.check_stall(now, self.stall_timeout_intervals)?;
        self.y.check_stall(now, self.stall_timeout_intervals)?;

        let Some(dot) = detection else {
            debug!("coast: no detection this cycle");
            return Ok(CycleOutcome {
                x: AxisAction::Coast,
                y: AxisAction::Coast,
            });
        };

        let x = self.x.correct(dot.x as f64, now)?;
        let y = self.y.correct(dot.y as f64, now)?;
        Ok(CycleOutcome { x, y })
    }

    /// Dropped-command counters `(x, y)`, for diagnostics.
    pub fn busy_drops(&self) -> (u64, u64) {
        (self.x.busy_drops, self.y.busy_drops)
    }

    /// Confirmed steps on each axis for the in-flight (or last) command.
    pub fn steps_confirmed(&self) -> (u32, u32) {
        (
            self.x.actuator.steps_confirmed(),
            self.y.actuator.steps_confirmed(),
        )
    }

    /// Whether each axis is currently executing a command.
    pub fn axes_moving(&self) -> (bool, bool) {
        (self.x.actuator.is_moving(), self.y.actuator.is_moving())
    }

    /// Stop both axes and release their hardware. Both axes are attempted
    /// even if the first fails; the first error wins.
    pub fn shutdown(&mut self) -> Result<(), HardwareError> {
        let x = self.x.actuator.shutdown();
        let y = self.y.actuator.shutdown();
        x.and(y)
    }
}
