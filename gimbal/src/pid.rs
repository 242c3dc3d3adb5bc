//! Single-axis PID with real-time-aware integration.

use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Controller gains for one axis.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PidGains {
    /// Proportional gain.
    pub kp: f64,
    /// Integral gain.
    pub ki: f64,
    /// Derivative gain.
    pub kd: f64,
    /// Symmetric clamp on the accumulated integral, `None` for unbounded.
    /// Bounds windup during long detection dropouts or motor saturation.
    #[serde(default)]
    pub integral_limit: Option<f64>,
}

/// Proportional-integral-derivative controller for one gimbal axis.
///
/// Each `compute` call advances controller time as a side effect: the
/// integral, the stored error and the sample timestamp update
/// unconditionally, whatever the output is used for.
#[derive(Debug)]
pub struct AxisPid {
    gains: PidGains,
    setpoint: f64,
    integral: f64,
    last_error: f64,
    last_sample: Option<Instant>,
}

impl AxisPid {
    /// Controller driving its input toward `setpoint`.
    pub fn new(gains: PidGains, setpoint: f64) -> Self {
        Self {
            gains,
            setpoint,
            integral: 0.0,
            last_error: 0.0,
            last_sample: None,
        }
    }

    /// Target value for this axis (a pixel coordinate here).
    pub fn setpoint(&self) -> f64 {
        self.setpoint
    }

    /// Correction output for the current measurement.
    ///
    /// `dt` comes from the gap to the previous sample. On the first call,
    /// or when the clock is non-monotonic (`now` at or before the previous
    /// sample), `dt` is treated as zero: the integral does not advance and
    /// the derivative term is suppressed rather than dividing by zero or
    /// spiking with an inverted sign.
    pub fn compute(&mut self, current_value: f64, now: Instant) -> f64 {
        let error = self.setpoint - current_value;
        let dt = self
            .last_sample
            .and_then(|prev| now.checked_duration_since(prev))
            .map(|gap| gap.as_secs_f64())
            .unwrap_or(0.0);

        self.integral += error * dt;
        if let Some(limit) = self.gains.integral_limit {
            self.integral = self.integral.clamp(-limit, limit);
        }
        let derivative = if dt > 0.0 {
            (error - self.last_error) / dt
        } else {
            0.0
        };

        let output =
            self.gains.kp * error + self.gains.ki * self.integral + self.gains.kd * derivative;

        self.last_error = error;
        self.last_sample = Some(now);
        output
    }

    /// Clear accumulated state; the next `compute` behaves like a first call.
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.last_error = 0.0;
        self.last_sample = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::time::Duration;

    fn gains(kp: f64, ki: f64, kd: f64) -> PidGains {
        PidGains {
            kp,
            ki,
            kd,
            integral_limit: None,
        }
    }

    #[test]
    fn pure_proportional_is_time_independent() {
        let mut pid = AxisPid::new(gains(1.0, 0.0, 0.0), 0.0);
        let t0 = Instant::now();

        assert_relative_eq!(pid.compute(5.0, t0), -5.0);
        assert_relative_eq!(pid.compute(5.0, t0 + Duration::from_secs(3)), -5.0);
    }

    #[test]
    fn integral_accumulates_monotonically_under_constant_error() {
        let mut pid = AxisPid::new(gains(0.0, 1.0, 0.0), 10.0);
        let t0 = Instant::now();

        let mut previous = pid.compute(0.0, t0); // first call: dt = 0
        for tick in 1..=5 {
            let output = pid.compute(0.0, t0 + Duration::from_millis(100 * tick));
            assert!(output > previous, "integral term must grow: {output} <= {previous}");
            previous = output;
        }
    }

    #[test]
    fn zero_ki_isolates_proportional_from_integral() {
        let mut pid = AxisPid::new(gains(2.0, 0.0, 0.0), 10.0);
        let t0 = Instant::now();

        // Repeated samples with the same error accumulate integral state,
        // but with ki = 0 the output stays purely proportional.
        for tick in 0..4 {
            let output = pid.compute(4.0, t0 + Duration::from_millis(50 * tick));
            assert_relative_eq!(output, 12.0);
        }
    }

    #[test]
    fn derivative_is_suppressed_on_first_sample_and_backwards_clock() {
        let mut pid = AxisPid::new(gains(0.0, 0.0, 1.0), 0.0);
        let t0 = Instant::now();
        let t1 = t0 + Duration::from_millis(100);

        // First call: no previous sample, derivative suppressed.
        assert_relative_eq!(pid.compute(3.0, t1), 0.0);

        // Clock going backwards: suppressed again instead of spiking.
        assert_relative_eq!(pid.compute(7.0, t0), 0.0);

        // Normal forward step afterwards produces a finite derivative.
        let out = pid.compute(7.0, t0 + Duration::from_millis(200));
        assert!(out.is_finite());
    }

    #[test]
    fn derivative_tracks_error_slope() {
        let mut pid = AxisPid::new(gains(0.0, 0.0, 1.0), 0.0);
        let t0 = Instant::now();

        pid.compute(0.0, t0);
        // Error moves from 0 to -2 over one second: derivative = -2.
        let out = pid.compute(2.0, t0 + Duration::from_secs(1));
        assert_relative_eq!(out, -2.0, epsilon = 1e-9);
    }

    #[test]
    fn integral_clamp_bounds_windup() {
        let mut pid = AxisPid::new(
            PidGains {
                kp: 0.0,
                ki: 1.0,
                kd: 0.0,
                integral_limit: Some(2.0),
            },
            10.0,
        );
        let t0 = Instant::now();

        let mut output = 0.0;
        for tick in 0..50 {
            output = pid.compute(0.0, t0 + Duration::from_secs(tick));
        }
        assert_relative_eq!(output, 2.0);
    }

    #[test]
    fn reset_clears_accumulated_state() {
        let mut pid = AxisPid::new(gains(0.0, 1.0, 0.0), 10.0);
        let t0 = Instant::now();
        pid.compute(0.0, t0);
        pid.compute(0.0, t0 + Duration::from_secs(1));

        pid.reset();
        // First call after reset has dt = 0: integral contributes nothing.
        assert_relative_eq!(pid.compute(0.0, t0 + Duration::from_secs(2)), 0.0);
    }
}
