//! Tracker configuration, loaded once at startup from a JSON file.

use std::path::Path;

use serde::{Deserialize, Serialize};
use vision::DetectorConfig;

use crate::error::ControlError;
use crate::pid::PidGains;

/// Per-axis control and mapping parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AxisConfig {
    /// PID gains for this axis.
    pub gains: PidGains,
    /// Steps commanded per unit of PID output (pixels of weighted error).
    pub steps_per_unit: f64,
    /// Commands below this many steps are suppressed to avoid motor chatter
    /// around the setpoint.
    pub deadband_steps: u32,
    /// Step rate for issued commands.
    pub max_speed_hz: u32,
    /// Full steps per output-shaft revolution, for angle conversions.
    pub steps_per_rev: u32,
}

impl AxisConfig {
    /// Steps equivalent to a shaft rotation of `degrees`.
    pub fn steps_for_degrees(&self, degrees: f64) -> u32 {
        (degrees / 360.0 * self.steps_per_rev as f64).abs() as u32
    }
}

impl Default for AxisConfig {
    fn default() -> Self {
        Self {
            gains: PidGains {
                kp: 0.8,
                ki: 0.05,
                kd: 0.1,
                integral_limit: Some(500.0),
            },
            steps_per_unit: 2.0,
            deadband_steps: 2,
            max_speed_hz: 500,
            steps_per_rev: 6400,
        }
    }
}

/// Complete tracker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Color detection parameters.
    pub detector: DetectorConfig,
    /// Pixel coordinate each axis drives the target toward; defaults to the
    /// center of a 640x480 frame.
    pub setpoint_x: f64,
    /// See `setpoint_x`.
    pub setpoint_y: f64,
    /// Horizontal axis parameters.
    pub x_axis: AxisConfig,
    /// Vertical axis parameters.
    pub y_axis: AxisConfig,
    /// Stall watchdog: a moving axis whose counter makes no progress for
    /// this many expected inter-step intervals is stopped and faulted.
    pub stall_timeout_intervals: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            detector: DetectorConfig::default(),
            setpoint_x: 320.0,
            setpoint_y: 240.0,
            x_axis: AxisConfig::default(),
            y_axis: AxisConfig::default(),
            stall_timeout_intervals: 100,
        }
    }
}

impl TrackerConfig {
    /// Load from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ControlError> {
        let text = std::fs::read_to_string(path).map_err(|source| ControlError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ControlError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }
}
