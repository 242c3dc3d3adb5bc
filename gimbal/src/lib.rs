//! Closed-loop gimbal pointing.
//!
//! Each control cycle reads a frame, locates the target dot, converts the
//! pixel error into per-axis motion through a PID filter, and issues step
//! commands through the actuators in `hardware`. The supervisor owns the
//! per-axis policies: deadband suppression, busy-drop while a move is in
//! flight, coasting through detection dropouts, and a no-progress stall
//! watchdog.

pub mod config;
pub mod error;
pub mod pid;
pub mod runner;
pub mod supervisor;

pub use config::{AxisConfig, TrackerConfig};
pub use error::ControlError;
pub use pid::{AxisPid, PidGains};
pub use runner::run_loop;
pub use supervisor::{AxisAction, CycleOutcome, GimbalSupervisor};
