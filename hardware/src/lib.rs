//! Hardware drivers for the laser gimbal.
//!
//! This crate owns the seam between the control loop and physical I/O:
//!
//! - [`gpio`] - the four primitives the rest of the system depends on
//!   (output bank, pulse generator, edge input, pulse clock), plus the
//!   error type for hardware faults.
//! - [`stepper`] - the [`StepActuator`](stepper::StepActuator) driving one
//!   stepper motor through either drive strategy.
//! - [`laser`] - the laser pointer switch line.
//! - [`mock`] - in-memory implementations of every primitive, used by tests
//!   and the mock demo binary.
//! - `rpi` - Raspberry Pi bindings (gpiod character-device lines, sysfs
//!   PWM), Linux only, behind the `rpi` feature.
//!
//! No module here holds global state; every line, PWM channel and edge
//! input is an owned resource object passed into its consumer.

pub mod clock;
pub mod gpio;
pub mod laser;
pub mod mock;
pub mod stepper;

#[cfg(all(target_os = "linux", feature = "rpi"))]
pub mod rpi;

pub use clock::{PulseClock, RealClock};
pub use gpio::{EdgeInput, HardwareError, OutputBank, PulseGenerator};
pub use laser::LaserSwitch;
pub use stepper::{Direction, MotionCommand, PrepareOutcome, StepActuator};
