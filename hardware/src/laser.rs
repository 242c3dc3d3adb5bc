//! The laser pointer switch.

use tracing::{debug, warn};

use crate::gpio::{HardwareError, OutputBank};

/// A single output line driving the laser diode.
///
/// The line is forced low on [`shutdown`](Self::shutdown) and on drop, so
/// the beam never outlives the program.
pub struct LaserSwitch {
    line: Box<dyn OutputBank>,
    lit: bool,
}

impl LaserSwitch {
    /// Wrap a one-line output bank. The laser starts off.
    pub fn new(mut line: Box<dyn OutputBank>) -> Result<Self, HardwareError> {
        if line.line_count() != 1 {
            return Err(HardwareError::InvalidConfig(format!(
                "laser switch needs 1 line, bank has {}",
                line.line_count()
            )));
        }
        line.set_levels(&[false])?;
        Ok(Self { line, lit: false })
    }

    /// Turn the beam on.
    pub fn on(&mut self) -> Result<(), HardwareError> {
        self.line.set_levels(&[true])?;
        self.lit = true;
        debug!("laser on");
        Ok(())
    }

    /// Turn the beam off.
    pub fn off(&mut self) -> Result<(), HardwareError> {
        self.line.set_levels(&[false])?;
        self.lit = false;
        debug!("laser off");
        Ok(())
    }

    /// Whether the beam is currently commanded on.
    pub fn is_lit(&self) -> bool {
        self.lit
    }

    /// Force the line low and release. Safe to call more than once.
    pub fn shutdown(&mut self) -> Result<(), HardwareError> {
        if self.lit {
            self.off()?;
        }
        Ok(())
    }
}

impl Drop for LaserSwitch {
    fn drop(&mut self) {
        if let Err(error) = self.shutdown() {
            warn!(%error, "failed to douse laser on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockBank;

    #[test]
    fn laser_starts_off_and_toggles() {
        let bank = MockBank::new(1);
        let mut laser = LaserSwitch::new(Box::new(bank.clone())).unwrap();
        assert!(!laser.is_lit());
        assert_eq!(bank.levels(), vec![false]);

        laser.on().unwrap();
        assert!(laser.is_lit());
        assert_eq!(bank.levels(), vec![true]);

        laser.off().unwrap();
        assert_eq!(bank.levels(), vec![false]);
    }

    #[test]
    fn drop_forces_the_line_low() {
        let bank = MockBank::new(1);
        {
            let mut laser = LaserSwitch::new(Box::new(bank.clone())).unwrap();
            laser.on().unwrap();
        }
        assert_eq!(bank.levels(), vec![false]);
    }

    #[test]
    fn multi_line_bank_is_rejected() {
        let bank = MockBank::new(4);
        assert!(LaserSwitch::new(Box::new(bank)).is_err());
    }
}
