//! Raspberry Pi bindings: gpiod character-device lines and sysfs PWM.
//!
//! All resources are claimed at construction and released on drop; there is
//! no module-level line state. Line offsets use BCM numbering, chip names
//! are `gpiochip0` (Pi 4 and earlier) or `gpiochip4` (Pi 5).

use std::fs;
use std::io::Write as _;
use std::os::fd::AsRawFd;
use std::path::PathBuf;
use std::time::Duration;

use gpiod::{Chip, EdgeDetect, Input, Lines, Options, Output};
use tracing::debug;

use crate::gpio::{EdgeInput, HardwareError, OutputBank, PulseGenerator};

const CONSUMER: &str = "laser-gimbal";

fn acquisition(resource: &str, source: std::io::Error) -> HardwareError {
    HardwareError::Acquisition {
        resource: resource.to_string(),
        source,
    }
}

/// A batch-settable bank of GPIO output lines.
pub struct CdevBank {
    lines: Lines<Output>,
    line_count: usize,
}

impl CdevBank {
    /// Claim `offsets` on `chip_name` as outputs, all initially low.
    pub fn open(chip_name: &str, offsets: &[u32]) -> Result<Self, HardwareError> {
        let chip = Chip::new(chip_name)
            .map_err(|e| acquisition(&format!("gpio chip {chip_name}"), e))?;
        let options = Options::output(offsets).consumer(CONSUMER);
        let lines = chip
            .request_lines(options)
            .map_err(|e| acquisition(&format!("output lines {offsets:?}"), e))?;
        debug!(chip = chip_name, ?offsets, "claimed output lines");
        Ok(Self {
            lines,
            line_count: offsets.len(),
        })
    }
}

impl OutputBank for CdevBank {
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
        match self.line_count {
            1 => {
                let values: [bool; 1] = [levels[0]];
                self.lines.set_values(values)?;
            }
            4 => {
                let values: [bool; 4] = [levels[0], levels[1], levels[2], levels[3]];
                self.lines.set_values(values)?;
            }
            _ => {
                return Err(HardwareError::InvalidConfig(format!(
                    "unsupported bank width {}",
                    self.line_count
                )))
            }
        }
        Ok(())
    }
}

/// A rising-edge input line with bounded blocking waits.
pub struct CdevEdgeInput {
    lines: Lines<Input>,
}

impl CdevEdgeInput {
    /// Claim `offset` on `chip_name` for rising-edge events.
    pub fn open(chip_name: &str, offset: u32) -> Result<Self, HardwareError> {
        let chip = Chip::new(chip_name)
            .map_err(|e| acquisition(&format!("gpio chip {chip_name}"), e))?;
        let options = Options::input([offset])
            .edge(EdgeDetect::Rising)
            .consumer(CONSUMER);
        let lines = chip
            .request_lines(options)
            .map_err(|e| acquisition(&format!("edge input line {offset}"), e))?;
        debug!(chip = chip_name, offset, "claimed edge input");
        Ok(Self { lines })
    }
}

impl EdgeInput for CdevEdgeInput {
    fn wait_rising(&mut self, timeout: Duration) -> Result<bool, HardwareError> {
        let mut pollfd = libc::pollfd {
            fd: self.lines.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        let timeout_ms = timeout.as_millis().min(i32::MAX as u128) as libc::c_int;

        // SAFETY: pollfd points at one valid, initialized struct for the
        // duration of the call.
        let ready = unsafe { libc::poll(&mut pollfd, 1, timeout_ms) };
        match ready {
            -1 => Err(HardwareError::Io(std::io::Error::last_os_error())),
            0 => Ok(false),
            _ => {
                // Drain exactly one queued event per wait.
                self.lines.read_event()?;
                Ok(true)
            }
        }
    }
}

/// One sysfs PWM channel used as the step pulse source.
///
/// Exports the channel on open, holds it at 50% duty, and unexports on drop.
pub struct SysfsPwm {
    channel_dir: PathBuf,
    chip_dir: PathBuf,
    channel: u32,
    period_ns: u64,
}

impl SysfsPwm {
    /// Export and claim channel `channel` of `/sys/class/pwm/pwmchip{chip}`.
    pub fn open(chip: u32, channel: u32) -> Result<Self, HardwareError> {
        let chip_dir = PathBuf::from(format!("/sys/class/pwm/pwmchip{chip}"));
        let channel_dir = chip_dir.join(format!("pwm{channel}"));

        if !channel_dir.exists() {
            fs::write(chip_dir.join("export"), channel.to_string())
                .map_err(|e| acquisition(&format!("pwm chip {chip} channel {channel}"), e))?;
        }
        debug!(chip, channel, "claimed pwm channel");

        let mut pwm = Self {
            channel_dir,
            chip_dir,
            channel,
            period_ns: 0,
        };
        pwm.write_attr("enable", "0")?;
        Ok(pwm)
    }

    fn write_attr(&mut self, name: &str, value: &str) -> Result<(), HardwareError> {
        let path = self.channel_dir.join(name);
        let mut file = fs::OpenOptions::new().write(true).open(&path)?;
        file.write_all(value.as_bytes())?;
        Ok(())
    }
}

impl PulseGenerator for SysfsPwm {
    fn set_frequency(&mut self, frequency_hz: u32) -> Result<(), HardwareError> {
        if frequency_hz == 0 {
            return Err(HardwareError::InvalidConfig(
                "pulse frequency must be nonzero".to_string(),
            ));
        }
        let period_ns = 1_000_000_000u64 / frequency_hz as u64;
        // Duty must never exceed the period, so shrink it first.
        self.write_attr("duty_cycle", "0")?;
        self.write_attr("period", &period_ns.to_string())?;
        self.write_attr("duty_cycle", &(period_ns / 2).to_string())?;
        self.period_ns = period_ns;
        Ok(())
    }

    fn start(&mut self) -> Result<(), HardwareError> {
        if self.period_ns == 0 {
            return Err(HardwareError::InvalidConfig(
                "pulse frequency not configured".to_string(),
            ));
        }
        self.write_attr("enable", "1")
    }

    fn stop(&mut self) -> Result<(), HardwareError> {
        self.write_attr("enable", "0")
    }
}

impl Drop for SysfsPwm {
    fn drop(&mut self) {
        let _ = self.write_attr("enable", "0");
        let _ = fs::write(self.chip_dir.join("unexport"), self.channel.to_string());
    }
}
