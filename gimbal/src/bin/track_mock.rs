//! Closed-loop tracking demo on in-memory hardware.
//!
//! Feeds the full pipeline (detector, PID, supervisor, actuators) from a
//! synthetic drifting red dot instead of a camera. Useful for exercising
//! the control loop off-target and for sanity-checking configuration files.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use image::{Rgb, RgbImage};

use gimbal::{run_loop, GimbalSupervisor, TrackerConfig};
use hardware::mock::{MockBank, MockPulses, ScriptedEdges};
use hardware::{LaserSwitch, RealClock, StepActuator};
use vision::{DotDetector, Frame, FrameError, FrameSource};

#[derive(Parser, Debug)]
#[command(about = "Run the tracking loop against synthetic frames and mock hardware")]
struct Args {
    /// Number of synthetic frames to feed before stopping.
    #[arg(short, long, default_value_t = 120)]
    frames: u32,

    /// Tracker configuration file (JSON). Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Horizontal drift of the dot per frame, in pixels.
    #[arg(long, default_value_t = 3.0, allow_negative_numbers = true)]
    drift_x: f64,

    /// Vertical drift of the dot per frame, in pixels.
    #[arg(long, default_value_t = -1.0, allow_negative_numbers = true)]
    drift_y: f64,
}

/// Canned frame source: a red dot drifting across a black 640x480 frame.
struct DriftingDot {
    remaining: u32,
    x: f64,
    y: f64,
    drift_x: f64,
    drift_y: f64,
}

impl DriftingDot {
    fn new(frames: u32, drift_x: f64, drift_y: f64) -> Self {
        Self {
            remaining: frames,
            x: 420.0,
            y: 240.0,
            drift_x,
            drift_y,
        }
    }
}

impl FrameSource for DriftingDot {
    fn next_frame(&mut self) -> Result<Frame, FrameError> {
        if self.remaining == 0 {
            return Err(FrameError::Exhausted);
        }
        self.remaining -= 1;

        let mut image = RgbImage::new(640, 480);
        // 5x5 dot, well inside the default area acceptance band.
        let left = (self.x as i64 - 2).clamp(0, 635) as u32;
        let top = (self.y as i64 - 2).clamp(0, 475) as u32;
        for row in top..top + 5 {
            for col in left..left + 5 {
                image.put_pixel(col, row, Rgb([255, 0, 0]));
            }
        }

        self.x = (self.x + self.drift_x).clamp(0.0, 639.0);
        self.y = (self.y + self.drift_y).clamp(0.0, 479.0);
        Ok(Frame::new(image))
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => TrackerConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => TrackerConfig::default(),
    };

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        ctrlc::set_handler(move || {
            running.store(false, Ordering::Relaxed);
        })
        .context("installing Ctrl-C handler")?;
    }

    // Horizontal axis on the phase-sequenced drive, vertical on the pulse
    // train, so a demo run exercises both strategies.
    let x_coils = MockBank::new(4);
    let x_actuator =
        StepActuator::phase_sequenced("x", Box::new(x_coils), Arc::new(RealClock))?;

    let y_pulses = MockPulses::new();
    let y_edges = ScriptedEdges::driven_by(&y_pulses);
    let y_actuator = StepActuator::pulse_counted(
        "y",
        Box::new(y_pulses),
        Box::new(MockBank::new(1)),
        Box::new(y_edges),
    )?;

    let mut laser = LaserSwitch::new(Box::new(MockBank::new(1)))?;
    laser.on()?;

    let detector = DotDetector::new(config.detector.clone())?;
    let mut supervisor = GimbalSupervisor::new(
        x_actuator,
        y_actuator,
        config.x_axis.clone(),
        config.y_axis.clone(),
        (config.setpoint_x, config.setpoint_y),
        config.stall_timeout_intervals,
    );

    let mut frames = DriftingDot::new(args.frames, args.drift_x, args.drift_y);
    let started = Instant::now();
    let result = run_loop(&mut frames, &detector, &mut supervisor, &running);

    let (x_steps, y_steps) = supervisor.steps_confirmed();
    let (x_drops, y_drops) = supervisor.busy_drops();
    println!("ran {:.2}s", started.elapsed().as_secs_f64());
    println!("last command steps confirmed: x={x_steps} y={y_steps}");
    println!("busy drops: x={x_drops} y={y_drops}");

    laser.off()?;
    result.map_err(Into::into)
}
