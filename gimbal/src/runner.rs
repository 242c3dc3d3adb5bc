//! The frame-paced control loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{info, warn};
use vision::{DotDetector, FrameError, FrameSource};

use crate::error::ControlError;
use crate::supervisor::GimbalSupervisor;

/// Pause after a failed frame read before retrying.
const READ_RETRY_PAUSE: Duration = Duration::from_millis(100);

/// Run the tracking loop until `running` clears, the frame source is
/// exhausted, or a fatal fault occurs.
///
/// Every exit path, including errors, releases the supervisor's hardware
/// before returning; actuator `Drop` impls back this up for panics.
pub fn run_loop(
    frames: &mut dyn FrameSource,
    detector: &DotDetector,
    supervisor: &mut GimbalSupervisor,
    running: &AtomicBool,
) -> Result<(), ControlError> {
    info!("control loop started");
    let result = run_cycles(frames, detector, supervisor, running);
    let released = supervisor.shutdown();
    info!("control loop stopped");
    result.and(released.map_err(Into::into))
}

fn run_cycles(
    frames: &mut dyn FrameSource,
    detector: &DotDetector,
    supervisor: &mut GimbalSupervisor,
    running: &AtomicBool,
) -> Result<(), ControlError> {
    let mut cycles: u64 = 0;
    let mut misses: u64 = 0;

    while running.load(Ordering::Relaxed) {
        let frame = match frames.next_frame() {
            Ok(frame) => frame,
            Err(FrameError::Exhausted) => {
                info!(cycles, misses, "frame source exhausted");
                return Ok(());
            }
            Err(error) => {
                warn!(%error, "frame read failed, skipping cycle");
                std::thread::sleep(READ_RETRY_PAUSE);
                continue;
            }
        };

        let detection = detector.detect(&frame);
        if detection.is_none() {
            misses += 1;
        }
        supervisor.process(detection, frame.captured_at)?;
        cycles += 1;
    }

    info!(cycles, misses, "shutdown requested");
    Ok(())
}
