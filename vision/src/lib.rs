//! Color-based target detection for the laser gimbal.
//!
//! The pipeline is a one-shot, stateless transform from a camera frame to an
//! optional target coordinate:
//!
//! 1. Convert the frame to HSV ([`color`]).
//! 2. Build a binary mask from one or two configured HSV ranges ([`mask`]).
//! 3. Optionally clean the mask with a morphological open/close pass.
//! 4. Extract connected blobs, filter by area, and take the centroid of the
//!    largest surviving blob ([`blob`], [`detector`]).
//!
//! The detector never retains the frame and keeps no history between calls.

pub mod blob;
pub mod color;
pub mod detector;
pub mod mask;

use std::time::Instant;

use image::RgbImage;
use thiserror::Error;

pub use blob::Blob;
pub use color::HsvRange;
pub use detector::{DetectError, DetectorConfig, DotDetector};

/// One camera frame: an owned RGB buffer plus its capture time.
///
/// Frames are passed by reference into the detector and dropped by the
/// control loop after each cycle.
pub struct Frame {
    /// Pixel data, 8-bit RGB.
    pub image: RgbImage,
    /// Capture timestamp, also used as the PID sample time for the cycle.
    pub captured_at: Instant,
}

impl Frame {
    /// Wrap an image buffer with a capture timestamp of "now".
    pub fn new(image: RgbImage) -> Self {
        Self {
            image,
            captured_at: Instant::now(),
        }
    }

    /// Frame center as `(x, y)`, the default tracking setpoint.
    pub fn center(&self) -> (f64, f64) {
        (
            self.image.width() as f64 / 2.0,
            self.image.height() as f64 / 2.0,
        )
    }
}

/// A detected target location in pixel coordinates.
///
/// Produced only when a blob passed the area acceptance band; a miss is
/// represented by `None` from [`DotDetector::detect`], never by a sentinel
/// coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DotDetection {
    /// Centroid column (pixels).
    pub x: u32,
    /// Centroid row (pixels).
    pub y: u32,
    /// Blob area in pixels (zeroth moment).
    pub area: f64,
}

/// Error produced by a frame source.
#[derive(Error, Debug)]
pub enum FrameError {
    /// The device could not deliver a frame this cycle. The control loop
    /// skips the cycle and tries again.
    #[error("frame read failed: {0}")]
    Read(String),
    /// The source has no more frames to deliver (end of a canned sequence,
    /// device unplugged). Terminates the control loop cleanly.
    #[error("frame source exhausted")]
    Exhausted,
}

/// Supplier of camera frames, polled once per control cycle.
///
/// Camera device binding lives outside this crate; tests and the mock demo
/// implement this over synthetic buffers.
pub trait FrameSource {
    /// Produce the next frame, blocking until one is available.
    fn next_frame(&mut self) -> Result<Frame, FrameError>;
}
