//! The dot detector: mask, filter, centroid.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

use crate::blob::find_blobs;
use crate::color::HsvRange;
use crate::mask::{close, color_mask, open};
use crate::{DotDetection, Frame};

/// Detector configuration validation errors.
#[derive(Error, Debug)]
pub enum DetectError {
    /// At least one HSV range is required, at most two (a wrapped hue band).
    #[error("expected 1 or 2 HSV ranges, got {0}")]
    BadRangeCount(usize),

    /// A range has a lower bound above its upper bound.
    #[error("HSV range {index} has inverted bounds")]
    InvertedRange {
        /// Index of the offending range.
        index: usize,
    },

    /// The area acceptance band is empty or inverted.
    #[error("area band ({min}, {max}) is empty")]
    EmptyAreaBand {
        /// Configured minimum area.
        min: f64,
        /// Configured maximum area.
        max: f64,
    },
}

/// Tunable parameters for color-based dot detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// One HSV band, or two when the hue wraps the zero point (red).
    pub ranges: Vec<HsvRange>,
    /// Exclusive lower bound of the blob area acceptance band, in pixels.
    pub min_area: f64,
    /// Exclusive upper bound of the blob area acceptance band, in pixels.
    pub max_area: f64,
    /// Apply an open-then-close pass before blob extraction.
    pub morphology: bool,
    /// Structuring element side length for the morphology pass.
    pub kernel_size: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        // Red laser dot: the hue band wraps zero, so two ranges.
        Self {
            ranges: vec![
                HsvRange::new([0, 120, 70], [10, 255, 255]),
                HsvRange::new([170, 120, 70], [179, 255, 255]),
            ],
            min_area: 1.0,
            max_area: 50.0,
            morphology: false,
            kernel_size: 3,
        }
    }
}

impl DetectorConfig {
    fn validate(&self) -> Result<(), DetectError> {
        if self.ranges.is_empty() || self.ranges.len() > 2 {
            return Err(DetectError::BadRangeCount(self.ranges.len()));
        }
        for (index, range) in self.ranges.iter().enumerate() {
            if !range.is_well_formed() {
                return Err(DetectError::InvertedRange { index });
            }
        }
        if self.min_area >= self.max_area {
            return Err(DetectError::EmptyAreaBand {
                min: self.min_area,
                max: self.max_area,
            });
        }
        Ok(())
    }
}

/// Stateless per-frame target detector.
pub struct DotDetector {
    config: DetectorConfig,
}

impl DotDetector {
    /// Build a detector, validating the configuration up front.
    pub fn new(config: DetectorConfig) -> Result<Self, DetectError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Configured parameters.
    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Locate the target dot in one frame.
    ///
    /// Returns `None` when no blob falls strictly inside the area band, or
    /// when the surviving blob is degenerate (zero area moment). Among
    /// qualifying blobs the largest wins; equal areas fall back to mask scan
    /// order.
    pub fn detect(&self, frame: &Frame) -> Option<DotDetection> {
        let mut mask = color_mask(&frame.image, &self.config.ranges);
        if self.config.morphology {
            mask = close(&open(&mask, self.config.kernel_size), self.config.kernel_size);
        }

        let mut best: Option<crate::Blob> = None;
        for blob in find_blobs(&mask) {
            if blob.area <= self.config.min_area || blob.area >= self.config.max_area {
                continue;
            }
            // Strictly-larger keeps the first-encountered blob on ties.
            if best.map_or(true, |b| blob.area > b.area) {
                best = Some(blob);
            }
        }

        let blob = best?;
        let (cx, cy) = blob.centroid()?;
        let hit = DotDetection {
            x: cx as u32,
            y: cy as u32,
            area: blob.area,
        };
        trace!(x = hit.x, y = hit.y, area = hit.area, "dot detected");
        Some(hit)
    }
}
