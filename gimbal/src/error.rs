//! Control-level errors.
//!
//! Only hardware faults and configuration problems reach this type;
//! detection misses, busy drops, failed frame reads and clock anomalies are
//! absorbed inside the cycle.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that terminate the control loop.
#[derive(Error, Debug)]
pub enum ControlError {
    /// Hardware acquisition failure or stall fault.
    #[error(transparent)]
    Hardware(#[from] hardware::HardwareError),

    /// Detector configuration was invalid.
    #[error(transparent)]
    Detector(#[from] vision::DetectError),

    /// The configuration file could not be read.
    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        /// Offending path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file could not be parsed.
    #[error("failed to parse config {path}: {source}")]
    ConfigParse {
        /// Offending path.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },
}
