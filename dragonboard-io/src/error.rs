//! I/O error types.

use thiserror::Error;

/// Result type for I/O operations.
pub type Result<T> = std::result::Result<T, Error>;

/// I/O error types.
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// There is no frame before the current one.
    #[error("already at the first frame")]
    AtFirstFrame,

    /// Stream decoding error.
    #[error("decoding error: {0}")]
    Decode(#[from] dragonboard_drs::Error),

    /// Calibration error.
    #[error("calibration error: {0}")]
    Calibration(#[from] dragonboard_calib::Error),

    /// Core library error.
    #[error("core error: {0}")]
    Core(#[from] dragonboard_core::Error),
}
