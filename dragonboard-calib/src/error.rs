//! Calibration error types.

use dragonboard_core::Gain;
use std::fmt;
use thiserror::Error;

/// Result type for calibration operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Composite key of one calibration constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConstantKey {
    /// Physical channel.
    pub channel: usize,
    /// Gain path.
    pub gain: Gain,
    /// Physical cell.
    pub cell: usize,
    /// Position within the capture window, for grid tables.
    pub position: Option<usize>,
}

impl fmt::Display for ConstantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "channel {} gain {} cell {}",
            self.channel, self.gain, self.cell
        )?;
        if let Some(position) = self.position {
            write!(f, " position {position}")?;
        }
        Ok(())
    }
}

/// Calibration errors.
#[derive(Error, Debug)]
pub enum Error {
    /// A constant table does not cover a key its stage needs.
    #[error("missing calibration constant in {table}: {key}")]
    MissingCalibrationConstant {
        /// Table name.
        table: &'static str,
        /// First uncovered key.
        key: ConstantKey,
    },

    /// A constant table lists the same key twice.
    #[error("duplicate calibration constant in {table}: {key}")]
    DuplicateCalibrationConstant {
        /// Table name.
        table: &'static str,
        /// Repeated key.
        key: ConstantKey,
    },

    /// A record lies outside the table geometry.
    #[error("invalid calibration table: {0}")]
    InvalidTable(String),

    /// The pipeline configuration is contradictory.
    #[error("configuration error: {0}")]
    Config(String),

    /// JSON parse error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Core library error.
    #[error("core error: {0}")]
    Core(#[from] dragonboard_core::Error),
}
