//! Error types for dragonboard-core.

use thiserror::Error;

/// Result type alias for dragonboard operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A physical cell outside the capacitor ring was passed to the translator.
    #[error("cell {cell} is outside the capacitor ring [0, {total_cells})")]
    AddressRange { cell: usize, total_cells: usize },

    /// Two tables that must share a shape do not.
    #[error("shape mismatch: expected capture length {expected}, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    /// A statistic needs more samples than were accumulated.
    #[error("{statistic} is undefined for {count} sample(s)")]
    NotEnoughSamples {
        statistic: &'static str,
        count: u64,
    },
}
