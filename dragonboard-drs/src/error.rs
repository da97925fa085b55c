//! Stream decoding error types.

use thiserror::Error;

/// Result type for stream decoding.
pub type Result<T> = std::result::Result<T, Error>;

/// Stream decoding errors.
///
/// Running out of bytes before a full header is not an error; decoders
/// report it as `Ok(None)`.
#[derive(Error, Debug)]
pub enum Error {
    /// The frame marker was not found twice within the lookahead window.
    #[error(
        "framing error at byte {position}: marker found {found} time(s) in {window} byte lookahead"
    )]
    Framing {
        /// Stream offset the search started from.
        position: u64,
        /// Number of marker occurrences found.
        found: usize,
        /// Lookahead window size in bytes.
        window: usize,
    },

    /// Magic or marker bytes did not match, or the frame geometry is invalid.
    #[error("header format error: {0}")]
    HeaderFormat(String),

    /// No known header layout decodes the first frame.
    #[error("no known header layout matches the stream")]
    UnknownLayout,

    /// Configuration could not be parsed.
    #[error("configuration error: {0}")]
    Config(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Core library error.
    #[error("core error: {0}")]
    Core(#[from] dragonboard_core::Error),
}
