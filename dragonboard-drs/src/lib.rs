//! dragonboard-drs: Dragon board stream framing and decoding.
//!
//! Dragon board readout files are plain concatenations of frames with no
//! container and no length field. This crate recovers frame boundaries from
//! the header markers, parses both firmware header layouts and de-interleaves
//! the DRS4 sample block into a [`dragonboard_core::Frame`].
//!
//! # Key Components
//!
//! - [`FrameSynchronizer`] - finds the frame length from two marker occurrences
//! - [`HeaderLayout`] - firmware-specific header parsing and encoding
//! - [`FrameDecoder`] - pull decoder yielding one frame per call
//! - [`FrameWriter`] - encoder for synthetic streams
//!
//! # Decoding
//!
//! 1. Read and validate the header at the current position
//! 2. Synchronize: locate this frame's marker and the next one
//! 3. Derive the capture length from the frame size
//! 4. De-interleave the sample block

mod config;
mod decoder;
mod error;
pub mod layout;
pub mod sync;
mod writer;

pub use config::DecoderConfig;
pub use decoder::{probe_layout, read_frames, FrameDecoder};
pub use error::{Error, Result};
pub use layout::{HeaderLayout, BYTES_PER_POSITION, MAX_CAPTURE_LENGTH};
pub use sync::FrameSynchronizer;
pub use writer::{encode_frame, FrameWriter};

// Re-export core types for convenience
pub use dragonboard_core::{Frame, FrameHeader, Gain, HeaderCounters, SampleTable, StopCells};
