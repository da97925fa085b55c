//! Frame encoder.
//!
//! Produces byte streams in either header layout, e.g. to create synthetic
//! pedestal data with known properties.

use crate::layout::{interleave, HeaderLayout};
use crate::Result;
use dragonboard_core::Frame;
use std::io::Write;

/// Encodes one frame.
///
/// # Errors
/// Returns [`crate::Error::HeaderFormat`] if the header cannot be
/// represented in `layout`.
pub fn encode_frame(layout: HeaderLayout, frame: &Frame) -> Result<Vec<u8>> {
    let mut bytes = layout.encode_header(&frame.header)?;
    bytes.extend_from_slice(&interleave(&frame.samples));
    Ok(bytes)
}

/// Writes frames to a byte sink in one layout.
#[derive(Debug)]
pub struct FrameWriter<W: Write> {
    writer: W,
    layout: HeaderLayout,
    frames_written: usize,
}

impl<W: Write> FrameWriter<W> {
    /// Creates a writer.
    pub fn new(writer: W, layout: HeaderLayout) -> Self {
        Self {
            writer,
            layout,
            frames_written: 0,
        }
    }

    /// Header layout being written.
    pub fn layout(&self) -> HeaderLayout {
        self.layout
    }

    /// Number of frames written so far.
    pub fn frames_written(&self) -> usize {
        self.frames_written
    }

    /// Encodes and writes one frame.
    ///
    /// # Errors
    /// Returns an error if the frame cannot be encoded or written.
    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        let bytes = encode_frame(self.layout, frame)?;
        self.writer.write_all(&bytes)?;
        self.frames_written += 1;
        Ok(())
    }

    /// Flushes the sink.
    ///
    /// # Errors
    /// Returns an error if flushing fails.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Consumes the writer, returning the sink.
    pub fn into_inner(self) -> W {
        self.writer
    }
}
