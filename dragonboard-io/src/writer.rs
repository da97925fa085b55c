//! File writer for Dragon board streams.

use crate::Result;
use dragonboard_core::Frame;
use dragonboard_drs::{FrameWriter, HeaderLayout};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Writes frames to a file in one header layout.
///
/// Used to produce synthetic runs, e.g. pedestal files with known noise.
#[derive(Debug)]
pub struct DragonFileWriter {
    writer: FrameWriter<BufWriter<File>>,
}

impl DragonFileWriter {
    /// Creates a new file writer.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P, layout: HeaderLayout) -> Result<Self> {
        let file = File::create(path)?;
        let writer = FrameWriter::new(BufWriter::new(file), layout);
        Ok(Self { writer })
    }

    /// Header layout being written.
    #[must_use]
    pub fn layout(&self) -> HeaderLayout {
        self.writer.layout()
    }

    /// Number of frames written so far.
    #[must_use]
    pub fn frames_written(&self) -> usize {
        self.writer.frames_written()
    }

    /// Writes one frame.
    ///
    /// # Errors
    /// Returns an error if the frame cannot be encoded or written.
    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.writer.write_frame(frame)?;
        Ok(())
    }

    /// Writes frames and flushes.
    ///
    /// # Errors
    /// Returns the first encoding or write error.
    pub fn write_frames(&mut self, frames: &[Frame]) -> Result<()> {
        for frame in frames {
            self.writer.write_frame(frame)?;
        }
        self.flush()
    }

    /// Flushes the writer.
    ///
    /// # Errors
    /// Returns an error if flushing fails.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
