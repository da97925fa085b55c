//! Frame navigation with recency tracking.

use crate::{Error, Result};
use dragonboard_core::{Frame, ReadoutRecencyTracker};
use dragonboard_drs::{DecoderConfig, FrameDecoder, HeaderLayout};
use log::debug;
use std::io::{Read, Seek};

/// Decodes frames and attaches the elapsed time since each sampled cell was
/// last written.
///
/// Forward reading keeps the tracker history exact. [`FrameStream::previous`]
/// jumps back one frame and invalidates the tracker, so the frame it returns
/// carries unknown (NaN) elapsed times; tracking resumes with the next frame.
///
/// Iteration ends after the first error.
#[derive(Debug)]
pub struct FrameStream<R> {
    decoder: FrameDecoder<R>,
    tracker: ReadoutRecencyTracker,
    /// Start offset of every frame decoded so far.
    offsets: Vec<u64>,
    /// Number of the next frame to decode.
    next_index: usize,
    max_frames: Option<usize>,
    failed: bool,
}

impl<R: Read + Seek> FrameStream<R> {
    /// Creates a stream over a known layout.
    pub fn new(reader: R, layout: HeaderLayout) -> Self {
        Self::from_decoder(FrameDecoder::new(reader, layout))
    }

    /// Creates a stream from a decoder configuration, probing the layout if unset.
    ///
    /// # Errors
    /// Returns an error if probing fails.
    pub fn with_config(reader: R, config: &DecoderConfig) -> Result<Self> {
        let mut stream = Self::from_decoder(FrameDecoder::with_config(reader, config)?);
        stream.max_frames = config.max_frames;
        Ok(stream)
    }

    /// Wraps an existing decoder positioned at a frame start.
    pub fn from_decoder(decoder: FrameDecoder<R>) -> Self {
        Self {
            decoder,
            tracker: ReadoutRecencyTracker::new(),
            offsets: Vec::new(),
            next_index: 0,
            max_frames: None,
            failed: false,
        }
    }

    /// Limits how many frames the stream yields.
    #[must_use]
    pub fn with_max_frames(mut self, max_frames: usize) -> Self {
        self.max_frames = Some(max_frames);
        self
    }

    /// Header layout of the stream.
    pub fn layout(&self) -> HeaderLayout {
        self.decoder.layout()
    }

    /// Number of the frame returned last, counting from 0.
    pub fn current_index(&self) -> Option<usize> {
        self.next_index.checked_sub(1)
    }

    /// Recency tracker of this stream.
    pub fn tracker(&self) -> &ReadoutRecencyTracker {
        &self.tracker
    }

    /// Decodes the next frame and attaches its recency data.
    ///
    /// Returns `Ok(None)` at the end of the stream or once `max_frames`
    /// frames have been read.
    ///
    /// # Errors
    /// Returns decoding errors from the underlying decoder.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.max_frames.is_some_and(|max| self.next_index >= max) {
            return Ok(None);
        }

        let start = self.decoder.position()?;
        let Some(frame) = self.decoder.next_frame()? else {
            return Ok(None);
        };

        if self.next_index == self.offsets.len() {
            self.offsets.push(start);
        }
        self.next_index += 1;

        let elapsed = self.tracker.observe(&frame)?;
        Ok(Some(frame.with_elapsed(elapsed)?))
    }

    /// Re-decodes the frame before the one returned last.
    ///
    /// # Errors
    /// Returns [`Error::AtFirstFrame`] if fewer than two frames were read.
    pub fn previous(&mut self) -> Result<Frame> {
        let target = match self.next_index.checked_sub(2) {
            Some(target) => target,
            None => return Err(Error::AtFirstFrame),
        };
        let offset = self.offsets[target];
        debug!("jumping back to frame {target} at byte {offset}");

        self.decoder.seek_to(offset)?;
        self.next_index = target;
        self.failed = false;
        self.tracker.invalidate_once();

        self.next_frame()?.ok_or(Error::AtFirstFrame)
    }

    /// Consumes the stream, returning the decoder.
    pub fn into_decoder(self) -> FrameDecoder<R> {
        self.decoder
    }
}

impl<R: Read + Seek> Iterator for FrameStream<R> {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let item = self.next_frame().transpose();
        self.failed = matches!(item, Some(Err(_)));
        item
    }
}
