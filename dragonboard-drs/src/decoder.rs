//! Frame decoder.

use crate::config::DecoderConfig;
use crate::layout::{deinterleave, HeaderLayout};
use crate::sync::FrameSynchronizer;
use crate::{Error, Result};
use dragonboard_core::Frame;
use log::{debug, warn};
use std::io::{ErrorKind, Read, Seek, SeekFrom};

/// Decodes consecutive frames from a byte stream.
///
/// The frame length is re-synchronized at every frame; the last frame of a
/// stream, which has no successor marker, reuses the length of the frame
/// before it.
///
/// As an [`Iterator`] the decoder stops after the first error; decoding
/// errors are not recoverable at the same stream position.
#[derive(Debug)]
pub struct FrameDecoder<R> {
    reader: R,
    sync: FrameSynchronizer,
    last_frame_size: Option<usize>,
    failed: bool,
}

impl<R: Read + Seek> FrameDecoder<R> {
    /// Creates a decoder for a known layout.
    pub fn new(reader: R, layout: HeaderLayout) -> Self {
        Self::with_synchronizer(reader, FrameSynchronizer::new(layout))
    }

    /// Creates a decoder with a custom synchronizer.
    pub fn with_synchronizer(reader: R, sync: FrameSynchronizer) -> Self {
        Self {
            reader,
            sync,
            last_frame_size: None,
            failed: false,
        }
    }

    /// Creates a decoder from a configuration, probing the layout if unset.
    ///
    /// # Errors
    /// Returns [`Error::UnknownLayout`] if probing fails.
    pub fn with_config(mut reader: R, config: &DecoderConfig) -> Result<Self> {
        let layout = match config.layout {
            Some(layout) => layout,
            None => probe_layout(&mut reader, config.lookahead_factor)?,
        };
        let sync = FrameSynchronizer::with_lookahead_factor(layout, config.lookahead_factor);
        Ok(Self::with_synchronizer(reader, sync))
    }

    /// Creates a decoder for whichever layout decodes the first frame.
    ///
    /// # Errors
    /// Returns [`Error::UnknownLayout`] if no layout matches.
    pub fn probe(reader: R) -> Result<Self> {
        Self::with_config(reader, &DecoderConfig::default())
    }

    /// Header layout of the stream.
    pub fn layout(&self) -> HeaderLayout {
        self.sync.layout()
    }

    /// Size of the most recently decoded frame.
    pub fn last_frame_size(&self) -> Option<usize> {
        self.last_frame_size
    }

    /// Current byte offset in the stream.
    ///
    /// # Errors
    /// Returns [`Error::Io`] if the position cannot be queried.
    pub fn position(&mut self) -> Result<u64> {
        Ok(self.reader.stream_position()?)
    }

    /// Moves to a byte offset, which should be a frame start.
    ///
    /// Iteration resumes from there even after an error.
    ///
    /// # Errors
    /// Returns [`Error::Io`] if seeking fails.
    pub fn seek_to(&mut self, offset: u64) -> Result<()> {
        self.reader.seek(SeekFrom::Start(offset))?;
        self.failed = false;
        Ok(())
    }

    /// Returns the underlying reader.
    pub fn get_ref(&self) -> &R {
        &self.reader
    }

    /// Consumes the decoder, returning the underlying reader.
    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Decodes the frame at the current position.
    ///
    /// Returns `Ok(None)` at the end of the stream: when fewer bytes than a
    /// header remain, or when the last frame is truncated. In both cases the
    /// position is left at the start of the incomplete frame.
    ///
    /// # Errors
    /// Returns [`Error::HeaderFormat`] for magic, marker or geometry
    /// violations and [`Error::Framing`] if the frame length cannot be
    /// determined.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        let layout = self.layout();
        let start = self.reader.stream_position()?;

        let mut header_bytes = vec![0u8; layout.header_size()];
        if !read_full(&mut self.reader, &mut header_bytes)? {
            self.reader.seek(SeekFrom::Start(start))?;
            return Ok(None);
        }
        let header = layout.parse_header(&header_bytes)?;

        self.reader.seek(SeekFrom::Start(start))?;
        let frame_size = match self.sync.frame_size(&mut self.reader) {
            Ok(size) => size,
            Err(Error::Framing { found: 1, .. }) if self.last_frame_size.is_some() => {
                let size = self.last_frame_size.unwrap_or_default();
                debug!("frame at byte {start} has no successor, reusing size {size}");
                size
            }
            Err(err) => return Err(err),
        };
        let capture_length = layout.capture_length(frame_size)?;

        self.reader
            .seek(SeekFrom::Start(start + layout.header_size() as u64))?;
        let mut block = vec![0u8; frame_size - layout.header_size()];
        if !read_full(&mut self.reader, &mut block)? {
            warn!("dropping truncated frame at byte {start} (expected {frame_size} bytes)");
            self.reader.seek(SeekFrom::Start(start))?;
            return Ok(None);
        }
        let samples = deinterleave(&block, capture_length)?;

        if self.last_frame_size != Some(frame_size) {
            debug!("frame size {frame_size} bytes, capture length {capture_length}");
        }
        self.last_frame_size = Some(frame_size);
        Ok(Some(Frame::new(header, samples)))
    }
}

impl<R: Read + Seek> Iterator for FrameDecoder<R> {
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

/// Fills `buf` completely; returns `false` if the stream ends first.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<bool> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == ErrorKind::UnexpectedEof => Ok(false),
        Err(err) => Err(err.into()),
    }
}

/// Finds the header layout that decodes the first frame without error.
///
/// Layouts are tried in [`HeaderLayout::ALL`] order. The read position is
/// restored afterwards.
///
/// # Errors
/// Returns [`Error::UnknownLayout`] if no layout matches, or [`Error::Io`]
/// if the position cannot be restored.
pub fn probe_layout<R: Read + Seek>(reader: &mut R, lookahead_factor: f64) -> Result<HeaderLayout> {
    let start = reader.stream_position()?;
    for layout in HeaderLayout::ALL {
        let sync = FrameSynchronizer::with_lookahead_factor(layout, lookahead_factor);
        let result = FrameDecoder::with_synchronizer(&mut *reader, sync).next_frame();
        reader.seek(SeekFrom::Start(start))?;
        match result {
            Ok(Some(_)) => {
                debug!("probed header layout {layout:?}");
                return Ok(layout);
            }
            Ok(None) => debug!("layout {layout:?}: stream too short"),
            Err(err) => debug!("layout {layout:?} rejected: {err}"),
        }
    }
    Err(Error::UnknownLayout)
}

/// Reads every frame of a stream.
///
/// # Errors
/// Returns the first decoding error.
pub fn read_frames<R: Read + Seek>(reader: R, layout: HeaderLayout) -> Result<Vec<Frame>> {
    FrameDecoder::new(reader, layout).collect()
}
