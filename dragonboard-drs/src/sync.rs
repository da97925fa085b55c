//! Frame synchronization.
//!
//! Dragon board streams carry no length field. The frame length is the
//! distance between two consecutive header markers, searched for in a
//! lookahead window larger than the largest possible frame.

use crate::layout::{HeaderLayout, BYTES_PER_POSITION};
use crate::{Error, Result};
use std::io::{Read, Seek, SeekFrom};

/// Default lookahead as a multiple of the largest possible frame.
pub const DEFAULT_LOOKAHEAD_FACTOR: f64 = 1.5;

/// Finds frame boundaries by locating the layout's marker twice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSynchronizer {
    layout: HeaderLayout,
    lookahead: usize,
}

impl FrameSynchronizer {
    /// A synchronizer with the default lookahead.
    #[must_use]
    pub fn new(layout: HeaderLayout) -> Self {
        Self::with_lookahead_factor(layout, DEFAULT_LOOKAHEAD_FACTOR)
    }

    /// A synchronizer reading `factor` times the largest frame size ahead.
    ///
    /// The lookahead never drops below one maximum frame plus one header,
    /// the least that can contain two markers.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    #[must_use]
    pub fn with_lookahead_factor(layout: HeaderLayout, factor: f64) -> Self {
        let minimum = layout.max_frame_size() + layout.header_size();
        let scaled = (layout.max_frame_size() as f64 * factor).ceil();
        let lookahead = if scaled.is_finite() && scaled > minimum as f64 {
            scaled as usize
        } else {
            minimum
        };
        Self { layout, lookahead }
    }

    /// Header layout whose marker is searched for.
    #[must_use]
    pub fn layout(&self) -> HeaderLayout {
        self.layout
    }

    /// Lookahead window in bytes.
    #[must_use]
    pub fn lookahead(&self) -> usize {
        self.lookahead
    }

    /// Determines the length of the frame starting at the reader's position.
    ///
    /// Reads at most one lookahead window and restores the read position
    /// before returning, whether or not synchronization succeeded.
    ///
    /// # Errors
    /// Returns [`Error::Framing`] if the marker does not occur twice within
    /// the window, or [`Error::Io`] if reading or seeking fails.
    pub fn frame_size<R: Read + Seek>(&self, reader: &mut R) -> Result<usize> {
        let position = reader.stream_position()?;

        let mut chunk = Vec::with_capacity(self.lookahead);
        let read = reader
            .by_ref()
            .take(self.lookahead as u64)
            .read_to_end(&mut chunk);
        reader.seek(SeekFrom::Start(position))?;
        read?;

        self.frame_size_in(&chunk).map_err(|found| Error::Framing {
            position,
            found,
            window: self.lookahead,
        })
    }

    /// Determines the frame length from an in-memory chunk starting at a
    /// frame start.
    ///
    /// The first marker must sit at the layout's marker offset. A later
    /// marker only ends the frame if it lies a whole number of capture
    /// positions away and the bytes around it form a valid header; header
    /// counters or sample words that happen to contain marker bytes are
    /// skipped.
    ///
    /// On failure returns the number of markers found.
    pub fn frame_size_in(&self, chunk: &[u8]) -> std::result::Result<usize, usize> {
        let marker = self.layout.marker();
        let marker_offset = self.layout.marker_offset();
        let header_size = self.layout.header_size();

        if chunk.get(marker_offset..marker_offset + marker.len()) != Some(marker) {
            return Err(0);
        }

        // No frame is shorter than its header
        let mut from = marker_offset + header_size;
        while let Some(hit) = find(chunk, marker, from) {
            let size = hit - marker_offset;
            if (size - header_size) % BYTES_PER_POSITION == 0
                && self.layout.is_frame_start(&chunk[size..])
            {
                return Ok(size);
            }
            from = hit + 1;
        }
        Err(1)
    }
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|offset| from + offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::FrameWriter;
    use dragonboard_core::{Frame, FrameHeader, HeaderCounters, SampleTable, StopCells};
    use std::io::Cursor;

    fn counter_frames(counters: &[u64], sample: i16) -> Vec<u8> {
        let mut writer = FrameWriter::new(Vec::new(), HeaderLayout::B);
        for (event, &counter_133mhz) in (0u32..).zip(counters) {
            let header = FrameHeader {
                event_counter: event,
                trigger_counter: event,
                counters: HeaderCounters::Counters {
                    pps: 0,
                    counter_10mhz: 0,
                    counter_133mhz,
                    flags: [0; 16],
                },
                stop_cells: StopCells::uniform(7),
            };
            writer
                .write_frame(&Frame::new(header, SampleTable::filled(16, sample)))
                .unwrap();
        }
        writer.into_inner()
    }

    fn fake_frames(layout: HeaderLayout, count: usize, capture_length: usize) -> Vec<u8> {
        let size = layout.frame_size(capture_length);
        let mut data = vec![0u8; size * count];
        for i in 0..count {
            let offset = i * size + layout.marker_offset();
            data[offset..offset + layout.marker().len()].copy_from_slice(layout.marker());
        }
        data
    }

    #[test]
    fn test_find() {
        assert_eq!(find(b"abcabc", b"bc", 0), Some(1));
        assert_eq!(find(b"abcabc", b"bc", 2), Some(4));
        assert_eq!(find(b"abc", b"bc", 10), None);
    }

    #[test]
    fn test_lookahead_default() {
        let sync = FrameSynchronizer::new(HeaderLayout::B);
        assert_eq!(sync.lookahead(), 196_704);
        // Too small a factor is clamped to what can hold two markers
        let sync = FrameSynchronizer::with_lookahead_factor(HeaderLayout::A, 0.1);
        assert_eq!(
            sync.lookahead(),
            HeaderLayout::A.max_frame_size() + HeaderLayout::A.header_size()
        );
    }

    #[test]
    fn test_frame_size_restores_position() {
        let data = fake_frames(HeaderLayout::A, 3, 16);
        let mut cursor = Cursor::new(data);
        cursor.set_position(560);

        let sync = FrameSynchronizer::new(HeaderLayout::A);
        assert_eq!(sync.frame_size(&mut cursor).unwrap(), 48 + 16 * 32);
        assert_eq!(cursor.position(), 560);
    }

    #[test]
    fn test_frame_start_is_anchored() {
        let sync = FrameSynchronizer::new(HeaderLayout::B);
        let size = HeaderLayout::B.frame_size(16);

        // Byte 23 of each header is 0xdd, directly before the marker
        let data = counter_frames(&[0x1dd, 0x2dd, 0x3dd], 0);
        assert_eq!(sync.frame_size_in(&data), Ok(size));
        assert_eq!(sync.frame_size_in(&data[size..]), Ok(size));

        // Only the following header ends in 0xdd
        let data = counter_frames(&[0x100, 0x1dd], 0);
        assert_eq!(sync.frame_size_in(&data), Ok(size));

        // Not positioned at a frame start
        assert_eq!(sync.frame_size_in(&data[1..]), Err(0));
    }

    #[test]
    fn test_marker_bytes_in_samples_are_skipped() {
        let sync = FrameSynchronizer::new(HeaderLayout::B);
        // 0xdddd in every sample word
        let data = counter_frames(&[0x100, 0x200], i16::from_be_bytes([0xdd, 0xdd]));
        assert_eq!(sync.frame_size_in(&data), Ok(HeaderLayout::B.frame_size(16)));

        let sync = FrameSynchronizer::new(HeaderLayout::A);
        let mut data = fake_frames(HeaderLayout::A, 2, 16);
        for frame in data.chunks_exact_mut(HeaderLayout::A.frame_size(16)) {
            frame[48..].copy_from_slice(&[0xf0, 0x02].repeat(256));
        }
        assert_eq!(sync.frame_size_in(&data), Ok(HeaderLayout::A.frame_size(16)));
    }

    #[test]
    fn test_single_marker_is_framing_error() {
        let data = fake_frames(HeaderLayout::B, 1, 16);
        let mut cursor = Cursor::new(data);
        let sync = FrameSynchronizer::new(HeaderLayout::B);

        let err = sync.frame_size(&mut cursor).unwrap_err();
        assert!(matches!(err, Error::Framing { found: 1, .. }));
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn test_unknown_format_is_framing_error() {
        let mut cursor = Cursor::new(vec![0x55u8; 4096]);
        let sync = FrameSynchronizer::new(HeaderLayout::B);
        assert!(matches!(
            sync.frame_size(&mut cursor),
            Err(Error::Framing { found: 0, .. })
        ));
    }
}
