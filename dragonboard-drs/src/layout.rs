//! Dragon board header layouts and sample block (de)interleaving.
//!
//! Two firmware generations are supported. All fields are big-endian.
//!
//! Layout A (firmware v5.1.05), 48 bytes:
//!
//! | offset | size | field |
//! |-------:|-----:|-------|
//! | 0  | 4  | event counter |
//! | 4  | 4  | trigger counter |
//! | 8  | 8  | clock (7.5 ns ticks) |
//! | 16 | 16 | stop cells, DRS4 chip order |
//! | 32 | 16 | marker `f0 02` x 8 |
//!
//! Layout B (firmware v5.1.0B), 64 bytes:
//!
//! | offset | size | field |
//! |-------:|-----:|-------|
//! | 0  | 2  | magic `0xAAAA` |
//! | 2  | 2  | PPS counter |
//! | 4  | 4  | 10 MHz counter |
//! | 8  | 4  | event counter |
//! | 12 | 4  | trigger counter |
//! | 16 | 8  | 133 MHz counter |
//! | 24 | 8  | marker `dd` x 8 |
//! | 32 | 16 | flags |
//! | 48 | 16 | stop cells, DRS4 chip order |

use crate::{Error, Result};
use dragonboard_core::{
    FrameHeader, Gain, HeaderCounters, SampleTable, StopCells, NUM_CHANNELS, NUM_GAINS,
    TOTAL_CELLS,
};
use serde::{Deserialize, Serialize};

/// Bytes per ADC sample.
pub const ADC_WORD_SIZE: usize = 2;

/// Bytes of sample data per capture position (all channels and gains).
pub const BYTES_PER_POSITION: usize = ADC_WORD_SIZE * NUM_GAINS * NUM_CHANNELS;

/// Largest capture window the DRS4 can read out.
pub const MAX_CAPTURE_LENGTH: usize = TOTAL_CELLS;

const MARKER_A: [u8; 16] = [
    0xf0, 0x02, 0xf0, 0x02, 0xf0, 0x02, 0xf0, 0x02, 0xf0, 0x02, 0xf0, 0x02, 0xf0, 0x02, 0xf0,
    0x02,
];
const MARKER_B: [u8; 8] = [0xdd; 8];
const MAGIC_B: u16 = 0xaaaa;
const STOP_CELL_BLOCK_SIZE: usize = 2 * NUM_CHANNELS;

/// Header layout of a Dragon board stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HeaderLayout {
    /// Firmware v5.1.05: single clock counter, marker after the stop cells.
    #[serde(rename = "v5_1_05", alias = "a", alias = "A")]
    A,
    /// Firmware v5.1.0B: magic, PPS/10 MHz/133 MHz counters, marker before the stop cells.
    #[serde(rename = "v5_1_0B", alias = "b", alias = "B")]
    B,
}

impl HeaderLayout {
    /// Layouts in probing order.
    pub const ALL: [HeaderLayout; 2] = [HeaderLayout::B, HeaderLayout::A];

    /// Header size in bytes.
    #[must_use]
    pub const fn header_size(self) -> usize {
        match self {
            HeaderLayout::A => 48,
            HeaderLayout::B => 64,
        }
    }

    /// Marker bytes used for synchronization.
    #[must_use]
    pub const fn marker(self) -> &'static [u8] {
        match self {
            HeaderLayout::A => &MARKER_A,
            HeaderLayout::B => &MARKER_B,
        }
    }

    /// Offset of the marker from the frame start.
    #[must_use]
    pub const fn marker_offset(self) -> usize {
        match self {
            HeaderLayout::A => 32,
            HeaderLayout::B => 24,
        }
    }

    const fn stop_cell_offset(self) -> usize {
        match self {
            HeaderLayout::A => 16,
            HeaderLayout::B => 48,
        }
    }

    /// Frame size in bytes for a capture window of `capture_length` samples.
    #[must_use]
    pub const fn frame_size(self, capture_length: usize) -> usize {
        self.header_size() + capture_length * BYTES_PER_POSITION
    }

    /// Largest possible frame size.
    #[must_use]
    pub const fn max_frame_size(self) -> usize {
        self.frame_size(MAX_CAPTURE_LENGTH)
    }

    /// Capture length implied by a frame size.
    ///
    /// # Errors
    /// Returns [`Error::HeaderFormat`] if the sample block does not divide
    /// evenly into capture positions or the result is outside `1..=4096`.
    pub fn capture_length(self, frame_size: usize) -> Result<usize> {
        let body = frame_size.checked_sub(self.header_size()).ok_or_else(|| {
            Error::HeaderFormat(format!(
                "frame size {frame_size} is smaller than the {} byte header",
                self.header_size()
            ))
        })?;
        if body % BYTES_PER_POSITION != 0 {
            return Err(Error::HeaderFormat(format!(
                "sample block of {body} bytes is not a multiple of {BYTES_PER_POSITION}"
            )));
        }
        let capture_length = body / BYTES_PER_POSITION;
        if capture_length == 0 || capture_length > MAX_CAPTURE_LENGTH {
            return Err(Error::HeaderFormat(format!(
                "capture length {capture_length} outside 1..={MAX_CAPTURE_LENGTH}"
            )));
        }
        Ok(capture_length)
    }

    /// Whether `bytes` start with a header of this layout.
    ///
    /// A header cut short by the end of `bytes` is judged on the magic
    /// alone, which layout A does not have.
    #[must_use]
    pub fn is_frame_start(self, bytes: &[u8]) -> bool {
        if bytes.len() >= self.header_size() {
            return self.parse_header(bytes).is_ok();
        }
        match self {
            HeaderLayout::A => true,
            HeaderLayout::B => bytes.len() >= 2 && read_u16(bytes, 0) == MAGIC_B,
        }
    }

    /// Parses and validates a header.
    ///
    /// # Errors
    /// Returns [`Error::HeaderFormat`] if `bytes` is too short, the magic or
    /// marker does not match, or a stop cell lies outside the ring.
    pub fn parse_header(self, bytes: &[u8]) -> Result<FrameHeader> {
        if bytes.len() < self.header_size() {
            return Err(Error::HeaderFormat(format!(
                "header needs {} bytes, got {}",
                self.header_size(),
                bytes.len()
            )));
        }

        let marker_range = self.marker_offset()..self.marker_offset() + self.marker().len();
        if &bytes[marker_range.clone()] != self.marker() {
            return Err(Error::HeaderFormat(format!(
                "marker {:02x?} does not match expected {:02x?}",
                &bytes[marker_range],
                self.marker()
            )));
        }

        let stop_cells = parse_stop_cells(&bytes[self.stop_cell_offset()..])?;

        let header = match self {
            HeaderLayout::A => FrameHeader {
                event_counter: read_u32(bytes, 0),
                trigger_counter: read_u32(bytes, 4),
                counters: HeaderCounters::Clock {
                    clock: read_u64(bytes, 8),
                },
                stop_cells,
            },
            HeaderLayout::B => {
                let magic = read_u16(bytes, 0);
                if magic != MAGIC_B {
                    return Err(Error::HeaderFormat(format!(
                        "magic {magic:#06x} is not {MAGIC_B:#06x}"
                    )));
                }
                let mut flags = [0u8; 16];
                flags.copy_from_slice(&bytes[32..48]);
                FrameHeader {
                    event_counter: read_u32(bytes, 8),
                    trigger_counter: read_u32(bytes, 12),
                    counters: HeaderCounters::Counters {
                        pps: read_u16(bytes, 2),
                        counter_10mhz: read_u32(bytes, 4),
                        counter_133mhz: read_u64(bytes, 16),
                        flags,
                    },
                    stop_cells,
                }
            }
        };
        Ok(header)
    }

    /// Encodes a header.
    ///
    /// # Errors
    /// Returns [`Error::HeaderFormat`] if the header counters belong to the
    /// other layout or paired channels do not share stop cells.
    pub fn encode_header(self, header: &FrameHeader) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.header_size());
        let stop_cells = encode_stop_cells(&header.stop_cells)?;

        match (self, header.counters) {
            (HeaderLayout::A, HeaderCounters::Clock { clock }) => {
                out.extend_from_slice(&header.event_counter.to_be_bytes());
                out.extend_from_slice(&header.trigger_counter.to_be_bytes());
                out.extend_from_slice(&clock.to_be_bytes());
                out.extend_from_slice(&stop_cells);
                out.extend_from_slice(&MARKER_A);
            }
            (
                HeaderLayout::B,
                HeaderCounters::Counters {
                    pps,
                    counter_10mhz,
                    counter_133mhz,
                    flags,
                },
            ) => {
                out.extend_from_slice(&MAGIC_B.to_be_bytes());
                out.extend_from_slice(&pps.to_be_bytes());
                out.extend_from_slice(&counter_10mhz.to_be_bytes());
                out.extend_from_slice(&header.event_counter.to_be_bytes());
                out.extend_from_slice(&header.trigger_counter.to_be_bytes());
                out.extend_from_slice(&counter_133mhz.to_be_bytes());
                out.extend_from_slice(&MARKER_B);
                out.extend_from_slice(&flags);
                out.extend_from_slice(&stop_cells);
            }
            (layout, counters) => {
                return Err(Error::HeaderFormat(format!(
                    "layout {layout:?} cannot encode counters {counters:?}"
                )));
            }
        }
        Ok(out)
    }
}

#[inline]
fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([bytes[offset], bytes[offset + 1]])
}

#[inline]
fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_be_bytes(buf)
}

#[inline]
fn read_u64(bytes: &[u8], offset: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[offset..offset + 8]);
    u64::from_be_bytes(buf)
}

/// Maps the DRS4 chip-order block onto channels.
///
/// Entry `2k` is the high-gain and entry `2k + 1` the low-gain stop cell of
/// the chip serving channels `2k` and `2k + 1`.
fn parse_stop_cells(block: &[u8]) -> Result<StopCells> {
    let mut stop_cells = StopCells::default();
    for pair in (0..NUM_CHANNELS).step_by(2) {
        let high = read_u16(block, 2 * pair);
        let low = read_u16(block, 2 * (pair + 1));
        for cell in [high, low] {
            if usize::from(cell) >= TOTAL_CELLS {
                return Err(Error::HeaderFormat(format!(
                    "stop cell {cell} outside [0, {TOTAL_CELLS})"
                )));
            }
        }
        for channel in [pair, pair + 1] {
            stop_cells.set(channel, Gain::High, high);
            stop_cells.set(channel, Gain::Low, low);
        }
    }
    Ok(stop_cells)
}

fn encode_stop_cells(stop_cells: &StopCells) -> Result<[u8; STOP_CELL_BLOCK_SIZE]> {
    let mut block = [0u8; STOP_CELL_BLOCK_SIZE];
    for pair in (0..NUM_CHANNELS).step_by(2) {
        for gain in Gain::ALL {
            let cell = stop_cells.0[pair][gain.index()];
            if cell != stop_cells.0[pair + 1][gain.index()] {
                return Err(Error::HeaderFormat(format!(
                    "channels {pair} and {} must share the {gain} stop cell",
                    pair + 1
                )));
            }
            let offset = 2 * (pair + gain.index());
            block[offset..offset + 2].copy_from_slice(&cell.to_be_bytes());
        }
    }
    Ok(block)
}

/// Position of a value in the interleaved sample block.
///
/// The block splits into two halves; even channels read from the first and
/// odd channels from the second. Within a half, each capture position holds
/// eight words: high and low gain alternating for each channel pair.
#[inline]
fn interleaved_index(channel: usize, gain: Gain, sample: usize, capture_length: usize) -> usize {
    let half = (channel % 2) * (NUM_CHANNELS * capture_length);
    let pair = channel - channel % 2;
    half + sample * NUM_CHANNELS + pair + gain.index()
}

/// De-interleaves a big-endian sample block.
///
/// # Errors
/// Returns [`Error::HeaderFormat`] if `block` is not exactly
/// `capture_length * BYTES_PER_POSITION` bytes.
pub fn deinterleave(block: &[u8], capture_length: usize) -> Result<SampleTable> {
    if block.len() != capture_length * BYTES_PER_POSITION {
        return Err(Error::HeaderFormat(format!(
            "sample block of {} bytes does not hold {capture_length} positions",
            block.len()
        )));
    }

    let words: Vec<i16> = block
        .chunks_exact(ADC_WORD_SIZE)
        .map(|word| i16::from_be_bytes([word[0], word[1]]))
        .collect();

    let mut table = SampleTable::filled(capture_length, 0);
    for channel in 0..NUM_CHANNELS {
        for gain in Gain::ALL {
            let row = table.get_mut(channel, gain);
            for (sample, value) in row.iter_mut().enumerate() {
                *value = words[interleaved_index(channel, gain, sample, capture_length)];
            }
        }
    }
    Ok(table)
}

/// Interleaves a sample table into the big-endian wire block.
#[must_use]
pub fn interleave(samples: &SampleTable) -> Vec<u8> {
    let capture_length = samples.capture_length();
    let mut words = vec![0i16; capture_length * NUM_CHANNELS * NUM_GAINS];
    for (channel, gain, row) in samples.rows() {
        for (sample, &value) in row.iter().enumerate() {
            words[interleaved_index(channel, gain, sample, capture_length)] = value;
        }
    }
    words.iter().flat_map(|word| word.to_be_bytes()).collect()
}
