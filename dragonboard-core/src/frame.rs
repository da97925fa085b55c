//! Version-agnostic frame model.
//!
//! A [`Frame`] is one decoded readout event: its header, the de-interleaved
//! sample table and the elapsed time since each sampled capacitor was last
//! written. Both tables share the [`WindowTable`] layout, indexed by
//! `[channel][gain]` and holding `capture_length` values per row.

use crate::error::{Error, Result};
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Number of physical pixel channels on the board.
pub const NUM_CHANNELS: usize = 8;

/// Number of gain paths digitized per channel.
pub const NUM_GAINS: usize = 2;

/// Seconds per tick of the single free-running clock of firmware v5.1.05.
pub const CLOCK_TICK_SECONDS: f64 = 7.5e-9;

/// Frequency of the authoritative timestamp counter of firmware v5.1.0B.
pub const COUNTER_133MHZ_HZ: f64 = 133e6;

/// Gain path of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Gain {
    /// High-gain path.
    High,
    /// Low-gain path.
    Low,
}

impl Gain {
    /// Both gains in table order.
    pub const ALL: [Gain; NUM_GAINS] = [Gain::High, Gain::Low];

    /// Row index of this gain within a channel.
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Gain::High => 0,
            Gain::Low => 1,
        }
    }

    /// Lowercase name, as used in constant tables.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Gain::High => "high",
            Gain::Low => "low",
        }
    }
}

impl fmt::Display for Gain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-channel, per-gain ring-buffer address at which the capture window starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StopCells(pub [[u16; NUM_GAINS]; NUM_CHANNELS]);

impl StopCells {
    /// Uses the same stop cell for every channel and gain.
    #[must_use]
    pub fn uniform(cell: u16) -> Self {
        Self([[cell; NUM_GAINS]; NUM_CHANNELS])
    }

    /// Stop cell of one channel and gain.
    ///
    /// # Panics
    /// Panics if `channel >= NUM_CHANNELS`.
    #[inline]
    #[must_use]
    pub fn get(&self, channel: usize, gain: Gain) -> usize {
        usize::from(self.0[channel][gain.index()])
    }

    /// Sets the stop cell of one channel and gain.
    pub fn set(&mut self, channel: usize, gain: Gain, cell: u16) {
        self.0[channel][gain.index()] = cell;
    }

    /// Largest stop cell in the block.
    #[must_use]
    pub fn max(&self) -> usize {
        self.0
            .iter()
            .flatten()
            .copied()
            .max()
            .map_or(0, usize::from)
    }
}

/// Layout-specific counter fields of a frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum HeaderCounters {
    /// Firmware v5.1.05: one 64-bit clock counter.
    Clock {
        /// Raw clock ticks.
        clock: u64,
    },
    /// Firmware v5.1.0B: PPS, 10 MHz and 133 MHz counters plus flag bytes.
    Counters {
        /// Pulse-per-second counter.
        pps: u16,
        /// 10 MHz counter.
        counter_10mhz: u32,
        /// 133 MHz counter, the authoritative timestamp.
        counter_133mhz: u64,
        /// Raw flag bytes following the marker.
        flags: [u8; 16],
    },
}

/// Decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FrameHeader {
    /// Monotonic event counter.
    pub event_counter: u32,
    /// Trigger counter.
    pub trigger_counter: u32,
    /// Layout-specific counters.
    pub counters: HeaderCounters,
    /// Capture window start per channel and gain.
    pub stop_cells: StopCells,
}

impl FrameHeader {
    /// Frame timestamp in seconds.
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn timestamp_seconds(&self) -> f64 {
        match self.counters {
            HeaderCounters::Clock { clock } => clock as f64 * CLOCK_TICK_SECONDS,
            HeaderCounters::Counters { counter_133mhz, .. } => {
                counter_133mhz as f64 / COUNTER_133MHZ_HZ
            }
        }
    }
}

/// Table of `capture_length` values per channel and gain.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WindowTable<T> {
    capture_length: usize,
    data: Vec<T>,
}

/// Raw or corrected ADC samples.
pub type SampleTable = WindowTable<i16>;

/// Seconds since each sampled capacitor was last written; NaN when unknown.
pub type ElapsedTable = WindowTable<f64>;

impl<T: Clone> WindowTable<T> {
    /// Creates a table with every entry set to `value`.
    #[must_use]
    pub fn filled(capture_length: usize, value: T) -> Self {
        Self {
            capture_length,
            data: vec![value; NUM_CHANNELS * NUM_GAINS * capture_length],
        }
    }
}

impl ElapsedTable {
    /// A table where every elapsed time is unknown.
    #[must_use]
    pub fn unknown(capture_length: usize) -> Self {
        Self::filled(capture_length, f64::NAN)
    }
}

impl<T> WindowTable<T> {
    /// Wraps channel-major, gain-minor data.
    ///
    /// # Errors
    /// Returns [`Error::ShapeMismatch`] if `data` does not hold exactly
    /// `NUM_CHANNELS * NUM_GAINS * capture_length` values.
    pub fn from_vec(capture_length: usize, data: Vec<T>) -> Result<Self> {
        let rows = NUM_CHANNELS * NUM_GAINS;
        if data.len() != rows * capture_length {
            return Err(Error::ShapeMismatch {
                expected: capture_length,
                actual: data.len() / rows,
            });
        }
        Ok(Self {
            capture_length,
            data,
        })
    }

    /// Number of values per channel and gain.
    #[inline]
    #[must_use]
    pub fn capture_length(&self) -> usize {
        self.capture_length
    }

    #[inline]
    fn row_start(&self, channel: usize, gain: Gain) -> usize {
        assert!(channel < NUM_CHANNELS, "channel {channel} out of range");
        (channel * NUM_GAINS + gain.index()) * self.capture_length
    }

    /// Row of one channel and gain.
    ///
    /// # Panics
    /// Panics if `channel >= NUM_CHANNELS`.
    #[must_use]
    pub fn get(&self, channel: usize, gain: Gain) -> &[T] {
        let start = self.row_start(channel, gain);
        &self.data[start..start + self.capture_length]
    }

    /// Mutable row of one channel and gain.
    ///
    /// # Panics
    /// Panics if `channel >= NUM_CHANNELS`.
    pub fn get_mut(&mut self, channel: usize, gain: Gain) -> &mut [T] {
        let start = self.row_start(channel, gain);
        let len = self.capture_length;
        &mut self.data[start..start + len]
    }

    /// Iterates rows as `(channel, gain, row)`.
    pub fn rows(&self) -> impl Iterator<Item = (usize, Gain, &[T])> + '_ {
        (0..NUM_CHANNELS).flat_map(move |channel| {
            Gain::ALL
                .into_iter()
                .map(move |gain| (channel, gain, self.get(channel, gain)))
        })
    }

    /// All values, channel-major.
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Consumes the table, returning its values.
    #[must_use]
    pub fn into_vec(self) -> Vec<T> {
        self.data
    }
}

/// One decoded readout event.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Frame {
    /// Decoded header.
    pub header: FrameHeader,
    /// ADC samples per channel and gain.
    pub samples: SampleTable,
    /// Elapsed time since each sampled cell was last written.
    pub elapsed_since_last_write: ElapsedTable,
}

impl Frame {
    /// Creates a frame whose elapsed times are still unknown.
    #[must_use]
    pub fn new(header: FrameHeader, samples: SampleTable) -> Self {
        let elapsed_since_last_write = ElapsedTable::unknown(samples.capture_length());
        Self {
            header,
            samples,
            elapsed_since_last_write,
        }
    }

    /// Number of samples captured per channel and gain.
    #[inline]
    #[must_use]
    pub fn capture_length(&self) -> usize {
        self.samples.capture_length()
    }

    /// Frame timestamp in seconds.
    #[must_use]
    pub fn timestamp_seconds(&self) -> f64 {
        self.header.timestamp_seconds()
    }

    /// Stop cell of one channel and gain.
    #[must_use]
    pub fn stop_cell(&self, channel: usize, gain: Gain) -> usize {
        self.header.stop_cells.get(channel, gain)
    }

    /// Attaches recency data.
    ///
    /// # Errors
    /// Returns [`Error::ShapeMismatch`] if the capture lengths differ.
    pub fn with_elapsed(mut self, elapsed: ElapsedTable) -> Result<Self> {
        check_shape(self.capture_length(), elapsed.capture_length())?;
        self.elapsed_since_last_write = elapsed;
        Ok(self)
    }

    /// A new frame with the same header and recency data but other samples.
    ///
    /// # Errors
    /// Returns [`Error::ShapeMismatch`] if the capture lengths differ.
    pub fn with_samples(&self, samples: SampleTable) -> Result<Self> {
        check_shape(self.capture_length(), samples.capture_length())?;
        Ok(Self {
            header: self.header,
            samples,
            elapsed_since_last_write: self.elapsed_since_last_write.clone(),
        })
    }
}

fn check_shape(expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(Error::ShapeMismatch { expected, actual })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn header(counters: HeaderCounters) -> FrameHeader {
        FrameHeader {
            event_counter: 1,
            trigger_counter: 1,
            counters,
            stop_cells: StopCells::default(),
        }
    }

    #[test]
    fn test_timestamp_conversion() {
        let a = header(HeaderCounters::Clock { clock: 1_000_000 });
        assert_relative_eq!(a.timestamp_seconds(), 7.5e-3);

        let b = header(HeaderCounters::Counters {
            pps: 0,
            counter_10mhz: 0,
            counter_133mhz: 133_000_000,
            flags: [0; 16],
        });
        assert_relative_eq!(b.timestamp_seconds(), 1.0);
    }

    #[test]
    fn test_window_table_rows() {
        let mut table = WindowTable::filled(3, 0i16);
        table.get_mut(5, Gain::Low).copy_from_slice(&[1, 2, 3]);

        assert_eq!(table.get(5, Gain::Low), &[1, 2, 3]);
        assert_eq!(table.get(5, Gain::High), &[0, 0, 0]);
        assert_eq!(table.rows().count(), NUM_CHANNELS * NUM_GAINS);
        assert_eq!(table.as_slice().len(), 48);
    }

    #[test]
    fn test_window_table_from_vec_checks_length() {
        assert!(WindowTable::from_vec(2, vec![0i16; 32]).is_ok());
        assert_eq!(
            WindowTable::from_vec(2, vec![0i16; 30]),
            Err(Error::ShapeMismatch {
                expected: 2,
                actual: 1
            })
        );
    }

    #[test]
    fn test_frame_with_elapsed_shape() {
        let frame = Frame::new(
            header(HeaderCounters::Clock { clock: 0 }),
            SampleTable::filled(4, 0),
        );
        assert!(frame.elapsed_since_last_write.as_slice().iter().all(|v| v.is_nan()));
        assert!(frame.clone().with_elapsed(ElapsedTable::unknown(5)).is_err());
        assert!(frame.with_elapsed(ElapsedTable::filled(4, 1.0)).is_ok());
    }

    #[test]
    fn test_gain_order() {
        assert_eq!(Gain::ALL.map(Gain::index), [0, 1]);
        assert_eq!(Gain::Low.to_string(), "low");
    }
}
