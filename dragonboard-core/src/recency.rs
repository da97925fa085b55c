//! Readout recency tracking.
//!
//! A DRS4 capacitor's baseline depends on how long ago it was last read.
//! [`ReadoutRecencyTracker`] keeps, for every channel, gain and physical cell,
//! the timestamp of the last frame that digitized it, and turns that into an
//! elapsed time for every sample of the next frame.
//!
//! Frames must be observed in forward stream order. After any backward jump
//! the caller invalidates the tracker; the next observation then reports
//! unknown (NaN) elapsed times for its whole window.

use crate::cell::CapacitorRing;
use crate::error::{Error, Result};
use crate::frame::{ElapsedTable, Frame, Gain, NUM_CHANNELS, NUM_GAINS};

/// Tracker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackerState {
    /// Elapsed times are computed from the stored history.
    #[default]
    Tracking,
    /// The next observation reports unknown elapsed times, then tracking resumes.
    InvalidatedOnce,
}

/// Last write timestamp of every physical cell, per channel and gain.
///
/// NaN marks a cell that was never written in this session.
#[derive(Debug, Clone, PartialEq)]
pub struct RingBufferState {
    ring: CapacitorRing,
    last_write: Vec<f64>,
}

impl RingBufferState {
    /// A state where no cell has been written yet.
    #[must_use]
    pub fn new(ring: CapacitorRing) -> Self {
        Self {
            ring,
            last_write: vec![f64::NAN; NUM_CHANNELS * NUM_GAINS * ring.total_cells()],
        }
    }

    #[inline]
    fn index(&self, channel: usize, gain: Gain, cell: usize) -> usize {
        (channel * NUM_GAINS + gain.index()) * self.ring.total_cells() + cell
    }

    /// Last write timestamp of one cell.
    ///
    /// # Errors
    /// Returns [`Error::AddressRange`] if `cell` is outside the ring.
    ///
    /// # Panics
    /// Panics if `channel` is not below [`NUM_CHANNELS`].
    pub fn last_write(&self, channel: usize, gain: Gain, cell: usize) -> Result<f64> {
        if cell >= self.ring.total_cells() {
            return Err(Error::AddressRange {
                cell,
                total_cells: self.ring.total_cells(),
            });
        }
        Ok(self.last_write[self.index(channel, gain, cell)])
    }

    /// Forgets every stored timestamp.
    pub fn clear(&mut self) {
        self.last_write.fill(f64::NAN);
    }
}

/// Computes the time since each sampled capacitor was last digitized.
///
/// One tracker belongs to exactly one stream; independent streams use
/// independent trackers.
#[derive(Debug, Clone)]
pub struct ReadoutRecencyTracker {
    state: TrackerState,
    buffer: RingBufferState,
}

impl Default for ReadoutRecencyTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadoutRecencyTracker {
    /// A tracker for the DRS4 ring.
    #[must_use]
    pub fn new() -> Self {
        Self::with_ring(CapacitorRing::DRS4)
    }

    /// A tracker for a ring of custom size.
    #[must_use]
    pub fn with_ring(ring: CapacitorRing) -> Self {
        Self {
            state: TrackerState::Tracking,
            buffer: RingBufferState::new(ring),
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> TrackerState {
        self.state
    }

    /// Stored history.
    #[must_use]
    pub fn buffer(&self) -> &RingBufferState {
        &self.buffer
    }

    /// Marks the history unreliable for the next observation.
    ///
    /// Call this after any non-sequential move of the underlying stream.
    pub fn invalidate_once(&mut self) {
        self.state = TrackerState::InvalidatedOnce;
    }

    /// Forgets all history and resumes tracking.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.state = TrackerState::Tracking;
    }

    /// Returns the elapsed time since the last write of every sampled cell
    /// and records this frame's timestamp for those cells.
    ///
    /// Cells never written before yield NaN, and so do cells whose stored
    /// write is not older than this frame, which happens for cells read
    /// ahead of a backward jump. While invalidated, every value is NaN; the
    /// history is still updated and tracking resumes afterwards.
    ///
    /// # Errors
    /// Returns [`Error::AddressRange`] if a stop cell lies outside the ring
    /// and [`Error::ShapeMismatch`] if the capture window is larger than it.
    pub fn observe(&mut self, frame: &Frame) -> Result<ElapsedTable> {
        let ring = self.buffer.ring;
        let capture_length = frame.capture_length();
        if capture_length > ring.total_cells() {
            return Err(Error::ShapeMismatch {
                expected: ring.total_cells(),
                actual: capture_length,
            });
        }
        let max_stop_cell = frame.header.stop_cells.max();
        if max_stop_cell >= ring.total_cells() {
            return Err(Error::AddressRange {
                cell: max_stop_cell,
                total_cells: ring.total_cells(),
            });
        }

        let invalidated = self.state == TrackerState::InvalidatedOnce;
        let now = frame.timestamp_seconds();
        let mut elapsed = ElapsedTable::unknown(capture_length);

        for channel in 0..NUM_CHANNELS {
            for gain in Gain::ALL {
                let stop_cell = frame.stop_cell(channel, gain);
                let row = elapsed.get_mut(channel, gain);
                for (sample, cell) in ring.window_cells(stop_cell, capture_length).enumerate() {
                    let slot = self.buffer.index(channel, gain, cell);
                    let since = now - self.buffer.last_write[slot];
                    // Also rejects NaN history
                    if !invalidated && since > 0.0 {
                        row[sample] = since;
                    }
                    self.buffer.last_write[slot] = now;
                }
            }
        }

        self.state = TrackerState::Tracking;
        Ok(elapsed)
    }
}
