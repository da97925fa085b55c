//! Capacitor ring addressing.
//!
//! Translates between a sample's position within a frame's capture window and
//! the physical DRS4 cell it was stored in. The window starts at the stop
//! cell and wraps around the end of the ring.

use crate::error::{Error, Result};

/// Number of capacitors in the DRS4 ring.
pub const TOTAL_CELLS: usize = 4096;

/// Geometry of a capacitor ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacitorRing {
    total_cells: usize,
}

impl Default for CapacitorRing {
    fn default() -> Self {
        Self::DRS4
    }
}

impl CapacitorRing {
    /// The 4096-cell DRS4 ring.
    pub const DRS4: Self = Self {
        total_cells: TOTAL_CELLS,
    };

    /// A ring with a custom number of cells.
    ///
    /// # Panics
    /// Panics if `total_cells` is zero.
    #[must_use]
    pub fn new(total_cells: usize) -> Self {
        assert!(total_cells > 0, "a capacitor ring needs at least one cell");
        Self { total_cells }
    }

    /// Number of cells in the ring.
    #[inline]
    #[must_use]
    pub fn total_cells(&self) -> usize {
        self.total_cells
    }

    #[inline]
    fn check(&self, cell: usize) -> Result<()> {
        if cell < self.total_cells {
            Ok(())
        } else {
            Err(Error::AddressRange {
                cell,
                total_cells: self.total_cells,
            })
        }
    }

    /// Position of `cell` within the window starting at `stop_cell`.
    ///
    /// A result of `capture_length` or more means the cell was not read out.
    ///
    /// # Errors
    /// Returns [`Error::AddressRange`] if `cell` or `stop_cell` is not a
    /// valid cell address.
    #[inline]
    pub fn cell_to_sample(&self, cell: usize, stop_cell: usize) -> Result<usize> {
        self.check(cell)?;
        self.check(stop_cell)?;
        Ok((cell + self.total_cells - stop_cell) % self.total_cells)
    }

    /// Physical cell holding position `sample` of the window starting at `stop_cell`.
    ///
    /// Unlike [`CapacitorRing::cell_to_sample`] this never fails: both
    /// arguments are taken modulo the ring size, so an out-of-range
    /// `stop_cell` wraps. Validate stop cells before relying on the result.
    #[inline]
    #[must_use]
    pub fn sample_to_cell(&self, sample: usize, stop_cell: usize) -> usize {
        (sample % self.total_cells + stop_cell % self.total_cells) % self.total_cells
    }

    /// Whether `cell` was read out by a window of `capture_length` samples
    /// starting at `stop_cell`.
    ///
    /// # Errors
    /// Returns [`Error::AddressRange`] for invalid cell addresses.
    #[inline]
    pub fn cell_in_window(
        &self,
        cell: usize,
        stop_cell: usize,
        capture_length: usize,
    ) -> Result<bool> {
        Ok(self.cell_to_sample(cell, stop_cell)? < capture_length)
    }

    /// Physical cells of a whole capture window, in sample order.
    pub fn window_cells(
        &self,
        stop_cell: usize,
        capture_length: usize,
    ) -> impl Iterator<Item = usize> + '_ {
        (0..capture_length).map(move |sample| self.sample_to_cell(sample, stop_cell))
    }
}

/// [`CapacitorRing::cell_to_sample`] on the DRS4 ring.
///
/// # Errors
/// Returns [`Error::AddressRange`] if `cell` or `stop_cell` is `>= 4096`.
pub fn cell_to_sample(cell: usize, stop_cell: usize) -> Result<usize> {
    CapacitorRing::DRS4.cell_to_sample(cell, stop_cell)
}

/// [`CapacitorRing::sample_to_cell`] on the DRS4 ring; wraps out-of-range
/// arguments.
#[must_use]
pub fn sample_to_cell(sample: usize, stop_cell: usize) -> usize {
    CapacitorRing::DRS4.sample_to_cell(sample, stop_cell)
}

/// [`CapacitorRing::cell_in_window`] on the DRS4 ring.
///
/// # Errors
/// Returns [`Error::AddressRange`] if `cell` or `stop_cell` is `>= 4096`.
pub fn cell_in_window(cell: usize, stop_cell: usize, capture_length: usize) -> Result<bool> {
    CapacitorRing::DRS4.cell_in_window(cell, stop_cell, capture_length)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_to_sample() {
        assert_eq!(cell_to_sample(10, 5), Ok(5));
        // Wraps around the end of the ring
        assert_eq!(cell_to_sample(5, 4090), Ok(11));
        assert_eq!(cell_to_sample(0, 0), Ok(0));
    }

    #[test]
    fn test_cell_out_of_range() {
        assert_eq!(
            cell_to_sample(4096, 0),
            Err(Error::AddressRange {
                cell: 4096,
                total_cells: 4096
            })
        );
        assert!(cell_in_window(5000, 0, 10).is_err());
        assert!(cell_to_sample(0, 4096).is_err());
    }

    #[test]
    fn test_round_trip_all_cells() {
        for stop_cell in [0, 1, 1000, 4000, 4095] {
            for cell in 0..TOTAL_CELLS {
                let sample = cell_to_sample(cell, stop_cell).unwrap();
                assert_eq!(sample_to_cell(sample, stop_cell), cell);
            }
        }
    }

    #[test]
    fn test_window_membership() {
        let capture_length = 100;
        for stop_cell in [0, 2048, 4050] {
            for i in 0..capture_length {
                let cell = sample_to_cell(i, stop_cell);
                assert!(cell_in_window(cell, stop_cell, capture_length).unwrap());
            }
            for i in capture_length..TOTAL_CELLS {
                let cell = sample_to_cell(i, stop_cell);
                assert!(!cell_in_window(cell, stop_cell, capture_length).unwrap());
            }
        }
    }

    #[test]
    fn test_sample_to_cell_wraps_arguments() {
        assert_eq!(sample_to_cell(0, 4096), 0);
        assert_eq!(sample_to_cell(3, 4100), 7);
        assert_eq!(sample_to_cell(4097, 0), 1);
        // The strict direction rejects the same stop cell
        assert!(cell_to_sample(7, 4100).is_err());
    }

    #[test]
    fn test_window_cells_wrap() {
        let cells: Vec<usize> = CapacitorRing::DRS4.window_cells(4094, 4).collect();
        assert_eq!(cells, vec![4094, 4095, 0, 1]);
    }

    #[test]
    fn test_custom_ring() {
        let ring = CapacitorRing::new(16);
        assert_eq!(ring.cell_to_sample(2, 14), Ok(4));
        assert_eq!(ring.sample_to_cell(4, 14), 2);
        assert!(ring.cell_to_sample(16, 0).is_err());
    }
}
