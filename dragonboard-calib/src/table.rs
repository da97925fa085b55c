//! Calibration constant tables.
//!
//! Tables are dense over the full `(channel, gain, cell)` key space of the
//! board, so lookups are plain indexing. Construction from records fails on
//! the first key that is not covered; NaN values are allowed and stand for
//! constants the fit could not determine.
//!
//! On disk a table is a JSON array of records. JSON `null` reads as NaN and
//! NaN is written back as `null`:
//!
//! ```json
//! [
//!   { "channel": 0, "gain": "high", "cell": 0, "a": 1.3, "b": -0.38, "c": 0.4 },
//!   { "channel": 0, "gain": "high", "cell": 1, "a": null, "b": null, "c": null }
//! ]
//! ```

use crate::error::{ConstantKey, Error, Result};
use dragonboard_core::{Gain, NUM_CHANNELS, NUM_GAINS, TOTAL_CELLS};
use log::info;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

const CELLS_PER_BOARD: usize = NUM_CHANNELS * NUM_GAINS * TOTAL_CELLS;

fn nan() -> f64 {
    f64::NAN
}

fn nullable_f64<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

/// Fitted power-law parameters of one cell: `a * dt^b + c`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerLaw {
    /// Amplitude.
    pub a: f64,
    /// Exponent.
    pub b: f64,
    /// Constant term.
    pub c: f64,
}

impl PowerLaw {
    /// Offset at elapsed time `dt` including the constant term.
    ///
    /// A non-finite result falls back to `c`, and to 0 if `c` is not finite
    /// either.
    #[must_use]
    pub fn offset(&self, dt: f64) -> f64 {
        let offset = self.a * dt.powf(self.b) + self.c;
        if offset.is_finite() {
            offset
        } else if self.c.is_finite() {
            self.c
        } else {
            0.0
        }
    }

    /// Offset at elapsed time `dt` without the constant term; 0 if not finite.
    #[must_use]
    pub fn offset_without_constant(&self, dt: f64) -> f64 {
        let offset = self.a * dt.powf(self.b);
        if offset.is_finite() {
            offset
        } else {
            0.0
        }
    }
}

/// One record of a static offset table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OffsetRecord {
    pub channel: usize,
    pub gain: Gain,
    pub cell: usize,
    #[serde(deserialize_with = "nullable_f64")]
    pub offset: f64,
}

/// One record of a power-law fit table. `c` may be omitted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PowerLawRecord {
    pub channel: usize,
    pub gain: Gain,
    pub cell: usize,
    #[serde(deserialize_with = "nullable_f64")]
    pub a: f64,
    #[serde(deserialize_with = "nullable_f64")]
    pub b: f64,
    #[serde(default = "nan", deserialize_with = "nullable_f64")]
    pub c: f64,
}

/// One record of a per-position grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridRecord {
    pub channel: usize,
    pub gain: Gain,
    pub cell: usize,
    pub position: usize,
    #[serde(deserialize_with = "nullable_f64")]
    pub value: f64,
}

fn check_range(table: &'static str, channel: usize, cell: usize) -> Result<()> {
    if channel >= NUM_CHANNELS || cell >= TOTAL_CELLS {
        return Err(Error::InvalidTable(format!(
            "{table}: channel {channel} cell {cell} outside {NUM_CHANNELS} channels x {TOTAL_CELLS} cells"
        )));
    }
    Ok(())
}

#[inline]
fn cell_index(channel: usize, gain: Gain, cell: usize) -> usize {
    assert!(
        channel < NUM_CHANNELS && cell < TOTAL_CELLS,
        "channel {channel} cell {cell} out of range"
    );
    (channel * NUM_GAINS + gain.index()) * TOTAL_CELLS + cell
}

fn key_of(index: usize) -> (usize, Gain, usize) {
    let cell = index % TOTAL_CELLS;
    let row = index / TOTAL_CELLS;
    (row / NUM_GAINS, Gain::ALL[row % NUM_GAINS], cell)
}

/// One value per physical cell of every channel and gain.
#[derive(Debug, Clone, PartialEq)]
pub struct CellTable<T> {
    data: Vec<T>,
}

impl<T: Clone> CellTable<T> {
    /// Table with every cell set to `value`.
    #[must_use]
    pub fn filled(value: T) -> Self {
        Self {
            data: vec![value; CELLS_PER_BOARD],
        }
    }
}

impl<T> CellTable<T> {
    /// Builds a table that must cover every key exactly once.
    ///
    /// # Errors
    /// Returns [`Error::InvalidTable`] for out-of-range keys,
    /// [`Error::DuplicateCalibrationConstant`] for repeated keys and
    /// [`Error::MissingCalibrationConstant`] for the first uncovered key.
    pub fn from_entries<I>(table: &'static str, entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (usize, Gain, usize, T)>,
    {
        let mut slots: Vec<Option<T>> = std::iter::repeat_with(|| None)
            .take(CELLS_PER_BOARD)
            .collect();

        for (channel, gain, cell, value) in entries {
            check_range(table, channel, cell)?;
            let slot = &mut slots[cell_index(channel, gain, cell)];
            if slot.is_some() {
                return Err(Error::DuplicateCalibrationConstant {
                    table,
                    key: ConstantKey {
                        channel,
                        gain,
                        cell,
                        position: None,
                    },
                });
            }
            *slot = Some(value);
        }

        let data = slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.ok_or_else(|| {
                    let (channel, gain, cell) = key_of(index);
                    Error::MissingCalibrationConstant {
                        table,
                        key: ConstantKey {
                            channel,
                            gain,
                            cell,
                            position: None,
                        },
                    }
                })
            })
            .collect::<Result<Vec<T>>>()?;
        Ok(Self { data })
    }

    /// Value of one cell.
    ///
    /// # Panics
    /// Panics if `channel` or `cell` is out of range.
    #[inline]
    #[must_use]
    pub fn get(&self, channel: usize, gain: Gain, cell: usize) -> &T {
        &self.data[cell_index(channel, gain, cell)]
    }

    /// Overwrites the value of one cell.
    ///
    /// # Panics
    /// Panics if `channel` or `cell` is out of range.
    pub fn set(&mut self, channel: usize, gain: Gain, cell: usize, value: T) {
        self.data[cell_index(channel, gain, cell)] = value;
    }
}

impl CellTable<f64> {
    /// Builds a static offset table from records.
    ///
    /// # Errors
    /// See [`CellTable::from_entries`].
    pub fn from_offset_records(table: &'static str, records: &[OffsetRecord]) -> Result<Self> {
        Self::from_entries(
            table,
            records.iter().map(|r| (r.channel, r.gain, r.cell, r.offset)),
        )
    }

    /// Loads a static offset table from a JSON file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or does not cover every cell.
    pub fn load_offsets<P: AsRef<Path>>(path: P) -> Result<Self> {
        let records: Vec<OffsetRecord> = read_records(&path)?;
        let table = Self::from_offset_records("static offsets", &records)?;
        info!(
            "loaded {} static offsets from {}",
            records.len(),
            path.as_ref().display()
        );
        Ok(table)
    }
}

impl CellTable<PowerLaw> {
    /// Builds a power-law table from records.
    ///
    /// # Errors
    /// See [`CellTable::from_entries`].
    pub fn from_power_law_records(table: &'static str, records: &[PowerLawRecord]) -> Result<Self> {
        Self::from_entries(
            table,
            records.iter().map(|r| {
                (
                    r.channel,
                    r.gain,
                    r.cell,
                    PowerLaw {
                        a: r.a,
                        b: r.b,
                        c: r.c,
                    },
                )
            }),
        )
    }

    /// Loads a power-law table from a JSON file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or does not cover every cell.
    pub fn load_power_law<P: AsRef<Path>>(path: P) -> Result<Self> {
        let records: Vec<PowerLawRecord> = read_records(&path)?;
        let table = Self::from_power_law_records("power-law fits", &records)?;
        info!(
            "loaded {} power-law fits from {}",
            records.len(),
            path.as_ref().display()
        );
        Ok(table)
    }
}

/// Values per physical cell and position within the capture window.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionGrid {
    width: usize,
    data: Vec<f64>,
}

impl PositionGrid {
    /// Grid of `width` positions with every entry set to `value`.
    ///
    /// # Panics
    /// Panics if `width` is zero.
    #[must_use]
    pub fn filled(width: usize, value: f64) -> Self {
        assert!(width > 0, "grid width must be positive");
        Self {
            width,
            data: vec![value; CELLS_PER_BOARD * width],
        }
    }

    /// Builds a grid from records covering every key and position.
    ///
    /// The width is taken from `width` or, if `None`, from the largest
    /// position in the records.
    ///
    /// # Errors
    /// Returns [`Error::InvalidTable`] for an empty grid or out-of-range keys,
    /// [`Error::DuplicateCalibrationConstant`] for repeated keys and
    /// [`Error::MissingCalibrationConstant`] for the first uncovered key.
    pub fn from_records(
        table: &'static str,
        width: Option<usize>,
        records: &[GridRecord],
    ) -> Result<Self> {
        let width = match width {
            Some(width) => width,
            None => records.iter().map(|r| r.position + 1).max().unwrap_or(0),
        };
        if width == 0 {
            return Err(Error::InvalidTable(format!("{table}: grid has no positions")));
        }

        let mut data = vec![f64::NAN; CELLS_PER_BOARD * width];
        let mut seen = vec![false; data.len()];
        for r in records {
            check_range(table, r.channel, r.cell)?;
            if r.position >= width {
                return Err(Error::InvalidTable(format!(
                    "{table}: position {} outside grid of width {width}",
                    r.position
                )));
            }
            let index = cell_index(r.channel, r.gain, r.cell) * width + r.position;
            if seen[index] {
                return Err(Error::DuplicateCalibrationConstant {
                    table,
                    key: ConstantKey {
                        channel: r.channel,
                        gain: r.gain,
                        cell: r.cell,
                        position: Some(r.position),
                    },
                });
            }
            seen[index] = true;
            data[index] = r.value;
        }

        if let Some(index) = seen.iter().position(|covered| !covered) {
            let (channel, gain, cell) = key_of(index / width);
            return Err(Error::MissingCalibrationConstant {
                table,
                key: ConstantKey {
                    channel,
                    gain,
                    cell,
                    position: Some(index % width),
                },
            });
        }
        Ok(Self { width, data })
    }

    /// Loads a grid from a JSON file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or the grid is incomplete.
    pub fn load<P: AsRef<Path>>(table: &'static str, path: P, width: Option<usize>) -> Result<Self> {
        let records: Vec<GridRecord> = read_records(&path)?;
        let grid = Self::from_records(table, width, &records)?;
        info!(
            "loaded {table} grid with {} positions from {}",
            grid.width,
            path.as_ref().display()
        );
        Ok(grid)
    }

    /// Number of positions per cell.
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Value at one cell and position; `None` beyond the grid width.
    ///
    /// # Panics
    /// Panics if `channel` or `cell` is out of range.
    #[inline]
    #[must_use]
    pub fn get(&self, channel: usize, gain: Gain, cell: usize, position: usize) -> Option<f64> {
        (position < self.width)
            .then(|| self.data[cell_index(channel, gain, cell) * self.width + position])
    }

    /// Overwrites one entry.
    ///
    /// # Panics
    /// Panics if any index is out of range.
    pub fn set(&mut self, channel: usize, gain: Gain, cell: usize, position: usize, value: f64) {
        assert!(position < self.width, "position {position} out of range");
        self.data[cell_index(channel, gain, cell) * self.width + position] = value;
    }
}

/// Reads a JSON array of records.
///
/// # Errors
/// Returns an error if the file cannot be opened or parsed.
pub fn read_records<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<Vec<T>> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}
