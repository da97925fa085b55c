//! Correction models.
//!
//! Every model answers one question: which offset should be subtracted from
//! the sample at a given window position. Applying a model walks the frame,
//! accumulates that offset in `f64` and writes the corrected value back as a
//! rounded, saturated `i16`.

use crate::table::{CellTable, PositionGrid, PowerLaw};
use crate::Result;
use dragonboard_core::{sample_to_cell, ElapsedTable, Frame, Gain, SampleTable};

/// Default amplitude of the board-wide time-lapse power law.
pub const DEFAULT_POWER_LAW_A: f64 = 1.459_932_428_522_222_8;

/// Default exponent of the board-wide time-lapse power law.
pub const DEFAULT_POWER_LAW_B: f64 = -0.375_032_500_939_917_02;

/// Default number of leading window positions corrected by pattern subtraction.
pub const DEFAULT_PATTERN_PREFIX: usize = 11;

/// Location and recency of one sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleContext {
    /// Physical channel.
    pub channel: usize,
    /// Gain path.
    pub gain: Gain,
    /// Physical cell the sample was stored in.
    pub cell: usize,
    /// Position within the capture window.
    pub position: usize,
    /// Seconds since the cell was last written; NaN when unknown.
    pub elapsed: f64,
}

/// A correction applied to decoded frames.
pub trait CalibrationModel: Send + Sync {
    /// Model name.
    fn name(&self) -> &'static str;

    /// Offset to subtract from one sample.
    fn sample_offset(&self, sample: &SampleContext) -> f64;

    /// Returns a corrected copy of `frame` using the given recency data.
    ///
    /// # Errors
    /// Returns a shape mismatch if `elapsed` does not match the frame.
    fn apply(&self, frame: &Frame, elapsed: &ElapsedTable) -> Result<Frame> {
        correct(frame, elapsed, |sample| self.sample_offset(sample))
    }
}

/// Subtracts `offset` from every sample of `frame`.
///
/// # Errors
/// Returns a shape mismatch if `elapsed` does not match the frame.
pub fn correct<F>(frame: &Frame, elapsed: &ElapsedTable, offset: F) -> Result<Frame>
where
    F: Fn(&SampleContext) -> f64,
{
    let capture_length = frame.capture_length();
    if elapsed.capture_length() != capture_length {
        return Err(dragonboard_core::Error::ShapeMismatch {
            expected: capture_length,
            actual: elapsed.capture_length(),
        }
        .into());
    }

    let mut corrected = SampleTable::filled(capture_length, 0);
    for (channel, gain, raw) in frame.samples.rows() {
        let stop_cell = frame.stop_cell(channel, gain);
        let dt = elapsed.get(channel, gain);
        let out = corrected.get_mut(channel, gain);
        for (position, (&value, slot)) in raw.iter().zip(out.iter_mut()).enumerate() {
            let sample = SampleContext {
                channel,
                gain,
                cell: sample_to_cell(position, stop_cell),
                position,
                elapsed: dt[position],
            };
            *slot = saturate(f64::from(value) - offset(&sample));
        }
    }
    Ok(frame.with_samples(corrected)?)
}

#[inline]
#[allow(clippy::cast_possible_truncation)]
fn saturate(value: f64) -> i16 {
    // `as` saturates at the i16 bounds
    value.round() as i16
}

#[inline]
fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Leaves frames unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCalibration;

impl CalibrationModel for NoCalibration {
    fn name(&self) -> &'static str {
        "NoCalibration"
    }

    fn sample_offset(&self, _sample: &SampleContext) -> f64 {
        0.0
    }
}

/// Static pedestal per physical cell.
#[derive(Debug, Clone)]
pub struct StaticOffsets {
    offsets: CellTable<f64>,
}

impl StaticOffsets {
    /// Creates the stage from a complete offset table.
    #[must_use]
    pub fn new(offsets: CellTable<f64>) -> Self {
        Self { offsets }
    }
}

impl CalibrationModel for StaticOffsets {
    fn name(&self) -> &'static str {
        "StaticOffsets"
    }

    fn sample_offset(&self, sample: &SampleContext) -> f64 {
        finite_or_zero(*self.offsets.get(sample.channel, sample.gain, sample.cell))
    }
}

#[derive(Debug, Clone)]
enum TimelapseParams {
    PerCell {
        fits: CellTable<PowerLaw>,
        constant_term: bool,
    },
    Uniform {
        a: f64,
        b: f64,
    },
}

/// Power-law time-lapse correction `a * dt^b (+ c)`.
#[derive(Debug, Clone)]
pub struct TimelapseCorrection {
    params: TimelapseParams,
}

impl TimelapseCorrection {
    /// Per-cell fits including the constant term `c`.
    #[must_use]
    pub fn per_cell(fits: CellTable<PowerLaw>) -> Self {
        Self {
            params: TimelapseParams::PerCell {
                fits,
                constant_term: true,
            },
        }
    }

    /// Per-cell fits ignoring `c`, for use with a [`WindowOffsetGrid`] that
    /// carries the remaining offset.
    #[must_use]
    pub fn per_cell_without_constant(fits: CellTable<PowerLaw>) -> Self {
        Self {
            params: TimelapseParams::PerCell {
                fits,
                constant_term: false,
            },
        }
    }

    /// One power law for every cell of the board.
    #[must_use]
    pub fn uniform(a: f64, b: f64) -> Self {
        Self {
            params: TimelapseParams::Uniform { a, b },
        }
    }
}

impl Default for TimelapseCorrection {
    fn default() -> Self {
        Self::uniform(DEFAULT_POWER_LAW_A, DEFAULT_POWER_LAW_B)
    }
}

impl CalibrationModel for TimelapseCorrection {
    fn name(&self) -> &'static str {
        match self.params {
            TimelapseParams::PerCell {
                constant_term: true,
                ..
            } => "TimelapseCorrection",
            TimelapseParams::PerCell { .. } => "TimelapseCorrectionWithoutConstant",
            TimelapseParams::Uniform { .. } => "UniformTimelapseCorrection",
        }
    }

    fn sample_offset(&self, sample: &SampleContext) -> f64 {
        match &self.params {
            TimelapseParams::PerCell {
                fits,
                constant_term,
            } => {
                let fit = fits.get(sample.channel, sample.gain, sample.cell);
                if *constant_term {
                    fit.offset(sample.elapsed)
                } else {
                    fit.offset_without_constant(sample.elapsed)
                }
            }
            TimelapseParams::Uniform { a, b } => finite_or_zero(a * sample.elapsed.powf(*b)),
        }
    }
}

/// Extra offset per physical cell and window position.
#[derive(Debug, Clone)]
pub struct WindowOffsetGrid {
    grid: PositionGrid,
}

impl WindowOffsetGrid {
    /// Creates the stage; positions beyond the grid width stay uncorrected.
    #[must_use]
    pub fn new(grid: PositionGrid) -> Self {
        Self { grid }
    }

    /// Number of corrected window positions.
    #[must_use]
    pub fn width(&self) -> usize {
        self.grid.width()
    }
}

impl CalibrationModel for WindowOffsetGrid {
    fn name(&self) -> &'static str {
        "WindowOffsetGrid"
    }

    fn sample_offset(&self, sample: &SampleContext) -> f64 {
        self.grid
            .get(sample.channel, sample.gain, sample.cell, sample.position)
            .map_or(0.0, finite_or_zero)
    }
}

/// Mean pattern subtracted from the first positions of every window.
#[derive(Debug, Clone)]
pub struct PatternSubtraction {
    pattern: PositionGrid,
    prefix: usize,
}

impl PatternSubtraction {
    /// Creates the stage covering [`DEFAULT_PATTERN_PREFIX`] positions, or
    /// fewer if the pattern is narrower.
    #[must_use]
    pub fn new(pattern: PositionGrid) -> Self {
        Self::with_prefix(pattern, DEFAULT_PATTERN_PREFIX)
    }

    /// Creates the stage covering `prefix` positions.
    #[must_use]
    pub fn with_prefix(pattern: PositionGrid, prefix: usize) -> Self {
        let prefix = prefix.min(pattern.width());
        Self { pattern, prefix }
    }

    /// Number of corrected leading positions.
    #[must_use]
    pub fn prefix(&self) -> usize {
        self.prefix
    }
}

impl CalibrationModel for PatternSubtraction {
    fn name(&self) -> &'static str {
        "PatternSubtraction"
    }

    fn sample_offset(&self, sample: &SampleContext) -> f64 {
        if sample.position >= self.prefix {
            return 0.0;
        }
        self.pattern
            .get(sample.channel, sample.gain, sample.cell, sample.position)
            .map_or(0.0, finite_or_zero)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use dragonboard_core::{FrameHeader, HeaderCounters, StopCells};

    fn frame(capture_length: usize, value: i16, stop_cell: u16) -> Frame {
        let header = FrameHeader {
            event_counter: 0,
            trigger_counter: 0,
            counters: HeaderCounters::Clock { clock: 0 },
            stop_cells: StopCells::uniform(stop_cell),
        };
        Frame::new(header, SampleTable::filled(capture_length, value))
    }

    fn context(cell: usize, position: usize, elapsed: f64) -> SampleContext {
        SampleContext {
            channel: 0,
            gain: Gain::High,
            cell,
            position,
            elapsed,
        }
    }

    #[test]
    fn test_no_calibration_is_identity() {
        let input = frame(16, 123, 4090);
        let output = NoCalibration
            .apply(&input, &input.elapsed_since_last_write)
            .unwrap();
        assert_eq!(output.samples, input.samples);
        assert_eq!(output.header, input.header);
    }

    #[test]
    fn test_static_offsets_follow_physical_cell() {
        let mut offsets = CellTable::filled(0.0);
        offsets.set(2, Gain::Low, 1, 40.0);
        let stage = StaticOffsets::new(offsets);

        // Window starting at 4090 reaches cell 1 at position 7
        let input = frame(10, 100, 4090);
        let output = stage.apply(&input, &ElapsedTable::unknown(10)).unwrap();
        assert_eq!(output.samples.get(2, Gain::Low)[7], 60);
        assert_eq!(output.samples.get(2, Gain::Low)[6], 100);
        assert_eq!(output.samples.get(2, Gain::High)[7], 100);
    }

    #[test]
    fn test_nan_offsets_leave_samples_unchanged() {
        let stage = StaticOffsets::new(CellTable::filled(f64::NAN));
        let input = frame(4, 100, 0);
        let output = stage.apply(&input, &ElapsedTable::unknown(4)).unwrap();
        assert_eq!(output.samples, input.samples);
    }

    #[test]
    fn test_timelapse_with_unknown_elapsed_uses_constant() {
        let fits = CellTable::filled(PowerLaw {
            a: 10.0,
            b: -1.0,
            c: 2.0,
        });
        let stage = TimelapseCorrection::per_cell(fits.clone());
        assert_relative_eq!(stage.sample_offset(&context(0, 0, f64::NAN)), 2.0);
        assert_relative_eq!(stage.sample_offset(&context(0, 0, 5.0)), 4.0);

        let without = TimelapseCorrection::per_cell_without_constant(fits);
        assert_relative_eq!(without.sample_offset(&context(0, 0, f64::NAN)), 0.0);
        assert_relative_eq!(without.sample_offset(&context(0, 0, 5.0)), 2.0);
    }

    #[test]
    fn test_timelapse_never_produces_nan_samples() {
        let fits = CellTable::filled(PowerLaw {
            a: f64::NAN,
            b: f64::NAN,
            c: f64::NAN,
        });
        let stage = TimelapseCorrection::per_cell(fits);
        let input = frame(8, -5, 100);
        let output = stage.apply(&input, &ElapsedTable::unknown(8)).unwrap();
        assert_eq!(output.samples, input.samples);
    }

    #[test]
    fn test_uniform_defaults() {
        let stage = TimelapseCorrection::default();
        assert_eq!(stage.name(), "UniformTimelapseCorrection");
        assert_relative_eq!(
            stage.sample_offset(&context(0, 0, 1.0)),
            DEFAULT_POWER_LAW_A
        );
        assert_relative_eq!(stage.sample_offset(&context(0, 0, f64::NAN)), 0.0);
    }

    #[test]
    fn test_window_grid_beyond_width_is_uncorrected() {
        let stage = WindowOffsetGrid::new(PositionGrid::filled(3, 1.5));
        assert_relative_eq!(stage.sample_offset(&context(9, 2, 0.1)), 1.5);
        assert_relative_eq!(stage.sample_offset(&context(9, 3, 0.1)), 0.0);
    }

    #[test]
    fn test_pattern_prefix() {
        let stage = PatternSubtraction::with_prefix(PositionGrid::filled(11, 4.0), 5);
        assert_eq!(stage.prefix(), 5);
        assert_relative_eq!(stage.sample_offset(&context(0, 4, 0.1)), 4.0);
        assert_relative_eq!(stage.sample_offset(&context(0, 5, 0.1)), 0.0);

        let narrow = PatternSubtraction::new(PositionGrid::filled(3, 4.0));
        assert_eq!(narrow.prefix(), 3);
    }

    #[test]
    fn test_correction_saturates_and_rounds() {
        let mut offsets = CellTable::filled(-1.0e6);
        offsets.set(0, Gain::High, 1, 0.6);
        let stage = StaticOffsets::new(offsets);

        let input = frame(2, 10, 0);
        let output = stage.apply(&input, &ElapsedTable::unknown(2)).unwrap();
        assert_eq!(output.samples.get(0, Gain::High), &[i16::MAX, 9]);
    }

    #[test]
    fn test_elapsed_shape_mismatch() {
        let input = frame(4, 0, 0);
        assert!(NoCalibration.apply(&input, &ElapsedTable::unknown(5)).is_err());
    }
}
