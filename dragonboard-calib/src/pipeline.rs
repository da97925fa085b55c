//! Calibration pipeline.
//!
//! Stages always run in the same order regardless of how the pipeline was
//! assembled:
//!
//! 1. Static offsets per physical cell
//! 2. Power-law time-lapse correction
//! 3. Window offset grid
//! 4. Pattern subtraction on the window prefix
//!
//! Offsets of all enabled stages are summed in `f64` and subtracted once, so
//! every sample is rounded a single time.

use crate::model::{
    CalibrationModel, PatternSubtraction, SampleContext, StaticOffsets, TimelapseCorrection,
    WindowOffsetGrid,
};
use crate::Result;
use dragonboard_core::Frame;

/// Ordered chain of correction stages; missing stages are skipped.
#[derive(Debug, Clone, Default)]
pub struct CalibrationPipeline {
    static_offsets: Option<StaticOffsets>,
    timelapse: Option<TimelapseCorrection>,
    window_offsets: Option<WindowOffsetGrid>,
    pattern: Option<PatternSubtraction>,
}

impl CalibrationPipeline {
    /// Creates a pipeline without stages.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables static offset subtraction.
    #[must_use]
    pub fn with_static_offsets(mut self, stage: StaticOffsets) -> Self {
        self.static_offsets = Some(stage);
        self
    }

    /// Enables the time-lapse correction.
    #[must_use]
    pub fn with_timelapse(mut self, stage: TimelapseCorrection) -> Self {
        self.timelapse = Some(stage);
        self
    }

    /// Enables the window offset grid.
    #[must_use]
    pub fn with_window_offsets(mut self, stage: WindowOffsetGrid) -> Self {
        self.window_offsets = Some(stage);
        self
    }

    /// Enables pattern subtraction.
    #[must_use]
    pub fn with_pattern(mut self, stage: PatternSubtraction) -> Self {
        self.pattern = Some(stage);
        self
    }

    /// Enabled stages in application order.
    #[must_use]
    pub fn stages(&self) -> Vec<&dyn CalibrationModel> {
        let mut stages: Vec<&dyn CalibrationModel> = Vec::with_capacity(4);
        if let Some(stage) = &self.static_offsets {
            stages.push(stage);
        }
        if let Some(stage) = &self.timelapse {
            stages.push(stage);
        }
        if let Some(stage) = &self.window_offsets {
            stages.push(stage);
        }
        if let Some(stage) = &self.pattern {
            stages.push(stage);
        }
        stages
    }

    /// True if no stage is enabled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.static_offsets.is_none()
            && self.timelapse.is_none()
            && self.window_offsets.is_none()
            && self.pattern.is_none()
    }

    /// Corrects a frame using the recency data it carries.
    ///
    /// # Errors
    /// Returns a shape mismatch if the frame's tables disagree.
    pub fn apply_frame(&self, frame: &Frame) -> Result<Frame> {
        self.apply(frame, &frame.elapsed_since_last_write)
    }
}

impl CalibrationModel for CalibrationPipeline {
    fn name(&self) -> &'static str {
        "CalibrationPipeline"
    }

    fn sample_offset(&self, sample: &SampleContext) -> f64 {
        let mut offset = 0.0;
        if let Some(stage) = &self.static_offsets {
            offset += stage.sample_offset(sample);
        }
        if let Some(stage) = &self.timelapse {
            offset += stage.sample_offset(sample);
        }
        if let Some(stage) = &self.window_offsets {
            offset += stage.sample_offset(sample);
        }
        if let Some(stage) = &self.pattern {
            offset += stage.sample_offset(sample);
        }
        offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{CellTable, PositionGrid, PowerLaw};
    use dragonboard_core::{
        ElapsedTable, FrameHeader, Gain, HeaderCounters, SampleTable, StopCells,
    };

    fn frame(capture_length: usize, value: i16) -> Frame {
        let header = FrameHeader {
            event_counter: 3,
            trigger_counter: 3,
            counters: HeaderCounters::Clock { clock: 99 },
            stop_cells: StopCells::uniform(4094),
        };
        Frame::new(header, SampleTable::filled(capture_length, value))
    }

    fn full_pipeline() -> CalibrationPipeline {
        let fits = CellTable::filled(PowerLaw {
            a: 8.0,
            b: -1.0,
            c: 1.0,
        });
        CalibrationPipeline::new()
            .with_pattern(PatternSubtraction::with_prefix(PositionGrid::filled(11, 0.3), 2))
            .with_window_offsets(WindowOffsetGrid::new(PositionGrid::filled(4, 0.3)))
            .with_timelapse(TimelapseCorrection::per_cell(fits))
            .with_static_offsets(StaticOffsets::new(CellTable::filled(100.0)))
    }

    #[test]
    fn test_stage_order_is_fixed() {
        let names: Vec<&str> = full_pipeline().stages().iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            vec![
                "StaticOffsets",
                "TimelapseCorrection",
                "WindowOffsetGrid",
                "PatternSubtraction"
            ]
        );
    }

    #[test]
    fn test_empty_pipeline_is_identity() {
        let pipeline = CalibrationPipeline::new();
        assert!(pipeline.is_empty());
        let input = frame(8, 321);
        let output = pipeline.apply_frame(&input).unwrap();
        assert_eq!(output.samples, input.samples);
    }

    #[test]
    fn test_offsets_are_summed_before_rounding() {
        let pipeline = full_pipeline();
        let input = frame(6, 200);
        let elapsed = ElapsedTable::filled(6, 4.0);
        let output = pipeline.apply(&input, &elapsed).unwrap();

        // 100 + (8 / 4 + 1) + 0.3 + 0.3 = 103.6, rounded per stage it would be 103
        assert_eq!(
            output.samples.get(5, Gain::High),
            &[96, 96, 97, 97, 97, 97]
        );
        assert_eq!(output.header, input.header);
    }

    #[test]
    fn test_unknown_elapsed_falls_back_to_constant() {
        let pipeline = full_pipeline();
        let input = frame(6, 200);
        let output = pipeline.apply_frame(&input).unwrap();

        // 100 + 1 + 0.3 + 0.3 = 101.6, then 101.3, then 101
        assert_eq!(output.samples.get(0, Gain::Low), &[98, 98, 99, 99, 99, 99]);
    }
}
