//! Parallel calibration of decoded frames.
//!
//! Decoding and recency tracking are sequential; once frames carry their
//! elapsed times, correcting them is frame-local and runs on the rayon pool.

use crate::Result;
use dragonboard_calib::CalibrationModel;
use dragonboard_core::Frame;
use rayon::prelude::*;

/// Applies `model` to every frame using the recency data each frame carries.
///
/// Output order matches input order.
///
/// # Errors
/// Returns the first correction error.
pub fn calibrate_frames<M>(model: &M, frames: &[Frame]) -> Result<Vec<Frame>>
where
    M: CalibrationModel + ?Sized,
{
    let corrected = frames
        .par_iter()
        .map(|frame| model.apply(frame, &frame.elapsed_since_last_write))
        .collect::<dragonboard_calib::Result<Vec<Frame>>>()?;
    Ok(corrected)
}

/// Like [`calibrate_frames`], on a dedicated pool of `num_threads` threads.
///
/// # Errors
/// Returns an error if the pool cannot be built or a correction fails.
pub fn calibrate_frames_with_threads<M>(
    model: &M,
    frames: &[Frame],
    num_threads: usize,
) -> Result<Vec<Frame>>
where
    M: CalibrationModel + ?Sized,
{
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build()
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    pool.install(|| calibrate_frames(model, frames))
}

#[cfg(test)]
mod tests {
    use super::*;
    use dragonboard_calib::{CalibrationPipeline, CellTable, NoCalibration, StaticOffsets};
    use dragonboard_core::{FrameHeader, HeaderCounters, SampleTable, StopCells};

    fn frames(count: u16) -> Vec<Frame> {
        (0..count)
            .map(|i| {
                let header = FrameHeader {
                    event_counter: u32::from(i),
                    trigger_counter: u32::from(i),
                    counters: HeaderCounters::Clock {
                        clock: u64::from(i),
                    },
                    stop_cells: StopCells::uniform(i * 37),
                };
                Frame::new(header, SampleTable::filled(32, i16::try_from(i).unwrap()))
            })
            .collect()
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let pipeline = CalibrationPipeline::new()
            .with_static_offsets(StaticOffsets::new(CellTable::filled(2.0)));
        let input = frames(20);

        let parallel = calibrate_frames(&pipeline, &input).unwrap();
        let sequential: Vec<Frame> = input
            .iter()
            .map(|f| pipeline.apply_frame(f).unwrap())
            .collect();

        assert_eq!(parallel.len(), sequential.len());
        for (p, s) in parallel.iter().zip(&sequential) {
            assert_eq!(p.header, s.header);
            assert_eq!(p.samples, s.samples);
        }
    }

    #[test]
    fn test_dedicated_pool() {
        let input = frames(4);
        let output = calibrate_frames_with_threads(&NoCalibration, &input, 2).unwrap();
        assert_eq!(output[3].samples, input[3].samples);
    }
}
