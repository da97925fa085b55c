#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_lossless,
    clippy::uninlined_format_args
)]
use dragonboard_core::{Frame, RunningStats, NUM_CHANNELS};
use dragonboard_drs::{
    FrameDecoder, FrameHeader, FrameSynchronizer, FrameWriter, Gain, HeaderCounters,
    HeaderLayout, SampleTable, StopCells,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use std::io::Cursor;

const CAPTURE_LENGTH: usize = 1024;

fn header(layout: HeaderLayout, event: u32, stop_cells: StopCells) -> FrameHeader {
    let counters = match layout {
        HeaderLayout::A => HeaderCounters::Clock {
            clock: u64::from(event) * 1000,
        },
        HeaderLayout::B => HeaderCounters::Counters {
            pps: 0,
            counter_10mhz: event * 1000,
            counter_133mhz: u64::from(event) * 13_300,
            flags: [
                0xf0, 0x01, 0xf0, 0x03, 0xf0, 0x01, 0xf0, 0x00, 0xf0, 0x00, 0xf0, 0x00, 0xf0,
                0x03, 0xf0, 0x01,
            ],
        },
    };
    FrameHeader {
        event_counter: event,
        trigger_counter: 0,
        counters,
        stop_cells,
    }
}

/// Writes `count` frames of Gaussian noise with the given mean and std.
fn noise_stream(
    layout: HeaderLayout,
    count: u32,
    stop_cells: StopCells,
    mean: f64,
    std: f64,
    seed: u64,
) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    let normal = Normal::new(mean, std).unwrap();
    let mut writer = FrameWriter::new(Vec::new(), layout);

    for event in 0..count {
        let values: Vec<i16> = (0..CAPTURE_LENGTH * 16)
            .map(|_| normal.sample(&mut rng).round() as i16)
            .collect();
        let samples = SampleTable::from_vec(CAPTURE_LENGTH, values).unwrap();
        let frame = Frame::new(header(layout, event, stop_cells), samples);
        writer.write_frame(&frame).unwrap();
    }
    writer.into_inner()
}

fn paired_stop_cells() -> StopCells {
    let mut stop_cells = StopCells::default();
    for pair in (0..NUM_CHANNELS).step_by(2) {
        for channel in [pair, pair + 1] {
            stop_cells.set(channel, Gain::High, 500 * pair as u16 + 3);
            stop_cells.set(channel, Gain::Low, 500 * pair as u16 + 7);
        }
    }
    stop_cells
}

#[test]
fn test_sync_reports_layout_b_frame_size() {
    let data = noise_stream(HeaderLayout::B, 2, StopCells::default(), 100.0, 5.0, 1);
    let sync = FrameSynchronizer::new(HeaderLayout::B);

    let size = sync.frame_size(&mut Cursor::new(&data)).unwrap();
    assert_eq!(size, 64 + CAPTURE_LENGTH * 2 * 2 * 8);
    assert_eq!(size, HeaderLayout::B.frame_size(CAPTURE_LENGTH));
}

#[test]
fn test_layout_a_frame_size_matches_reference_file() {
    let data = noise_stream(HeaderLayout::A, 3, StopCells::default(), 100.0, 5.0, 2);
    let mut decoder = FrameDecoder::new(Cursor::new(data), HeaderLayout::A);
    let frame = decoder.next_frame().unwrap().unwrap();

    assert_eq!(decoder.last_frame_size(), Some(32_816));
    assert_eq!(frame.capture_length(), 1024);
}

#[test]
fn test_averaging_recovers_injected_mean() {
    let (mean, std, count) = (100.0, 5.0, 20u32);

    for layout in HeaderLayout::ALL {
        let stop_cells = paired_stop_cells();
        let data = noise_stream(layout, count, stop_cells, mean, std, 42);
        let decoder = FrameDecoder::probe(Cursor::new(data)).unwrap();
        assert_eq!(decoder.layout(), layout);

        let mut stats = RunningStats::new(CAPTURE_LENGTH * 16);
        let mut frames = 0;
        for frame in decoder {
            let frame = frame.unwrap();
            assert_eq!(frame.header.stop_cells, stop_cells);
            assert_eq!(frame.capture_length(), CAPTURE_LENGTH);
            stats.add(frame.samples.as_slice()).unwrap();
            frames += 1;
        }
        assert_eq!(frames, count);

        // Grand mean over every sample of every frame
        let n = stats.mean().len() as f64;
        let grand_mean = stats.mean().iter().sum::<f64>() / n;
        let standard_error = std / (n * f64::from(count)).sqrt();
        assert!(
            (grand_mean - mean).abs() < 5.0 * standard_error,
            "grand mean {} too far from {}",
            grand_mean,
            mean
        );

        // Per-sample spread matches the injected noise
        let sample_std = stats.std().unwrap();
        let mean_std = sample_std.iter().sum::<f64>() / n;
        assert!((mean_std - std).abs() < 0.5, "mean std {}", mean_std);
    }
}

#[test]
fn test_timestamps_follow_counters() {
    let data = noise_stream(HeaderLayout::B, 3, StopCells::default(), 0.0, 1.0, 3);
    let frames: Vec<_> = FrameDecoder::new(Cursor::new(data), HeaderLayout::B)
        .collect::<Result<_, _>>()
        .unwrap();

    let times: Vec<f64> = frames.iter().map(|f| f.timestamp_seconds()).collect();
    assert!((times[1] - 13_300.0 / 133e6).abs() < 1e-12);
    assert!((times[2] - 2.0 * 13_300.0 / 133e6).abs() < 1e-12);
}

/// Layout-B stream whose headers and samples contain marker bytes.
fn marker_heavy_stream(counters: impl Iterator<Item = u64>, sample: i16) -> Vec<Frame> {
    counters
        .zip(0u32..)
        .map(|(counter_133mhz, event)| {
            let header = FrameHeader {
                event_counter: event,
                trigger_counter: event,
                counters: HeaderCounters::Counters {
                    pps: 0xdddd,
                    counter_10mhz: 0xdddd_dddd,
                    counter_133mhz,
                    flags: [0xdd; 16],
                },
                stop_cells: StopCells::uniform(0x0ddd),
            };
            Frame::new(header, SampleTable::filled(16, sample))
        })
        .collect()
}

fn decode_all(frames: &[Frame]) -> Vec<Frame> {
    let mut writer = FrameWriter::new(Vec::new(), HeaderLayout::B);
    for frame in frames {
        writer.write_frame(frame).unwrap();
    }
    let decoder = FrameDecoder::probe(Cursor::new(writer.into_inner())).unwrap();
    assert_eq!(decoder.layout(), HeaderLayout::B);
    decoder.collect::<Result<_, _>>().unwrap()
}

#[test]
fn test_every_counter_low_byte_decodes() {
    // Low byte of the 133 MHz counter runs through all values, 0xdd included
    let frames = marker_heavy_stream((0..300u64).map(|event| event * 0x101), 17);
    let decoded = decode_all(&frames);
    assert_eq!(decoded.len(), frames.len());
    for (got, want) in decoded.iter().zip(&frames) {
        assert_eq!(got.header, want.header);
        assert_eq!(got.samples, want.samples);
    }
}

#[test]
fn test_marker_words_in_samples_decode() {
    let sample = i16::from_be_bytes([0xdd, 0xdd]);
    let frames = marker_heavy_stream([0x1dd, 0x2dd, 0xdddd_dddd].into_iter(), sample);
    let decoded = decode_all(&frames);
    assert_eq!(decoded.len(), 3);
    for frame in &decoded {
        assert_eq!(frame.capture_length(), 16);
        assert!(frame.samples.as_slice().iter().all(|&v| v == sample));
    }
    assert_eq!(decoded[2].header, frames[2].header);
}
