//! dragonboard-core: Core types for DRS4 Dragon board readout data.
//!
//! This crate holds the version-agnostic frame model, the capacitor ring
//! address translation and the stateful readout recency tracker that every
//! time-lapse correction depends on.
//!

pub mod cell;
pub mod error;
pub mod frame;
pub mod recency;
pub mod stats;

pub use cell::{cell_in_window, cell_to_sample, sample_to_cell, CapacitorRing, TOTAL_CELLS};
pub use error::{Error, Result};
pub use frame::{
    ElapsedTable, Frame, FrameHeader, Gain, HeaderCounters, SampleTable, StopCells, WindowTable,
    CLOCK_TICK_SECONDS, COUNTER_133MHZ_HZ, NUM_CHANNELS, NUM_GAINS,
};
pub use recency::{ReadoutRecencyTracker, RingBufferState, TrackerState};
pub use stats::RunningStats;
