//! dragonboard-calib: Correction models for DRS4 Dragon board frames.
//!
//! Each DRS4 capacitor carries a pedestal that depends on the cell itself and
//! on how long ago the cell was last written. This crate holds the constant
//! tables that describe those effects and the models that subtract them from
//! decoded frames.
//!
//! # Stages
//!
//! - [`StaticOffsets`] - pedestal per physical cell
//! - [`TimelapseCorrection`] - power law in the time since the last write
//! - [`WindowOffsetGrid`] - offset per cell and window position
//! - [`PatternSubtraction`] - mean pattern over the first window positions
//!
//! [`CalibrationPipeline`] chains the enabled stages in that order.

mod config;
mod error;
pub mod model;
mod pipeline;
pub mod table;

pub use config::{PipelineConfig, UniformPowerLaw};
pub use error::{ConstantKey, Error, Result};
pub use model::{
    correct, CalibrationModel, NoCalibration, PatternSubtraction, SampleContext, StaticOffsets,
    TimelapseCorrection, WindowOffsetGrid, DEFAULT_PATTERN_PREFIX, DEFAULT_POWER_LAW_A,
    DEFAULT_POWER_LAW_B,
};
pub use pipeline::CalibrationPipeline;
pub use table::{CellTable, GridRecord, OffsetRecord, PositionGrid, PowerLaw, PowerLawRecord};
