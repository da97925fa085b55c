//! Pipeline configuration.

use crate::model::{
    PatternSubtraction, StaticOffsets, TimelapseCorrection, WindowOffsetGrid,
    DEFAULT_PATTERN_PREFIX, DEFAULT_POWER_LAW_A, DEFAULT_POWER_LAW_B,
};
use crate::pipeline::CalibrationPipeline;
use crate::table::{CellTable, PositionGrid};
use crate::{Error, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Board-wide power-law parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UniformPowerLaw {
    pub a: f64,
    pub b: f64,
}

impl Default for UniformPowerLaw {
    fn default() -> Self {
        Self {
            a: DEFAULT_POWER_LAW_A,
            b: DEFAULT_POWER_LAW_B,
        }
    }
}

/// Which constant tables to load into a [`CalibrationPipeline`].
///
/// Each stage is enabled by giving the path of its table; the per-cell and
/// the uniform time-lapse correction are mutually exclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Static offset table.
    pub static_offsets: Option<PathBuf>,
    /// Per-cell power-law fits.
    pub timelapse_fits: Option<PathBuf>,
    /// Include the fitted constant term of the per-cell power law.
    pub timelapse_constant_term: bool,
    /// Board-wide power law used instead of per-cell fits.
    pub uniform_timelapse: Option<UniformPowerLaw>,
    /// Window offset grid.
    pub window_offsets: Option<PathBuf>,
    /// Expected width of the window offset grid; inferred if unset.
    pub window_offset_positions: Option<usize>,
    /// Pattern grid.
    pub pattern: Option<PathBuf>,
    /// Number of leading window positions the pattern is subtracted from.
    pub pattern_prefix: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            static_offsets: None,
            timelapse_fits: None,
            timelapse_constant_term: true,
            uniform_timelapse: None,
            window_offsets: None,
            window_offset_positions: None,
            pattern: None,
            pattern_prefix: DEFAULT_PATTERN_PREFIX,
        }
    }
}

impl PipelineConfig {
    /// Creates a configuration without stages.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the static offset table.
    #[must_use]
    pub fn with_static_offsets<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.static_offsets = Some(path.into());
        self
    }

    /// Sets the per-cell power-law fits.
    #[must_use]
    pub fn with_timelapse_fits<P: Into<PathBuf>>(mut self, path: P, constant_term: bool) -> Self {
        self.timelapse_fits = Some(path.into());
        self.timelapse_constant_term = constant_term;
        self
    }

    /// Uses one power law for the whole board.
    #[must_use]
    pub fn with_uniform_timelapse(mut self, power_law: UniformPowerLaw) -> Self {
        self.uniform_timelapse = Some(power_law);
        self
    }

    /// Sets the window offset grid.
    #[must_use]
    pub fn with_window_offsets<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.window_offsets = Some(path.into());
        self
    }

    /// Sets the pattern grid and prefix length.
    #[must_use]
    pub fn with_pattern<P: Into<PathBuf>>(mut self, path: P, prefix: usize) -> Self {
        self.pattern = Some(path.into());
        self.pattern_prefix = prefix;
        self
    }

    /// Loads a configuration from a JSON file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Loads a configuration from a JSON string.
    ///
    /// # Errors
    /// Returns an error if the string cannot be parsed.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl CalibrationPipeline {
    /// Loads every configured table and assembles the pipeline.
    ///
    /// All tables are read before any frame is processed, so incomplete
    /// tables are reported here.
    ///
    /// # Errors
    /// Returns [`Error::Config`] for contradictory settings and the table
    /// loading errors otherwise.
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        let mut pipeline = Self::new();

        if let Some(path) = &config.static_offsets {
            let offsets = CellTable::load_offsets(path)?;
            pipeline = pipeline.with_static_offsets(StaticOffsets::new(offsets));
        }

        match (&config.timelapse_fits, config.uniform_timelapse) {
            (Some(_), Some(_)) => {
                return Err(Error::Config(
                    "per-cell and uniform time-lapse corrections are exclusive".into(),
                ));
            }
            (Some(path), None) => {
                let fits = CellTable::load_power_law(path)?;
                let stage = if config.timelapse_constant_term {
                    TimelapseCorrection::per_cell(fits)
                } else {
                    TimelapseCorrection::per_cell_without_constant(fits)
                };
                pipeline = pipeline.with_timelapse(stage);
            }
            (None, Some(UniformPowerLaw { a, b })) => {
                pipeline = pipeline.with_timelapse(TimelapseCorrection::uniform(a, b));
            }
            (None, None) => {}
        }

        if let Some(path) = &config.window_offsets {
            let grid = PositionGrid::load("window offsets", path, config.window_offset_positions)?;
            pipeline = pipeline.with_window_offsets(WindowOffsetGrid::new(grid));
        }

        if let Some(path) = &config.pattern {
            let grid = PositionGrid::load("pattern", path, None)?;
            pipeline =
                pipeline.with_pattern(PatternSubtraction::with_prefix(grid, config.pattern_prefix));
        }

        debug!(
            "calibration stages: {:?}",
            pipeline.stages().iter().map(|s| s.name()).collect::<Vec<_>>()
        );
        Ok(pipeline)
    }
}
