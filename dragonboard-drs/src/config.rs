//! Decoder configuration.

use crate::layout::HeaderLayout;
use crate::sync::DEFAULT_LOOKAHEAD_FACTOR;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Configuration for decoding a Dragon board stream.
///
/// Partial JSON documents fall back to the defaults for missing fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Header layout; `None` probes the stream.
    pub layout: Option<HeaderLayout>,
    /// Maximum number of frames to yield; `None` reads to the end.
    pub max_frames: Option<usize>,
    /// Synchronization lookahead as a multiple of the largest frame.
    pub lookahead_factor: f64,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            layout: None,
            max_frames: None,
            lookahead_factor: DEFAULT_LOOKAHEAD_FACTOR,
        }
    }
}

impl DecoderConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fixes the header layout instead of probing.
    #[must_use]
    pub fn with_layout(mut self, layout: HeaderLayout) -> Self {
        self.layout = Some(layout);
        self
    }

    /// Limits the number of frames yielded.
    #[must_use]
    pub fn with_max_frames(mut self, max_frames: usize) -> Self {
        self.max_frames = Some(max_frames);
        self
    }

    /// Sets the synchronization lookahead factor.
    #[must_use]
    pub fn with_lookahead_factor(mut self, factor: f64) -> Self {
        self.lookahead_factor = factor;
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = DecoderConfig::new()
            .with_layout(HeaderLayout::A)
            .with_max_frames(10)
            .with_lookahead_factor(2.0);

        assert_eq!(config.layout, Some(HeaderLayout::A));
        assert_eq!(config.max_frames, Some(10));
        assert!((config.lookahead_factor - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_json_partial() {
        let config = DecoderConfig::from_json(r#"{ "layout": "v5_1_0B" }"#).unwrap();
        assert_eq!(config.layout, Some(HeaderLayout::B));
        assert_eq!(config.max_frames, None);
        assert!((config.lookahead_factor - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_json_empty() {
        let config = DecoderConfig::from_json("{}").unwrap();
        assert_eq!(config, DecoderConfig::default());
    }

    #[test]
    fn test_json_invalid_layout() {
        assert!(DecoderConfig::from_json(r#"{ "layout": "v4" }"#).is_err());
    }
}
