//! Run configuration.
//!
//! Every tuning knob has a default. A JSON file passed with `--config` may
//! override any subset of them using flat keys, for example:
//! ```text
//! {"sample_rate": 1.0, "scene_threshold": 0.2, "alignment_tolerance": 2.0, "format": "png"}
//! ```
//! Command line flags are applied last.

use serde::{Deserialize, Serialize};
use shotlist_align::{AnalysisConfig, PhraseLoadConfig};
use shotlist_core::{Result, ShotlistError};
use shotlist_media::{DecodeOptions, StillOptions};
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ShotlistConfig {
    #[serde(flatten)]
    pub decode: DecodeOptions,
    #[serde(flatten)]
    pub analysis: AnalysisConfig,
    #[serde(flatten)]
    pub phrases: PhraseLoadConfig,
    #[serde(flatten)]
    pub stills: StillOptions,
    /// Only write stills for keyframes referenced by a product match.
    pub only_matched: bool,
}

impl ShotlistConfig {
    /// Defaults, overlaid with the JSON file at `path` if given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            ShotlistError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        let config: Self = serde_json::from_str(&json).map_err(|e| {
            ShotlistError::InvalidConfig(format!("{}: {e}", path.display()))
        })?;
        debug!(config = %path.display(), "Loaded configuration file");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.decode.validate()?;
        self.analysis.validate()?;
        self.phrases.validate()?;

        if !(1..=31).contains(&self.stills.quality) {
            return Err(ShotlistError::InvalidConfig(format!(
                "quality must be within 1..=31, got {}",
                self.stills.quality
            )));
        }
        if self.stills.scale_width == Some(0) {
            return Err(ShotlistError::InvalidConfig(
                "scale_width must be positive".into(),
            ));
        }
        if self.stills.prefix.trim().is_empty() {
            return Err(ShotlistError::InvalidConfig("prefix must not be empty".into()));
        }
        Ok(())
    }
}
