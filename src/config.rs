use std::path::Path;

use burn::config::Config;

use crate::error::AnchorError;

/// Matching and sampling options of the anchor target layer.
///
/// `allow_border` widens the valid image region by that many pixels on every side
/// before anchors are discarded, `fg_threshold` is the IoU an anchor needs with its
/// best ground truth box to become foreground on its own, and
/// `fg_rpn_fraction * rpn_batch_size` bounds the number of foreground anchors kept
/// per image and level.
#[derive(Config, Debug)]
pub struct AnchorTargetConfig {
    #[config(default = 0.0)]
    pub allow_border: f32,
    #[config(default = 0.7)]
    pub fg_threshold: f32,
    #[config(default = 0.25)]
    pub fg_rpn_fraction: f32,
    #[config(default = 256)]
    pub rpn_batch_size: usize,
}

impl AnchorTargetConfig {
    pub fn validate(&self) -> Result<(), AnchorError> {
        if !(self.allow_border >= 0.0) {
            return Err(AnchorError::InvalidConfiguration(format!(
                "allow_border must be >= 0, got {}",
                self.allow_border
            )));
        }

        if !(self.fg_threshold > 0.0 && self.fg_threshold <= 1.0) {
            return Err(AnchorError::InvalidConfiguration(format!(
                "fg_threshold must be in (0, 1], got {}",
                self.fg_threshold
            )));
        }

        if !(self.fg_rpn_fraction > 0.0 && self.fg_rpn_fraction <= 1.0) {
            return Err(AnchorError::InvalidConfiguration(format!(
                "fg_rpn_fraction must be in (0, 1], got {}",
                self.fg_rpn_fraction
            )));
        }

        if self.rpn_batch_size == 0 {
            return Err(AnchorError::InvalidConfiguration(
                "rpn_batch_size must be positive".into(),
            ));
        }

        Ok(())
    }

    /// Maximum number of foreground anchors kept after subsampling.
    pub fn max_foreground(&self) -> usize {
        (self.fg_rpn_fraction * self.rpn_batch_size as f32).floor() as usize
    }
}

/// Shape of the anchors placed at every feature map cell.
///
/// Each cell carries `ratios.len() * scales.len()` anchors derived from a square
/// reference box of `base_size` pixels.
#[derive(Config, Debug)]
pub struct AnchorGridConfig {
    #[config(default = 16.0)]
    pub base_size: f32,
    #[config(default = "vec![0.5, 1.0, 2.0]")]
    pub ratios: Vec<f32>,
    #[config(default = "vec![2.0, 4.0, 8.0, 16.0, 32.0]")]
    pub scales: Vec<f32>,
}

impl AnchorGridConfig {
    pub fn validate(&self) -> Result<(), AnchorError> {
        if !(self.base_size > 0.0) {
            return Err(AnchorError::InvalidConfiguration(format!(
                "base_size must be positive, got {}",
                self.base_size
            )));
        }

        if self.ratios.is_empty() || self.ratios.iter().any(|r| !(*r > 0.0)) {
            return Err(AnchorError::InvalidConfiguration(format!(
                "ratios must be a non-empty list of positive values, got {:?}",
                self.ratios
            )));
        }

        if self.scales.is_empty() || self.scales.iter().any(|s| !(*s > 0.0)) {
            return Err(AnchorError::InvalidConfiguration(format!(
                "scales must be a non-empty list of positive values, got {:?}",
                self.scales
            )));
        }

        Ok(())
    }

    /// Number of anchors per feature map cell.
    pub fn anchors_per_location(&self) -> usize {
        self.ratios.len() * self.scales.len()
    }
}

/// Feature pyramid level assignment.
///
/// A box of side `sqrt(area)` is given the level
/// `floor(canonical_level + log2(sqrt(area) / canonical_size)) + level_offset`,
/// clamped to `[min_level, max_level]`. A stride `s` hosts level `log2(s)`.
#[derive(Config, Debug)]
pub struct LevelConfig {
    #[config(default = 224.0)]
    pub canonical_size: f32,
    #[config(default = 4)]
    pub canonical_level: i32,
    #[config(default = 0)]
    pub level_offset: i32,
    #[config(default = 2)]
    pub min_level: i32,
    #[config(default = 5)]
    pub max_level: i32,
}

impl LevelConfig {
    pub fn validate(&self) -> Result<(), AnchorError> {
        if !(self.canonical_size > 0.0) {
            return Err(AnchorError::InvalidConfiguration(format!(
                "canonical_size must be positive, got {}",
                self.canonical_size
            )));
        }

        if self.min_level > self.max_level {
            return Err(AnchorError::InvalidConfiguration(format!(
                "min_level ({}) is above max_level ({})",
                self.min_level, self.max_level
            )));
        }

        Ok(())
    }
}

/// Everything the anchor layer reads, stored as a single json document.
#[derive(Config, Debug)]
pub struct AnchorLayerConfig {
    #[config(default = "AnchorTargetConfig::new()")]
    pub targets: AnchorTargetConfig,
    #[config(default = "AnchorGridConfig::new()")]
    pub grid: AnchorGridConfig,
    #[config(default = "LevelConfig::new()")]
    pub levels: LevelConfig,
}

impl AnchorLayerConfig {
    pub fn validate(&self) -> Result<(), AnchorError> {
        self.targets.validate()?;
        self.grid.validate()?;
        self.levels.validate()
    }

    /// Reads a configuration file and rejects it if any value is out of range.
    pub fn load_validated<P: AsRef<Path>>(path: P) -> Result<Self, AnchorError> {
        let config = Self::load(path.as_ref()).map_err(|err| {
            AnchorError::ConfigLoad(format!("{}: {:?}", path.as_ref().display(), err))
        })?;
        config.validate()?;

        Ok(config)
    }
}
