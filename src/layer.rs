use burn::{prelude::Backend, tensor::Tensor};

use crate::{
    anchors::anchor_plane,
    config::{AnchorGridConfig, AnchorLayerConfig, AnchorTargetConfig, LevelConfig},
    error::AnchorError,
};

/// Anchor layer of a pyramid region proposal network.
///
/// Holds a validated [`AnchorLayerConfig`] and exposes the two directions of the layer:
/// [`AnchorLayer::encode`] turns ground truth into per-anchor training targets for one
/// pyramid level, and [`AnchorLayer::decode`] turns per-anchor network outputs back into
/// boxes. The layer keeps no state between calls, so one instance can serve every level
/// and every worker.
#[derive(Clone, Debug)]
pub struct AnchorLayer {
    config: AnchorLayerConfig,
}

impl AnchorLayer {
    /// Creates a layer, rejecting out of range configuration values.
    pub fn new(config: AnchorLayerConfig) -> Result<Self, AnchorError> {
        config.validate()?;

        Ok(Self { config })
    }

    pub fn config(&self) -> &AnchorLayerConfig {
        &self.config
    }

    pub fn targets(&self) -> &AnchorTargetConfig {
        &self.config.targets
    }

    pub fn grid(&self) -> &AnchorGridConfig {
        &self.config.grid
    }

    pub fn levels(&self) -> &LevelConfig {
        &self.config.levels
    }

    /// Number of anchors at every feature map cell.
    pub fn anchors_per_location(&self) -> usize {
        self.config.grid.anchors_per_location()
    }

    /// `[height, width, A, 4]` anchors of a feature map with the given stride.
    pub fn anchor_grid<B: Backend>(
        &self,
        height: usize,
        width: usize,
        stride: usize,
        device: &B::Device,
    ) -> Tensor<B, 4> {
        anchor_plane(height, width, stride, &self.config.grid, device)
    }

    /// Uses the given grid or generates one, checking it matches the feature map.
    pub(crate) fn resolve_grid<B: Backend>(
        &self,
        anchors: Option<Tensor<B, 4>>,
        height: usize,
        width: usize,
        stride: usize,
        device: &B::Device,
    ) -> Result<Tensor<B, 4>, AnchorError> {
        let Some(anchors) = anchors else {
            return Ok(self.anchor_grid(height, width, stride, device));
        };

        let dims = anchors.dims();
        if dims[0] != height || dims[1] != width || dims[3] != 4 {
            return Err(AnchorError::InvalidLayout {
                name: "anchor grid",
                expected: format!("[{height}, {width}, A, 4]"),
                got: dims.to_vec(),
            });
        }

        Ok(anchors)
    }
}

impl Default for AnchorLayer {
    fn default() -> Self {
        Self {
            config: AnchorLayerConfig::new(),
        }
    }
}
