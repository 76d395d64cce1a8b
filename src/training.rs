use burn::{prelude::Backend, tensor::Tensor};
use tracing::{debug, instrument};

use crate::{
    error::AnchorError,
    filter::inside_anchors,
    labels::Label,
    layer::AnchorLayer,
    levels::boxes_for_stride,
    matching::assign_targets,
    sampler::IndexSampler,
    unmap::unmap,
};

/// Per-anchor training targets of one pyramid level, shaped like the network outputs.
#[derive(Clone, Debug)]
pub struct EncodedTargets<B: Backend> {
    /// `[1, height, width, A]`, `1` foreground, `0` background, `-1` ignored.
    pub labels: Tensor<B, 4>,
    /// `[1, height, width, 4 * A]` regression deltas.
    pub bbox_targets: Tensor<B, 4>,
    /// `[1, height, width, 4 * A]` regression loss mask.
    pub inside_weights: Tensor<B, 4>,
}

impl<B: Backend> EncodedTargets<B> {
    fn reshape(
        labels: Tensor<B, 1>,
        bbox_targets: Tensor<B, 2>,
        inside_weights: Tensor<B, 2>,
        height: usize,
        width: usize,
        per_cell: usize,
    ) -> Self {
        Self {
            labels: labels.reshape([1, height, width, per_cell]),
            bbox_targets: bbox_targets.reshape([1, height, width, per_cell * 4]),
            inside_weights: inside_weights.reshape([1, height, width, per_cell * 4]),
        }
    }

    /// Every anchor background, no regression.
    fn background(height: usize, width: usize, per_cell: usize, device: &B::Device) -> Self {
        let total = height * width * per_cell;

        Self::reshape(
            Tensor::zeros([total], device),
            Tensor::zeros([total, 4], device),
            Tensor::zeros([total, 4], device),
            height,
            width,
            per_cell,
        )
    }
}

impl AnchorLayer {
    /// Matches ground truth boxes to the anchors of one pyramid level and encodes them into
    /// learning targets.
    ///
    /// # Arguments
    ///
    /// * `gt_boxes` - `[G, 5]` ground truth rows `[x1, y1, x2, y2, class]` for the image.
    /// * `anchors` - `[height, width, A, 4]` anchors of the level, generated from the layer
    ///   configuration when `None`.
    /// * `height`, `width` - Size of the feature map.
    /// * `stride` - Down-sampling factor of the feature map w.r.t. the input, e.g. 4, 8, 16, 32.
    /// * `sampler` - Randomness used to subsample foreground and background anchors.
    ///
    /// # Returns
    ///
    /// Labels, regression targets and inside weights for every anchor of the grid. When no
    /// ground truth box belongs to this level every anchor is background with zero targets.
    /// Anchors outside the image border are ignored.
    #[instrument(level = "debug", skip(self, gt_boxes, anchors, sampler))]
    pub fn encode<B: Backend, S: IndexSampler>(
        &self,
        gt_boxes: Tensor<B, 2>,
        anchors: Option<Tensor<B, 4>>,
        height: usize,
        width: usize,
        stride: usize,
        sampler: &mut S,
    ) -> Result<EncodedTargets<B>, AnchorError> {
        let device = gt_boxes.device();

        let [_, gt_cols] = gt_boxes.dims();
        if gt_cols < 4 {
            return Err(AnchorError::InvalidLayout {
                name: "ground truth",
                expected: "[G, 5]".into(),
                got: gt_boxes.dims().to_vec(),
            });
        }

        let anchors = self.resolve_grid(anchors, height, width, stride, &device)?;
        let [_, _, per_cell, _] = anchors.dims();
        let total = height * width * per_cell;

        let Some(routed) = boxes_for_stride(gt_boxes, stride, self.levels()) else {
            debug!("no ground truth for this level");
            return Ok(EncodedTargets::background(height, width, per_cell, &device));
        };

        let inside = inside_anchors(
            anchors.reshape([total, 4]),
            self.targets().allow_border,
            height,
            width,
            stride,
        );

        debug!(
            num_gt = routed.indices.len(),
            inside = inside.len(),
            total,
            "encoding anchor targets"
        );

        let targets = assign_targets(inside.anchors, routed.boxes, self.targets(), sampler);

        let labels = unmap(targets.labels, total, &inside.indices, Label::Ignore.as_f32())?;
        let bbox_targets = unmap(targets.bbox_targets, total, &inside.indices, 0.0)?;
        let inside_weights = unmap(targets.inside_weights, total, &inside.indices, 0.0)?;

        Ok(EncodedTargets::reshape(
            labels,
            bbox_targets,
            inside_weights,
            height,
            width,
            per_cell,
        ))
    }
}
