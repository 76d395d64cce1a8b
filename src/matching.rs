use burn::{prelude::Backend, tensor::Tensor};
use tracing::trace;

use crate::{
    boxes::{compute_overlap, encode_delta},
    config::AnchorTargetConfig,
    labels::{self, Label},
    sampler::IndexSampler,
    tensor_ops::{argmax_first, from_f32_vec, index_tensor, to_f32_vec},
};

/// Learning targets for the anchors inside the border.
#[derive(Clone, Debug)]
pub struct AnchorTargets<B: Backend> {
    /// `[A]` label per anchor (`1` foreground, `0` background, `-1` ignored).
    pub labels: Tensor<B, 1>,
    /// `[A, 4]` regression deltas, zero unless the anchor is foreground.
    pub bbox_targets: Tensor<B, 2>,
    /// `[A, 4]` ones for foreground anchors, zeros elsewhere.
    pub inside_weights: Tensor<B, 2>,
}

impl<B: Backend> AnchorTargets<B> {
    fn empty(device: &B::Device) -> Self {
        Self {
            labels: Tensor::zeros([0], device),
            bbox_targets: Tensor::zeros([0, 4], device),
            inside_weights: Tensor::zeros([0, 4], device),
        }
    }
}

/// Result of matching anchors against ground truth boxes.
#[derive(Clone, Debug, PartialEq)]
pub struct Matches {
    /// Ground truth index with the highest IoU for each anchor.
    pub gt_assignment: Vec<usize>,
    /// That highest IoU.
    pub max_overlaps: Vec<f32>,
    /// Anchor index with the highest IoU for each ground truth box, empty without anchors.
    pub gt_argmax: Vec<usize>,
}

/// Finds the best ground truth for every anchor and the best anchor for every ground truth.
///
/// ```text
///              ┌──────────────► gt (G)
///              │ ┌►[0.10, 0.05, 0.00], <-- anchor 0, best gt 0
///              │ ├►[0.20, 0.65, 0.30], <-- anchor 1, best gt 1
///   anchors (A)│ ├►[0.00, 0.65, 0.72], <-- anchor 2, best gt 2
///              ▼    ▲     ▲     ▲
///                   1     1     2   <-- best anchor per gt column
/// ```
///
/// Ties go to the lowest index in both directions, so of two anchors sharing the best IoU
/// with a ground truth box only the first becomes its forced match.
pub fn match_anchors(overlaps: &[f32], num_anchors: usize, num_gt: usize) -> Matches {
    if num_gt == 0 {
        return Matches {
            gt_assignment: vec![0; num_anchors],
            max_overlaps: vec![0.0; num_anchors],
            gt_argmax: vec![],
        };
    }

    let mut gt_assignment = Vec::with_capacity(num_anchors);
    let mut max_overlaps = Vec::with_capacity(num_anchors);

    for row in overlaps.chunks_exact(num_gt) {
        let (j, v) = argmax_first(row.iter().copied()).unwrap_or((0, 0.0));
        gt_assignment.push(j);
        max_overlaps.push(v);
    }

    // no anchors, no best anchor
    let gt_argmax = (0..num_gt)
        .filter_map(|j| {
            argmax_first((0..num_anchors).map(|i| overlaps[i * num_gt + j])).map(|(i, _)| i)
        })
        .collect();

    Matches {
        gt_assignment,
        max_overlaps,
        gt_argmax,
    }
}

/// Labels anchors from their matches, before any subsampling.
///
/// An anchor is foreground when it is the best anchor of some ground truth box, whatever
/// the IoU, or when its best IoU reaches `fg_threshold`. Everything else is background.
pub fn label_matches(matches: &Matches, fg_threshold: f32) -> Vec<Label> {
    let mut labels = vec![Label::Background; matches.max_overlaps.len()];

    for i in matches.gt_argmax.iter() {
        labels[*i] = Label::Foreground;
    }

    for (label, overlap) in labels.iter_mut().zip(matches.max_overlaps.iter()) {
        if *overlap >= fg_threshold {
            *label = Label::Foreground;
        }
    }

    labels
}

/// Turns random anchors carrying `label` into [`Label::Ignore`] until at most `keep` remain.
///
/// Returns the number of anchors disabled.
pub fn subsample<S: IndexSampler>(
    labels: &mut [Label],
    label: Label,
    keep: usize,
    sampler: &mut S,
) -> usize {
    let candidates = labels::positions(labels, label);
    if candidates.len() <= keep {
        return 0;
    }

    let disable = sampler.choose_without_replacement(&candidates, candidates.len() - keep);
    for i in disable.iter() {
        labels[*i] = Label::Ignore;
    }

    disable.len()
}

/// Assigns labels, regression targets and inside weights to the anchors inside the border.
///
/// 1. IoU between every anchor and every ground truth box.
/// 2. Each ground truth box claims its best anchor as foreground, and every anchor whose best
///    IoU reaches `fg_threshold` is foreground too.
/// 3. At most `fg_rpn_fraction * rpn_batch_size` foreground anchors are kept, the rest are
///    ignored at random. Background anchors are then thinned the same way until foreground
///    plus background fits in `rpn_batch_size`.
/// 4. Foreground anchors regress towards their best ground truth box.
///
/// # Arguments
///
/// * `anchors` - `[A, 4]` anchors inside the border.
/// * `gt_boxes` - `[G, 4+]` ground truth rows routed to this level, class in column 4.
/// * `sampler` - Randomness used to pick which anchors to ignore.
pub fn assign_targets<B: Backend, S: IndexSampler>(
    anchors: Tensor<B, 2>,
    gt_boxes: Tensor<B, 2>,
    config: &AnchorTargetConfig,
    sampler: &mut S,
) -> AnchorTargets<B> {
    let device = anchors.device();
    let [num_anchors, _] = anchors.dims();
    let [num_gt, _] = gt_boxes.dims();

    if num_anchors == 0 || num_gt == 0 {
        return AnchorTargets::empty(&device);
    }

    let gt_boxes = gt_boxes.slice([0..num_gt, 0..4]);

    let overlaps = to_f32_vec(compute_overlap(anchors.clone(), gt_boxes.clone()));
    let matches = match_anchors(&overlaps, num_anchors, num_gt);
    let mut labels = label_matches(&matches, config.fg_threshold);

    let fg_disabled = subsample(
        &mut labels,
        Label::Foreground,
        config.max_foreground(),
        sampler,
    );

    let num_bg = config
        .rpn_batch_size
        .saturating_sub(labels::count(&labels, Label::Foreground));
    let bg_disabled = subsample(&mut labels, Label::Background, num_bg, sampler);

    trace!(
        num_anchors,
        num_gt,
        fg_disabled,
        bg_disabled,
        "assigned anchor labels"
    );

    let inside_weights = from_f32_vec(
        labels.iter().flat_map(|l| l.inside_weight()).collect(),
        [num_anchors, 4],
        &device,
    );

    let assigned_gt = gt_boxes.select(0, index_tensor::<B>(&matches.gt_assignment, &device));
    let bbox_targets = encode_delta(anchors, assigned_gt) * inside_weights.clone();

    let labels = from_f32_vec(
        labels.iter().map(|l| l.as_f32()).collect(),
        [num_anchors],
        &device,
    );

    AnchorTargets {
        labels,
        bbox_targets,
        inside_weights,
    }
}
