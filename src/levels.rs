use burn::{prelude::Backend, tensor::Tensor};

use crate::{
    config::LevelConfig,
    tensor_ops::{index_tensor, to_f32_vec},
};

/// Pyramid level hosting a feature map of the given stride, `floor(log2(stride))`.
pub fn stride_level(stride: usize) -> i32 {
    stride.max(1).ilog2() as i32
}

/// Pyramid level a box with corners `(x1, y1, x2, y2)` should be learnt on.
///
/// Feature Pyramid Networks assign an object of side `sqrt(w * h)` to
///
/// ```text
///  k = ⌊k0 + log2(sqrt(w⋅h) / 224)⌋
/// ```
///
/// where 224 is the canonical ImageNet pre-training size and `k0 = 4` the level such a box
/// would come from in a single-scale detector. Smaller objects go to finer levels, larger ones
/// to coarser levels, and everything outside the pyramid is clamped onto its first or last
/// level so that each box lands on exactly one level.
pub fn box_level(x1: f32, y1: f32, x2: f32, y2: f32, config: &LevelConfig) -> i32 {
    let area = (x2 - x1 + 1.0) * (y2 - y1 + 1.0);
    let k = (config.canonical_level as f32 + (area.sqrt() / config.canonical_size).log2()).floor();

    // tiny or degenerate boxes give -inf, which saturates onto min_level
    (k as i32)
        .saturating_add(config.level_offset)
        .clamp(config.min_level, config.max_level)
}

/// Ground truth boxes routed to one pyramid level.
#[derive(Clone, Debug)]
pub struct RoutedBoxes<B: Backend> {
    /// `[G, C]` rows of the input that belong to the level, in input order.
    pub boxes: Tensor<B, 2>,
    /// Row of each routed box in the input.
    pub indices: Vec<usize>,
}

/// Selects the ground truth rows `[x1, y1, x2, y2, ...]` whose level matches `stride`.
///
/// Returns `None` when no box belongs to this level, which callers treat as "nothing to learn
/// here" rather than as an error.
pub fn boxes_for_stride<B: Backend>(
    gt_boxes: Tensor<B, 2>,
    stride: usize,
    config: &LevelConfig,
) -> Option<RoutedBoxes<B>> {
    let [rows, cols] = gt_boxes.dims();
    if rows == 0 || cols < 4 {
        return None;
    }

    let level = stride_level(stride);
    let values = to_f32_vec(gt_boxes.clone());

    let indices = values
        .chunks_exact(cols)
        .enumerate()
        .filter(|(_, row)| box_level(row[0], row[1], row[2], row[3], config) == level)
        .map(|(i, _)| i)
        .collect::<Vec<usize>>();

    if indices.is_empty() {
        return None;
    }

    let device = gt_boxes.device();
    let boxes = gt_boxes.select(0, index_tensor::<B>(&indices, &device));

    Some(RoutedBoxes { boxes, indices })
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{NdArray, ndarray::NdArrayDevice};

    const STRIDES: [usize; 4] = [4, 8, 16, 32];

    fn square(side: f32) -> [f32; 4] {
        [0.0, 0.0, side - 1.0, side - 1.0]
    }

    #[test]
    fn canonical_size_lands_on_stride_16() {
        let config = LevelConfig::new();
        let [x1, y1, x2, y2] = square(224.0);

        assert_eq!(box_level(x1, y1, x2, y2, &config), 4);
        assert_eq!(stride_level(16), 4);
    }

    #[test]
    fn level_boundaries() {
        let config = LevelConfig::new();
        let level = |side: f32| {
            let [x1, y1, x2, y2] = square(side);
            box_level(x1, y1, x2, y2, &config)
        };

        assert_eq!(level(111.0), 2);
        assert_eq!(level(112.0), 3);
        assert_eq!(level(223.0), 3);
        assert_eq!(level(448.0), 5);
        assert_eq!(level(1.0), 2);
        assert_eq!(level(5000.0), 5);
    }

    #[test]
    fn routing_is_exclusive_and_exhaustive() {
        let config = LevelConfig::new();

        for side in [1.0, 8.0, 50.0, 100.0, 150.0, 224.0, 300.0, 449.0, 900.0, 4000.0] {
            let [x1, y1, x2, y2] = square(side);
            let level = box_level(x1, y1, x2, y2, &config);
            let hosts = STRIDES
                .iter()
                .filter(|s| stride_level(**s) == level)
                .count();

            assert_eq!(hosts, 1, "side {side} routed to {hosts} strides");
        }
    }

    #[test]
    fn offset_reproduces_shifted_rule() {
        // k + 4 == log2(stride): only boxes of side 3.5..56 reach the usual strides
        let config = LevelConfig::new()
            .with_level_offset(4)
            .with_min_level(i32::MIN)
            .with_max_level(i32::MAX);

        let [x1, y1, x2, y2] = square(224.0);
        assert_eq!(box_level(x1, y1, x2, y2, &config), 8);

        let [x1, y1, x2, y2] = square(30.0);
        assert_eq!(box_level(x1, y1, x2, y2, &config), 5);
    }

    #[test]
    fn selects_rows_for_stride() {
        let device = &NdArrayDevice::default();
        type B = NdArray<f32>;

        let gt = Tensor::<B, 2>::from_data(
            [
                [0.0, 0.0, 223.0, 223.0, 1.0],
                [10.0, 10.0, 59.0, 59.0, 2.0],
                [5.0, 5.0, 228.0, 228.0, 3.0],
            ],
            device,
        );

        let routed = boxes_for_stride(gt.clone(), 16, &LevelConfig::new()).unwrap();

        assert_eq!(routed.indices, vec![0, 2]);
        assert_eq!(routed.boxes.dims(), [2, 5]);
        assert_eq!(
            to_f32_vec(routed.boxes),
            vec![0.0, 0.0, 223.0, 223.0, 1.0, 5.0, 5.0, 228.0, 228.0, 3.0]
        );

        assert!(boxes_for_stride(gt, 32, &LevelConfig::new()).is_none());
    }
}
