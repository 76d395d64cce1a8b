use burn::{prelude::Backend, tensor::Tensor};

use crate::tensor_ops::{index_tensor, to_f32_vec};

/// Anchors that survived the border check together with where they came from.
#[derive(Clone, Debug)]
pub struct InsideAnchors<B: Backend> {
    /// `[A, 4]` retained anchors, in grid order.
    pub anchors: Tensor<B, 2>,
    /// Position of each retained anchor in the flattened grid.
    pub indices: Vec<usize>,
    /// Number of anchors in the full grid.
    pub total: usize,
}

impl<B: Backend> InsideAnchors<B> {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Keeps the anchors lying inside the image, give or take `border` pixels.
///
/// The image covered by a `height x width` feature map of the given `stride` spans
/// `width * stride` by `height * stride` pixels. An anchor is kept when
///
/// ```text
/// x1 >= -border   y1 >= -border   x2 < width * stride + border   y2 < height * stride + border
/// ```
///
/// # Arguments
///
/// * `all_anchors` - `[N, 4]` flattened anchor grid.
///
/// # Returns
///
/// The retained anchors and their grid positions, ordered as in `all_anchors`.
pub fn inside_anchors<B: Backend>(
    all_anchors: Tensor<B, 2>,
    border: f32,
    height: usize,
    width: usize,
    stride: usize,
) -> InsideAnchors<B> {
    let [total, _] = all_anchors.dims();
    let device = all_anchors.device();

    let max_x = (width * stride) as f32 + border;
    let max_y = (height * stride) as f32 + border;

    let values = to_f32_vec(all_anchors.clone());
    let indices = values
        .chunks_exact(4)
        .enumerate()
        .filter(|(_, a)| a[0] >= -border && a[1] >= -border && a[2] < max_x && a[3] < max_y)
        .map(|(i, _)| i)
        .collect::<Vec<usize>>();

    let anchors = if indices.is_empty() {
        Tensor::zeros([0, 4], &device)
    } else {
        all_anchors.select(0, index_tensor::<B>(&indices, &device))
    };

    InsideAnchors {
        anchors,
        indices,
        total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{NdArray, ndarray::NdArrayDevice};

    #[test]
    fn keeps_anchors_inside_border() {
        let device = &NdArrayDevice::default();
        type B = NdArray<f32>;

        // 2x2 map, stride 8 -> 16x16 image
        let anchors = Tensor::<B, 2>::from_data(
            [
                [0.0, 0.0, 7.0, 7.0],
                [-1.0, 0.0, 7.0, 7.0],
                [8.0, 8.0, 15.0, 15.0],
                [8.0, 8.0, 16.0, 15.0],
                [-0.5, -0.5, 15.5, 15.5],
            ],
            device,
        );

        let strict = inside_anchors(anchors.clone(), 0.0, 2, 2, 8);
        assert_eq!(strict.indices, vec![0, 2]);
        assert_eq!(strict.total, 5);
        assert_eq!(
            to_f32_vec(strict.anchors),
            vec![0.0, 0.0, 7.0, 7.0, 8.0, 8.0, 15.0, 15.0]
        );

        let loose = inside_anchors(anchors, 1.0, 2, 2, 8);
        assert_eq!(loose.indices, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn nothing_inside() {
        let device = &NdArrayDevice::default();
        type B = NdArray<f32>;

        let anchors = Tensor::<B, 2>::from_data([[-100.0, -100.0, 200.0, 200.0]], device);

        let inside = inside_anchors(anchors, 0.0, 2, 2, 8);

        assert!(inside.is_empty());
        assert_eq!(inside.total, 1);
        assert_eq!(inside.anchors.dims(), [0, 4]);
    }
}
