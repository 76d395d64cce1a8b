use burn::{prelude::Backend, tensor::Tensor};

use crate::{config::AnchorGridConfig, tensor_ops::from_f32_vec};

/// Returns the anchors centred on the first feature map cell, one `[x1, y1, x2, y2]` per
/// (ratio, scale) pair, ratio-major.
///
/// A square reference box `[0, 0, base - 1, base - 1]` is first reshaped to every aspect
/// ratio while keeping its area, then grown by every scale:
///
/// ```text
///            ⎛   ⎛  w⋅h  ⎞⎞
/// ws = round ⎜sqrt⎜─────── ⎟⎟      hs = round(ws ⋅ ratio)
///            ⎝   ⎝ ratio ⎠⎠
///
/// anchor = [cx - (ws⋅s - 1)/2, cy - (hs⋅s - 1)/2, cx + (ws⋅s - 1)/2, cy + (hs⋅s - 1)/2]
/// ```
///
/// with `cx = cy = (base - 1) / 2`. Rounding is half-to-even so base 16 with ratios
/// `{0.5, 1, 2}` and scales `{8, 16, 32}` yields the familiar
/// `[-84, -40, 99, 55], [-176, -88, 191, 103], ...` set.
pub fn base_anchors(config: &AnchorGridConfig) -> Vec<[f32; 4]> {
    let base = config.base_size;
    let size = base * base;
    let ctr = 0.5 * (base - 1.0);

    let mut anchors = Vec::with_capacity(config.anchors_per_location());

    for ratio in config.ratios.iter() {
        let ws = (size / ratio).sqrt().round_ties_even();
        let hs = (ws * ratio).round_ties_even();

        for scale in config.scales.iter() {
            let half_w = 0.5 * (ws * scale - 1.0);
            let half_h = 0.5 * (hs * scale - 1.0);

            anchors.push([ctr - half_w, ctr - half_h, ctr + half_w, ctr + half_h]);
        }
    }

    anchors
}

/// Tiles the base anchors over a `height x width` feature map.
///
/// The anchors of cell `(y, x)` are the base anchors shifted by `x * stride` horizontally
/// and `y * stride` vertically, so the result is laid out as
///
/// ```text
/// [height, width, anchors per cell, 4]
/// ```
///
/// which, flattened to `[height * width * A, 4]`, is the anchor ordering every other part of
/// the layer indexes into.
pub fn anchor_plane<B: Backend>(
    height: usize,
    width: usize,
    stride: usize,
    config: &AnchorGridConfig,
    device: &B::Device,
) -> Tensor<B, 4> {
    let base = base_anchors(config);
    let per_cell = base.len();

    let mut grid_pos: Vec<f32> = Vec::with_capacity(height * width * per_cell * 4);

    for y in 0..height {
        let shift_y = (y * stride) as f32;
        for x in 0..width {
            let shift_x = (x * stride) as f32;
            for [x1, y1, x2, y2] in base.iter() {
                grid_pos.extend([x1 + shift_x, y1 + shift_y, x2 + shift_x, y2 + shift_y]);
            }
        }
    }

    from_f32_vec(grid_pos, [height, width, per_cell, 4], device)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{debug::assert_approx_eq, tensor_ops::to_f32_vec};
    use burn::backend::{NdArray, ndarray::NdArrayDevice};

    #[test]
    fn classic_base_anchors() {
        let config = AnchorGridConfig::new().with_scales(vec![8.0, 16.0, 32.0]);

        let expected = [
            [-84.0, -40.0, 99.0, 55.0],
            [-176.0, -88.0, 191.0, 103.0],
            [-360.0, -184.0, 375.0, 199.0],
            [-56.0, -56.0, 71.0, 71.0],
            [-120.0, -120.0, 135.0, 135.0],
            [-248.0, -248.0, 263.0, 263.0],
            [-36.0, -80.0, 51.0, 95.0],
            [-80.0, -168.0, 95.0, 183.0],
            [-168.0, -344.0, 183.0, 359.0],
        ];

        let anchors = base_anchors(&config);

        assert_eq!(anchors.len(), expected.len());
        for (a, b) in anchors.iter().zip(expected.iter()) {
            for (a, b) in a.iter().zip(b.iter()) {
                assert_approx_eq(a, b, 1e-4);
            }
        }
    }

    #[test]
    fn plane_is_shifted_per_cell() {
        let device = &NdArrayDevice::default();
        type B = NdArray<f32>;

        let config = AnchorGridConfig::new()
            .with_ratios(vec![1.0])
            .with_scales(vec![1.0, 2.0]);

        let plane = anchor_plane::<B>(2, 3, 8, &config, device);

        assert_eq!(plane.dims(), [2, 3, 2, 4]);

        let values = to_f32_vec(plane);

        // cell (0, 0)
        assert_eq!(&values[0..8], &[0.0, 0.0, 15.0, 15.0, -8.0, -8.0, 23.0, 23.0]);

        // cell (1, 2), first anchor: shifted by (16, 8)
        let offset = ((1 * 3 + 2) * 2) * 4;
        assert_eq!(&values[offset..offset + 4], &[16.0, 8.0, 31.0, 23.0]);
    }

    #[test]
    fn default_plane_size() {
        let device = &NdArrayDevice::default();
        type B = NdArray<f32>;

        let plane = anchor_plane::<B>(4, 5, 16, &AnchorGridConfig::new(), device);

        assert_eq!(plane.dims(), [4, 5, 15, 4]);
    }
}
