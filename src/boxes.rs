use crate::{check_nan, tensor_ops::outer_pair};

use burn::{
    prelude::Backend,
    tensor::{Tensor, s},
};

/// Splits a tensor of bounding boxes in any 4 component format (cxcywh, xyxy, ect..) into
/// individual components.
///
/// # Arguments
///
/// * `boxes` - Tensor of shape [num_boxes, 4] containing boxes in any 4 component format.
///
/// # Returns
///
/// * Tuple of four tensors `(c1, c2, c3, c4)` each of shape [num_boxes, 1].
pub fn boxes_to_components<B: Backend>(
    boxes: Tensor<B, 2>,
) -> (Tensor<B, 2>, Tensor<B, 2>, Tensor<B, 2>, Tensor<B, 2>) {
    (
        boxes.clone().slice(s![.., 0]),
        boxes.clone().slice(s![.., 1]),
        boxes.clone().slice(s![.., 2]),
        boxes.slice(s![.., 3]),
    )
}

/// Converts corner boxes `(x1, y1, x2, y2)` to centre, width and height columns.
///
/// Coordinates are pixel indices, so a box covering pixels `0..=9` has a width of 10:
///
/// ```text
/// w  = x2 - x1 + 1
/// cx = x1 + 0.5 * w
/// ```
pub fn x1y1x2y2_to_cxcywh<B: Backend>(
    boxes: Tensor<B, 2>,
) -> (Tensor<B, 2>, Tensor<B, 2>, Tensor<B, 2>, Tensor<B, 2>) {
    let (x1, y1, x2, y2) = boxes_to_components(boxes);

    let w = (x2 - x1.clone()).add_scalar(1.0);
    let h = (y2 - y1.clone()).add_scalar(1.0);
    let cx = x1 + w.clone().mul_scalar(0.5);
    let cy = y1 + h.clone().mul_scalar(0.5);

    (cx, cy, w, h)
}

/// Area of each box in pixels, shape `[num_boxes, 1]`.
pub fn box_areas<B: Backend>(boxes: Tensor<B, 2>) -> Tensor<B, 2> {
    let (x1, y1, x2, y2) = boxes_to_components(boxes);

    (x2 - x1).add_scalar(1.0) * (y2 - y1).add_scalar(1.0)
}

/// Computes the Intersection over Union (IoU) between two sets of bounding boxes in `xyxy`
/// format.
///
/// The function returns a matrix of shape `[N, M]` where entry `(i, j)` is the IoU between box
/// `i` of `boxes_a` and box `j` of `boxes_b`. Widths and heights are inclusive
/// (`x2 - x1 + 1`), boxes that do not intersect have an IoU of 0.
///
/// ```text
///                 Dim 1
///              boxes_b (M)
///             ┌──────────────►
///             │┌──────────────────┐
///    Dim 0    ││                  │
///   boxes_a   ││       IOU        │
///     (N)     ││                  │
///             ▼└──────────────────┘
/// ```
///
/// # Arguments
/// * `boxes_a` - Tensor of shape `[N, 4]`.
/// * `boxes_b` - Tensor of shape `[M, 4]`.
pub fn compute_overlap<B: Backend>(boxes_a: Tensor<B, 2>, boxes_b: Tensor<B, 2>) -> Tensor<B, 2> {
    let (ax1, ay1, ax2, ay2) = boxes_to_components(boxes_a.clone());
    let (bx1, by1, bx2, by2) = boxes_to_components(boxes_b.clone());

    // --- Intersection top-left corner ---
    let (a, b) = outer_pair(ax1, bx1);
    let x1_max = a.max_pair(b);

    let (a, b) = outer_pair(ay1, by1);
    let y1_max = a.max_pair(b);

    // --- Intersection bottom-right corner ---
    let (a, b) = outer_pair(ax2, bx2);
    let x2_min = a.min_pair(b);

    let (a, b) = outer_pair(ay2, by2);
    let y2_min = a.min_pair(b);

    let iw = (x2_min - x1_max).add_scalar(1.0).clamp_min(0.0);
    let ih = (y2_min - y1_max).add_scalar(1.0).clamp_min(0.0);
    let intersection = iw * ih;

    // --- Union area ---
    let (a, b) = outer_pair(box_areas(boxes_a), box_areas(boxes_b));
    let union = (a + b) - intersection.clone();

    intersection / union
}

/// Computes the regression targets that move each anchor onto its matched box.
///
/// Both tensors are `[num_boxes, 4]` in `xyxy` format and paired row by row. The
/// parameterisation is the usual region proposal one:
///
/// ```text
///      Gx - Ax           Gy - Ay               ⎛Gw⎞               ⎛Gh⎞
/// dx = ───────      dy = ───────      dw = log ⎜──⎟      dh = log ⎜──⎟
///        Aw                Ah                  ⎝Aw⎠               ⎝Ah⎠
/// ```
///
/// where `(Ax, Ay, Aw, Ah)` are the anchor centre and size and `(Gx, Gy, Gw, Gh)` the same for
/// the target box.
///
/// # Returns
///
/// * `Tensor<B, 2>` - `[num_boxes, 4]` deltas `(dx, dy, dw, dh)`.
pub fn encode_delta<B: Backend>(anchors: Tensor<B, 2>, targets: Tensor<B, 2>) -> Tensor<B, 2> {
    let (ax, ay, aw, ah) = x1y1x2y2_to_cxcywh(anchors);
    let (gx, gy, gw, gh) = x1y1x2y2_to_cxcywh(targets);

    let dx = (gx - ax) / aw.clone();
    let dy = (gy - ay) / ah.clone();

    let dw = (gw.clone() / aw.clone()).log();
    check_nan!(dw, gw, aw);

    let dh = (gh.clone() / ah.clone()).log();
    check_nan!(dh, gh, ah);

    Tensor::cat(vec![dx, dy, dw, dh], 1)
}

/// Applies predicted deltas to anchors, the inverse of [`encode_delta`].
///
/// ```text
/// cx = dx * Aw + Ax        w = exp(dw) * Aw
/// cy = dy * Ah + Ay        h = exp(dh) * Ah
///
/// x1 = cx - 0.5 * w        x2 = cx + 0.5 * w - 1
/// ```
///
/// The `- 1` on the far corner undoes the inclusive width so that decoding the encoding of a
/// box gives the box back.
///
/// # Arguments
///
/// * `anchors` - `[num_boxes, 4]` anchors in `xyxy` format.
/// * `deltas` - `[num_boxes, 4]` deltas `(dx, dy, dw, dh)`.
pub fn decode_delta<B: Backend>(anchors: Tensor<B, 2>, deltas: Tensor<B, 2>) -> Tensor<B, 2> {
    let (ax, ay, aw, ah) = x1y1x2y2_to_cxcywh(anchors);
    let (dx, dy, dw, dh) = boxes_to_components(deltas);

    let cx = dx * aw.clone() + ax;
    let cy = dy * ah.clone() + ay;
    let w = dw.exp() * aw;
    let h = dh.exp() * ah;

    let half_w = w.mul_scalar(0.5);
    let half_h = h.mul_scalar(0.5);

    Tensor::cat(
        vec![
            cx.clone() - half_w.clone(),
            cy.clone() - half_h.clone(),
            (cx + half_w).sub_scalar(1.0),
            (cy + half_h).sub_scalar(1.0),
        ],
        1,
    )
}

/// Clamps `xyxy` boxes to the pixels of an image, x into `[0, width - 1]` and y into
/// `[0, height - 1]`.
pub fn clip_boxes<B: Backend>(boxes: Tensor<B, 2>, height: usize, width: usize) -> Tensor<B, 2> {
    let max_x = width.saturating_sub(1) as f32;
    let max_y = height.saturating_sub(1) as f32;

    let (x1, y1, x2, y2) = boxes_to_components(boxes);

    Tensor::cat(
        vec![
            x1.clamp(0.0, max_x),
            y1.clamp(0.0, max_y),
            x2.clamp(0.0, max_x),
            y2.clamp(0.0, max_y),
        ],
        1,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{debug::assert_approx_eq, tensor_ops::to_f32_vec};
    use burn::backend::{NdArray, ndarray::NdArrayDevice};

    type B = NdArray<f32>;

    fn assert_all_close(a: &[f32], b: &[f32], eps: f32) {
        assert_eq!(a.len(), b.len(), "{a:?} vs {b:?}");
        for (a, b) in a.iter().zip(b.iter()) {
            assert_approx_eq(a, b, eps);
        }
    }

    #[test]
    fn test_iou() {
        let device = &NdArrayDevice::default();

        let boxes1 = Tensor::<B, 2>::from_data(
            [[0.0, 0.0, 9.0, 9.0], [10.0, 10.0, 19.0, 29.0]],
            device,
        );

        let boxes2 = Tensor::<B, 2>::from_data(
            [
                [0.0, 0.0, 9.0, 9.0],
                [5.0, 5.0, 14.0, 14.0],
                [50.0, 50.0, 60.0, 60.0],
            ],
            device,
        );

        let iou = compute_overlap(boxes1, boxes2);

        assert_eq!(iou.dims(), [2, 3]);

        // 25 / (100 + 100 - 25), 25 / (100 + 200 - 25)
        assert_all_close(
            &to_f32_vec(iou),
            &[1.0, 0.14285715, 0.0, 0.0, 0.09090909, 0.0],
            1e-6,
        );
    }

    #[test]
    fn test_touching_boxes_overlap_by_one_pixel() {
        let device = &NdArrayDevice::default();

        let a = Tensor::<B, 2>::from_data([[0.0, 0.0, 9.0, 0.0]], device);
        let b = Tensor::<B, 2>::from_data([[9.0, 0.0, 18.0, 0.0]], device);

        // 1 shared pixel out of 19
        assert_all_close(&to_f32_vec(compute_overlap(a, b)), &[1.0 / 19.0], 1e-6);
    }

    #[test]
    fn test_encode_delta() {
        let device = &NdArrayDevice::default();

        let anchors = Tensor::<B, 2>::from_data([[0.0, 0.0, 15.0, 15.0]], device);
        let targets = Tensor::<B, 2>::from_data([[8.0, 0.0, 23.0, 31.0]], device);

        let deltas = encode_delta(anchors, targets);

        assert_all_close(
            &to_f32_vec(deltas),
            &[0.5, 0.5, 0.0, std::f32::consts::LN_2],
            1e-6,
        );
    }

    #[test]
    fn test_decode_inverts_encode() {
        let device = &NdArrayDevice::default();

        let anchors = Tensor::<B, 2>::from_data(
            [
                [-84.0, -40.0, 99.0, 55.0],
                [0.0, 0.0, 10.0, 10.0],
                [12.5, 3.0, 40.0, 90.0],
            ],
            device,
        );
        let targets = Tensor::<B, 2>::from_data(
            [
                [10.0, 12.0, 60.0, 30.0],
                [0.0, 0.0, 10.0, 10.0],
                [1.0, 2.0, 300.0, 41.0],
            ],
            device,
        );

        let deltas = encode_delta(anchors.clone(), targets.clone());
        let decoded = decode_delta(anchors, deltas);

        assert_all_close(&to_f32_vec(decoded), &to_f32_vec(targets), 1e-3);
    }

    #[test]
    fn test_zero_delta_returns_anchor() {
        let device = &NdArrayDevice::default();

        let anchors = Tensor::<B, 2>::from_data([[0.0, 0.0, 10.0, 10.0]], device);
        let deltas = Tensor::<B, 2>::zeros([1, 4], device);

        assert_all_close(
            &to_f32_vec(decode_delta(anchors, deltas)),
            &[0.0, 0.0, 10.0, 10.0],
            1e-6,
        );
    }

    #[test]
    fn inverted_height_gives_nan_without_panicking() {
        let device = &NdArrayDevice::default();

        let anchors = Tensor::<B, 2>::from_data([[0.0, 0.0, 15.0, 15.0]], device);
        let targets = Tensor::<B, 2>::from_data([[0.0, 0.0, 15.0, -5.0]], device);

        let deltas = to_f32_vec(encode_delta(anchors, targets));

        assert_approx_eq(&deltas[2], &0.0, 1e-6);
        assert!(deltas[3].is_nan());
    }

    #[test]
    fn test_clip_boxes() {
        let device = &NdArrayDevice::default();

        let boxes = Tensor::<B, 2>::from_data(
            [[-5.0, -1.0, 120.0, 40.0], [10.0, 10.0, 20.0, 80.0]],
            device,
        );

        let clipped = clip_boxes(boxes, 50, 100);

        assert_all_close(
            &to_f32_vec(clipped),
            &[0.0, 0.0, 99.0, 40.0, 10.0, 10.0, 20.0, 49.0],
            1e-6,
        );
    }
}
