use burn::{
    prelude::Backend,
    tensor::{Int, Tensor, TensorData},
};
use tracing::{debug, instrument};

use crate::{
    boxes::{clip_boxes, decode_delta},
    error::AnchorError,
    layer::AnchorLayer,
    tensor_ops::{argmax_first, from_f32_vec, to_f32_vec},
};

/// Boxes recovered from the outputs of one pyramid level, one row per anchor.
#[derive(Clone, Debug)]
pub struct Detections<B: Backend> {
    /// `[R, 4]` boxes `[x1, y1, x2, y2]` clipped to the image.
    pub boxes: Tensor<B, 2>,
    /// `[R]` argmax class per anchor, `0` background and `1` foreground.
    pub classes: Tensor<B, 1, Int>,
    /// `[R]` foreground score per anchor.
    pub scores: Tensor<B, 1>,
}

impl<B: Backend> Detections<B> {
    fn empty(device: &B::Device) -> Self {
        Self {
            boxes: Tensor::zeros([0, 4], device),
            classes: Tensor::zeros([0], device),
            scores: Tensor::zeros([0], device),
        }
    }
}

/// Stride of a feature map of `width` columns over an image `image_width` pixels wide,
/// rounded to the nearest power of two.
pub fn infer_stride(image_width: usize, width: usize) -> usize {
    let ratio = image_width as f64 / width as f64;
    let level = ratio.log2().round().clamp(0.0, 31.0) as u32;

    1 << level
}

impl AnchorLayer {
    /// Turns the box and score outputs of one pyramid level into image boxes.
    ///
    /// # Arguments
    ///
    /// * `boxes` - `[1, height, width, 4 * A]` class agnostic deltas, or
    ///   `[1, height, width, 8 * A]` with one delta per class.
    /// * `scores` - `[1, height, width, 2 * A]` background and foreground scores per anchor.
    /// * `anchors` - `[height, width, A, 4]` grid, generated when `None` with the stride
    ///   inferred from the image width.
    /// * `image_height`, `image_width` - Size of the input image, boxes are clipped to it.
    ///
    /// # Returns
    ///
    /// One detection per anchor, labelled with its best scoring class (the lowest class on
    /// ties) and its foreground score. With one delta per class, the box is the one predicted
    /// for the winning class.
    #[instrument(level = "debug", skip(self, boxes, scores, anchors))]
    pub fn decode<B: Backend>(
        &self,
        boxes: Tensor<B, 4>,
        scores: Tensor<B, 4>,
        anchors: Option<Tensor<B, 4>>,
        image_height: usize,
        image_width: usize,
    ) -> Result<Detections<B>, AnchorError> {
        let device = boxes.device();
        let [_, height, width, _] = boxes.dims();

        let anchors = match anchors {
            Some(anchors) => anchors,
            None => {
                if width == 0 {
                    return Err(AnchorError::InvalidLayout {
                        name: "box deltas",
                        expected: "[1, h, w > 0, 4A]".into(),
                        got: boxes.dims().to_vec(),
                    });
                }

                let stride = infer_stride(image_width, width);
                debug!(stride, "generating anchors for decoding");
                self.anchor_grid(height, width, stride, &device)
            }
        };

        // every row must be whole before counting rows
        let layouts = [
            ("anchor grid", anchors.dims(), anchors.dims()[3] == 4, "[h, w, A, 4]"),
            ("box deltas", boxes.dims(), boxes.dims()[3] % 4 == 0, "[1, h, w, 4A]"),
            ("scores", scores.dims(), scores.dims()[3] % 2 == 0, "[1, h, w, 2A]"),
        ];
        if let Some((name, dims, _, expected)) = layouts.into_iter().find(|l| !l.2) {
            return Err(AnchorError::InvalidLayout {
                name,
                expected: expected.into(),
                got: dims.to_vec(),
            });
        }

        let num_anchors = anchors.dims().iter().product::<usize>() / 4;
        let num_scores = scores.dims().iter().product::<usize>() / 2;
        let num_deltas = boxes.dims().iter().product::<usize>();

        let classes_per_box = match num_deltas {
            n if n == num_anchors * 4 => 1,
            n if n == num_anchors * 8 => 2,
            _ => 0,
        };

        if num_scores != num_anchors || classes_per_box == 0 {
            return Err(AnchorError::ShapeMismatch {
                scores: num_scores,
                boxes: num_deltas / 4,
                anchors: num_anchors,
            });
        }

        if num_anchors == 0 {
            return Ok(Detections::empty(&device));
        }

        let anchors = anchors.reshape([num_anchors, 4]);

        // one anchor row per delta row
        let anchors = if classes_per_box == 1 {
            anchors
        } else {
            anchors
                .reshape([num_anchors, 1, 4])
                .repeat_dim(1, classes_per_box)
                .reshape([num_anchors * classes_per_box, 4])
        };
        let decoded = to_f32_vec(decode_delta(
            anchors,
            boxes.reshape([num_anchors * classes_per_box, 4]),
        ));

        let scores = to_f32_vec(scores);

        let mut final_boxes = Vec::with_capacity(num_anchors * 4);
        let mut classes = Vec::with_capacity(num_anchors);
        let mut fg_scores = Vec::with_capacity(num_anchors);

        for (i, pair) in scores.chunks_exact(2).enumerate() {
            let (class, _) = argmax_first(pair.iter().copied()).unwrap_or((0, 0.0));
            let slot = if classes_per_box == 1 { 0 } else { class };
            let row = (i * classes_per_box + slot) * 4;

            final_boxes.extend_from_slice(&decoded[row..row + 4]);
            classes.push(class as i64);
            fg_scores.push(pair[1]);
        }

        let boxes = clip_boxes(
            from_f32_vec(final_boxes, [num_anchors, 4], &device),
            image_height,
            image_width,
        );

        Ok(Detections {
            boxes,
            classes: Tensor::from_data(TensorData::new(classes, [num_anchors]), &device),
            scores: from_f32_vec(fg_scores, [num_anchors], &device),
        })
    }
}
