use burn::{
    prelude::Backend,
    tensor::{Int, Tensor},
};
use tracing::debug;

/// Whether proposals are sampled for training or for inference.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Train,
    Test,
}

/// Regions of interest handed to the next stage of the detector.
#[derive(Clone, Debug)]
pub struct Proposals<B: Backend> {
    /// `[N, 4]` boxes `[x1, y1, x2, y2]`.
    pub rois: Tensor<B, 2>,
    /// `[N, 1]` foreground scores.
    pub scores: Tensor<B, 2>,
    /// `[N]` image of each roi within the batch.
    pub batch_ids: Tensor<B, 1, Int>,
}

/// Reduces decoded anchor boxes to the regions a mask or roi head should look at.
pub trait ProposalSampler<B: Backend> {
    /// # Arguments
    ///
    /// * `boxes` - `[R, 4]` decoded boxes.
    /// * `scores` - `[R]` foreground scores.
    /// * `image_height`, `image_width` - Size of the input image.
    fn sample(
        &self,
        boxes: Tensor<B, 2>,
        scores: Tensor<B, 1>,
        image_height: usize,
        image_width: usize,
        phase: Phase,
    ) -> Option<Proposals<B>>;
}

/// Sampler of a network without a second stage, it never proposes anything.
#[derive(Clone, Copy, Debug, Default)]
pub struct Unsampled;

impl<B: Backend> ProposalSampler<B> for Unsampled {
    fn sample(
        &self,
        boxes: Tensor<B, 2>,
        _scores: Tensor<B, 1>,
        image_height: usize,
        image_width: usize,
        phase: Phase,
    ) -> Option<Proposals<B>> {
        let [rows, _] = boxes.dims();
        debug!(
            rows,
            image_height,
            image_width,
            ?phase,
            "proposal sampling is not implemented"
        );

        None
    }
}
