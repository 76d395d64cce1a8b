use burn::{
    prelude::Backend,
    tensor::{Device, Int, Tensor, TensorData},
};

/// Copies a float tensor to the host in row-major order.
pub fn to_f32_vec<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Vec<f32> {
    tensor.into_data().iter::<f32>().collect()
}

/// Builds a float tensor of the given shape from host values.
pub fn from_f32_vec<B: Backend, const D: usize>(
    values: Vec<f32>,
    shape: [usize; D],
    device: &Device<B>,
) -> Tensor<B, D> {
    Tensor::from_data(TensorData::new(values, shape), device)
}

/// Converts host indices into an index tensor usable with `select`.
pub fn index_tensor<B: Backend>(indices: &[usize], device: &Device<B>) -> Tensor<B, 1, Int> {
    let indices = indices.iter().map(|i| *i as i64).collect::<Vec<i64>>();
    let len = indices.len();
    Tensor::from_data(TensorData::new(indices, [len]), device)
}

/// Expands a column `[N, 1]` and a column `[M, 1]` into two `[N, M]` grids so
/// that element `(i, j)` pairs row `i` of `a` with row `j` of `b`.
pub fn outer_pair<B: Backend>(a: Tensor<B, 2>, b: Tensor<B, 2>) -> (Tensor<B, 2>, Tensor<B, 2>) {
    let [n, _] = a.dims();
    let [m, _] = b.dims();

    (
        a.reshape([n, 1]).repeat_dim(1, m),
        b.reshape([1, m]).repeat_dim(0, n),
    )
}

/// Index of the largest value, the first one on ties. `None` for an empty slice.
pub fn argmax_first(values: impl IntoIterator<Item = f32>) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;

    for (i, v) in values.into_iter().enumerate() {
        match best {
            Some((_, b)) if !(v > b) => {}
            _ => best = Some((i, v)),
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{NdArray, ndarray::NdArrayDevice};

    #[test]
    fn test_outer_pair() {
        let device = &NdArrayDevice::default();
        type B = NdArray<f32>;

        let a = Tensor::<B, 2>::from_data([[1.0], [2.0]], device);
        let b = Tensor::<B, 2>::from_data([[10.0], [20.0], [30.0]], device);

        let (a, b) = outer_pair(a, b);

        assert_eq!(a.dims(), [2, 3]);
        assert_eq!(to_f32_vec(a), vec![1.0, 1.0, 1.0, 2.0, 2.0, 2.0]);
        assert_eq!(to_f32_vec(b), vec![10.0, 20.0, 30.0, 10.0, 20.0, 30.0]);
    }

    #[test]
    fn test_argmax_first_prefers_lowest_index() {
        assert_eq!(argmax_first([0.2, 0.8, 0.8, 0.1]), Some((1, 0.8)));
        assert_eq!(argmax_first([0.5, 0.5]), Some((0, 0.5)));
        assert_eq!(argmax_first([]), None);
    }

    #[test]
    fn test_index_tensor() {
        let device = &NdArrayDevice::default();
        type B = NdArray<f32>;

        let values = Tensor::<B, 2>::from_data([[0.0, 0.0], [1.0, 1.0], [2.0, 2.0]], device);
        let picked = values.select(0, index_tensor::<B>(&[2, 0], device));

        assert_eq!(to_f32_vec(picked), vec![2.0, 2.0, 0.0, 0.0]);
    }
}
