use burn::{prelude::Backend, tensor::Tensor};

use crate::{
    error::AnchorError,
    tensor_ops::{from_f32_vec, to_f32_vec},
};

/// Scatters rows of a subset back into a population of `count` rows.
///
/// `data` holds `indices.len()` rows of `row_len` values each. Row `r` of `data` lands on row
/// `indices[r]` of the result; every other row is filled with `fill`.
pub fn unmap_slice(
    data: &[f32],
    row_len: usize,
    count: usize,
    indices: &[usize],
    fill: f32,
) -> Result<Vec<f32>, AnchorError> {
    if data.len() != indices.len() * row_len {
        return Err(AnchorError::InvalidLayout {
            name: "unmap data",
            expected: format!("{} rows of {} values", indices.len(), row_len),
            got: vec![data.len()],
        });
    }

    if let Some(bad) = indices.iter().find(|i| **i >= count) {
        return Err(AnchorError::InvalidLayout {
            name: "unmap indices",
            expected: format!("indices below {count}"),
            got: vec![*bad],
        });
    }

    let mut out = vec![fill; count * row_len];

    for (row, index) in data.chunks_exact(row_len.max(1)).zip(indices.iter()) {
        out[index * row_len..(index + 1) * row_len].copy_from_slice(row);
    }

    Ok(out)
}

/// Maps a tensor computed over the filtered anchors back onto the whole anchor grid.
///
/// Works for label vectors (`D = 1`) as well as `[A, 4]` target and weight matrices
/// (`D = 2`); the fill value is applied to every element of a missing row.
///
/// # Example
///
/// ```text
/// data = [5.0], count = 4, indices = [2], fill = 0  ->  [0.0, 0.0, 5.0, 0.0]
/// ```
pub fn unmap<B: Backend, const D: usize>(
    data: Tensor<B, D>,
    count: usize,
    indices: &[usize],
    fill: f32,
) -> Result<Tensor<B, D>, AnchorError> {
    let dims = data.dims();
    let device = data.device();
    let row_len: usize = dims[1..].iter().product();

    if dims[0] != indices.len() {
        return Err(AnchorError::InvalidLayout {
            name: "unmap data",
            expected: format!("{} rows", indices.len()),
            got: dims.to_vec(),
        });
    }

    // empty subsets never touch the tensor data
    let values = if indices.is_empty() {
        vec![]
    } else {
        to_f32_vec(data)
    };

    let out = unmap_slice(&values, row_len, count, indices, fill)?;

    let mut shape = dims;
    shape[0] = count;

    Ok(from_f32_vec(out, shape, &device))
}
