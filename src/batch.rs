use ndarray::{Array2, ArrayD, ArrayViewD, Axis, IxDyn};
use thiserror::Error;

/// Contract errors for batched array operations.
///
/// These are call-boundary violations (incompatible operand shapes), not
/// numerical failures; numerical failures propagate as non-finite values.
#[derive(Error, Debug)]
pub enum ShapeError {
    #[error("operand of rank {got} where at least rank {needed} is required")]
    RankTooSmall { needed: usize, got: usize },

    #[error("operand shapes {left:?} and {right:?} do not agree")]
    OperandMismatch { left: Vec<usize>, right: Vec<usize> },

    #[error("cannot broadcast shape {from:?} to {to:?}")]
    Broadcast { from: Vec<usize>, to: Vec<usize> },

    #[error("array layout error: {0}")]
    Layout(#[from] ndarray::ShapeError),
}

/// Transpose of a batched matrix: swaps the two trailing axes, leaving any
/// leading batch axes untouched. Returns a view; no data is moved.
///
/// Panics if `matrix` has rank < 2.
pub fn transpose(matrix: ArrayViewD<'_, f64>) -> ArrayViewD<'_, f64> {
    let rank = matrix.ndim();
    assert!(rank >= 2, "transpose requires rank >= 2, got {rank}");
    let mut view = matrix;
    view.swap_axes(rank - 2, rank - 1);
    view
}

/// Inserts `count` singleton axes at `position`, shifting later axes right.
///
/// Used to separate axis roles before broadcasting: a reduction axis that has
/// been pushed past explicitly inserted singletons can never be conflated
/// with a candidate or order axis.
///
/// Panics if `position` exceeds the rank of `array`.
pub fn expand_dims(array: ArrayViewD<'_, f64>, position: usize, count: usize) -> ArrayViewD<'_, f64> {
    let mut view = array;
    for _ in 0..count {
        view = view.insert_axis(Axis(position));
    }
    view
}

/// Batched matrix–vector product.
///
/// `matrix` has shape `batch × R × C` and `vector` shape `batch × C`, where
/// `batch` is any (possibly empty) sequence of leading axes; the two batch
/// prefixes must agree exactly. Returns `batch × R`.
///
/// # Errors
///
/// [`ShapeError::RankTooSmall`] if `matrix` has rank < 2, and
/// [`ShapeError::OperandMismatch`] if the batch prefixes or the contraction
/// dimension disagree.
pub fn matvec(
    matrix: ArrayViewD<'_, f64>,
    vector: ArrayViewD<'_, f64>,
) -> Result<ArrayD<f64>, ShapeError> {
    let rank = matrix.ndim();
    if rank < 2 {
        return Err(ShapeError::RankTooSmall {
            needed: 2,
            got: rank,
        });
    }
    let rows = matrix.shape()[rank - 2];
    let cols = matrix.shape()[rank - 1];
    let lane_shape = &matrix.shape()[..rank - 2];

    let mut expected = lane_shape.to_vec();
    expected.push(cols);
    if vector.shape() != expected.as_slice() {
        return Err(ShapeError::OperandMismatch {
            left: matrix.shape().to_vec(),
            right: vector.shape().to_vec(),
        });
    }

    let lanes: usize = lane_shape.iter().product();
    let matrix_std = matrix.as_standard_layout();
    let vector_std = vector.as_standard_layout();
    let matrix_lanes = matrix_std.to_shape((lanes, rows, cols))?;
    let vector_lanes = vector_std.to_shape((lanes, cols))?;

    let mut output = Array2::<f64>::zeros((lanes, rows));
    for ((mut out_lane, matrix_lane), vector_lane) in output
        .outer_iter_mut()
        .zip(matrix_lanes.outer_iter())
        .zip(vector_lanes.outer_iter())
    {
        out_lane.assign(&matrix_lane.dot(&vector_lane));
    }

    let mut out_shape = lane_shape.to_vec();
    out_shape.push(rows);
    Ok(output.into_shape_with_order(IxDyn(&out_shape))?)
}
