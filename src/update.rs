use crate::batch::{self, ShapeError};
use ndarray::{ArrayD, ArrayView1, ArrayViewD, Axis, concatenate};
use thiserror::Error;

/// Contract errors for update-vector construction.
#[derive(Error, Debug)]
pub enum UpdateError {
    #[error("append column index {index} is out of bounds for a covariance of {ncols} columns")]
    AppendIndexOutOfBounds { index: usize, ncols: usize },

    #[error("eigen column index {index} is out of bounds for a covariance of {ncols} columns")]
    EigIndexOutOfBounds { index: usize, ncols: usize },

    #[error("{got} eigen column indices were supplied for a decomposition of {expected} eigenvalues")]
    IndexCountMismatch { expected: usize, got: usize },

    #[error("column_norms has {got} entries but the covariance has {expected} columns")]
    ColumnNormsLength { expected: usize, got: usize },

    #[error("variance normalization requires at least two rows, got {0}")]
    TooFewRows(usize),

    #[error(transparent)]
    Shape(#[from] ShapeError),
}

/// Constructs the rank-one perturbation vector for an appended feature column.
///
/// The appended column's cross-covariance with the already-decomposed columns
/// is projected onto the current eigenbasis and divided elementwise by the
/// eigenvalues, expressing the new column in whitened eigen-coordinates. The
/// portion of the column's variance that falls outside the span of that basis
/// becomes an orthogonal residual, paired with a new zero eigenvalue, and is
/// prepended as the first coordinate of the result.
///
/// # Arguments
///
/// * `eigenvalues`: shape `batch × N`, ascending. The spectrum of the
///   covariance restricted to the decomposed columns.
/// * `eigenvectors`: shape `batch × N × N`, orthonormal columns; column `i`
///   belongs to `eigenvalues[i]`.
/// * `eig_column_indices`: the `N` covariance column indices already
///   represented in the decomposition, in the order the basis was built.
/// * `append_column_index`: the covariance column being appended.
/// * `cov`: shape `batch × P × P`, symmetric. Only the appended row,
///   restricted to `eig_column_indices`, is read.
/// * `column_norms`: length `P`; per-column L2 norm of the centered data.
/// * `num_row`: sample count; the variance divisor is `num_row − 1`.
///
/// # Returns
///
/// The perturbation vector, shape `batch × (N+1)`: entry 0 is the orthogonal
/// residual, entries `1..` the projected cross-covariance.
///
/// # Errors
///
/// [`UpdateError`] on any index/shape contract violation. A negative residual
/// radicand (inconsistent norms or decomposition) is *not* an error: that
/// batch lane comes back NaN and sibling lanes are unaffected.
pub fn construct_update_vector(
    eigenvalues: ArrayViewD<'_, f64>,
    eigenvectors: ArrayViewD<'_, f64>,
    eig_column_indices: &[usize],
    append_column_index: usize,
    cov: ArrayViewD<'_, f64>,
    column_norms: ArrayView1<'_, f64>,
    num_row: usize,
) -> Result<ArrayD<f64>, UpdateError> {
    if num_row < 2 {
        return Err(UpdateError::TooFewRows(num_row));
    }
    if eigenvalues.ndim() < 1 {
        return Err(ShapeError::RankTooSmall {
            needed: 1,
            got: eigenvalues.ndim(),
        }
        .into());
    }
    let batch_ndim = eigenvalues.ndim() - 1;
    let num_eig = eigenvalues.shape()[batch_ndim];
    if eig_column_indices.len() != num_eig {
        return Err(UpdateError::IndexCountMismatch {
            expected: num_eig,
            got: eig_column_indices.len(),
        });
    }

    let mut expected_vectors = eigenvalues.shape()[..batch_ndim].to_vec();
    expected_vectors.push(num_eig);
    expected_vectors.push(num_eig);
    if eigenvectors.shape() != expected_vectors.as_slice() {
        return Err(ShapeError::OperandMismatch {
            left: eigenvectors.shape().to_vec(),
            right: expected_vectors,
        }
        .into());
    }

    if cov.ndim() != batch_ndim + 2 || cov.shape()[batch_ndim] != cov.shape()[batch_ndim + 1] {
        return Err(ShapeError::OperandMismatch {
            left: cov.shape().to_vec(),
            right: eigenvalues.shape().to_vec(),
        }
        .into());
    }
    let num_col = cov.shape()[batch_ndim + 1];
    if append_column_index >= num_col {
        return Err(UpdateError::AppendIndexOutOfBounds {
            index: append_column_index,
            ncols: num_col,
        });
    }
    if let Some(&bad) = eig_column_indices.iter().find(|&&i| i >= num_col) {
        return Err(UpdateError::EigIndexOutOfBounds {
            index: bad,
            ncols: num_col,
        });
    }
    if column_norms.len() != num_col {
        return Err(UpdateError::ColumnNormsLength {
            expected: num_col,
            got: column_norms.len(),
        });
    }

    // Cross-covariance of the appended column with each decomposed column.
    let cov_row = cov.index_axis(Axis(batch_ndim), append_column_index);
    let cross = cov_row.select(Axis(batch_ndim), eig_column_indices);

    // Similarity transform into eigen-coordinates: Vᵗ·c, then divide by S.
    let mut projected = batch::matvec(batch::transpose(eigenvectors), cross.view())
        .map_err(UpdateError::Shape)?;
    projected.zip_mut_with(&eigenvalues, |value, &eigenvalue| *value /= eigenvalue);

    // The residual carries whatever variance the current basis cannot explain.
    let total_variance =
        column_norms[append_column_index].powi(2) / (num_row as f64 - 1.0);
    let explained = projected.mapv(|value| value * value).sum_axis(Axis(batch_ndim));
    let residual = explained.mapv(|lane| (total_variance - lane).sqrt());

    let bad_lanes = residual.iter().filter(|value| !value.is_finite()).count();
    if bad_lanes > 0 {
        log::warn!(
            "orthogonal residual is non-finite in {bad_lanes} of {} batch lanes; \
             column norms and decomposition are inconsistent there",
            residual.len()
        );
    }

    let residual = residual.insert_axis(Axis(batch_ndim));
    let update_vec = concatenate(Axis(batch_ndim), &[residual.view(), projected.view()])
        .map_err(|err| UpdateError::Shape(ShapeError::Layout(err)))?;
    Ok(update_vec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{ArrayD, IxDyn, array};

    // Two decomposed columns with an identity eigenbasis, one appended column.
    fn diagonal_case() -> (ArrayD<f64>, ArrayD<f64>, ArrayD<f64>) {
        let eigenvalues = array![1.0, 3.0].into_dyn();
        let eigenvectors = array![[1.0, 0.0], [0.0, 1.0]].into_dyn();
        let cov = array![
            [1.0, 0.0, 0.5],
            [0.0, 3.0, 0.2],
            [0.5, 0.2, 0.4]
        ]
        .into_dyn();
        (eigenvalues, eigenvectors, cov)
    }

    #[test]
    fn projects_cross_covariance_into_eigenbasis() {
        let (eigenvalues, eigenvectors, cov) = diagonal_case();
        let column_norms = array![2.0, 3.4, 1.2];
        let update_vec = construct_update_vector(
            eigenvalues.view(),
            eigenvectors.view(),
            &[0, 1],
            2,
            cov.view(),
            column_norms.view(),
            5,
        )
        .unwrap();

        assert_eq!(update_vec.shape(), &[3]);
        // With V = I the projection is the raw cross row divided by S.
        assert_relative_eq!(update_vec[[1]], 0.5, max_relative = 1e-12);
        assert_relative_eq!(update_vec[[2]], 0.2 / 3.0, max_relative = 1e-12);

        // Variance conservation: residual² + ‖projected‖² = norm²/(n−1).
        let total = 1.2_f64.powi(2) / 4.0;
        let explained = update_vec[[1]].powi(2) + update_vec[[2]].powi(2);
        assert!(update_vec[[0]] > 0.0);
        assert_relative_eq!(
            update_vec[[0]].powi(2) + explained,
            total,
            max_relative = 1e-12
        );

        // Recombination: V · (S ⊙ v[1..]) reproduces the cross row.
        let recombined = [
            1.0 * update_vec[[1]],
            3.0 * update_vec[[2]],
        ];
        assert_relative_eq!(recombined[0], 0.5, max_relative = 1e-12);
        assert_relative_eq!(recombined[1], 0.2, max_relative = 1e-12);
    }

    #[test]
    fn rotated_eigenbasis_round_trips() {
        // cov block = V S Vᵗ for a 45° rotation; the projection must undo it.
        let c = std::f64::consts::FRAC_1_SQRT_2;
        let eigenvalues = array![1.0, 3.0].into_dyn();
        let eigenvectors = array![[c, -c], [c, c]].into_dyn();
        let cross = [0.4, 0.1];
        let cov = array![
            [2.0, -1.0, cross[0]],
            [-1.0, 2.0, cross[1]],
            [cross[0], cross[1], 0.5]
        ]
        .into_dyn();
        let column_norms = array![2.83, 2.83, 2.0];

        let update_vec = construct_update_vector(
            eigenvalues.view(),
            eigenvectors.view(),
            &[0, 1],
            2,
            cov.view(),
            column_norms.view(),
            9,
        )
        .unwrap();

        // Vᵗ·c = [(0.4+0.1)/√2, (−0.4+0.1)/√2], then divide by S.
        assert_relative_eq!(update_vec[[1]], 0.5 * c / 1.0, max_relative = 1e-12);
        assert_relative_eq!(update_vec[[2]], -0.3 * c / 3.0, max_relative = 1e-12);
    }

    #[test]
    fn inconsistent_lane_goes_nan_without_touching_siblings() {
        // Two batch lanes sharing norms; lane 1's cross terms explain more
        // variance than the column norm admits, so only its radicand is
        // negative.
        let eigenvalues =
            ArrayD::from_shape_vec(IxDyn(&[2, 2]), vec![1.0, 3.0, 1.0, 3.0]).unwrap();
        let eye = vec![1.0, 0.0, 0.0, 1.0];
        let eigenvectors = ArrayD::from_shape_vec(
            IxDyn(&[2, 2, 2]),
            eye.iter().chain(eye.iter()).copied().collect(),
        )
        .unwrap();
        let lane0 = vec![
            1.0, 0.0, 0.5, //
            0.0, 3.0, 0.2, //
            0.5, 0.2, 0.4,
        ];
        let lane1 = vec![
            1.0, 0.0, 1.5, //
            0.0, 3.0, 0.2, //
            1.5, 0.2, 0.4,
        ];
        let cov = ArrayD::from_shape_vec(
            IxDyn(&[2, 3, 3]),
            lane0.iter().chain(lane1.iter()).copied().collect(),
        )
        .unwrap();
        // norm²/(n−1) = 0.36: above lane 0's explained ≈ 0.2544, far below
        // lane 1's explained ≈ 2.254.
        let column_norms = array![2.0, 3.4, 1.2];

        let update_vec = construct_update_vector(
            eigenvalues.view(),
            eigenvectors.view(),
            &[0, 1],
            2,
            cov.view(),
            column_norms.view(),
            5,
        )
        .unwrap();
        assert_eq!(update_vec.shape(), &[2, 3]);
        assert!(update_vec[[0, 0]].is_finite());
        assert!(update_vec[[1, 0]].is_nan());
        // Projected entries stay finite in both lanes.
        assert_relative_eq!(update_vec[[0, 1]], 0.5, max_relative = 1e-12);
        assert_relative_eq!(update_vec[[1, 1]], 1.5, max_relative = 1e-12);
        assert_relative_eq!(update_vec[[1, 2]], 0.2 / 3.0, max_relative = 1e-12);
    }

    #[test]
    fn rejects_contract_violations() {
        let (eigenvalues, eigenvectors, cov) = diagonal_case();
        let column_norms = array![2.0, 3.4, 1.2];

        assert!(matches!(
            construct_update_vector(
                eigenvalues.view(),
                eigenvectors.view(),
                &[0, 1],
                7,
                cov.view(),
                column_norms.view(),
                5,
            ),
            Err(UpdateError::AppendIndexOutOfBounds { index: 7, ncols: 3 })
        ));
        assert!(matches!(
            construct_update_vector(
                eigenvalues.view(),
                eigenvectors.view(),
                &[0],
                2,
                cov.view(),
                column_norms.view(),
                5,
            ),
            Err(UpdateError::IndexCountMismatch { expected: 2, got: 1 })
        ));
        assert!(matches!(
            construct_update_vector(
                eigenvalues.view(),
                eigenvectors.view(),
                &[0, 1],
                2,
                cov.view(),
                column_norms.view(),
                1,
            ),
            Err(UpdateError::TooFewRows(1))
        ));
    }
}
