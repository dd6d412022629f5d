//! Truncated Taylor expansion of the secular function around candidate
//! eigenvalue estimates.
//!
//! Each term `vᵢ²/(pᵢ − μ)` is a shifted geometric series in μ, so its k-th
//! Taylor coefficient at μ is `vᵢ² · (pᵢ − μ)^{−(k+1)}`; summing over poles
//! and adding the constant `1` at order 0 gives the coefficient of the full
//! function. Coefficient k equals `f⁽ᵏ⁾(μ)/k!`, which is exactly what a
//! Newton or higher-order iteration needs to advance μ.

use crate::batch::ShapeError;
use crate::secular::{secular_denominator, secular_numerator};
use ndarray::{ArrayD, ArrayViewD, Axis, IxDyn, stack};

/// Expands the secular function around each μ candidate.
///
/// # Arguments
///
/// * `update_vec`: shape `batch × (N+1)`; the perturbation vector.
/// * `eigenvalues`: shape `batch × N`; ascending spectrum whose augmented
///   form `[0] ++ S` supplies the poles.
/// * `mu`: shape `batch × candidate`; the leading axes must equal the batch
///   axes exactly, any trailing axes are independent candidates.
/// * `min_order`, `num_order`: the expansion covers orders
///   `[min_order, min_order + num_order)`.
///
/// # Returns
///
/// Shape `batch × candidate × num_order`; the trailing axis holds the
/// requested coefficients in order. `num_order == 0` yields an empty
/// trailing axis.
///
/// # Errors
///
/// [`ShapeError`] when the batch prefixes disagree or the update vector is
/// not one entry longer than the spectrum. A μ sitting exactly on a pole is
/// not an error: that candidate's coefficients come back non-finite and
/// sibling candidates are unaffected.
pub fn taylor_series(
    update_vec: ArrayViewD<'_, f64>,
    eigenvalues: ArrayViewD<'_, f64>,
    mu: ArrayViewD<'_, f64>,
    min_order: usize,
    num_order: usize,
) -> Result<ArrayD<f64>, ShapeError> {
    if update_vec.ndim() < 1 {
        return Err(ShapeError::RankTooSmall {
            needed: 1,
            got: update_vec.ndim(),
        });
    }
    let batch_ndim = update_vec.ndim() - 1;
    let mut expected = eigenvalues.shape().to_vec();
    if let Some(last) = expected.last_mut() {
        *last += 1;
    }
    if update_vec.shape() != expected.as_slice() {
        return Err(ShapeError::OperandMismatch {
            left: update_vec.shape().to_vec(),
            right: eigenvalues.shape().to_vec(),
        });
    }

    let denominator = secular_denominator(eigenvalues, mu.view())?;
    let candidate_ndim = mu.ndim() - batch_ndim;
    let numerator = secular_numerator(update_vec, candidate_ndim);
    let numerator = numerator
        .broadcast(denominator.raw_dim())
        .ok_or_else(|| ShapeError::Broadcast {
            from: numerator.shape().to_vec(),
            to: denominator.shape().to_vec(),
        })?;

    let pole_axis = denominator.ndim() - 1;
    if num_order == 0 {
        let mut empty_shape = denominator.shape()[..pole_axis].to_vec();
        empty_shape.push(0);
        return Ok(ArrayD::zeros(IxDyn(&empty_shape)));
    }

    let mut coefficients = Vec::with_capacity(num_order);
    for order in min_order..min_order + num_order {
        let exponent = -(order as i32) - 1;
        let terms = denominator.mapv(|gap| gap.powi(exponent));
        let terms = &terms * &numerator;
        let mut coefficient = terms.sum_axis(Axis(pole_axis));
        // The constant "+ 1" of the secular function survives only at order
        // zero; every derivative of a constant vanishes.
        if order == 0 {
            coefficient += 1.0;
        }
        coefficients.push(coefficient);
    }

    let order_axis = coefficients[0].ndim();
    let views: Vec<_> = coefficients.iter().map(|coefficient| coefficient.view()).collect();
    Ok(stack(Axis(order_axis), &views)?)
}
