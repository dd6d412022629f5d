//! Termwise pieces of the secular rational function
//! `f(μ) = 1 + Σᵢ vᵢ² / (pᵢ − μ)`, whose roots are the eigenvalues of the
//! rank-one-updated covariance. The poles `p` are the old eigenvalues with a
//! zero prepended: growing the matrix by one row/column contributes one extra
//! zero eigenvalue before the rank-one term is applied.
//!
//! Numerator and denominator are kept separate and un-summed so the Taylor
//! expander can reuse them across derivative orders, and the interlacing
//! theorem guarantees each pole gap brackets exactly one root for the
//! external solver.
//!
//! Axis discipline: every array carries `batch` axes first, then any
//! μ-candidate axes, then the pole-index axis last. The candidate axes are
//! created here by explicit singleton insertion, never by positional
//! broadcasting accident, so the pole reduction in the expander can only ever
//! collapse the intended axis.

use crate::batch::{self, ShapeError};
use ndarray::{ArrayD, ArrayViewD, Axis, IxDyn, concatenate};

/// Squared update-vector components, shaped for candidate broadcasting.
///
/// Inserts `candidate_ndim` singleton axes between the batch axes and the
/// trailing pole axis, so the result has shape `batch × 1…1 × (N+1)` and can
/// broadcast against a denominator carrying that many μ-candidate axes.
pub fn secular_numerator(update_vec: ArrayViewD<'_, f64>, candidate_ndim: usize) -> ArrayD<f64> {
    let pole_axis = update_vec.ndim().saturating_sub(1);
    let mut squared = update_vec.mapv(|component| component * component);
    for _ in 0..candidate_ndim {
        squared = squared.insert_axis(Axis(pole_axis));
    }
    squared
}

/// Per-term pole gaps `pᵢ − μ` of the secular function.
///
/// The poles are the augmented eigenvalues `[0] ++ S` per batch element. μ's
/// leading axes must equal S's batch axes exactly; any trailing μ axes are
/// treated as independent simultaneous candidates. The result has shape
/// `batch × candidate × (N+1)`.
///
/// A μ lying exactly on a pole produces a zero gap, which downstream division
/// turns into a non-finite lane; candidate-selection policy upstream is
/// expected to keep μ strictly inside a pole interval.
///
/// # Errors
///
/// [`ShapeError`] when S is rank 0 or μ's leading axes disagree with S's
/// batch axes.
pub fn secular_denominator(
    eigenvalues: ArrayViewD<'_, f64>,
    mu: ArrayViewD<'_, f64>,
) -> Result<ArrayD<f64>, ShapeError> {
    if eigenvalues.ndim() < 1 {
        return Err(ShapeError::RankTooSmall {
            needed: 1,
            got: eigenvalues.ndim(),
        });
    }
    let batch_ndim = eigenvalues.ndim() - 1;
    if mu.ndim() < batch_ndim
        || mu.shape()[..batch_ndim] != eigenvalues.shape()[..batch_ndim]
    {
        return Err(ShapeError::OperandMismatch {
            left: eigenvalues.shape().to_vec(),
            right: mu.shape().to_vec(),
        });
    }
    let candidate_shape = mu.shape()[batch_ndim..].to_vec();
    let candidate_ndim = candidate_shape.len();
    let num_pole = eigenvalues.shape()[batch_ndim] + 1;

    // Augment the spectrum with the zero eigenvalue of the grown dimension.
    let mut zero_shape = eigenvalues.shape()[..batch_ndim].to_vec();
    zero_shape.push(1);
    let zero = ArrayD::<f64>::zeros(IxDyn(&zero_shape));
    let poles = concatenate(Axis(batch_ndim), &[zero.view(), eigenvalues.view()])?;

    let mut out_shape = eigenvalues.shape()[..batch_ndim].to_vec();
    out_shape.extend_from_slice(&candidate_shape);
    out_shape.push(num_pole);

    let poles = batch::expand_dims(poles.view(), batch_ndim, candidate_ndim);
    let poles = poles
        .broadcast(IxDyn(&out_shape))
        .ok_or_else(|| ShapeError::Broadcast {
            from: poles.shape().to_vec(),
            to: out_shape.clone(),
        })?;
    let mu_shape = mu.shape().to_vec();
    let mu = mu.insert_axis(Axis(mu_shape.len()));
    let mu = mu
        .broadcast(IxDyn(&out_shape))
        .ok_or(ShapeError::Broadcast {
            from: mu_shape,
            to: out_shape,
        })?;
    Ok(&poles - &mu)
}
