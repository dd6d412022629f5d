//! Newton-type driver that turns Taylor coefficients into the updated
//! spectrum for a single (unbatched) rank-one update.
//!
//! Interlacing brackets every root: with augmented poles
//! `p = [0] ++ S` strictly increasing, root `i` lies in the open interval
//! `(pᵢ, pᵢ₊₁)` and the last root in `(p_N, p_N + ‖v‖²)`. Inside each
//! interval the secular function is strictly increasing (its derivative is a
//! sum of squares), so a sign bracket plus Newton steps with bisection
//! fallback converges unconditionally. Intervals are independent and solved
//! in parallel.

use crate::batch::ShapeError;
use crate::taylor::taylor_series;
use ndarray::{Array1, ArrayView1, Ix1, arr0};
use rayon::prelude::*;
use thiserror::Error;

/// Errors from the secular root search.
#[derive(Error, Debug)]
pub enum RootError {
    #[error(
        "augmented eigenvalues must be strictly increasing; poles {lower} and {upper} collide at index {index}"
    )]
    DegeneratePoles {
        index: usize,
        lower: f64,
        upper: f64,
    },

    #[error(
        "update vector component {index} is zero; its root needs deflation, which is not supported"
    )]
    DeflatedComponent { index: usize },

    #[error("root search in ({lower:.6e}, {upper:.6e}) did not converge within {max_iter} iterations")]
    DidNotConverge {
        lower: f64,
        upper: f64,
        max_iter: usize,
    },

    #[error(transparent)]
    Shape(#[from] ShapeError),
}

/// Settings for the secular root search.
#[derive(Debug, Clone, Copy)]
pub struct RootSettings {
    /// Convergence tolerance on the bracket width, relative to the root scale.
    pub x_tol: f64,
    /// Convergence tolerance on the function value `|f(μ)|`.
    pub f_tol: f64,
    /// Maximum number of iterations per interval.
    pub max_iter: usize,
}

impl Default for RootSettings {
    fn default() -> Self {
        Self {
            x_tol: 1e-12,
            f_tol: 1e-12,
            max_iter: 100,
        }
    }
}

/// Solves for all `N+1` updated eigenvalues of one rank-one update.
///
/// # Arguments
///
/// * `update_vec`: length `N+1`, as produced by
///   [`construct_update_vector`](crate::construct_update_vector).
/// * `eigenvalues`: length `N`, ascending; the pre-update spectrum.
/// * `settings`: convergence tolerances and iteration limit.
///
/// # Returns
///
/// The updated spectrum, ascending, one root per interlacing interval.
///
/// # Errors
///
/// [`RootError::DegeneratePoles`] / [`RootError::DeflatedComponent`] when the
/// problem needs deflation (coincident poles or a zero perturbation
/// component) — detected, never resolved here. [`RootError::DidNotConverge`]
/// if an interval exhausts `settings.max_iter`.
pub fn updated_eigenvalues(
    update_vec: ArrayView1<'_, f64>,
    eigenvalues: ArrayView1<'_, f64>,
    settings: &RootSettings,
) -> Result<Array1<f64>, RootError> {
    let num_pole = update_vec.len();
    if eigenvalues.len() + 1 != num_pole {
        return Err(ShapeError::OperandMismatch {
            left: vec![update_vec.len()],
            right: vec![eigenvalues.len()],
        }
        .into());
    }

    let mut poles = Vec::with_capacity(num_pole);
    poles.push(0.0);
    poles.extend(eigenvalues.iter().copied());
    for index in 0..num_pole - 1 {
        if poles[index] >= poles[index + 1] {
            return Err(RootError::DegeneratePoles {
                index,
                lower: poles[index],
                upper: poles[index + 1],
            });
        }
    }
    if let Some(index) = update_vec.iter().position(|&component| component == 0.0) {
        return Err(RootError::DeflatedComponent { index });
    }

    // The rank-one term shifts the trace by ‖v‖², which caps the last root.
    let norm_sq: f64 = update_vec.iter().map(|&component| component * component).sum();
    let fence = poles[num_pole - 1] + norm_sq;

    log::debug!("solving {num_pole} secular intervals, trace shift {norm_sq:.6e}");

    let roots: Result<Vec<f64>, RootError> = (0..num_pole)
        .into_par_iter()
        .map(|interval| {
            let lower = poles[interval];
            let upper = if interval + 1 < num_pole {
                poles[interval + 1]
            } else {
                fence
            };
            solve_interval(update_vec, eigenvalues, lower, upper, settings)
        })
        .collect();
    Ok(Array1::from_vec(roots?))
}

/// Newton iteration on one open pole interval, safeguarded by bisection.
///
/// The function value and slope come from the order-0/1 Taylor coefficients;
/// the sign bracket `(lo, hi)` narrows at every evaluated point, and any
/// Newton step that leaves it (or goes non-finite near a pole) is replaced by
/// the midpoint.
fn solve_interval(
    update_vec: ArrayView1<'_, f64>,
    eigenvalues: ArrayView1<'_, f64>,
    lower: f64,
    upper: f64,
    settings: &RootSettings,
) -> Result<f64, RootError> {
    let mut lo = lower;
    let mut hi = upper;
    let mut mu = 0.5 * (lower + upper);

    for iteration in 0..settings.max_iter {
        let (value, slope) = value_and_slope(update_vec, eigenvalues, mu)?;

        if value.is_finite() && value.abs() <= settings.f_tol {
            log::trace!("interval ({lower:.3e}, {upper:.3e}) converged after {iteration} iterations");
            return Ok(mu);
        }

        if value.is_finite() {
            // f is increasing across the interval, so the sign tells the side.
            if value < 0.0 {
                lo = mu;
            } else {
                hi = mu;
            }
        }

        if (hi - lo) <= settings.x_tol * hi.abs().max(1.0) {
            return Ok(0.5 * (lo + hi));
        }

        let mut next = mu - value / slope;
        if !next.is_finite() || next <= lo || next >= hi {
            next = 0.5 * (lo + hi);
        }
        mu = next;
    }

    Err(RootError::DidNotConverge {
        lower,
        upper,
        max_iter: settings.max_iter,
    })
}

fn value_and_slope(
    update_vec: ArrayView1<'_, f64>,
    eigenvalues: ArrayView1<'_, f64>,
    mu: f64,
) -> Result<(f64, f64), ShapeError> {
    let mu = arr0(mu);
    let coefficients = taylor_series(
        update_vec.into_dyn(),
        eigenvalues.into_dyn(),
        mu.view().into_dyn(),
        0,
        2,
    )?;
    let coefficients = coefficients.into_dimensionality::<Ix1>()?;
    Ok((coefficients[0], coefficients[1]))
}
