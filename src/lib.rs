#![deny(dead_code)]
#![deny(unused_imports)]

//! Rank-one eigenvalue updates for streaming covariance decomposition.
//!
//! When a new feature column is appended to a dataset whose covariance matrix
//! already has a known eigendecomposition, the updated spectrum can be found
//! without an O(N³) re-decomposition: the appended column is expressed in the
//! old eigenbasis plus one orthogonal residual dimension, and the N+1 new
//! eigenvalues are the roots of a rational secular equation whose poles are
//! the old eigenvalues augmented with a zero.
//!
//! The crate is organized as a chain of pure functions over batched
//! `ndarray` arrays:
//!
//! 1. [`construct_update_vector`] builds the perturbation vector for the
//!    appended column.
//! 2. [`secular_numerator`] / [`secular_denominator`] evaluate the termwise
//!    pieces of the secular function at one or more candidate estimates.
//! 3. [`taylor_series`] combines them into a multi-order Taylor expansion
//!    around each candidate, suitable for Newton-type refinement.
//! 4. [`updated_eigenvalues`] drives that refinement over the interlacing
//!    intervals and returns the full updated spectrum.

pub mod batch;
pub mod roots;
pub mod secular;
pub mod taylor;
pub mod update;

pub use batch::ShapeError;
pub use roots::{RootError, RootSettings, updated_eigenvalues};
pub use secular::{secular_denominator, secular_numerator};
pub use taylor::taylor_series;
pub use update::{UpdateError, construct_update_vector};
