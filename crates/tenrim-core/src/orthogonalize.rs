//! QR sweeps that bring a Tensor Train into orthogonal form
//!
//! # Left-orthogonal form
//!
//! Sweeping left to right, every core except the last is replaced by the Q
//! factor of its left unfolding (rₖ₋₁·iₖ, rₖ) and the R factor is pushed into
//! the next core. Afterwards each left unfolding Lₖ satisfies LₖᵀLₖ = I.
//!
//! # Right-orthogonal form
//!
//! The mirror sweep runs right to left on the transposed right unfoldings, so
//! every core except the first satisfies RₖRₖᵀ = I.
//!
//! Both sweeps keep the represented tensor. A rank larger than the unfolding
//! it is attached to is redundant and shrinks to the unfolding size, so the
//! output ranks never exceed `min(rows, cols)` of any swept unfolding.
//!
//! # Orthogonal pairs
//!
//! A left sweep followed by a right sweep may leave the two forms with
//! different ranks when `x` carries redundant rank. [`orthogonal_pair`]
//! alternates sweeps until both forms agree.

use crate::error::{TtError, TtResult};
use crate::scalar::TtScalar;
use crate::tensor_train::{fold_core, left_unfolding, right_unfolding, TensorTrain};
use scirs2_core::ndarray_ext::{s, Array2, ArrayD};
use scirs2_linalg::qr;
use tracing::debug;

/// Orthogonalize a TT with a left-to-right or right-to-left QR sweep
///
/// # Arguments
///
/// * `tt` - Tensor Train to orthogonalize
/// * `left_to_right` - `true` for left-orthogonal cores, `false` for
///   right-orthogonal cores
///
/// # Errors
///
/// Returns [`TtError::QrFailed`] when the factorization fails (for example
/// on non-finite entries).
///
/// # Complexity
///
/// Time: O(N × I × R³) for N cores, mode size I, max rank R
pub fn orthogonalize<T: TtScalar>(
    tt: &TensorTrain<T>,
    left_to_right: bool,
) -> TtResult<TensorTrain<T>> {
    debug!(
        ndims = tt.ndims(),
        ranks = ?tt.tt_ranks(),
        left_to_right,
        "orthogonalizing tensor train"
    );
    let cores = if left_to_right {
        left_sweep(tt)?
    } else {
        right_sweep(tt)?
    };
    Ok(TensorTrain::from_valid_cores(cores))
}

fn left_sweep<T: TtScalar>(tt: &TensorTrain<T>) -> TtResult<Vec<ArrayD<T>>> {
    let mut cores = tt.cores().to_vec();
    let d = cores.len();

    for k in 0..d.saturating_sub(1) {
        let (q, r) = thin_qr(&left_unfolding(&cores[k])?)?;
        let rank = q.ncols();
        let mut shape = cores[k].shape().to_vec();
        if let Some(last) = shape.last_mut() {
            *last = rank;
        }
        cores[k] = fold_core(&q, &shape)?;

        let mut next_shape = cores[k + 1].shape().to_vec();
        next_shape[0] = rank;
        let next = r.dot(&right_unfolding(&cores[k + 1])?);
        cores[k + 1] = fold_core(&next, &next_shape)?;
    }

    Ok(cores)
}

fn right_sweep<T: TtScalar>(tt: &TensorTrain<T>) -> TtResult<Vec<ArrayD<T>>> {
    let mut cores = tt.cores().to_vec();
    let d = cores.len();

    for k in (1..d).rev() {
        // Rₖ = (QR)ᵀ = RᵀQᵀ, keep Qᵀ and push Rᵀ left
        let unfolding = right_unfolding(&cores[k])?;
        let (q, r) = thin_qr(&unfolding.t().to_owned())?;
        let rank = q.ncols();
        let mut shape = cores[k].shape().to_vec();
        shape[0] = rank;
        cores[k] = fold_core(&q.t().to_owned(), &shape)?;

        let mut prev_shape = cores[k - 1].shape().to_vec();
        if let Some(last) = prev_shape.last_mut() {
            *last = rank;
        }
        let prev = left_unfolding(&cores[k - 1])?.dot(&r.t());
        cores[k - 1] = fold_core(&prev, &prev_shape)?;
    }

    Ok(cores)
}

/// Reduced QR: Q (rows, k) with orthonormal columns and R (k, cols), k = min(rows, cols)
fn thin_qr<T: TtScalar>(matrix: &Array2<T>) -> TtResult<(Array2<T>, Array2<T>)> {
    let (rows, cols) = matrix.dim();
    let rank = rows.min(cols);
    let (q, r) = qr(&matrix.view(), None).map_err(|e| TtError::QrFailed(e.to_string()))?;
    Ok((
        q.slice(s![.., ..rank]).to_owned(),
        r.slice(s![..rank, ..]).to_owned(),
    ))
}

/// Left- and right-orthogonal forms of `tt` sharing the same TT-ranks
///
/// Starts from a left sweep of `tt` and a right sweep of the result. While
/// redundant rank makes the two disagree, the forms are swept again from each
/// other. Ranks only decrease, so the loop ends after at most one round per
/// interior rank.
pub fn orthogonal_pair<T: TtScalar>(
    tt: &TensorTrain<T>,
) -> TtResult<(TensorTrain<T>, TensorTrain<T>)> {
    let mut left = orthogonalize(tt, true)?;
    let mut right = orthogonalize(&left, false)?;
    while left.tt_ranks() != right.tt_ranks() {
        left = orthogonalize(&right, true)?;
        if left.tt_ranks() == right.tt_ranks() {
            break;
        }
        right = orthogonalize(&left, false)?;
    }
    debug!(ranks = ?right.tt_ranks(), "orthogonal pair");
    Ok((left, right))
}

/// Largest entry of |MᵀM − I|
pub fn orthogonality_error<T: TtScalar>(matrix: &Array2<T>) -> T {
    let gram = matrix.t().dot(matrix);
    gram.indexed_iter()
        .map(|((i, j), &v)| {
            let target = if i == j { T::one() } else { T::zero() };
            (v - target).abs()
        })
        .fold(T::zero(), |acc, v| acc.max(v))
}

/// Worst orthogonality defect over the left unfoldings of cores 0..N-1
pub fn left_orthogonality_error<T: TtScalar>(tt: &TensorTrain<T>) -> TtResult<T> {
    let d = tt.ndims();
    let mut worst = T::zero();
    for core in &tt.cores()[..d - 1] {
        worst = worst.max(orthogonality_error(&left_unfolding(core)?));
    }
    Ok(worst)
}

/// Worst orthogonality defect over the right unfoldings of cores 1..N
pub fn right_orthogonality_error<T: TtScalar>(tt: &TensorTrain<T>) -> TtResult<T> {
    let mut worst = T::zero();
    for core in &tt.cores()[1..] {
        let unfolding = right_unfolding(core)?;
        worst = worst.max(orthogonality_error(&unfolding.t().to_owned()));
    }
    Ok(worst)
}
