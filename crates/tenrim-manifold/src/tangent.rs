//! Tangent space of the fixed-rank TT manifold
//!
//! # Parametrization
//!
//! Let `left` be the left-orthogonal and `right` the right-orthogonal form of
//! a point x with ranks r. Every tangent vector at x can be written as
//!
//! ```text
//! δX = Σₖ L₁ ⋯ Lₖ₋₁ δₖ Rₖ₊₁ ⋯ Rₙ
//! ```
//!
//! where δₖ has the shape of core k. The sum is itself a TT with doubled
//! interior ranks, built from the blocks
//!
//! ```text
//! first: [δ₁  L₁]     middle: [Rₖ  0 ]     last: [Rₙ]
//!                             [δₖ  Lₖ]           [δₙ]
//! ```
//!
//! The δ are unique once the gauge condition Lₖᵀ δₖ = 0 holds for k < n.

use crate::error::{ManifoldError, ManifoldResult};
use crate::tt_expr::TtExpr;
use std::fmt;
use tenrim_ad::{Expr, Graph, Session};
use tenrim_core::{orthogonal_pair, TensorTrain, TtScalar};
use tracing::debug;

/// TT expression in the block form above, tagged with the ranks of its point
#[derive(Clone)]
pub struct TangentVector<'g, T> {
    tt: TtExpr<'g, T>,
    base_ranks: Vec<usize>,
}

impl<T> fmt::Debug for TangentVector<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TangentVector")
            .field("tt", &self.tt)
            .field("base_ranks", &self.base_ranks)
            .finish()
    }
}

impl<'g, T: TtScalar> TangentVector<'g, T> {
    /// Tag a TT expression as a tangent vector at a point with `base_ranks`
    ///
    /// # Errors
    ///
    /// [`ManifoldError::NotATangentVector`] unless every interior rank of
    /// `tt` is exactly twice the corresponding base rank.
    pub fn new(tt: TtExpr<'g, T>, base_ranks: Vec<usize>) -> ManifoldResult<Self> {
        check_doubled_ranks(&tt.tt_ranks(), &base_ranks)?;
        Ok(Self { tt, base_ranks })
    }

    /// Underlying TT expression
    pub fn as_tt(&self) -> &TtExpr<'g, T> {
        &self.tt
    }

    /// Consume and return the TT expression
    pub fn into_tt(self) -> TtExpr<'g, T> {
        self.tt
    }

    /// TT-ranks of the point this vector is attached to
    pub fn base_ranks(&self) -> &[usize] {
        &self.base_ranks
    }

    /// Graph the cores live in
    pub fn graph(&self) -> &'g Graph<T> {
        self.tt.graph()
    }

    /// Delta cores of this vector
    pub fn deltas(&self) -> ManifoldResult<Vec<Expr>> {
        tangent_space_to_deltas(&self.tt)
    }

    /// Evaluate into a concrete TT
    pub fn evaluate(&self, session: &mut Session<'g, T>) -> ManifoldResult<TensorTrain<T>> {
        self.tt.evaluate(session)
    }
}

fn check_doubled_ranks(ranks: &[usize], base_ranks: &[usize]) -> ManifoldResult<()> {
    if ranks.len() != base_ranks.len() {
        return Err(ManifoldError::NotATangentVector(format!(
            "{} cores for a point with {} cores",
            ranks.len().saturating_sub(1),
            base_ranks.len().saturating_sub(1)
        )));
    }
    let d = ranks.len() - 1;
    for k in 1..d {
        if ranks[k] != 2 * base_ranks[k] {
            return Err(ManifoldError::NotATangentVector(format!(
                "rank {} is {} but the point has rank {}",
                k, ranks[k], base_ranks[k]
            )));
        }
    }
    Ok(())
}

/// Assemble a tangent vector from delta cores
///
/// # Arguments
///
/// * `graph` - Graph holding the deltas; `left` and `right` are embedded as constants
/// * `deltas` - One expression per core, shaped like the cores of `right`
/// * `x` - The point
/// * `left`, `right` - Left- and right-orthogonal forms of `x` with equal
///   ranks, as returned by [`orthogonal_pair`]
///
/// # Returns
///
/// The block-form TT; with `deltas = [right₁, 0, ..., 0]` it equals `x`.
/// Its base ranks are those of `right`, which are below the ranks of `x`
/// when `x` carries redundant rank.
pub fn deltas_to_tangent_space<'g, T: TtScalar>(
    graph: &'g Graph<T>,
    deltas: &[Expr],
    x: &TensorTrain<T>,
    left: &TensorTrain<T>,
    right: &TensorTrain<T>,
) -> ManifoldResult<TangentVector<'g, T>> {
    let d = x.ndims();
    if left.tt_ranks() != right.tt_ranks() || right.ndims() != d {
        return Err(ManifoldError::IncompatibleShapes(format!(
            "Orthogonal forms with ranks {:?} and {:?} do not match a point with {} cores",
            left.tt_ranks(),
            right.tt_ranks(),
            d
        )));
    }
    if deltas.len() != d {
        return Err(ManifoldError::DeltaCount {
            expected: d,
            actual: deltas.len(),
        });
    }
    for (k, delta) in deltas.iter().enumerate() {
        let shape = graph.shape(*delta)?;
        if shape.as_slice() != right.core(k).shape() {
            return Err(ManifoldError::IncompatibleShapes(format!(
                "Delta {} has shape {:?}, expected {:?}",
                k,
                shape,
                right.core(k).shape()
            )));
        }
    }

    let base_ranks = right.tt_ranks();
    if d == 1 {
        let tt = TtExpr::from_cores(graph, vec![deltas[0]])?;
        return TangentVector::new(tt, base_ranks);
    }

    let last_axis = x.core(0).ndim() - 1;
    let mut cores = Vec::with_capacity(d);
    for k in 0..d {
        let core = if k == 0 {
            let l = graph.constant(left.core(k).clone());
            graph.concat(&[deltas[k], l], last_axis)?
        } else if k == d - 1 {
            let r = graph.constant(right.core(k).clone());
            graph.concat(&[r, deltas[k]], 0)?
        } else {
            let l = graph.constant(left.core(k).clone());
            let r = graph.constant(right.core(k).clone());
            let top = graph.pad(r, last_axis, 0, base_ranks[k + 1])?;
            let bottom = graph.concat(&[deltas[k], l], last_axis)?;
            graph.concat(&[top, bottom], 0)?
        };
        cores.push(core);
    }

    TangentVector::new(TtExpr::from_cores(graph, cores)?, base_ranks)
}

/// Slice the delta cores back out of a block-form TT
///
/// Base ranks are taken as half of the interior ranks of `tangent`.
///
/// # Errors
///
/// [`ManifoldError::NotATangentVector`] when an interior rank is odd.
pub fn tangent_space_to_deltas<'g, T: TtScalar>(tangent: &TtExpr<'g, T>) -> ManifoldResult<Vec<Expr>> {
    let graph = tangent.graph();
    let d = tangent.ndims();
    if d == 1 {
        return Ok(vec![tangent.core(0)]);
    }

    let ranks = tangent.tt_ranks();
    if let Some(k) = (1..d).find(|&k| ranks[k] % 2 != 0) {
        return Err(ManifoldError::NotATangentVector(format!(
            "interior rank {} is odd ({})",
            k, ranks[k]
        )));
    }
    let base: Vec<usize> = ranks
        .iter()
        .enumerate()
        .map(|(k, &r)| if k == 0 || k == d { r } else { r / 2 })
        .collect();

    let last_axis = tangent.core_shape(0).len() - 1;
    let mut deltas = Vec::with_capacity(d);
    for k in 0..d {
        let core = tangent.core(k);
        let delta = if k == 0 {
            graph.slice(core, last_axis, 0, base[1])?
        } else if k == d - 1 {
            graph.slice(core, 0, base[k], 2 * base[k])?
        } else {
            let rows = graph.slice(core, 0, base[k], 2 * base[k])?;
            graph.slice(rows, last_axis, 0, base[k + 1])?
        };
        deltas.push(delta);
    }
    Ok(deltas)
}

/// Remove the column space of the left unfolding of `q_core` from `delta`
///
/// Computes `Δ - Q(QᵀΔ)` on the (−1, r) unfoldings, where `q_core` is a
/// left-orthogonal core of shape (rₖ₋₁, nₖ, [mₖ,] rₖ), and returns it in the
/// shape of `delta`.
pub fn project_out_column_space<T: TtScalar>(
    graph: &Graph<T>,
    q_core: Expr,
    delta: Expr,
) -> ManifoldResult<Expr> {
    let q_shape = graph.shape(q_core)?;
    let delta_shape = graph.shape(delta)?;
    if q_shape != delta_shape {
        return Err(ManifoldError::IncompatibleShapes(format!(
            "Delta shape {:?} differs from core shape {:?}",
            delta_shape, q_shape
        )));
    }
    let r = *q_shape.last().unwrap_or(&1);
    let rows = q_shape.iter().product::<usize>() / r.max(1);

    let q = graph.reshape(q_core, &[rows, r])?;
    let delta_mat = graph.reshape(delta, &[rows, r])?;
    let coefficients = graph.matmul(graph.transpose(q)?, delta_mat)?;
    let removed = graph.matmul(q, coefficients)?;
    let projected = graph.sub(delta_mat, removed)?;
    Ok(graph.reshape(projected, &delta_shape)?)
}

/// Orthogonal projection of a TT expression onto the tangent space at `x`
///
/// # Arguments
///
/// * `vector` - Any TT with the same modes as `x`; ranks may differ
/// * `x` - The point
///
/// # Complexity
///
/// Time: O(N × I × R_x² × R_v) plus the two QR sweeps of `x`
pub fn project<'g, T: TtScalar>(
    vector: &TtExpr<'g, T>,
    x: &TensorTrain<T>,
) -> ManifoldResult<TangentVector<'g, T>> {
    if vector.raw_shape() != x.raw_shape() {
        return Err(ManifoldError::IncompatibleShapes(format!(
            "Cannot project a TT with modes {:?} onto the tangent space at modes {:?}",
            vector.raw_shape(),
            x.raw_shape()
        )));
    }
    let graph = vector.graph();
    let _scope = graph.name_scope("project");
    debug!(ranks = ?x.tt_ranks(), vector_ranks = ?vector.tt_ranks(), "projecting onto tangent space");

    let (left, right) = orthogonal_pair(x)?;

    let d = x.ndims();
    let modes = x.mode_sizes();
    let ra = right.tt_ranks();
    let rb = vector.tt_ranks();
    let left_cores: Vec<Expr> = left.cores().iter().map(|c| graph.constant(c.clone())).collect();
    let right_cores: Vec<Expr> = right.cores().iter().map(|c| graph.constant(c.clone())).collect();

    // lhs[k]: (ra[k], rb[k]), left interfaces Lₖᵀ Z
    let mut lhs = Vec::with_capacity(d);
    lhs.push(graph.ones(&[1, 1]));
    for k in 0..d - 1 {
        let z = graph.reshape(vector.core(k), &[rb[k], modes[k] * rb[k + 1]])?;
        let u = graph.matmul(lhs[k], z)?;
        let u = graph.reshape(u, &[ra[k] * modes[k], rb[k + 1]])?;
        let l = graph.reshape(left_cores[k], &[ra[k] * modes[k], ra[k + 1]])?;
        lhs.push(graph.matmul(graph.transpose(l)?, u)?);
    }

    // rhs[k]: (rb[k + 1], ra[k + 1]), right interfaces Z Rᵀ
    let mut rhs = vec![graph.ones(&[1, 1]); d];
    for k in (1..d).rev() {
        let z = graph.reshape(vector.core(k), &[rb[k] * modes[k], rb[k + 1]])?;
        let v = graph.matmul(z, rhs[k])?;
        let v = graph.reshape(v, &[rb[k], modes[k] * ra[k + 1]])?;
        let r = graph.reshape(right_cores[k], &[ra[k], modes[k] * ra[k + 1]])?;
        rhs[k - 1] = graph.matmul(v, graph.transpose(r)?)?;
    }

    let mut deltas = Vec::with_capacity(d);
    for k in 0..d {
        let z = graph.reshape(vector.core(k), &[rb[k], modes[k] * rb[k + 1]])?;
        let partial = graph.matmul(lhs[k], z)?;
        let partial = graph.reshape(partial, &[ra[k] * modes[k], rb[k + 1]])?;
        let delta = graph.matmul(partial, rhs[k])?;
        let delta = graph.reshape(delta, left.core(k).shape())?;
        let delta = if k < d - 1 {
            project_out_column_space(graph, left_cores[k], delta)?
        } else {
            delta
        };
        deltas.push(delta);
    }

    deltas_to_tangent_space(graph, &deltas, x, &left, &right)
}

/// [`project`] for a concrete TT, embedded as constants into `graph`
pub fn project_tt<'g, T: TtScalar>(
    graph: &'g Graph<T>,
    vector: &TensorTrain<T>,
    x: &TensorTrain<T>,
) -> ManifoldResult<TangentVector<'g, T>> {
    project(&TtExpr::constant(graph, vector), x)
}
