//! Riemannian Hessian-vector products
//!
//! The product is obtained by double backpropagation through the delta
//! parametrization: the inner product of the first derivative with the delta
//! coordinates of `P_x v` is differentiated once more. The result is
//! `P_x ∇²f(x) P_x v`. The curvature term of the full Riemannian Hessian,
//! which involves the Euclidean gradient component normal to the manifold,
//! is not included.

use crate::checked::CheckedTangent;
use crate::error::AutodiffResult;
use crate::gauge::enforce_gauge_conditions;
use crate::gradient::linearize;
use crate::options::RiemannianOptions;
use tenrim_ad::{Expr, Graph, Session};
use tenrim_core::{TensorTrain, TtScalar};
use tenrim_manifold::{deltas_to_tangent_space, project_tt, ManifoldResult, TtExpr};
use tracing::{debug, info_span};

/// Build the projected Hessian of `func` at `x` applied to `vector`
///
/// `vector` is any TT with the modes of `x`; it is projected onto the
/// tangent space first.
pub fn build_hessian_vector_product<'g, T, F>(
    graph: &'g Graph<T>,
    func: F,
    x: &TensorTrain<T>,
    vector: &TensorTrain<T>,
    options: &RiemannianOptions,
) -> AutodiffResult<CheckedTangent<'g, T>>
where
    T: TtScalar,
    F: Fn(&TtExpr<'g, T>) -> ManifoldResult<Expr>,
{
    let span = info_span!("riemannian_hessian_vector_product", name = %options.name);
    let _enter = span.enter();
    let _scope = graph.name_scope(&options.name);
    debug!(
        ranks = ?x.tt_ranks(),
        vector_ranks = ?vector.tt_ranks(),
        invariance_check = options.debug,
        "building Hessian-vector product"
    );

    let lin = linearize(graph, &func, x, options)?;
    let vector_projection = project_tt(graph, vector, x)?;
    let first = graph.gradients(lin.value, &lin.deltas)?;
    let vector_deltas = vector_projection.deltas()?;

    let terms = first
        .iter()
        .zip(&vector_deltas)
        .map(|(&g, &v)| graph.dot(g, v))
        .collect::<Result<Vec<_>, _>>()?;
    let directional = graph.add_n(&terms)?;

    let second = graph.gradients(directional, &lin.deltas)?;
    let projected = enforce_gauge_conditions(graph, &second, &lin.left)?;
    let tangent = deltas_to_tangent_space(graph, &projected, x, &lin.left, &lin.right)?;

    Ok(CheckedTangent::new(tangent, lin.check))
}

/// Projected Hessian of `func` at `x` applied to `vector`
///
/// Builds the product in a fresh graph and evaluates it.
pub fn hessian_vector_product<T, F>(
    func: F,
    x: &TensorTrain<T>,
    vector: &TensorTrain<T>,
    options: &RiemannianOptions,
) -> AutodiffResult<TensorTrain<T>>
where
    T: TtScalar,
    F: for<'g> Fn(&TtExpr<'g, T>) -> ManifoldResult<Expr>,
{
    let graph = Graph::new();
    let hvp = build_hessian_vector_product(&graph, &func, x, vector, options)?;
    let mut session = Session::new(&graph);
    hvp.evaluate(&mut session)
}
