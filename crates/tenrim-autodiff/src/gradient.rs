//! Riemannian gradient on the fixed-rank TT manifold
//!
//! The user function is evaluated on the tangent-space encoding of the point
//! with trainable delta cores. Differentiating with respect to the deltas and
//! imposing the gauge conditions yields the delta coordinates of the
//! projected Euclidean gradient `P_x ∇f(x)`.

use crate::checked::CheckedTangent;
use crate::error::AutodiffResult;
use crate::gauge::enforce_gauge_conditions;
use crate::invariance::{advise, InvarianceCheck};
use crate::options::RiemannianOptions;
use scirs2_core::ndarray_ext::{ArrayD, IxDyn};
use tenrim_ad::{Expr, Graph, Session};
use tenrim_core::{orthogonal_pair, TensorTrain, TtScalar};
use tenrim_manifold::{deltas_to_tangent_space, ManifoldResult, TtExpr};
use tracing::{debug, info_span};

/// The user function evaluated at the zero-tangent encoding of a point
pub(crate) struct Linearization<T> {
    pub(crate) left: TensorTrain<T>,
    pub(crate) right: TensorTrain<T>,
    pub(crate) deltas: Vec<Expr>,
    pub(crate) value: Expr,
    pub(crate) check: Option<InvarianceCheck>,
}

/// Evaluate `func` on `x` written as a function of its delta cores
///
/// The deltas start at `[right₁, 0, ..., 0]`, for which the encoding equals
/// `x`. With `options.debug` the function is also applied to the
/// right-orthogonal representation for the invariance check.
pub(crate) fn linearize<'g, T, F>(
    graph: &'g Graph<T>,
    func: &F,
    x: &TensorTrain<T>,
    options: &RiemannianOptions,
) -> AutodiffResult<Linearization<T>>
where
    T: TtScalar,
    F: Fn(&TtExpr<'g, T>) -> ManifoldResult<Expr>,
{
    let (left, right) = orthogonal_pair(x)?;

    let deltas: Vec<Expr> = right
        .cores()
        .iter()
        .enumerate()
        .map(|(k, core)| {
            if k == 0 {
                graph.variable(core.clone())
            } else {
                graph.variable(ArrayD::zeros(IxDyn(core.shape())))
            }
        })
        .collect();

    let x_projection = deltas_to_tangent_space(graph, &deltas, x, &left, &right)?;
    let value = func(x_projection.as_tt())?;

    let check = if options.debug {
        advise(options);
        let reference = func(&TtExpr::constant(graph, &right))?;
        Some(InvarianceCheck::new(value, reference))
    } else {
        None
    };

    Ok(Linearization {
        left,
        right,
        deltas,
        value,
        check,
    })
}

/// Build the Riemannian gradient of `func` at `x` in `graph`
///
/// # Arguments
///
/// * `func` - Scalar function of a TT, written with [`tenrim_manifold::ops`];
///   it must depend only on the tensor, not on its cores
/// * `x` - The point
/// * `options` - Scope name and invariance checking
///
/// # Returns
///
/// A guard around the gradient as a tangent vector with ranks `2r` in the
/// interior. Evaluate it with [`CheckedTangent::evaluate`].
///
/// # Errors
///
/// Fails when `x` cannot be orthogonalized, when `func` fails to build or
/// does not return a scalar.
pub fn build_gradient<'g, T, F>(
    graph: &'g Graph<T>,
    func: F,
    x: &TensorTrain<T>,
    options: &RiemannianOptions,
) -> AutodiffResult<CheckedTangent<'g, T>>
where
    T: TtScalar,
    F: Fn(&TtExpr<'g, T>) -> ManifoldResult<Expr>,
{
    let span = info_span!("riemannian_gradient", name = %options.name);
    let _enter = span.enter();
    let _scope = graph.name_scope(&options.name);
    debug!(ranks = ?x.tt_ranks(), invariance_check = options.debug, "building gradient");

    let lin = linearize(graph, &func, x, options)?;
    let raw = graph.gradients(lin.value, &lin.deltas)?;
    let projected = enforce_gauge_conditions(graph, &raw, &lin.left)?;
    let tangent = deltas_to_tangent_space(graph, &projected, x, &lin.left, &lin.right)?;

    Ok(CheckedTangent::new(tangent, lin.check))
}

/// Riemannian gradient of `func` at `x`
///
/// Builds the gradient in a fresh graph and evaluates it.
///
/// # Examples
///
/// ```
/// use tenrim_autodiff::{gradient, RiemannianOptions};
/// use tenrim_core::TensorTrain;
/// use tenrim_manifold::ops::frobenius_norm_squared;
///
/// let x = TensorTrain::<f64>::random(&[3, 3, 3], 2, 0).unwrap();
/// let grad = gradient(|tt| frobenius_norm_squared(tt), &x, &RiemannianOptions::default()).unwrap();
///
/// // ∇‖x‖² = 2x already lies in the tangent space at x
/// let actual = grad.full().unwrap();
/// let expected = x.scale(2.0).full().unwrap();
/// for (a, e) in actual.iter().zip(expected.iter()) {
///     assert!((a - e).abs() < 1e-10);
/// }
/// ```
pub fn gradient<T, F>(func: F, x: &TensorTrain<T>, options: &RiemannianOptions) -> AutodiffResult<TensorTrain<T>>
where
    T: TtScalar,
    F: for<'g> Fn(&TtExpr<'g, T>) -> ManifoldResult<Expr>,
{
    let graph = Graph::new();
    let grad = build_gradient(&graph, &func, x, options)?;
    let mut session = Session::new(&graph);
    grad.evaluate(&mut session)
}
