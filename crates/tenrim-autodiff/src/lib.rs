//! # tenrim-autodiff
//!
//! Riemannian gradients and Hessian-vector products of scalar functions on
//! the manifold of Tensor Trains with fixed TT-ranks.
//!
//! Write the function once against [`TtExpr`](tenrim_manifold::TtExpr)
//! using the differentiable operations of [`tenrim_manifold::ops`], then ask
//! for:
//!
//! - [`gradient`]: `P_x ∇f(x)`, the projection of the Euclidean gradient
//!   onto the tangent space at `x`
//! - [`hessian_vector_product`]: `P_x ∇²f(x) P_x v`
//!
//! Both return a TT whose interior ranks are twice those of `x`. The cost
//! is a small multiple of one evaluation of `f`, independent of the size of
//! the full tensor.
//!
//! ## Invariance checking
//!
//! A valid function depends only on the tensor `x`, not on how it is split
//! into cores. With [`RiemannianOptions::debug`] enabled (the default) the
//! function is evaluated on two representations of `x` and
//! [`AutodiffError::NotInvariant`] is returned when they disagree. Without
//! the check a representation-dependent function silently yields a wrong
//! result.
//!
//! ## Deferred use
//!
//! [`build_gradient`] and [`build_hessian_vector_product`] only append to a
//! caller-supplied [`Graph`](tenrim_ad::Graph), so several derivatives can
//! share one [`Session`](tenrim_ad::Session). The returned
//! [`CheckedTangent`] only hands out the result after the invariance check
//! has passed.
//!
//! ## Quick Start
//!
//! ```
//! use tenrim_ad::Expr;
//! use tenrim_autodiff::prelude::*;
//! use tenrim_core::TensorTrain;
//! use tenrim_manifold::{flat_inner, ManifoldResult, TtExpr};
//!
//! let x = TensorTrain::<f64>::random(&[4, 4, 4], 2, 7).unwrap();
//! let t = TensorTrain::<f64>::random(&[4, 4, 4], 3, 8).unwrap();
//!
//! // f(x) = ½⟨x, t⟩²
//! let f = |tt: &TtExpr<'_, f64>| -> ManifoldResult<Expr> {
//!     let graph = tt.graph();
//!     let ip = flat_inner(tt, &TtExpr::constant(graph, &t))?;
//!     Ok(graph.scale(graph.mul(ip, ip)?, 0.5)?)
//! };
//!
//! let options = RiemannianOptions::default().with_debug_advisory(false);
//! let grad = gradient(f, &x, &options).unwrap();
//! assert_eq!(grad.tt_ranks(), vec![1, 4, 4, 1]);
//! ```

pub mod checked;
pub mod error;
pub mod gauge;
pub mod gradient;
pub mod hessian;
pub mod invariance;
pub mod options;


pub use checked::CheckedTangent;
pub use error::{AutodiffError, AutodiffResult};
pub use gauge::enforce_gauge_conditions;
pub use gradient::{build_gradient, gradient};
pub use hessian::{build_hessian_vector_product, hessian_vector_product};
pub use invariance::{relative_difference, InvarianceCheck, INVARIANCE_TOLERANCE};
pub use options::RiemannianOptions;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::checked::CheckedTangent;
    pub use crate::error::{AutodiffError, AutodiffResult};
    pub use crate::gradient::{build_gradient, gradient};
    pub use crate::hessian::{build_hessian_vector_product, hessian_vector_product};
    pub use crate::options::RiemannianOptions;
}
