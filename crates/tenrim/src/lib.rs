//! # TenRim - Riemannian autodiff for Tensor Trains
//!
//! This is the **meta crate** that re-exports all TenRim components.
//!
//! ## Quick Start
//!
//! ```
//! use tenrim::prelude::*;
//!
//! let x = TensorTrain::<f64>::random(&[4, 4, 4], 2, 0)?;
//! let grad = gradient(
//!     |tt| frobenius_norm_squared(tt),
//!     &x,
//!     &RiemannianOptions::default().with_debug_advisory(false),
//! )?;
//! assert_eq!(grad.tt_ranks(), vec![1, 4, 4, 1]);
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Components
//!
//! ### Tensor Trains ([`core`])
//!
//! The [`TensorTrain`](core::TensorTrain) container for TT tensors and
//! TT-matrices, QR orthogonalization, inner products and sums.
//!
//! ```
//! use tenrim::core::{orthogonalize, left_orthogonality_error, TensorTrain};
//!
//! let x = TensorTrain::<f64>::random(&[3, 4, 5], 3, 1).unwrap();
//! let left = orthogonalize(&x, true).unwrap();
//! assert!(left_orthogonality_error(&left).unwrap() < 1e-12);
//! ```
//!
//! ### Expression graphs ([`ad`])
//!
//! Deferred graphs with symbolic reverse mode. Gradients are expressions
//! themselves, so they can be differentiated again.
//!
//! ```
//! use scirs2_core::ndarray_ext::{ArrayD, IxDyn};
//! use tenrim::ad::{Graph, Session};
//!
//! let graph = Graph::<f64>::new();
//! let x = graph.variable(ArrayD::from_elem(IxDyn(&[]), 3.0));
//! let y = graph.mul(x, graph.mul(x, x).unwrap()).unwrap();
//! let dy = graph.gradients(y, &[x]).unwrap()[0];
//! let d2y = graph.gradients(graph.sum(dy).unwrap(), &[x]).unwrap()[0];
//!
//! let mut session = Session::new(&graph);
//! assert_eq!(session.scalar(dy).unwrap(), 27.0);
//! assert_eq!(session.scalar(d2y).unwrap(), 18.0);
//! ```
//!
//! ### Tangent spaces ([`manifold`])
//!
//! Differentiable TT operations on [`TtExpr`](manifold::TtExpr) and the
//! delta parametrization of tangent vectors.
//!
//! ### Riemannian derivatives ([`autodiff`])
//!
//! [`gradient`](autodiff::gradient) and
//! [`hessian_vector_product`](autodiff::hessian_vector_product) with
//! optional invariance checking.
//!
//! ## Features
//!
//! - `serde`: Serialize and deserialize
//!   [`RiemannianOptions`](autodiff::RiemannianOptions)

pub use tenrim_ad as ad;
pub use tenrim_autodiff as autodiff;
pub use tenrim_core as core;
pub use tenrim_manifold as manifold;

pub mod prelude {
    //! Prelude module for convenient imports
    //!
    //! # Example
    //!
    //! ```
    //! use tenrim::prelude::*;
    //!
    //! let x = TensorTrain::<f64>::random(&[2, 3, 2], 2, 5).unwrap();
    //! assert_eq!(x.ndims(), 3);
    //! ```

    // Tensor Trains
    pub use crate::core::{orthogonalize, TensorTrain, TtError, TtScalar};

    // Graphs
    pub use crate::ad::{Expr, Graph, Session};

    // TT expressions
    pub use crate::manifold::{
        flat_inner, frobenius_norm_squared, matvec, project, project_tt, quadratic_form,
        ManifoldResult, TangentVector, TtExpr,
    };

    // Riemannian derivatives
    pub use crate::autodiff::{
        build_gradient, build_hessian_vector_product, gradient, hessian_vector_product,
        AutodiffError, CheckedTangent, RiemannianOptions,
    };
}
