//! # tenrim-manifold
//!
//! Tensor Trains as differentiable graph expressions, and the tangent space
//! of the fixed-rank TT manifold.
//!
//! ## Overview
//!
//! - [`TtExpr`]: a TT whose cores are [`tenrim_ad::Expr`] handles
//! - [`ops`]: differentiable TT operations (`flat_inner`, `full`, `add`,
//!   `matvec`, `quadratic_form`, ...) that user functions are written with
//! - [`tangent`]: the delta parametrization of tangent vectors, with
//!   [`deltas_to_tangent_space`], [`tangent_space_to_deltas`] and the
//!   orthogonal projection [`project`]
//!
//! ## Quick Start
//!
//! ```
//! use tenrim_ad::{Graph, Session};
//! use tenrim_core::TensorTrain;
//! use tenrim_manifold::{ops, project_tt};
//!
//! let x = TensorTrain::<f64>::random(&[3, 4, 3], 2, 1).unwrap();
//! let z = TensorTrain::<f64>::random(&[3, 4, 3], 3, 2).unwrap();
//!
//! let graph = Graph::new();
//! let pz = project_tt(&graph, &z, &x).unwrap();
//! let norm = ops::frobenius_norm_squared(pz.as_tt()).unwrap();
//!
//! let mut session = Session::new(&graph);
//! let projected_norm = session.scalar(norm).unwrap();
//! assert!(projected_norm <= z.flat_inner(&z).unwrap() + 1e-10);
//! ```

pub mod error;
pub mod ops;
pub mod tangent;
pub mod tt_expr;


pub use error::{ManifoldError, ManifoldResult};
pub use ops::{
    add, flat_inner, frobenius_norm_squared, full, matvec, quadratic_form, scalar_mul, scale,
    transpose,
};
pub use tangent::{
    deltas_to_tangent_space, project, project_out_column_space, project_tt,
    tangent_space_to_deltas, TangentVector,
};
pub use tt_expr::TtExpr;
