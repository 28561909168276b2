//! # tenrim-ad
//!
//! Deferred-graph reverse-mode automatic differentiation for TenRim.
//!
//! This crate provides:
//! - An append-only expression [`Graph`] with opaque [`Expr`] handles
//! - Symbolic reverse mode ([`Graph::gradients`]) whose output is itself a
//!   graph expression, so gradients can be differentiated again
//! - A [`Session`] that evaluates expressions with memoization
//! - Finite-difference gradient checking in [`gradcheck`]
//!
//! Building never evaluates anything; shapes are inferred eagerly so that
//! incompatible expressions fail at build time.

pub mod backward;
pub mod error;
pub mod gradcheck;
pub mod graph;
pub mod session;


pub use error::{GraphError, GraphResult};
pub use graph::{numel, Expr, Graph, NameScope, NodeId, Operation};
pub use session::Session;
