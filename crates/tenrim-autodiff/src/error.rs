//! Error types for Riemannian differentiation

use tenrim_ad::GraphError;
use tenrim_core::TtError;
use tenrim_manifold::ManifoldError;
use thiserror::Error;

/// Result type for Riemannian differentiation
pub type AutodiffResult<T> = Result<T, AutodiffError>;

/// Errors raised while building or evaluating Riemannian derivatives
#[derive(Error, Debug)]
pub enum AutodiffError {
    /// The function depends on the TT representation, not only on the tensor
    #[error(
        "Function is not invariant to the TT representation: {value_1} vs {value_2} \
         (relative difference {relative_difference:e})"
    )]
    NotInvariant {
        value_1: f64,
        value_2: f64,
        relative_difference: f64,
    },

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Tt(#[from] TtError),

    #[error(transparent)]
    Manifold(#[from] ManifoldError),
}
