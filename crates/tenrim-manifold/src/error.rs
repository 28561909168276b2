//! Error types for TT expressions and tangent-space operations

use tenrim_ad::GraphError;
use tenrim_core::TtError;
use thiserror::Error;

/// Result type for manifold operations
pub type ManifoldResult<T> = std::result::Result<T, ManifoldError>;

/// Errors raised by TT expressions and the tangent-space codec
#[derive(Error, Debug)]
pub enum ManifoldError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Tt(#[from] TtError),

    #[error("Not a tangent vector: {0}")]
    NotATangentVector(String),

    #[error("Expected {expected} delta cores, got {actual}")]
    DeltaCount { expected: usize, actual: usize },

    #[error("Incompatible shapes: {0}")]
    IncompatibleShapes(String),
}
