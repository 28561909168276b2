//! Error types for Tensor-Train containers and sweeps

use thiserror::Error;

/// Result type for Tensor-Train operations
pub type TtResult<T> = std::result::Result<T, TtError>;

/// Errors raised while building or transforming a Tensor-Train
#[derive(Error, Debug)]
pub enum TtError {
    #[error("Tensor train has no cores")]
    Empty,

    #[error("Invalid ranks: {0}")]
    InvalidRanks(String),

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Invalid tensor: {0}")]
    InvalidTensor(String),

    #[error("QR failed: {0}")]
    QrFailed(String),
}
