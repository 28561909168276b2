//! Error types for graph construction and evaluation

use crate::graph::NodeId;
use thiserror::Error;

/// Result type for graph operations
pub type GraphResult<T> = std::result::Result<T, GraphError>;

/// Errors raised while building, differentiating or evaluating a graph
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Invalid axis {axis} for a {ndim}-way tensor")]
    InvalidAxis { axis: usize, ndim: usize },

    #[error("Invalid permutation {0:?}")]
    InvalidPermutation(Vec<usize>),

    #[error("Invalid slice: {0}")]
    InvalidSlice(String),

    #[error("Differentiated output must have exactly one element, got shape {0:?}")]
    NotScalar(Vec<usize>),

    #[error("{0} does not belong to this graph")]
    UnknownNode(NodeId),

    #[error("Cannot reshape {from:?} into {to:?}")]
    Reshape { from: Vec<usize>, to: Vec<usize> },

    #[error("Evaluation failed: {0}")]
    Evaluation(String),
}
