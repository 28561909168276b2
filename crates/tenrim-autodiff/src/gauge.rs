//! Gauge conditions on delta cores
//!
//! A tangent vector has many delta parametrizations. Requiring every delta
//! except the last to be orthogonal to the left-orthogonal core of the point
//! at the same position picks a unique one.

use tenrim_ad::{Expr, Graph};
use tenrim_core::{TensorTrain, TtScalar};
use tenrim_manifold::{project_out_column_space, ManifoldError, ManifoldResult};

/// Project deltas onto the gauge `Lᵢᵀ δᵢ = 0` for every `i < d - 1`
///
/// `left` is the left-orthogonal form of the point. Output shapes equal
/// input shapes and the last delta is returned unchanged.
pub fn enforce_gauge_conditions<T: TtScalar>(
    graph: &Graph<T>,
    deltas: &[Expr],
    left: &TensorTrain<T>,
) -> ManifoldResult<Vec<Expr>> {
    let d = left.ndims();
    if deltas.len() != d {
        return Err(ManifoldError::DeltaCount {
            expected: d,
            actual: deltas.len(),
        });
    }

    deltas
        .iter()
        .enumerate()
        .map(|(i, &delta)| {
            if i + 1 < d {
                let q = graph.constant(left.core(i).clone());
                project_out_column_space(graph, q, delta)
            } else {
                Ok(delta)
            }
        })
        .collect()
}
