//! Tensor Train container
//!
//! The Tensor Train (TT) format represents an N-way tensor as a chain of
//! small TT-cores:
//!
//! X(i₁, i₂, ..., iₙ) = G₁\[i₁\] × G₂\[i₂\] × ... × Gₙ\[iₙ\]
//!
//! Where:
//! - Gₖ is a TT-core with shape (rₖ₋₁, iₖ, rₖ)
//! - r₀ = rₙ = 1 (boundary conditions)
//! - r₁, r₂, ..., rₙ₋₁ are TT-ranks
//!
//! TT-matrices use 4-way cores (rₖ₋₁, iₖ, jₖ, rₖ). Everything that only cares
//! about the chain structure treats the pair (iₖ, jₖ) as one merged mode of
//! size iₖ·jₖ.

use crate::error::{TtError, TtResult};
use crate::scalar::TtScalar;
use scirs2_core::ndarray::{ArrayBase, Data};
use scirs2_core::ndarray_ext::{Array2, ArrayD, Dimension, IxDyn};
use scirs2_core::random::{rngs::StdRng, RngExt, SeedableRng};

/// Tensor Train with owned cores
///
/// # Structure
///
/// Each core has shape (rₖ₋₁, iₖ, rₖ) or (rₖ₋₁, iₖ, jₖ, rₖ). The constructor
/// enforces r₀ = rₙ = 1, matching adjacent ranks and a single core order
/// across the chain. Instances are never mutated after construction.
#[derive(Clone, Debug)]
pub struct TensorTrain<T> {
    cores: Vec<ArrayD<T>>,
}

impl<T: TtScalar> TensorTrain<T> {
    /// Build a TT from its cores, validating the chain structure
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - `cores` is empty
    /// - cores are not all 3-way or all 4-way
    /// - boundary ranks differ from 1 or adjacent ranks disagree
    pub fn new(cores: Vec<ArrayD<T>>) -> TtResult<Self> {
        let shapes: Vec<Vec<usize>> = cores.iter().map(|c| c.shape().to_vec()).collect();
        validate_core_shapes(&shapes)?;
        Ok(Self { cores })
    }

    /// Build a TT from cores that are already known to form a valid chain
    pub(crate) fn from_valid_cores(cores: Vec<ArrayD<T>>) -> Self {
        Self { cores }
    }

    /// Random TT with the given mode sizes
    ///
    /// Entries are drawn uniformly from \[-1, 1) with a seeded RNG, so the
    /// same `(shape, max_rank, seed)` always yields the same tensor. Ranks are
    /// clamped to the largest values the manifold admits, see
    /// [`feasible_ranks`].
    ///
    /// # Examples
    ///
    /// ```
    /// use tenrim_core::TensorTrain;
    ///
    /// let tt = TensorTrain::<f64>::random(&[3, 4, 5], 3, 42).unwrap();
    /// assert_eq!(tt.tt_ranks(), vec![1, 3, 3, 1]);
    /// ```
    pub fn random(shape: &[usize], max_rank: usize, seed: u64) -> TtResult<Self> {
        let modes: Vec<Vec<usize>> = shape.iter().map(|&n| vec![n]).collect();
        Self::random_with_modes(&modes, max_rank, seed)
    }

    /// Random TT-matrix with row modes `row_shape` and column modes `col_shape`
    pub fn random_matrix(
        row_shape: &[usize],
        col_shape: &[usize],
        max_rank: usize,
        seed: u64,
    ) -> TtResult<Self> {
        if row_shape.len() != col_shape.len() {
            return Err(TtError::ShapeMismatch(format!(
                "Row shape {:?} and column shape {:?} have different lengths",
                row_shape, col_shape
            )));
        }
        let modes: Vec<Vec<usize>> = row_shape
            .iter()
            .zip(col_shape.iter())
            .map(|(&n, &m)| vec![n, m])
            .collect();
        Self::random_with_modes(&modes, max_rank, seed)
    }

    fn random_with_modes(modes: &[Vec<usize>], max_rank: usize, seed: u64) -> TtResult<Self> {
        if modes.is_empty() {
            return Err(TtError::Empty);
        }
        if max_rank == 0 {
            return Err(TtError::InvalidRanks("Max rank is zero".to_string()));
        }

        let sizes: Vec<usize> = modes.iter().map(|m| m.iter().product()).collect();
        let ranks = feasible_ranks(&sizes, max_rank);
        let mut rng = StdRng::seed_from_u64(seed);

        let mut cores = Vec::with_capacity(modes.len());
        for (k, mode) in modes.iter().enumerate() {
            let mut core_shape = Vec::with_capacity(mode.len() + 2);
            core_shape.push(ranks[k]);
            core_shape.extend_from_slice(mode);
            core_shape.push(ranks[k + 1]);

            let len: usize = core_shape.iter().product();
            let data = (0..len)
                .map(|_| {
                    let sample: f64 = rng.random_range(-1.0..1.0);
                    T::from_f64(sample).ok_or_else(|| {
                        TtError::InvalidTensor(format!("Cannot represent {} as scalar", sample))
                    })
                })
                .collect::<TtResult<Vec<T>>>()?;

            let core = ArrayD::from_shape_vec(IxDyn(&core_shape), data)
                .map_err(|e| TtError::ShapeMismatch(format!("Core {} creation failed: {}", k, e)))?;
            cores.push(core);
        }

        Self::new(cores)
    }

    /// Zero TT with the same core shapes as `self`
    pub fn zeros_like(&self) -> Self {
        let cores = self
            .cores
            .iter()
            .map(|c| ArrayD::zeros(c.raw_dim()))
            .collect();
        Self::from_valid_cores(cores)
    }

    /// Number of TT-cores
    pub fn ndims(&self) -> usize {
        self.cores.len()
    }

    /// Whether the cores are 4-way (TT-matrix)
    pub fn is_tt_matrix(&self) -> bool {
        self.cores[0].ndim() == 4
    }

    /// TT-cores in chain order
    pub fn cores(&self) -> &[ArrayD<T>] {
        &self.cores
    }

    /// Core `k`
    pub fn core(&self, k: usize) -> &ArrayD<T> {
        &self.cores[k]
    }

    /// Consume the TT and return its cores
    pub fn into_cores(self) -> Vec<ArrayD<T>> {
        self.cores
    }

    /// TT-ranks including the boundary ranks: \[1, r₁, ..., rₙ₋₁, 1\]
    pub fn tt_ranks(&self) -> Vec<usize> {
        tt_ranks_of(&self.core_shapes())
    }

    /// Mode sizes per core: `[n]` for tensors, `[n, m]` for TT-matrices
    pub fn raw_shape(&self) -> Vec<Vec<usize>> {
        self.cores
            .iter()
            .map(|c| c.shape()[1..c.ndim() - 1].to_vec())
            .collect()
    }

    /// Merged mode size of every core
    pub fn mode_sizes(&self) -> Vec<usize> {
        self.raw_shape()
            .iter()
            .map(|m| m.iter().product())
            .collect()
    }

    /// Shapes of all cores
    pub fn core_shapes(&self) -> Vec<Vec<usize>> {
        self.cores.iter().map(|c| c.shape().to_vec()).collect()
    }

    /// Total number of stored entries
    pub fn num_parameters(&self) -> usize {
        self.cores.iter().map(|c| c.len()).sum()
    }

    /// Reconstruct the dense tensor
    ///
    /// Plain TTs reconstruct to shape (i₁, ..., iₙ). TT-matrices reconstruct to
    /// the (∏ iₖ, ∏ jₖ) matrix.
    ///
    /// # Complexity
    ///
    /// Time: O(∏ₖ Iₖ × R²) where R = max TT-rank
    /// Space: O(∏ₖ Iₖ)
    pub fn full(&self) -> TtResult<ArrayD<T>> {
        let mut acc = Array2::from_elem((1, 1), T::one());

        for core in &self.cores {
            let r_right = core.shape()[core.ndim() - 1];
            let n = core.len() / (core.shape()[0] * r_right);
            let contracted = acc.dot(&right_unfolding(core)?);
            acc = reshape_matrix(&contracted, acc.nrows() * n, r_right)?;
        }

        let raw = self.raw_shape();
        if !self.is_tt_matrix() {
            let shape: Vec<usize> = raw.iter().map(|m| m[0]).collect();
            return ArrayD::from_shape_vec(IxDyn(&shape), acc.iter().cloned().collect())
                .map_err(|e| TtError::ShapeMismatch(format!("Final reshape failed: {}", e)));
        }

        // Interleaved (i₁, j₁, i₂, j₂, ...) -> (i₁, ..., iₙ, j₁, ..., jₙ)
        let interleaved: Vec<usize> = raw.iter().flat_map(|m| m.iter().copied()).collect();
        let d = raw.len();
        let axes: Vec<usize> = (0..d).map(|k| 2 * k).chain((0..d).map(|k| 2 * k + 1)).collect();
        let tensor = ArrayD::from_shape_vec(IxDyn(&interleaved), acc.iter().cloned().collect())
            .map_err(|e| TtError::ShapeMismatch(format!("Interleaved reshape failed: {}", e)))?;
        let permuted = tensor.permuted_axes(IxDyn(&axes));

        let rows: usize = raw.iter().map(|m| m[0]).product();
        let cols: usize = raw.iter().map(|m| m[1]).product();
        ArrayD::from_shape_vec(IxDyn(&[rows, cols]), permuted.iter().cloned().collect())
            .map_err(|e| TtError::ShapeMismatch(format!("Matrix reshape failed: {}", e)))
    }
}

/// Validate a sequence of TT-core shapes
///
/// Shared by concrete TTs and by TT expressions whose cores live in a graph.
pub fn validate_core_shapes(shapes: &[Vec<usize>]) -> TtResult<()> {
    let first = shapes.first().ok_or(TtError::Empty)?;
    let order = first.len();
    if order != 3 && order != 4 {
        return Err(TtError::InvalidTensor(format!(
            "TT-cores must be 3-way or 4-way, got a {}-way core",
            order
        )));
    }

    for (k, shape) in shapes.iter().enumerate() {
        if shape.len() != order {
            return Err(TtError::ShapeMismatch(format!(
                "Core {} has {} axes, expected {}",
                k,
                shape.len(),
                order
            )));
        }
        if shape.contains(&0) {
            return Err(TtError::InvalidTensor(format!(
                "Core {} has an empty axis: {:?}",
                k, shape
            )));
        }
    }

    if first[0] != 1 {
        return Err(TtError::InvalidRanks(format!(
            "First core must have left rank 1, got {}",
            first[0]
        )));
    }
    let last = &shapes[shapes.len() - 1];
    if last[order - 1] != 1 {
        return Err(TtError::InvalidRanks(format!(
            "Last core must have right rank 1, got {}",
            last[order - 1]
        )));
    }

    for k in 0..shapes.len() - 1 {
        let right = shapes[k][order - 1];
        let left = shapes[k + 1][0];
        if right != left {
            return Err(TtError::InvalidRanks(format!(
                "Core {} has right rank {} but core {} has left rank {}",
                k,
                right,
                k + 1,
                left
            )));
        }
    }

    Ok(())
}

/// TT-ranks of a validated chain of core shapes
pub fn tt_ranks_of(shapes: &[Vec<usize>]) -> Vec<usize> {
    let mut ranks = Vec::with_capacity(shapes.len() + 1);
    if let Some(first) = shapes.first() {
        ranks.push(first[0]);
    }
    ranks.extend(shapes.iter().map(|s| s[s.len() - 1]));
    ranks
}

/// Largest TT-ranks admitted by the given merged mode sizes, capped at `max_rank`
///
/// rₖ can never exceed min(∏_{i≤k} nᵢ, ∏_{i>k} nᵢ); higher ranks do not
/// describe a point of the fixed-rank manifold.
pub fn feasible_ranks(mode_sizes: &[usize], max_rank: usize) -> Vec<usize> {
    let d = mode_sizes.len();
    let mut ranks = vec![1; d + 1];
    for (k, rank) in ranks.iter_mut().enumerate().take(d).skip(1) {
        let left = mode_sizes[..k]
            .iter()
            .fold(1usize, |acc, &n| acc.saturating_mul(n));
        let right = mode_sizes[k..]
            .iter()
            .fold(1usize, |acc, &n| acc.saturating_mul(n));
        *rank = max_rank.min(left).min(right);
    }
    ranks
}

/// Reshape a core to the (rₖ₋₁·iₖ, rₖ) matrix
pub fn left_unfolding<T: TtScalar>(core: &ArrayD<T>) -> TtResult<Array2<T>> {
    let r_right = core
        .shape()
        .last()
        .copied()
        .filter(|&r| r > 0)
        .ok_or_else(|| TtError::InvalidTensor(format!("Bad core shape {:?}", core.shape())))?;
    reshape_matrix(core, core.len() / r_right, r_right)
}

/// Reshape a core to the (rₖ₋₁, iₖ·rₖ) matrix
pub fn right_unfolding<T: TtScalar>(core: &ArrayD<T>) -> TtResult<Array2<T>> {
    let r_left = core
        .shape()
        .first()
        .copied()
        .filter(|&r| r > 0)
        .ok_or_else(|| TtError::InvalidTensor(format!("Bad core shape {:?}", core.shape())))?;
    reshape_matrix(core, r_left, core.len() / r_left)
}

/// Fold a matrix back into a core of the given shape (row-major)
pub fn fold_core<T: TtScalar>(matrix: &Array2<T>, shape: &[usize]) -> TtResult<ArrayD<T>> {
    ArrayD::from_shape_vec(IxDyn(shape), matrix.iter().cloned().collect())
        .map_err(|e| TtError::ShapeMismatch(format!("Fold to {:?} failed: {}", shape, e)))
}

pub(crate) fn reshape_matrix<T, S, D>(
    array: &ArrayBase<S, D>,
    rows: usize,
    cols: usize,
) -> TtResult<Array2<T>>
where
    T: TtScalar,
    S: Data<Elem = T>,
    D: Dimension,
{
    Array2::from_shape_vec((rows, cols), array.iter().cloned().collect()).map_err(|e| {
        TtError::ShapeMismatch(format!("Reshape to ({}, {}) failed: {}", rows, cols, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_bad_boundary_rank() {
        let cores = vec![
            ArrayD::<f64>::zeros(IxDyn(&[2, 3, 2])),
            ArrayD::<f64>::zeros(IxDyn(&[2, 3, 1])),
        ];
        assert!(matches!(
            TensorTrain::new(cores),
            Err(TtError::InvalidRanks(_))
        ));
    }

    #[test]
    fn test_new_rejects_rank_mismatch() {
        let cores = vec![
            ArrayD::<f64>::zeros(IxDyn(&[1, 3, 2])),
            ArrayD::<f64>::zeros(IxDyn(&[3, 3, 1])),
        ];
        assert!(matches!(
            TensorTrain::new(cores),
            Err(TtError::InvalidRanks(_))
        ));
    }

    #[test]
    fn test_new_rejects_mixed_core_order() {
        let cores = vec![
            ArrayD::<f64>::zeros(IxDyn(&[1, 3, 2])),
            ArrayD::<f64>::zeros(IxDyn(&[2, 3, 2, 1])),
        ];
        assert!(matches!(
            TensorTrain::new(cores),
            Err(TtError::ShapeMismatch(_))
        ));
        assert!(matches!(TensorTrain::<f64>::new(vec![]), Err(TtError::Empty)));
    }

    #[test]
    fn test_random_clamps_ranks() {
        let tt = TensorTrain::<f64>::random(&[2, 3, 4, 2], 10, 7).unwrap();
        assert_eq!(tt.tt_ranks(), vec![1, 2, 6, 2, 1]);
        assert_eq!(tt.ndims(), 4);
        assert!(!tt.is_tt_matrix());
    }

    #[test]
    fn test_random_is_deterministic() {
        let a = TensorTrain::<f64>::random(&[3, 3, 3], 2, 11).unwrap();
        let b = TensorTrain::<f64>::random(&[3, 3, 3], 2, 11).unwrap();
        for (ca, cb) in a.cores().iter().zip(b.cores()) {
            assert_eq!(ca, cb);
        }
    }

    #[test]
    fn test_full_rank_one() {
        // x(i, j) = u(i) * v(j)
        let u = ArrayD::from_shape_vec(IxDyn(&[1, 2, 1]), vec![1.0, 2.0]).unwrap();
        let v = ArrayD::from_shape_vec(IxDyn(&[1, 3, 1]), vec![3.0, 4.0, 5.0]).unwrap();
        let tt = TensorTrain::new(vec![u, v]).unwrap();

        let full = tt.full().unwrap();
        assert_eq!(full.shape(), &[2, 3]);
        assert_eq!(full[[1, 2]], 10.0);
        assert_eq!(full[[0, 1]], 4.0);
    }

    #[test]
    fn test_full_matrix_layout() {
        // Kronecker product of a 2x2 and a 1x3 matrix
        let a = ArrayD::from_shape_vec(IxDyn(&[1, 2, 2, 1]), vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let b = ArrayD::from_shape_vec(IxDyn(&[1, 1, 3, 1]), vec![5.0, 6.0, 7.0]).unwrap();
        let tt = TensorTrain::new(vec![a, b]).unwrap();
        assert!(tt.is_tt_matrix());

        let full = tt.full().unwrap();
        assert_eq!(full.shape(), &[2, 6]);
        // Row i₁, column (j₁, j₂): a[i₁, j₁] * b[0, j₂]
        assert_eq!(full[[0, 0]], 5.0);
        assert_eq!(full[[0, 4]], 2.0 * 6.0);
        assert_eq!(full[[1, 5]], 4.0 * 7.0);
    }

    #[test]
    fn test_unfoldings_and_fold() {
        let tt = TensorTrain::<f64>::random(&[3, 4, 5], 3, 3).unwrap();
        let core = tt.core(1);
        let left = left_unfolding(core).unwrap();
        assert_eq!(left.dim(), (12, 3));
        let right = right_unfolding(core).unwrap();
        assert_eq!(right.dim(), (3, 12));
        let back = fold_core(&left, core.shape()).unwrap();
        assert_eq!(&back, core);
    }

    #[test]
    fn test_feasible_ranks() {
        assert_eq!(feasible_ranks(&[2, 2, 2], 5), vec![1, 2, 2, 1]);
        assert_eq!(feasible_ranks(&[10], 5), vec![1, 1]);
        assert_eq!(feasible_ranks(&[6, 6, 6], 4), vec![1, 4, 4, 1]);
    }
}
