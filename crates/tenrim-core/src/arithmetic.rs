//! Arithmetic on Tensor Trains without densification
//!
//! Sums concatenate cores block-diagonally (ranks add up), scaling touches
//! only the first core, and the flat inner product contracts both chains
//! core by core.

use crate::error::{TtError, TtResult};
use crate::scalar::TtScalar;
use crate::tensor_train::{left_unfolding, reshape_matrix, right_unfolding, TensorTrain};
use scirs2_core::ndarray::Slice;
use scirs2_core::ndarray_ext::{Array2, ArrayD, Axis, IxDyn};

impl<T: TtScalar> TensorTrain<T> {
    /// Multiply the tensor by a scalar
    pub fn scale(&self, alpha: T) -> Self {
        let mut cores = self.cores().to_vec();
        cores[0].mapv_inplace(|v| v * alpha);
        Self::from_valid_cores(cores)
    }

    /// Sum of two TTs with the same mode sizes
    ///
    /// Interior cores become block-diagonal, so the ranks of the result are
    /// the sums of the input ranks.
    pub fn add(&self, other: &Self) -> TtResult<Self> {
        if self.raw_shape() != other.raw_shape() {
            return Err(TtError::ShapeMismatch(format!(
                "Cannot add TTs with modes {:?} and {:?}",
                self.raw_shape(),
                other.raw_shape()
            )));
        }

        let d = self.ndims();
        if d == 1 {
            return Self::new(vec![self.core(0) + other.core(0)]);
        }

        let mut cores = Vec::with_capacity(d);
        for k in 0..d {
            let a = self.core(k);
            let b = other.core(k);
            let last = a.ndim() - 1;

            let (left, b_left) = if k == 0 {
                (1, 0)
            } else {
                (a.shape()[0] + b.shape()[0], a.shape()[0])
            };
            let (right, b_right) = if k == d - 1 {
                (1, 0)
            } else {
                (a.shape()[last] + b.shape()[last], a.shape()[last])
            };

            let mut shape = a.shape().to_vec();
            shape[0] = left;
            shape[last] = right;
            let mut core = ArrayD::zeros(IxDyn(&shape));
            place_block(&mut core, a, 0, 0);
            place_block(&mut core, b, b_left, b_right);
            cores.push(core);
        }

        Self::new(cores)
    }

    /// Difference `self - other`
    pub fn sub(&self, other: &Self) -> TtResult<Self> {
        self.add(&other.scale(-T::one()))
    }

    /// Flat inner product ⟨self, other⟩ = Σ self(i) · other(i)
    ///
    /// # Complexity
    ///
    /// Time: O(N × I × R³)
    pub fn flat_inner(&self, other: &Self) -> TtResult<T> {
        if self.mode_sizes() != other.mode_sizes() {
            return Err(TtError::ShapeMismatch(format!(
                "Cannot take inner product of TTs with modes {:?} and {:?}",
                self.raw_shape(),
                other.raw_shape()
            )));
        }

        // acc[a, b] contracts everything left of the current cores
        let mut acc = Array2::from_elem((1, 1), T::one());
        for (a, b) in self.cores().iter().zip(other.cores()) {
            let rb = b.shape()[0];
            let ra_right = a.shape()[a.ndim() - 1];
            let n = a.len() / (a.shape()[0] * ra_right);

            let tmp = acc.t().dot(&right_unfolding(a)?);
            let tmp = reshape_matrix(&tmp, rb * n, ra_right)?;
            acc = tmp.t().dot(&left_unfolding(b)?);
        }

        Ok(acc[[0, 0]])
    }

    /// Frobenius norm, computed from the flat inner product
    pub fn frobenius_norm(&self) -> TtResult<T> {
        Ok(self.flat_inner(self)?.max(T::zero()).sqrt())
    }
}

fn place_block<T: TtScalar>(
    target: &mut ArrayD<T>,
    block: &ArrayD<T>,
    left_offset: usize,
    right_offset: usize,
) {
    let last = target.ndim() - 1;
    let rows = block.shape()[0];
    let cols = block.shape()[last];
    let mut view = target.slice_axis_mut(Axis(0), Slice::from(left_offset..left_offset + rows));
    view.slice_axis_mut(Axis(last), Slice::from(right_offset..right_offset + cols))
        .assign(block);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dense_inner(a: &TensorTrain<f64>, b: &TensorTrain<f64>) -> f64 {
        let fa = a.full().unwrap();
        let fb = b.full().unwrap();
        fa.iter().zip(fb.iter()).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn test_flat_inner_matches_dense() {
        let a = TensorTrain::<f64>::random(&[3, 4, 2], 2, 1).unwrap();
        let b = TensorTrain::<f64>::random(&[3, 4, 2], 3, 2).unwrap();
        let inner = a.flat_inner(&b).unwrap();
        assert!((inner - dense_inner(&a, &b)).abs() < 1e-10);
    }

    #[test]
    fn test_flat_inner_tt_matrix() {
        let a = TensorTrain::<f64>::random_matrix(&[2, 3], &[2, 2], 2, 3).unwrap();
        let b = TensorTrain::<f64>::random_matrix(&[2, 3], &[2, 2], 3, 4).unwrap();
        let inner = a.flat_inner(&b).unwrap();
        assert!((inner - dense_inner(&a, &b)).abs() < 1e-10);
    }

    #[test]
    fn test_add_and_sub() {
        let a = TensorTrain::<f64>::random(&[3, 4, 2], 2, 5).unwrap();
        let b = TensorTrain::<f64>::random(&[3, 4, 2], 2, 6).unwrap();

        let sum = a.add(&b).unwrap();
        assert_eq!(sum.tt_ranks(), vec![1, 4, 4, 1]);
        let (fa, fb, fs) = (a.full().unwrap(), b.full().unwrap(), sum.full().unwrap());
        for ((x, y), s) in fa.iter().zip(fb.iter()).zip(fs.iter()) {
            assert!((x + y - s).abs() < 1e-12);
        }

        let zero = a.sub(&a).unwrap();
        assert!(zero.frobenius_norm().unwrap() < 1e-6);
    }

    #[test]
    fn test_add_rejects_mismatched_modes() {
        let a = TensorTrain::<f64>::random(&[3, 4], 2, 5).unwrap();
        let b = TensorTrain::<f64>::random(&[4, 3], 2, 6).unwrap();
        assert!(matches!(a.add(&b), Err(TtError::ShapeMismatch(_))));
        assert!(matches!(a.flat_inner(&b), Err(TtError::ShapeMismatch(_))));
    }

    #[test]
    fn test_scale_and_norm() {
        let a = TensorTrain::<f64>::random(&[3, 3, 3], 2, 8).unwrap();
        let norm = a.frobenius_norm().unwrap();
        let scaled = a.scale(-2.5);
        assert!((scaled.frobenius_norm().unwrap() - 2.5 * norm).abs() < 1e-10);
        assert!((dense_inner(&a, &a).sqrt() - norm).abs() < 1e-10);
    }
}
