//! # tenrim-core - Tensor Train containers
//!
//! Concrete Tensor Trains (TT) and TT-matrices together with the dense
//! building blocks the Riemannian machinery relies on.
//!
//! ## Format
//!
//! ```text
//! X(i₁,...,iₙ) = G₁[i₁] × G₂[i₂] × ... × Gₙ[iₙ]
//! ```
//!
//! Cores are 3-way (rₖ₋₁, iₖ, rₖ) for tensors and 4-way (rₖ₋₁, iₖ, jₖ, rₖ)
//! for TT-matrices, with r₀ = rₙ = 1.
//!
//! ## Operations
//!
//! - [`TensorTrain::random`] / [`TensorTrain::random_matrix`]: seeded random TTs
//! - [`TensorTrain::full`]: dense reconstruction
//! - [`TensorTrain::add`], [`TensorTrain::scale`], [`TensorTrain::flat_inner`]
//! - [`orthogonalize`]: left or right QR sweeps
//! - [`orthogonal_pair`]: left and right forms with matching ranks
//!
//! ## Quick Start
//!
//! ```
//! use tenrim_core::{orthogonalize, TensorTrain};
//!
//! let tt = TensorTrain::<f64>::random(&[4, 5, 6], 3, 42).unwrap();
//! let left = orthogonalize(&tt, true).unwrap();
//!
//! let diff = tt.sub(&left).unwrap().frobenius_norm().unwrap();
//! assert!(diff < 1e-6);
//! ```

pub mod arithmetic;
pub mod error;
pub mod orthogonalize;
pub mod scalar;
pub mod tensor_train;


pub use error::{TtError, TtResult};
pub use orthogonalize::{
    left_orthogonality_error, orthogonal_pair, orthogonality_error, orthogonalize,
    right_orthogonality_error,
};
pub use scalar::TtScalar;
pub use tensor_train::{
    feasible_ranks, fold_core, left_unfolding, right_unfolding, tt_ranks_of,
    validate_core_shapes, TensorTrain,
};
