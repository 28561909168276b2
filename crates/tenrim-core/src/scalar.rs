//! Scalar trait shared by every TenRim crate

use scirs2_core::ndarray_ext::ScalarOperand;
use scirs2_core::numeric::{Float, FromPrimitive, NumAssign, NumCast};
use std::fmt::{Debug, Display};
use std::iter::Sum;

/// Element type of TT-cores and graph values.
///
/// Collects the bounds that `scirs2_linalg` decompositions and the expression
/// graph need, so downstream signatures stay short. Implemented for `f32` and
/// `f64`.
pub trait TtScalar:
    Float
    + NumAssign
    + NumCast
    + FromPrimitive
    + Sum
    + ScalarOperand
    + Send
    + Sync
    + Debug
    + Display
    + 'static
{
}

impl<T> TtScalar for T where
    T: Float
        + NumAssign
        + NumCast
        + FromPrimitive
        + Sum
        + ScalarOperand
        + Send
        + Sync
        + Debug
        + Display
        + 'static
{
}
