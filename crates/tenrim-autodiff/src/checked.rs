//! Tangent vectors guarded by a pending invariance check

use crate::error::AutodiffResult;
use crate::invariance::InvarianceCheck;
use tenrim_ad::Session;
use tenrim_core::{TensorTrain, TtScalar};
use tenrim_manifold::TangentVector;

/// Result of a Riemannian builder
///
/// The tangent expression is only handed out after the configured
/// invariance check has passed in the session that evaluates it.
#[derive(Debug)]
pub struct CheckedTangent<'g, T> {
    tangent: TangentVector<'g, T>,
    check: Option<InvarianceCheck>,
}

impl<'g, T: TtScalar> CheckedTangent<'g, T> {
    pub(crate) fn new(tangent: TangentVector<'g, T>, check: Option<InvarianceCheck>) -> Self {
        Self { tangent, check }
    }

    /// Whether an invariance check is attached
    pub fn is_checked(&self) -> bool {
        self.check.is_some()
    }

    /// Run the invariance check, then expose the tangent expression
    pub fn verify(&self, session: &mut Session<'g, T>) -> AutodiffResult<&TangentVector<'g, T>> {
        if let Some(check) = &self.check {
            check.verify(session)?;
        }
        Ok(&self.tangent)
    }

    /// Like [`verify`](Self::verify), consuming the guard
    pub fn into_verified(self, session: &mut Session<'g, T>) -> AutodiffResult<TangentVector<'g, T>> {
        if let Some(check) = &self.check {
            check.verify(session)?;
        }
        Ok(self.tangent)
    }

    /// Verify, then evaluate the tangent vector to a concrete TT
    pub fn evaluate(&self, session: &mut Session<'g, T>) -> AutodiffResult<TensorTrain<T>> {
        let tangent = self.verify(session)?;
        Ok(tangent.evaluate(session)?)
    }
}
