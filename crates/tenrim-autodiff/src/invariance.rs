//! Detection of functions that depend on the TT representation
//!
//! A function of a tensor must give the same value for every TT
//! representation of it. The check evaluates the user function on two
//! different representations of the point and compares the results.

use crate::error::{AutodiffError, AutodiffResult};
use crate::options::RiemannianOptions;
use tenrim_ad::{Expr, Session};
use tenrim_core::TtScalar;
use tracing::{debug, warn};

/// Largest accepted relative difference between the two evaluations
pub const INVARIANCE_TOLERANCE: f64 = 1e-5;

/// `|v1 - v2| / |v1|`
///
/// Equal values give zero (including two zeros); a zero reference with a
/// nonzero second value gives infinity.
pub fn relative_difference(value_1: f64, value_2: f64) -> f64 {
    if value_1 == value_2 {
        0.0
    } else if value_1 == 0.0 {
        f64::INFINITY
    } else {
        (value_1 - value_2).abs() / value_1.abs()
    }
}

/// Pair of scalar expressions that must evaluate to the same value
#[derive(Debug, Clone, Copy)]
pub struct InvarianceCheck {
    value_1: Expr,
    value_2: Expr,
}

impl InvarianceCheck {
    pub fn new(value_1: Expr, value_2: Expr) -> Self {
        Self { value_1, value_2 }
    }

    /// Evaluate both values and fail unless they agree
    ///
    /// # Errors
    ///
    /// [`AutodiffError::NotInvariant`] when the relative difference exceeds
    /// [`INVARIANCE_TOLERANCE`] or is NaN.
    pub fn verify<T: TtScalar>(&self, session: &mut Session<'_, T>) -> AutodiffResult<()> {
        let value_1 = session.scalar(self.value_1)?.to_f64().unwrap_or(f64::NAN);
        let value_2 = session.scalar(self.value_2)?.to_f64().unwrap_or(f64::NAN);
        let relative_difference = relative_difference(value_1, value_2);
        debug!(value_1, value_2, relative_difference, "invariance check");

        if relative_difference <= INVARIANCE_TOLERANCE {
            Ok(())
        } else {
            Err(AutodiffError::NotInvariant {
                value_1,
                value_2,
                relative_difference,
            })
        }
    }
}

/// Log the cost of the invariance check once per enabling call
pub(crate) fn advise(options: &RiemannianOptions) {
    if options.debug && options.debug_advisory {
        warn!(
            name = %options.name,
            "Invariance checking is enabled: the function is evaluated twice per call. \
             Set debug to false once the function is known to be invariant"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tenrim_ad::Graph;

    #[test]
    fn test_relative_difference() {
        assert_eq!(relative_difference(2.0, 2.0), 0.0);
        assert_eq!(relative_difference(0.0, 0.0), 0.0);
        assert_eq!(relative_difference(0.0, 1e-300), f64::INFINITY);
        assert!((relative_difference(-4.0, -3.0) - 0.25).abs() < 1e-15);
        assert!(relative_difference(f64::NAN, 1.0).is_nan());
    }

    #[test]
    fn test_verify() {
        let graph = Graph::<f64>::new();
        let a = graph.scalar(10.0);
        let b = graph.scalar(10.0 + 1e-6);
        let c = graph.scalar(11.0);
        let mut session = Session::new(&graph);

        assert!(InvarianceCheck::new(a, b).verify(&mut session).is_ok());
        match InvarianceCheck::new(a, c).verify(&mut session) {
            Err(AutodiffError::NotInvariant {
                value_1,
                value_2,
                relative_difference,
            }) => {
                assert_eq!(value_1, 10.0);
                assert_eq!(value_2, 11.0);
                assert!((relative_difference - 0.1).abs() < 1e-12);
            }
            other => panic!("expected NotInvariant, got {:?}", other),
        }
    }

    #[test]
    fn test_nan_is_never_invariant() {
        let graph = Graph::<f64>::new();
        let a = graph.scalar(f64::NAN);
        let mut session = Session::new(&graph);
        assert!(InvarianceCheck::new(a, a).verify(&mut session).is_err());
    }

    mod advisory {
        use super::super::advise;
        use crate::gradient::build_gradient;
        use crate::hessian::build_hessian_vector_product;
        use crate::options::RiemannianOptions;
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;
        use tenrim_ad::Graph;
        use tenrim_core::TensorTrain;
        use tenrim_manifold::frobenius_norm_squared;
        use tracing::{Event, Level, Subscriber};
        use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

        struct WarnCounter(Arc<AtomicUsize>);

        impl<S: Subscriber> Layer<S> for WarnCounter {
            fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
                if *event.metadata().level() == Level::WARN {
                    self.0.fetch_add(1, Ordering::SeqCst);
                }
            }
        }

        fn count_warnings(f: impl FnOnce()) -> usize {
            let count = Arc::new(AtomicUsize::new(0));
            let subscriber = tracing_subscriber::registry().with(WarnCounter(count.clone()));
            tracing::subscriber::with_default(subscriber, f);
            count.load(Ordering::SeqCst)
        }

        #[test]
        fn test_advisory_requires_both_flags() {
            let on = RiemannianOptions::default();
            let quiet = RiemannianOptions::default().with_debug_advisory(false);
            let off = RiemannianOptions::default().with_debug(false);

            assert_eq!(count_warnings(|| advise(&on)), 1);
            assert_eq!(count_warnings(|| advise(&quiet)), 0);
            assert_eq!(count_warnings(|| advise(&off)), 0);
        }

        #[test]
        fn test_advisory_once_per_call() {
            let x = TensorTrain::<f64>::random(&[2, 3, 2], 2, 5).unwrap();
            let v = TensorTrain::<f64>::random(&[2, 3, 2], 2, 6).unwrap();
            let options = RiemannianOptions::default();

            let warnings = count_warnings(|| {
                let graph = Graph::new();
                for _ in 0..2 {
                    build_gradient(&graph, |tt| frobenius_norm_squared(tt), &x, &options).unwrap();
                }
                build_hessian_vector_product(&graph, |tt| frobenius_norm_squared(tt), &x, &v, &options)
                    .unwrap();
            });
            assert_eq!(warnings, 3);

            let silent = RiemannianOptions::default().with_debug(false);
            let warnings = count_warnings(|| {
                let graph = Graph::new();
                build_gradient(&graph, |tt| frobenius_norm_squared(tt), &x, &silent).unwrap();
                build_hessian_vector_product(&graph, |tt| frobenius_norm_squared(tt), &x, &v, &silent)
                    .unwrap();
            });
            assert_eq!(warnings, 0);
        }
    }
}
