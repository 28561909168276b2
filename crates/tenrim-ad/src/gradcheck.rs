//! Gradient checking utilities
//!
//! Verifies the symbolic gradients produced by [`Graph::gradients`] against
//! finite differences. Every check rebuilds the expression on a fresh graph
//! for each perturbed input, so the build closure must be deterministic.
//!
//! # Finite Difference Methods
//!
//! - **Central difference**: `f'(x) ≈ [f(x+h) - f(x-h)] / (2h)` (more accurate)
//! - **Forward difference**: `f'(x) ≈ [f(x+h) - f(x)] / h` (faster)
//!
//! # Example
//!
//! ```
//! use tenrim_ad::gradcheck::{check_gradient, GradCheckConfig};
//! use scirs2_core::ndarray_ext::{ArrayD, IxDyn};
//!
//! let x = ArrayD::from_shape_vec(IxDyn(&[3]), vec![0.5, -1.0, 2.0]).unwrap();
//! let result = check_gradient(
//!     |graph, inputs| {
//!         let square = graph.mul(inputs[0], inputs[0])?;
//!         graph.sum(square)
//!     },
//!     &[x],
//!     &GradCheckConfig::default(),
//! )
//! .unwrap();
//! assert!(result.passed);
//! ```

use crate::error::GraphResult;
use crate::graph::{Expr, Graph};
use crate::session::Session;
use anyhow::{anyhow, Result};
use scirs2_core::ndarray_ext::{ArrayD, IxDyn};
use tenrim_core::TtScalar;
use tracing::{info, warn};

/// Gradient checking configuration
#[derive(Debug, Clone)]
pub struct GradCheckConfig {
    /// Step size for finite differences (default: 1e-5)
    pub epsilon: f64,

    /// Relative tolerance for gradient comparison (default: 1e-3)
    pub rtol: f64,

    /// Absolute tolerance for gradient comparison (default: 1e-5)
    pub atol: f64,

    /// Use central difference (more accurate but 2x slower)
    pub use_central_diff: bool,

    /// Log every mismatch and a summary
    pub verbose: bool,
}

impl Default for GradCheckConfig {
    fn default() -> Self {
        Self {
            epsilon: 1e-5,
            rtol: 1e-3,
            atol: 1e-5,
            use_central_diff: true,
            verbose: false,
        }
    }
}

impl GradCheckConfig {
    /// Set the finite-difference step
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Set both tolerances
    pub fn with_tolerances(mut self, rtol: f64, atol: f64) -> Self {
        self.rtol = rtol;
        self.atol = atol;
        self
    }

    /// Enable mismatch logging
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

/// Result of gradient checking
#[derive(Debug)]
pub struct GradCheckResult {
    /// Maximum absolute difference between analytical and numerical gradients
    pub max_abs_diff: f64,

    /// Maximum relative difference
    pub max_rel_diff: f64,

    /// Whether the gradient check passed
    pub passed: bool,

    /// Number of elements checked
    pub num_elements: usize,

    /// Number of elements that failed the check
    pub num_failures: usize,
}

/// Check symbolic gradients of a scalar expression using finite differences
///
/// # Arguments
///
/// * `build` - Builds the single-element output from one variable per input
/// * `inputs` - Values at which to check the gradient
/// * `config` - Gradient checking configuration
///
/// # Returns
///
/// Result containing gradient check statistics over all inputs
pub fn check_gradient<T, F>(
    build: F,
    inputs: &[ArrayD<T>],
    config: &GradCheckConfig,
) -> Result<GradCheckResult>
where
    T: TtScalar,
    F: Fn(&Graph<T>, &[Expr]) -> GraphResult<Expr>,
{
    let analytical = analytical_gradients(&build, inputs)?;
    let epsilon = T::from_f64(config.epsilon).ok_or_else(|| anyhow!("Failed to convert epsilon"))?;
    let two = T::one() + T::one();

    let base = if config.use_central_diff {
        None
    } else {
        Some(evaluate_at(&build, inputs)?)
    };

    let mut numerical = Vec::with_capacity(inputs.len());
    for (j, input) in inputs.iter().enumerate() {
        let values: Vec<T> = input.iter().cloned().collect();
        let mut grad = Vec::with_capacity(values.len());
        for e in 0..values.len() {
            let plus = evaluate_at(&build, &perturbed(inputs, j, &values, e, epsilon)?)?;
            let estimate = match base {
                None => {
                    let minus = evaluate_at(&build, &perturbed(inputs, j, &values, e, -epsilon)?)?;
                    (plus - minus) / (two * epsilon)
                }
                Some(f0) => (plus - f0) / epsilon,
            };
            grad.push(estimate);
        }
        numerical.push(ArrayD::from_shape_vec(IxDyn(input.shape()), grad)?);
    }

    compare_gradients(&analytical, &numerical, config)
}

/// Check second derivatives obtained by differentiating a gradient again
///
/// The symbolic Hessian-vector product `∇(⟨∇f, v⟩)` is compared with the
/// central difference of symbolic gradients along `direction`.
pub fn check_hessian_vector_product<T, F>(
    build: F,
    inputs: &[ArrayD<T>],
    direction: &[ArrayD<T>],
    config: &GradCheckConfig,
) -> Result<GradCheckResult>
where
    T: TtScalar,
    F: Fn(&Graph<T>, &[Expr]) -> GraphResult<Expr>,
{
    if inputs.len() != direction.len() {
        return Err(anyhow!(
            "Got {} inputs but {} direction components",
            inputs.len(),
            direction.len()
        ));
    }

    let graph = Graph::new();
    let variables: Vec<Expr> = inputs.iter().map(|x| graph.variable(x.clone())).collect();
    let output = build(&graph, &variables)?;
    let grads = graph.gradients(output, &variables)?;
    let terms = grads
        .iter()
        .zip(direction)
        .map(|(g, v)| {
            let v = graph.constant(v.clone());
            graph.dot(*g, v)
        })
        .collect::<GraphResult<Vec<_>>>()?;
    let directional = graph.add_n(&terms)?;
    let hvp = graph.gradients(directional, &variables)?;
    let analytical = Session::new(&graph).run(&hvp)?;

    let epsilon = T::from_f64(config.epsilon).ok_or_else(|| anyhow!("Failed to convert epsilon"))?;
    let shifted = |sign: T| -> Vec<ArrayD<T>> {
        inputs
            .iter()
            .zip(direction)
            .map(|(x, v)| x + &(v * (sign * epsilon)))
            .collect()
    };
    let plus = analytical_gradients(&build, &shifted(T::one()))?;
    let minus = analytical_gradients(&build, &shifted(-T::one()))?;
    let numerical: Vec<ArrayD<T>> = plus
        .iter()
        .zip(&minus)
        .map(|(p, m)| (p - m) / (epsilon + epsilon))
        .collect();

    compare_gradients(&analytical, &numerical, config)
}

fn analytical_gradients<T, F>(build: &F, inputs: &[ArrayD<T>]) -> Result<Vec<ArrayD<T>>>
where
    T: TtScalar,
    F: Fn(&Graph<T>, &[Expr]) -> GraphResult<Expr>,
{
    let graph = Graph::new();
    let variables: Vec<Expr> = inputs.iter().map(|x| graph.variable(x.clone())).collect();
    let output = build(&graph, &variables)?;
    let grads = graph.gradients(output, &variables)?;
    Ok(Session::new(&graph).run(&grads)?)
}

fn evaluate_at<T, F>(build: &F, inputs: &[ArrayD<T>]) -> Result<T>
where
    T: TtScalar,
    F: Fn(&Graph<T>, &[Expr]) -> GraphResult<Expr>,
{
    let graph = Graph::new();
    let variables: Vec<Expr> = inputs.iter().map(|x| graph.variable(x.clone())).collect();
    let output = build(&graph, &variables)?;
    Ok(Session::new(&graph).scalar(output)?)
}

fn perturbed<T: TtScalar>(
    inputs: &[ArrayD<T>],
    which: usize,
    values: &[T],
    element: usize,
    delta: T,
) -> Result<Vec<ArrayD<T>>> {
    let mut data = values.to_vec();
    data[element] += delta;
    let mut shifted = inputs.to_vec();
    shifted[which] = ArrayD::from_shape_vec(IxDyn(inputs[which].shape()), data)?;
    Ok(shifted)
}

/// Compare analytical and numerical gradients
fn compare_gradients<T: TtScalar>(
    analytical: &[ArrayD<T>],
    numerical: &[ArrayD<T>],
    config: &GradCheckConfig,
) -> Result<GradCheckResult> {
    let rtol = T::from_f64(config.rtol).ok_or_else(|| anyhow!("Failed to convert rtol"))?;
    let atol = T::from_f64(config.atol).ok_or_else(|| anyhow!("Failed to convert atol"))?;

    let mut max_abs_diff = 0.0_f64;
    let mut max_rel_diff = 0.0_f64;
    let mut num_failures = 0;
    let mut num_elements = 0;

    for (j, (a, n)) in analytical.iter().zip(numerical).enumerate() {
        if a.shape() != n.shape() {
            return Err(anyhow!(
                "Gradient shape {:?} doesn't match input shape {:?}",
                a.shape(),
                n.shape()
            ));
        }

        for (e, (&a_val, &n_val)) in a.iter().zip(n.iter()).enumerate() {
            let abs_diff = (a_val - n_val).abs();
            let rel_diff = if n_val.abs() > T::epsilon() {
                abs_diff / n_val.abs()
            } else {
                abs_diff
            };

            max_abs_diff = max_abs_diff.max(abs_diff.to_f64().unwrap_or(f64::INFINITY));
            max_rel_diff = max_rel_diff.max(rel_diff.to_f64().unwrap_or(f64::INFINITY));
            num_elements += 1;

            if abs_diff.is_nan() || (abs_diff > atol && rel_diff > rtol) {
                num_failures += 1;
                if config.verbose {
                    warn!(
                        input = j,
                        element = e,
                        analytical = %a_val,
                        numerical = %n_val,
                        "gradient mismatch"
                    );
                }
            }
        }
    }

    let passed = num_failures == 0;
    if config.verbose {
        info!(
            passed,
            num_failures, num_elements, max_abs_diff, max_rel_diff, "gradient check finished"
        );
    }

    Ok(GradCheckResult {
        max_abs_diff,
        max_rel_diff,
        passed,
        num_elements,
        num_failures,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn array(shape: &[usize], data: Vec<f64>) -> ArrayD<f64> {
        ArrayD::from_shape_vec(IxDyn(shape), data).unwrap()
    }

    #[test]
    fn test_detects_wrong_gradient() {
        let analytical = vec![array(&[2], vec![0.0, 0.0])];
        let numerical = vec![array(&[2], vec![2.0, 4.0])];
        let result =
            compare_gradients(&analytical, &numerical, &GradCheckConfig::default()).unwrap();
        assert!(!result.passed);
        assert_eq!(result.num_failures, 2);
        assert_eq!(result.num_elements, 2);
    }

    #[test]
    fn test_forward_difference() {
        let config = GradCheckConfig {
            use_central_diff: false,
            ..GradCheckConfig::default()
        }
        .with_tolerances(1e-3, 1e-3);
        let x = array(&[2, 2], vec![0.3, -0.7, 1.1, 0.2]);
        let result = check_gradient(
            |graph, inputs| {
                let t = graph.transpose(inputs[0])?;
                let prod = graph.matmul(inputs[0], t)?;
                graph.sum(prod)
            },
            &[x],
            &config,
        )
        .unwrap();
        assert!(result.passed, "{:?}", result);
    }

    #[test]
    fn test_hessian_vector_check() {
        let x = array(&[3], vec![0.5, -1.5, 2.0]);
        let v = array(&[3], vec![1.0, 0.5, -1.0]);
        let result = check_hessian_vector_product(
            |graph, inputs| {
                let sq = graph.mul(inputs[0], inputs[0])?;
                let s = graph.sum(sq)?;
                graph.mul(s, s)
            },
            &[x],
            &[v],
            &GradCheckConfig::default(),
        )
        .unwrap();
        assert!(result.passed, "{:?}", result);
    }
}
