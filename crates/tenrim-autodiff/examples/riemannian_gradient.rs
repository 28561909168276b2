//! Riemannian derivatives of a TT approximation objective
//!
//! This example demonstrates:
//! - Writing a function of a TT with differentiable TT operations
//! - Computing its Riemannian gradient and a Hessian-vector product
//! - Skipping the invariance check once a function is known to be valid
//! - How the invariance check rejects a representation-dependent function
//!
//! Run with: RUST_LOG=tenrim_autodiff=debug cargo run --example riemannian_gradient

use anyhow::Result;
use tenrim_ad::Expr;
use tenrim_autodiff::prelude::*;
use tenrim_core::TensorTrain;
use tenrim_manifold::{flat_inner, frobenius_norm_squared, ManifoldResult, TtExpr};
use tracing_subscriber::EnvFilter;

/// f(x) = ½‖x‖² − ⟨x, t⟩, which differs from ½‖x − t‖² by a constant
fn objective<'g>(x: &TtExpr<'g, f64>, t: &TensorTrain<f64>) -> ManifoldResult<Expr> {
    let graph = x.graph();
    let norm = frobenius_norm_squared(x)?;
    let ip = flat_inner(x, &TtExpr::constant(graph, t))?;
    Ok(graph.sub(graph.scale(norm, 0.5)?, ip)?)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== Riemannian Gradient on the TT Manifold ===\n");

    let shape = [4, 5, 4, 3];
    let t = TensorTrain::<f64>::random(&shape, 3, 42)?;
    let x = TensorTrain::<f64>::random(&shape, 3, 7)?;
    println!("Target ranks: {:?}", t.tt_ranks());
    println!("Point ranks:  {:?}\n", x.tt_ranks());

    let options = RiemannianOptions::default().with_name("completion");
    let grad = gradient(|tt| objective(tt, &t), &x, &options)?;
    println!("Gradient ranks: {:?}", grad.tt_ranks());
    println!("f(x) = {:.6}", 0.5 * x.flat_inner(&x)? - x.flat_inner(&t)?);
    println!("‖grad f(x)‖ = {:.6}", grad.frobenius_norm()?);

    let hvp = hessian_vector_product(|tt| objective(tt, &t), &x, &grad, &options)?;
    // ∇²f is the identity, so ⟨g, H g⟩ = ‖g‖²
    println!(
        "⟨g, H g⟩ = {:.6}, ‖g‖² = {:.6}\n",
        grad.flat_inner(&hvp)?,
        grad.flat_inner(&grad)?
    );

    let unchecked = gradient(|tt| objective(tt, &t), &x, &options.clone().with_debug(false))?;
    println!(
        "Without the invariance check: ‖difference‖ = {:.3e}",
        grad.sub(&unchecked)?.frobenius_norm()?
    );

    println!("\nA function of the first core only:");
    let rejected = gradient(
        |tt| Ok(tt.graph().sum(tt.core(0))?),
        &TensorTrain::<f64>::random(&shape, 2, 3)?,
        &RiemannianOptions::default(),
    );
    match rejected {
        Err(AutodiffError::NotInvariant {
            relative_difference,
            ..
        }) => println!("  rejected, relative difference {:.3e}", relative_difference),
        other => println!("  unexpected result: {:?}", other.map(|g| g.tt_ranks())),
    }

    Ok(())
}
