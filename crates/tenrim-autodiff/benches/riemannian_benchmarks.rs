//! Performance benchmarks for Riemannian derivatives
//!
//! Benchmarks:
//! - Riemannian gradient of ½⟨x, t⟩² for growing mode sizes and ranks
//! - Hessian-vector product of the same function
//! - Cost of the invariance check

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;
use tenrim_ad::Expr;
use tenrim_autodiff::{gradient, hessian_vector_product, RiemannianOptions};
use tenrim_core::TensorTrain;
use tenrim_manifold::{flat_inner, ManifoldResult, TtExpr};

fn half_squared_inner<'g>(x: &TtExpr<'g, f64>, t: &TensorTrain<f64>) -> ManifoldResult<Expr> {
    let graph = x.graph();
    let ip = flat_inner(x, &TtExpr::constant(graph, t))?;
    Ok(graph.scale(graph.mul(ip, ip)?, 0.5)?)
}

fn quiet() -> RiemannianOptions {
    RiemannianOptions::default()
        .with_debug(false)
        .with_debug_advisory(false)
}

/// Benchmark the gradient for (mode size, rank) pairs on 4 cores
fn bench_gradient(c: &mut Criterion) {
    let mut group = c.benchmark_group("riemannian_gradient");

    for &(n, r) in [(4, 2), (8, 4), (16, 8)].iter() {
        let x = TensorTrain::<f64>::random(&[n; 4], r, 0).unwrap();
        let t = TensorTrain::<f64>::random(&[n; 4], r, 1).unwrap();
        let options = quiet();
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("n{}_r{}", n, r)),
            &(x, t),
            |bencher, (x, t)| {
                bencher.iter(|| {
                    let grad = gradient(|tt| half_squared_inner(tt, t), black_box(x), &options).unwrap();
                    black_box(grad);
                });
            },
        );
    }
    group.finish();
}

/// Benchmark the Hessian-vector product on 4 cores
fn bench_hessian_vector_product(c: &mut Criterion) {
    let mut group = c.benchmark_group("riemannian_hessian_vector_product");

    for &(n, r) in [(4, 2), (8, 4)].iter() {
        let x = TensorTrain::<f64>::random(&[n; 4], r, 0).unwrap();
        let t = TensorTrain::<f64>::random(&[n; 4], r, 1).unwrap();
        let v = TensorTrain::<f64>::random(&[n; 4], r, 2).unwrap();
        let options = quiet();
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("n{}_r{}", n, r)),
            &(x, t, v),
            |bencher, (x, t, v)| {
                bencher.iter(|| {
                    let hvp = hessian_vector_product(
                        |tt| half_squared_inner(tt, t),
                        black_box(x),
                        black_box(v),
                        &options,
                    )
                    .unwrap();
                    black_box(hvp);
                });
            },
        );
    }
    group.finish();
}

/// Benchmark the gradient with and without the invariance check
fn bench_invariance_overhead(c: &mut Criterion) {
    let mut group = c.benchmark_group("invariance_overhead");
    let x = TensorTrain::<f64>::random(&[8; 4], 4, 0).unwrap();
    let t = TensorTrain::<f64>::random(&[8; 4], 4, 1).unwrap();

    for debug in [false, true] {
        let options = quiet().with_debug(debug);
        group.bench_with_input(BenchmarkId::from_parameter(debug), &debug, |bencher, _| {
            bencher.iter(|| {
                let grad = gradient(|tt| half_squared_inner(tt, &t), black_box(&x), &options).unwrap();
                black_box(grad);
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_gradient,
    bench_hessian_vector_product,
    bench_invariance_overhead
);
criterion_main!(benches);
