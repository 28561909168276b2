//! Differentiable operations on TT expressions
//!
//! These are the building blocks user functions are written with. Everything
//! works core by core and never materializes the full tensor, except
//! [`full`] which exists for small problems and tests.
//!
//! # Complexity
//!
//! For N cores, mode size I and ranks R:
//! - [`flat_inner`]: O(N × I × R³)
//! - [`matvec`]: O(N × I² × R⁴)
//! - [`full`]: O(∏ₖ Iₖ × R²)

use crate::error::{ManifoldError, ManifoldResult};
use crate::tt_expr::TtExpr;
use tenrim_ad::Expr;
use tenrim_core::TtScalar;

/// Flat inner product ⟨a, b⟩ as a 0-way expression
///
/// Both TTs must have the same merged mode sizes; ranks may differ.
pub fn flat_inner<'g, T: TtScalar>(a: &TtExpr<'g, T>, b: &TtExpr<'g, T>) -> ManifoldResult<Expr> {
    a.ensure_same_graph(b)?;
    if a.mode_sizes() != b.mode_sizes() {
        return Err(ManifoldError::IncompatibleShapes(format!(
            "Inner product of TTs with modes {:?} and {:?}",
            a.raw_shape(),
            b.raw_shape()
        )));
    }

    let graph = a.graph();
    let modes = a.mode_sizes();
    let ranks_a = a.tt_ranks();
    let ranks_b = b.tt_ranks();

    // acc[α, β] contracts everything left of core k
    let mut acc = graph.ones(&[1, 1]);
    for k in 0..a.ndims() {
        let n = modes[k];
        let (ra, ra_next) = (ranks_a[k], ranks_a[k + 1]);
        let (rb, rb_next) = (ranks_b[k], ranks_b[k + 1]);

        let a_mat = graph.reshape(a.core(k), &[ra, n * ra_next])?;
        let tmp = graph.matmul(graph.transpose(acc)?, a_mat)?;
        let tmp = graph.reshape(tmp, &[rb * n, ra_next])?;
        let b_mat = graph.reshape(b.core(k), &[rb * n, rb_next])?;
        acc = graph.matmul(graph.transpose(tmp)?, b_mat)?;
    }

    Ok(graph.reshape(acc, &[])?)
}

/// Squared Frobenius norm ⟨a, a⟩
pub fn frobenius_norm_squared<'g, T: TtScalar>(a: &TtExpr<'g, T>) -> ManifoldResult<Expr> {
    flat_inner(a, a)
}

/// Dense tensor as a single expression
///
/// Plain TTs give shape (i₁, ..., iₙ); TT-matrices give the (∏ iₖ, ∏ jₖ)
/// matrix.
pub fn full<'g, T: TtScalar>(a: &TtExpr<'g, T>) -> ManifoldResult<Expr> {
    let graph = a.graph();
    let modes = a.mode_sizes();
    let ranks = a.tt_ranks();

    let mut acc = graph.reshape(a.core(0), &[modes[0], ranks[1]])?;
    let mut rows = modes[0];
    for k in 1..a.ndims() {
        let core = graph.reshape(a.core(k), &[ranks[k], modes[k] * ranks[k + 1]])?;
        let product = graph.matmul(acc, core)?;
        rows *= modes[k];
        acc = graph.reshape(product, &[rows, ranks[k + 1]])?;
    }

    let raw = a.raw_shape();
    if !a.is_tt_matrix() {
        let shape: Vec<usize> = raw.iter().map(|m| m[0]).collect();
        return Ok(graph.reshape(acc, &shape)?);
    }

    let d = raw.len();
    let interleaved: Vec<usize> = raw.iter().flat_map(|m| m.iter().copied()).collect();
    let axes: Vec<usize> = (0..d).map(|k| 2 * k).chain((0..d).map(|k| 2 * k + 1)).collect();
    let tensor = graph.reshape(acc, &interleaved)?;
    let permuted = graph.permute(tensor, &axes)?;
    let row_size: usize = raw.iter().map(|m| m[0]).product();
    let col_size: usize = raw.iter().map(|m| m[1]).product();
    Ok(graph.reshape(permuted, &[row_size, col_size])?)
}

/// Sum a + b; interior ranks add up
pub fn add<'g, T: TtScalar>(a: &TtExpr<'g, T>, b: &TtExpr<'g, T>) -> ManifoldResult<TtExpr<'g, T>> {
    a.ensure_same_graph(b)?;
    if a.raw_shape() != b.raw_shape() {
        return Err(ManifoldError::IncompatibleShapes(format!(
            "Cannot add TTs with modes {:?} and {:?}",
            a.raw_shape(),
            b.raw_shape()
        )));
    }

    let graph = a.graph();
    let d = a.ndims();
    if d == 1 {
        let core = graph.add(a.core(0), b.core(0))?;
        return TtExpr::from_cores(graph, vec![core]);
    }

    let last_axis = a.core_shape(0).len() - 1;
    let ranks_a = a.tt_ranks();
    let ranks_b = b.tt_ranks();

    let mut cores = Vec::with_capacity(d);
    for k in 0..d {
        let core = if k == 0 {
            graph.concat(&[a.core(k), b.core(k)], last_axis)?
        } else if k == d - 1 {
            graph.concat(&[a.core(k), b.core(k)], 0)?
        } else {
            let top = graph.pad(a.core(k), last_axis, 0, ranks_b[k + 1])?;
            let bottom = graph.pad(b.core(k), last_axis, ranks_a[k + 1], 0)?;
            graph.concat(&[top, bottom], 0)?
        };
        cores.push(core);
    }

    TtExpr::from_cores(graph, cores)
}

/// Multiply by a fixed scalar (applied to the first core)
pub fn scale<'g, T: TtScalar>(a: &TtExpr<'g, T>, alpha: T) -> ManifoldResult<TtExpr<'g, T>> {
    let graph = a.graph();
    let mut cores = a.cores().to_vec();
    cores[0] = graph.scale(cores[0], alpha)?;
    TtExpr::from_cores(graph, cores)
}

/// Multiply by a single-element expression (applied to the first core)
pub fn scalar_mul<'g, T: TtScalar>(a: &TtExpr<'g, T>, scalar: Expr) -> ManifoldResult<TtExpr<'g, T>> {
    let graph = a.graph();
    let mut cores = a.cores().to_vec();
    cores[0] = graph.scalar_mul(scalar, cores[0])?;
    TtExpr::from_cores(graph, cores)
}

/// Transpose of a TT-matrix (swaps row and column modes of every core)
pub fn transpose<'g, T: TtScalar>(a: &TtExpr<'g, T>) -> ManifoldResult<TtExpr<'g, T>> {
    if !a.is_tt_matrix() {
        return Err(ManifoldError::IncompatibleShapes(
            "Transpose needs a TT-matrix".to_string(),
        ));
    }
    let graph = a.graph();
    let cores = a
        .cores()
        .iter()
        .map(|core| graph.permute(*core, &[0, 2, 1, 3]))
        .collect::<Result<Vec<_>, _>>()?;
    TtExpr::from_cores(graph, cores)
}

/// TT-matrix by TT-vector product A x
///
/// The ranks of the result are the products of the ranks of A and x.
pub fn matvec<'g, T: TtScalar>(
    matrix: &TtExpr<'g, T>,
    vector: &TtExpr<'g, T>,
) -> ManifoldResult<TtExpr<'g, T>> {
    matrix.ensure_same_graph(vector)?;
    if !matrix.is_tt_matrix() || vector.is_tt_matrix() || matrix.ndims() != vector.ndims() {
        return Err(ManifoldError::IncompatibleShapes(
            "matvec needs a TT-matrix and a TT-vector with the same number of cores".to_string(),
        ));
    }
    let col_modes: Vec<usize> = matrix.raw_shape().iter().map(|m| m[1]).collect();
    if col_modes != vector.mode_sizes() {
        return Err(ManifoldError::IncompatibleShapes(format!(
            "Matrix column modes {:?} do not match vector modes {:?}",
            col_modes,
            vector.mode_sizes()
        )));
    }

    let graph = matrix.graph();
    let mut cores = Vec::with_capacity(matrix.ndims());
    for k in 0..matrix.ndims() {
        let (ra, n, m, ra_next) = match *matrix.core_shape(k) {
            [ra, n, m, ra_next] => (ra, n, m, ra_next),
            _ => {
                return Err(ManifoldError::IncompatibleShapes(format!(
                    "Matrix core {} has shape {:?}",
                    k,
                    matrix.core_shape(k)
                )))
            }
        };
        let (rb, rb_next) = (vector.core_shape(k)[0], vector.core_shape(k)[2]);

        // (ra, n, m, ra') -> (ra·ra'·n, m)
        let a = graph.permute(matrix.core(k), &[0, 3, 1, 2])?;
        let a = graph.reshape(a, &[ra * ra_next * n, m])?;
        // (rb, m, rb') -> (m, rb·rb')
        let x = graph.permute(vector.core(k), &[1, 0, 2])?;
        let x = graph.reshape(x, &[m, rb * rb_next])?;

        let product = graph.matmul(a, x)?;
        let product = graph.reshape(product, &[ra, ra_next, n, rb, rb_next])?;
        let product = graph.permute(product, &[0, 3, 2, 1, 4])?;
        cores.push(graph.reshape(product, &[ra * rb, n, ra_next * rb_next])?);
    }

    TtExpr::from_cores(graph, cores)
}

/// Quadratic form ⟨b, A c⟩
pub fn quadratic_form<'g, T: TtScalar>(
    matrix: &TtExpr<'g, T>,
    b: &TtExpr<'g, T>,
    c: &TtExpr<'g, T>,
) -> ManifoldResult<Expr> {
    let product = matvec(matrix, c)?;
    flat_inner(b, &product)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scirs2_core::ndarray_ext::{Array2, Ix2};
    use tenrim_ad::{Graph, Session};
    use tenrim_core::TensorTrain;

    fn dense(tt: &TensorTrain<f64>) -> Vec<f64> {
        tt.full().unwrap().iter().cloned().collect()
    }

    #[test]
    fn test_flat_inner_matches_concrete() {
        let graph = Graph::<f64>::new();
        let a = TensorTrain::<f64>::random(&[3, 2, 4], 2, 1).unwrap();
        let b = TensorTrain::<f64>::random(&[3, 2, 4], 3, 2).unwrap();
        let inner = flat_inner(&TtExpr::constant(&graph, &a), &TtExpr::constant(&graph, &b)).unwrap();

        let mut session = Session::new(&graph);
        let value = session.scalar(inner).unwrap();
        assert!((value - a.flat_inner(&b).unwrap()).abs() < 1e-10);
    }

    #[test]
    fn test_full_add_scale() {
        let graph = Graph::<f64>::new();
        let a = TensorTrain::<f64>::random(&[3, 2, 4], 2, 3).unwrap();
        let b = TensorTrain::<f64>::random(&[3, 2, 4], 2, 4).unwrap();
        let ea = TtExpr::constant(&graph, &a);
        let eb = TtExpr::constant(&graph, &b);

        let sum = add(&scale(&ea, 2.0).unwrap(), &eb).unwrap();
        assert_eq!(sum.tt_ranks(), vec![1, 4, 4, 1]);
        let dense_sum = full(&sum).unwrap();

        let mut session = Session::new(&graph);
        let value = session.run(&[dense_sum]).unwrap().remove(0);
        assert_eq!(value.shape(), &[3, 2, 4]);
        let expected: Vec<f64> = dense(&a)
            .iter()
            .zip(dense(&b))
            .map(|(x, y)| 2.0 * x + y)
            .collect();
        for (v, e) in value.iter().zip(expected) {
            assert!((v - e).abs() < 1e-12);
        }
    }

    #[test]
    fn test_matvec_matches_dense() {
        let graph = Graph::<f64>::new();
        let a = TensorTrain::<f64>::random_matrix(&[2, 3], &[3, 2], 2, 7).unwrap();
        let x = TensorTrain::<f64>::random(&[3, 2], 2, 8).unwrap();
        let ea = TtExpr::constant(&graph, &a);
        let ex = TtExpr::constant(&graph, &x);

        let y = matvec(&ea, &ex).unwrap();
        assert_eq!(y.raw_shape(), vec![vec![2], vec![3]]);
        let dense_y = full(&y).unwrap();
        let dense_at = full(&transpose(&ea).unwrap()).unwrap();

        let mut session = Session::new(&graph);
        let values = session.run(&[dense_y, dense_at]).unwrap();

        let matrix = a.full().unwrap().into_dimensionality::<Ix2>().unwrap();
        let vector = Array2::from_shape_vec((6, 1), dense(&x)).unwrap();
        let expected = matrix.dot(&vector);
        for (v, e) in values[0].iter().zip(expected.iter()) {
            assert!((v - e).abs() < 1e-10);
        }

        let at = values[1].clone().into_dimensionality::<Ix2>().unwrap();
        assert_eq!(at.dim(), (6, 6));
        for i in 0..6 {
            for j in 0..6 {
                assert!((at[[i, j]] - matrix[[j, i]]).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_quadratic_form() {
        let graph = Graph::<f64>::new();
        let a = TensorTrain::<f64>::random_matrix(&[2, 2], &[2, 2], 2, 9).unwrap();
        let b = TensorTrain::<f64>::random(&[2, 2], 2, 10).unwrap();
        let c = TensorTrain::<f64>::random(&[2, 2], 2, 11).unwrap();

        let q = quadratic_form(
            &TtExpr::constant(&graph, &a),
            &TtExpr::constant(&graph, &b),
            &TtExpr::constant(&graph, &c),
        )
        .unwrap();
        let mut session = Session::new(&graph);
        let value = session.scalar(q).unwrap();

        let matrix = a.full().unwrap().into_dimensionality::<Ix2>().unwrap();
        let bv = Array2::from_shape_vec((1, 4), dense(&b)).unwrap();
        let cv = Array2::from_shape_vec((4, 1), dense(&c)).unwrap();
        let expected = bv.dot(&matrix).dot(&cv)[[0, 0]];
        assert!((value - expected).abs() < 1e-10);
    }

    #[test]
    fn test_incompatible_inputs() {
        let graph = Graph::<f64>::new();
        let a = TtExpr::constant(&graph, &TensorTrain::<f64>::random(&[2, 3], 1, 0).unwrap());
        let b = TtExpr::constant(&graph, &TensorTrain::<f64>::random(&[3, 2], 1, 0).unwrap());
        assert!(matches!(
            flat_inner(&a, &b),
            Err(ManifoldError::IncompatibleShapes(_))
        ));
        assert!(matches!(add(&a, &b), Err(ManifoldError::IncompatibleShapes(_))));
        assert!(matches!(matvec(&a, &b), Err(ManifoldError::IncompatibleShapes(_))));
        assert!(matches!(transpose(&a), Err(ManifoldError::IncompatibleShapes(_))));
    }
}
