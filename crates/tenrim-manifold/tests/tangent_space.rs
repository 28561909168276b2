//! Differentiating through the tangent-space codec

use anyhow::Result;
use tenrim_ad::gradcheck::{check_gradient, GradCheckConfig};
use tenrim_ad::{Graph, Session};
use tenrim_core::{orthogonal_pair, TensorTrain};
use tenrim_manifold::{
    deltas_to_tangent_space, flat_inner, frobenius_norm_squared, matvec, project_tt,
    quadratic_form, TtExpr,
};

#[test]
fn test_gradient_through_encoding() -> Result<()> {
    let x = TensorTrain::<f64>::random(&[3, 2, 3], 2, 21)?;
    let t = TensorTrain::<f64>::random(&[3, 2, 3], 2, 22)?;
    let (left, right) = orthogonal_pair(&x)?;
    let inputs = TensorTrain::<f64>::random(&[3, 2, 3], 2, 23)?.into_cores();

    let result = check_gradient(
        |graph, deltas| {
            let tangent = deltas_to_tangent_space(graph, deltas, &x, &left, &right)
                .map_err(|e| tenrim_ad::GraphError::Evaluation(e.to_string()))?;
            let target = TtExpr::constant(graph, &t);
            let inner = flat_inner(tangent.as_tt(), &target)
                .map_err(|e| tenrim_ad::GraphError::Evaluation(e.to_string()))?;
            graph.mul(inner, inner)
        },
        &inputs,
        &GradCheckConfig::default(),
    )?;
    assert!(result.passed, "{:?}", result);
    Ok(())
}

#[test]
fn test_projection_does_not_increase_norm() -> Result<()> {
    let x = TensorTrain::<f64>::random_matrix(&[2, 2, 2], &[2, 2, 2], 2, 31)?;
    let z = TensorTrain::<f64>::random_matrix(&[2, 2, 2], &[2, 2, 2], 4, 32)?;
    let graph = Graph::new();
    let pz = project_tt(&graph, &z, &x)?;
    let norm = frobenius_norm_squared(pz.as_tt())?;

    let mut session = Session::new(&graph);
    let projected = session.scalar(norm)?;
    let total = z.flat_inner(&z)?;
    assert!(projected <= total + 1e-10);
    assert!(projected > 0.0);
    Ok(())
}

#[test]
fn test_quadratic_form_on_tangent_vector() -> Result<()> {
    let a = TensorTrain::<f64>::random_matrix(&[2, 3], &[2, 3], 2, 41)?;
    let x = TensorTrain::<f64>::random(&[2, 3], 2, 42)?;
    let graph = Graph::new();
    let ea = TtExpr::constant(&graph, &a);
    let ex = project_tt(&graph, &x, &x)?;

    let q = quadratic_form(&ea, ex.as_tt(), ex.as_tt())?;
    let ax = matvec(&ea, ex.as_tt())?;
    let q2 = flat_inner(ex.as_tt(), &ax)?;

    let mut session = Session::new(&graph);
    let v1 = session.scalar(q)?;
    let v2 = session.scalar(q2)?;
    let concrete = {
        let ax = a.full()?;
        let xv: Vec<f64> = x.full()?.iter().cloned().collect();
        let mut acc = 0.0;
        for i in 0..6 {
            for j in 0..6 {
                acc += xv[i] * ax[&[i, j][..]] * xv[j];
            }
        }
        acc
    };
    assert!((v1 - v2).abs() < 1e-10);
    assert!((v1 - concrete).abs() < 1e-9 * (1.0 + concrete.abs()));
    Ok(())
}
