//! Symbolic reverse-mode differentiation.
//!
//! [`Graph::gradients`] walks the graph backwards from a single-element
//! output and appends the adjoint of every relevant node as new graph
//! expressions. Since the adjoints are ordinary nodes, calling `gradients`
//! on an expression that already contains adjoints differentiates twice.
//!
//! # Backward rules
//!
//! | Operation | Adjoint of inputs |
//! |-----------|-------------------|
//! | `a + b` | `g`, `g` |
//! | `a - b` | `g`, `-g` |
//! | `a * b` | `g * b`, `g * a` |
//! | `sum(a)` | `broadcast(g)` |
//! | `broadcast(a)` | `reshape(sum(g))` |
//! | `a @ b` | `g @ bᵀ`, `aᵀ @ g` |
//! | `permute(a, p)` | `permute(g, p⁻¹)` |
//! | `concat`, `slice`, `pad` | slices and pads of `g` |

use crate::error::{GraphError, GraphResult};
use crate::graph::{numel, Expr, Graph, NodeId, Operation};
use tenrim_core::TtScalar;
use tracing::trace;

impl<T: TtScalar> Graph<T> {
    /// Gradients of `output` with respect to each of `targets`
    ///
    /// # Arguments
    ///
    /// * `output` - Expression with exactly one element
    /// * `targets` - Expressions to differentiate against
    ///
    /// # Returns
    ///
    /// One expression per target, shaped like the target. Targets that do not
    /// influence `output` get a zero constant.
    ///
    /// # Errors
    ///
    /// [`GraphError::NotScalar`] when `output` has more than one element.
    pub fn gradients(&self, output: Expr, targets: &[Expr]) -> GraphResult<Vec<Expr>> {
        let output_shape = self.shape(output)?;
        if numel(&output_shape) != 1 {
            return Err(GraphError::NotScalar(output_shape));
        }
        for target in targets {
            self.shape(*target)?;
        }

        let n = output.id().0 + 1;
        let operations: Vec<Operation<T>> = self.nodes()[..n]
            .iter()
            .map(|node| node.operation.clone())
            .collect();

        // Nodes that depend on a target
        let mut from_target = vec![false; n];
        for target in targets {
            if let Some(flag) = from_target.get_mut(target.id().0) {
                *flag = true;
            }
        }
        for i in 0..n {
            if !from_target[i] && operations[i].inputs().iter().any(|p| from_target[p.0]) {
                from_target[i] = true;
            }
        }

        // Nodes the output depends on
        let mut to_output = vec![false; n];
        to_output[n - 1] = true;
        for i in (0..n).rev() {
            if to_output[i] {
                for parent in operations[i].inputs() {
                    to_output[parent.0] = true;
                }
            }
        }

        let relevant: Vec<bool> = (0..n).map(|i| from_target[i] && to_output[i]).collect();
        trace!(
            output = %output.id(),
            relevant = relevant.iter().filter(|&&r| r).count(),
            "building backward pass"
        );

        let mut adjoints: Vec<Option<Expr>> = vec![None; n];
        if relevant[n - 1] {
            adjoints[n - 1] = Some(self.ones(&output_shape));
        }

        for i in (0..n).rev() {
            let Some(adjoint) = adjoints[i].filter(|_| relevant[i]) else {
                continue;
            };
            for (parent, contribution) in self.backward_rule(&operations[i], adjoint, &relevant)? {
                adjoints[parent.0] = Some(match adjoints[parent.0] {
                    Some(acc) => self.add(acc, contribution)?,
                    None => contribution,
                });
            }
        }

        targets
            .iter()
            .map(|target| match adjoints.get(target.id().0).copied().flatten() {
                Some(adjoint) => Ok(adjoint),
                None => Ok(self.zeros(&self.shape(*target)?)),
            })
            .collect()
    }

    /// Adjoint contributions of one node to its relevant inputs
    fn backward_rule(
        &self,
        operation: &Operation<T>,
        g: Expr,
        relevant: &[bool],
    ) -> GraphResult<Vec<(NodeId, Expr)>> {
        let wanted = |id: &NodeId| relevant[id.0];
        let node = Expr::from_id;
        let mut out = Vec::new();

        match operation {
            Operation::Variable | Operation::Constant => {}
            Operation::Add { lhs, rhs } => {
                if wanted(lhs) {
                    out.push((*lhs, g));
                }
                if wanted(rhs) {
                    out.push((*rhs, g));
                }
            }
            Operation::Sub { lhs, rhs } => {
                if wanted(lhs) {
                    out.push((*lhs, g));
                }
                if wanted(rhs) {
                    out.push((*rhs, self.neg(g)?));
                }
            }
            Operation::Mul { lhs, rhs } => {
                if wanted(lhs) {
                    out.push((*lhs, self.mul(g, node(*rhs))?));
                }
                if wanted(rhs) {
                    out.push((*rhs, self.mul(g, node(*lhs))?));
                }
            }
            Operation::Neg { input } => {
                if wanted(input) {
                    out.push((*input, self.neg(g)?));
                }
            }
            Operation::Scale { input, factor } => {
                if wanted(input) {
                    out.push((*input, self.scale(g, *factor)?));
                }
            }
            Operation::Sum { input } => {
                if wanted(input) {
                    let shape = self.shape(node(*input))?;
                    out.push((*input, self.broadcast(g, &shape)?));
                }
            }
            Operation::Broadcast { input } => {
                if wanted(input) {
                    let shape = self.shape(node(*input))?;
                    let total = self.sum(g)?;
                    out.push((*input, self.reshape(total, &shape)?));
                }
            }
            Operation::Reshape { input } => {
                if wanted(input) {
                    let shape = self.shape(node(*input))?;
                    out.push((*input, self.reshape(g, &shape)?));
                }
            }
            Operation::Permute { input, axes } => {
                if wanted(input) {
                    let mut inverse = vec![0; axes.len()];
                    for (k, &axis) in axes.iter().enumerate() {
                        inverse[axis] = k;
                    }
                    out.push((*input, self.permute(g, &inverse)?));
                }
            }
            Operation::MatMul { lhs, rhs } => {
                if wanted(lhs) {
                    let rhs_t = self.transpose(node(*rhs))?;
                    out.push((*lhs, self.matmul(g, rhs_t)?));
                }
                if wanted(rhs) {
                    let lhs_t = self.transpose(node(*lhs))?;
                    out.push((*rhs, self.matmul(lhs_t, g)?));
                }
            }
            Operation::Concat { inputs, axis } => {
                let mut offset = 0;
                for input in inputs {
                    let len = self.shape(node(*input))?[*axis];
                    if wanted(input) {
                        out.push((*input, self.slice(g, *axis, offset, offset + len)?));
                    }
                    offset += len;
                }
            }
            Operation::Slice {
                input,
                axis,
                start,
                end,
            } => {
                if wanted(input) {
                    let len = self.shape(node(*input))?[*axis];
                    out.push((*input, self.pad(g, *axis, *start, len - *end)?));
                }
            }
            Operation::Pad {
                input,
                axis,
                before,
                ..
            } => {
                if wanted(input) {
                    let len = self.shape(node(*input))?[*axis];
                    out.push((*input, self.slice(g, *axis, *before, *before + len)?));
                }
            }
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use crate::{Graph, Session};
    use scirs2_core::ndarray_ext::{ArrayD, IxDyn};

    fn array(shape: &[usize], data: Vec<f64>) -> ArrayD<f64> {
        ArrayD::from_shape_vec(IxDyn(shape), data).unwrap()
    }

    #[test]
    fn test_gradient_of_matmul() {
        let graph = Graph::<f64>::new();
        let a = graph.variable(array(&[2, 2], vec![1.0, 2.0, 3.0, 4.0]));
        let b = graph.variable(array(&[2, 1], vec![5.0, 6.0]));
        let c = graph.matmul(a, b).unwrap();
        let loss = graph.sum(c).unwrap();

        let grads = graph.gradients(loss, &[a, b]).unwrap();
        let mut session = Session::new(&graph);
        let values = session.run(&grads).unwrap();

        // d/dA sum(A b) = 1 bᵀ, d/db = Aᵀ 1
        assert_eq!(values[0], array(&[2, 2], vec![5.0, 6.0, 5.0, 6.0]));
        assert_eq!(values[1], array(&[2, 1], vec![4.0, 6.0]));
    }

    #[test]
    fn test_unconnected_target_gets_zeros() {
        let graph = Graph::<f64>::new();
        let x = graph.variable(array(&[2], vec![1.0, 2.0]));
        let unused = graph.variable(array(&[3, 1], vec![1.0, 1.0, 1.0]));
        let loss = graph.dot(x, x).unwrap();

        let grads = graph.gradients(loss, &[unused, x]).unwrap();
        assert_eq!(graph.shape(grads[0]).unwrap(), vec![3, 1]);

        let mut session = Session::new(&graph);
        let values = session.run(&grads).unwrap();
        assert!(values[0].iter().all(|&v| v == 0.0));
        assert_eq!(values[1], array(&[2], vec![2.0, 4.0]));
    }

    #[test]
    fn test_non_scalar_output_is_rejected() {
        let graph = Graph::<f64>::new();
        let x = graph.variable(array(&[2], vec![1.0, 2.0]));
        assert!(matches!(
            graph.gradients(x, &[x]),
            Err(crate::GraphError::NotScalar(_))
        ));
    }

    #[test]
    fn test_single_element_output_of_any_shape() {
        let graph = Graph::<f64>::new();
        let x = graph.variable(array(&[1, 1], vec![3.0]));
        let y = graph.mul(x, x).unwrap();

        let grads = graph.gradients(y, &[x]).unwrap();
        let mut session = Session::new(&graph);
        assert_eq!(session.scalar(grads[0]).unwrap(), 6.0);
    }

    #[test]
    fn test_double_backprop_hessian_vector_product() {
        // f(x) = Σ x³, ∇f = 3x², ∇²f v = 6 x v
        let graph = Graph::<f64>::new();
        let x = graph.variable(array(&[3], vec![1.0, -2.0, 0.5]));
        let v = graph.constant(array(&[3], vec![1.0, 1.0, 2.0]));
        let cube = graph.mul(graph.mul(x, x).unwrap(), x).unwrap();
        let f = graph.sum(cube).unwrap();

        let grad = graph.gradients(f, &[x]).unwrap()[0];
        let directional = graph.dot(grad, v).unwrap();
        let hvp = graph.gradients(directional, &[x]).unwrap()[0];

        let mut session = Session::new(&graph);
        let values = session.run(&[grad, hvp]).unwrap();
        assert_eq!(values[0], array(&[3], vec![3.0, 12.0, 0.75]));
        assert_eq!(values[1], array(&[3], vec![6.0, -12.0, 6.0]));
    }

    #[test]
    fn test_second_derivative_through_layout_ops() {
        // f(x) = (Σ concat(x, 2x)[1..3])² for x = [a, b]
        // = (b + 2a)², ∇f = 2(b + 2a)·[2, 1]
        let graph = Graph::<f64>::new();
        let x = graph.variable(array(&[2], vec![1.0, 3.0]));
        let doubled = graph.scale(x, 2.0).unwrap();
        let joined = graph.concat(&[x, doubled], 0).unwrap();
        let middle = graph.slice(joined, 0, 1, 3).unwrap();
        let total = graph.sum(middle).unwrap();
        let f = graph.mul(total, total).unwrap();

        let grad = graph.gradients(f, &[x]).unwrap()[0];
        let first = graph.slice(grad, 0, 0, 1).unwrap();
        let first = graph.sum(first).unwrap();
        let second = graph.gradients(first, &[x]).unwrap()[0];

        let mut session = Session::new(&graph);
        let values = session.run(&[grad, second]).unwrap();
        assert_eq!(values[0], array(&[2], vec![20.0, 10.0]));
        // ∂/∂x of 4(b + 2a) = [8, 4]
        assert_eq!(values[1], array(&[2], vec![8.0, 4.0]));
    }
}
